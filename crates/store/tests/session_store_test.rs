use image::{Rgb, RgbImage};
use schema::{BoundingBox, Detection, DetectionRecord};
use std::fs;
use store::{SessionId, SessionStore, StoreError, StoreLayout};
use tempfile::tempdir;

fn record(id: &str, label: &str) -> DetectionRecord {
    DetectionRecord {
        id: id.to_string(),
        timestamp: "2024-06-10T12:13:20".to_string(),
        dominant_label: label.to_string(),
        description: format!("description of {label}"),
        detections: vec![Detection {
            class_id: 3,
            confidence: 0.912,
            label: label.to_string(),
            bbox: BoundingBox::new(0.41, 0.52, 0.3333333333333333, 0.25),
        }],
        inference_time: 0.143,
        image_path: format!("detected_images/x/{id}.jpg"),
    }
}

fn store_in(dir: &std::path::Path) -> SessionStore {
    SessionStore::new(StoreLayout::under(dir))
}

/// Test the full append / list / find round trip
///
/// Tests:
/// - Missing log reads as empty
/// - Insertion order is preserved
/// - Records read back field-for-field identical
#[test]
fn test_append_list_find_round_trip() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let session = SessionId::generate();

    assert!(store.list(&session).is_empty(), "New session should be empty");

    let first = record("1700000000000000001", "healthy");
    let second = record("1700000000000000002", "blight");
    store.append(&session, first.clone()).unwrap();
    store.append(&session, second.clone()).unwrap();

    let records = store.list(&session);
    assert_eq!(records, vec![first.clone(), second.clone()]);

    assert_eq!(store.find_by_id(&session, &second.id), Some(second));
    assert_eq!(store.find_by_id(&session, "1700000000000000003"), None);
}

#[test]
fn test_duplicate_record_id_rejected() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let session = SessionId::generate();

    store.append(&session, record("42", "healthy")).unwrap();
    let err = store.append(&session, record("42", "algal")).unwrap_err();

    assert!(matches!(err, StoreError::DuplicateRecord(id) if id == "42"));
    assert_eq!(store.list(&session).len(), 1);
}

#[test]
fn test_log_is_pretty_json_array_on_disk() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let session = SessionId::generate();

    store.append(&session, record("7", "healthy")).unwrap();

    let raw = fs::read_to_string(store.layout().log_path(&session)).unwrap();
    assert!(raw.starts_with("[\n  {"), "log should be a pretty-printed array");

    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entry = &value[0];
    for key in [
        "id",
        "timestamp",
        "dominant_label",
        "description",
        "detections",
        "inference_time",
        "image_path",
    ] {
        assert!(entry.get(key).is_some(), "missing field {key}");
    }
    assert_eq!(entry["detections"][0]["bbox"]["x_center"], 0.41);
}

/// Test corruption tolerance
///
/// Tests:
/// - Invalid JSON reads as empty
/// - Non-array JSON reads as empty
/// - Malformed entries are skipped, valid ones kept
/// - Appending after corruption starts a fresh log
#[test]
fn test_corrupt_log_reads_as_empty() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let session = SessionId::generate();
    let log_path = store.layout().log_path(&session);
    fs::create_dir_all(log_path.parent().unwrap()).unwrap();

    fs::write(&log_path, b"[{\"id\": \"1\", trunc").unwrap();
    assert!(store.list(&session).is_empty());

    fs::write(&log_path, b"{\"id\": \"1\"}").unwrap();
    assert!(store.list(&session).is_empty());

    let good = serde_json::to_value(record("5", "healthy")).unwrap();
    let mixed = serde_json::json!([{"id": "broken"}, good]);
    fs::write(&log_path, serde_json::to_vec(&mixed).unwrap()).unwrap();
    let records = store.list(&session);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "5");

    fs::write(&log_path, b"\xff\xfe garbage").unwrap();
    store.append(&session, record("6", "algal")).unwrap();
    assert_eq!(store.list(&session).len(), 1);
}

#[test]
fn test_append_drops_malformed_entries_from_log() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let session = SessionId::generate();
    let log_path = store.layout().log_path(&session);
    fs::create_dir_all(log_path.parent().unwrap()).unwrap();

    let good = serde_json::to_value(record("5", "healthy")).unwrap();
    let mixed = serde_json::json!([{"id": "broken"}, good]);
    fs::write(&log_path, serde_json::to_vec(&mixed).unwrap()).unwrap();

    store.append(&session, record("6", "algal")).unwrap();

    let on_disk: serde_json::Value = serde_json::from_slice(&fs::read(&log_path).unwrap()).unwrap();
    let ids: Vec<&str> = on_disk
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["5", "6"]);
}

/// Test that two sessions never see each other's data
#[test]
fn test_session_isolation() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let a = SessionId::generate();
    let b = SessionId::generate();
    let img = RgbImage::from_pixel(8, 8, Rgb([10, 200, 10]));

    store.append(&a, record("1", "healthy")).unwrap();
    store.save_image(&a, "1", &img).unwrap();
    store.append(&b, record("2", "blight")).unwrap();
    store.save_image(&b, "2", &img).unwrap();
    store.append(&a, record("3", "algal")).unwrap();

    let ids = |s: &SessionId| store.list(s).into_iter().map(|r| r.id).collect::<Vec<_>>();
    assert_eq!(ids(&a), vec!["1", "3"]);
    assert_eq!(ids(&b), vec!["2"]);

    assert!(store.find_by_id(&a, "2").is_none());
    assert!(store.find_by_id(&b, "1").is_none());
    assert!(store.read_image(&a, "2").unwrap().is_none());

    store.clear(&a).unwrap();

    assert!(store.list(&a).is_empty());
    assert_eq!(ids(&b), vec!["2"]);
    assert!(store.read_image(&b, "2").unwrap().is_some());
}

#[test]
fn test_clear_removes_all_records_and_images() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let session = SessionId::generate();
    let img = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));

    for i in 0..5 {
        let id = format!("17000000000000000{i:02}");
        store.save_image(&session, &id, &img).unwrap();
        store.append(&session, record(&id, "healthy")).unwrap();
    }
    assert_eq!(store.list(&session).len(), 5);

    store.clear(&session).unwrap();

    assert!(store.list(&session).is_empty());
    assert!(!store.layout().image_dir(&session).exists());
}

#[test]
fn test_clear_without_images_succeeds() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let session = SessionId::generate();

    store.clear(&session).unwrap();

    assert!(store.list(&session).is_empty());
    assert!(store.layout().log_path(&session).exists());
}

#[test]
fn test_save_read_remove_image() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let session = SessionId::generate();
    let img = RgbImage::from_pixel(32, 16, Rgb([200, 30, 30]));

    let path = store.save_image(&session, "99", &img).unwrap();
    assert_eq!(path, store.layout().image_path(&session, "99").unwrap());

    let bytes = store.read_image(&session, "99").unwrap().unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 16));

    store.remove_image(&session, "99");
    assert!(store.read_image(&session, "99").unwrap().is_none());

    // Removing twice is fine
    store.remove_image(&session, "99");
}

#[test]
fn test_invalid_record_id_is_rejected_for_images() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let session = SessionId::generate();

    assert!(matches!(
        store.read_image(&session, "../../etc/passwd"),
        Err(StoreError::InvalidRecordId(_))
    ));
}

/// Test that an image the JPEG encoder rejects leaves nothing on disk
///
/// Tests:
/// - Widths above 65535 fail to encode
/// - No `<id>.jpg` or temp file is left in the session's image directory
#[test]
fn test_failed_image_encode_leaves_no_file() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let session = SessionId::generate();
    let too_wide = RgbImage::from_pixel(70_000, 1, Rgb([10, 120, 40]));

    let result = store.save_image(&session, "77", &too_wide);

    assert!(matches!(result, Err(StoreError::ImageEncoding(_))));
    assert!(store.read_image(&session, "77").unwrap().is_none());
    let image_dir = store.layout().image_dir(&session);
    let leftovers = fs::read_dir(&image_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0, "no partial files in {}", image_dir.display());
}
