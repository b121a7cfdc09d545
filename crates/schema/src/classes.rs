use std::borrow::Cow;

/// Class table of the leaf-disease model, indexed by class id.
pub const CLASS_NAMES: [&str; 6] = [
    "algal",
    "blight",
    "Lcolletotrichum",
    "healthy",
    "phomopis",
    "rhizoctonia",
];

pub const HEALTHY_LABEL: &str = "healthy";

/// Dominant label reported when nothing usable was detected.
pub const NOT_DETECTED_LABEL: &str = "Not detected";

pub const NO_CANDIDATES_DESCRIPTION: &str = "The model did not detect any object in the image.";

pub const ALL_FILTERED_DESCRIPTION: &str =
    "Detected objects were too weak or too small and were filtered out.";

pub const FALLBACK_DESCRIPTION: &str = "No description available yet.";

const CLASS_DESCRIPTIONS: [(&str, &str); 6] = [
    (
        "algal",
        "Algal leaf spot: greenish to dull gray patches caused by parasitic algae.",
    ),
    (
        "blight",
        "Leaf blight: the leaf dries from the margin inward with spreading brown to blackish lesions.",
    ),
    (
        "Lcolletotrichum",
        "Anthracnose: dark brown, sometimes circular spots caused by the fungus Colletotrichum.",
    ),
    (
        "healthy",
        "Healthy leaf: evenly green with no spots or visible disease symptoms.",
    ),
    (
        "phomopis",
        "Phomopsis leaf spot: irregular necrotic spots surrounded by a yellow halo.",
    ),
    (
        "rhizoctonia",
        "Rhizoctonia leaf rot: large irregular lesions caused by the fungus Rhizoctonia.",
    ),
];

/// Resolve a class id to its label. Unknown ids get a synthesized
/// `class_<id>` label instead of being rejected.
pub fn label_for(class_id: u32) -> Cow<'static, str> {
    match CLASS_NAMES.get(class_id as usize) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(format!("class_{}", class_id)),
    }
}

/// Description text for a dominant label, or [`FALLBACK_DESCRIPTION`].
pub fn describe(label: &str) -> &'static str {
    CLASS_DESCRIPTIONS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, desc)| *desc)
        .unwrap_or(FALLBACK_DESCRIPTION)
}
