use crate::report::{MARGIN, PAGE_HEIGHT, PAGE_WIDTH, ReportDocument};
use lopdf::{
    Document, Object, Stream, StringFormat,
    content::{Content, Operation},
    dictionary,
};

const TITLE_SIZE: f32 = 16.0;
const FIELD_SIZE: f32 = 11.0;
const FIELD_LEADING: f32 = 15.0;
const HEADING_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 10.0;
const BODY_LEADING: f32 = 12.0;
const FOOTER_SIZE: f32 = 9.0;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";
const OBLIQUE: &str = "F3";
const IMAGE: &str = "Im1";

/// Render a single-page A4 PDF.
#[tracing::instrument(skip(report), fields(record_id = %report.record_id))]
pub fn render_pdf(report: &ReportDocument) -> anyhow::Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = lopdf::Dictionary::new();
    for (name, base) in [
        (REGULAR, "Helvetica"),
        (BOLD, "Helvetica-Bold"),
        (OBLIQUE, "Helvetica-Oblique"),
    ] {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base,
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(name, font_id);
    }

    let mut resources = dictionary! { "Font" => fonts };

    if let Some(image) = &report.image {
        let image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.pixel_width as i64,
                "Height" => image.pixel_height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            image.jpeg.clone(),
        )
        .with_compression(false);
        let image_id = doc.add_object(image_stream);
        resources.set("XObject", dictionary! { IMAGE => image_id });
    }

    let resources_id = doc.add_object(resources);

    let content = Content {
        operations: layout(report),
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "MediaBox" => vec![0.into(), 0.into(), Object::from(PAGE_WIDTH), Object::from(PAGE_HEIGHT)],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// Top-down layout, y measured from the bottom of the page.
fn layout(report: &ReportDocument) -> Vec<Operation> {
    let mut ops = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    text(&mut ops, BOLD, TITLE_SIZE, MARGIN, y, report.title);
    y -= 30.0;

    for field in &report.fields {
        let line = format!("{}: {}", field.label, field.value);
        text(&mut ops, REGULAR, FIELD_SIZE, MARGIN, y, &line);
        y -= FIELD_LEADING;
    }
    y -= 5.0;

    if let Some(image) = &report.image {
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                Object::from(image.width),
                0.into(),
                0.into(),
                Object::from(image.height),
                Object::from(MARGIN),
                Object::from(y - image.height),
            ],
        ));
        ops.push(Operation::new("Do", vec![IMAGE.into()]));
        ops.push(Operation::new("Q", vec![]));
        y -= image.height + 20.0;
    }

    text(&mut ops, BOLD, HEADING_SIZE, MARGIN, y, report.description_heading);
    y -= 16.0;

    for line in &report.description_lines {
        text(&mut ops, REGULAR, BODY_SIZE, MARGIN, y, line);
        y -= BODY_LEADING;
    }

    ops.push(Operation::new("g", vec![Object::from(0.5_f32)]));
    text(&mut ops, OBLIQUE, FOOTER_SIZE, PAGE_WIDTH - 200.0, 30.0, report.footer);

    ops
}

fn text(ops: &mut Vec<Operation>, font: &str, size: f32, x: f32, y: f32, s: &str) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![font.into(), Object::from(size)]));
    ops.push(Operation::new("Td", vec![Object::from(x), Object::from(y)]));
    ops.push(Operation::new("Tj", vec![win_ansi(s)]));
    ops.push(Operation::new("ET", vec![]));
}

/// Latin-1 subset of WinAnsi; anything outside it becomes `?`.
fn win_ansi(s: &str) -> Object {
    let bytes = s
        .chars()
        .map(|c| u8::try_from(c as u32).unwrap_or(b'?'))
        .collect::<Vec<u8>>();
    Object::String(bytes, StringFormat::Literal)
}
