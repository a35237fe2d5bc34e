//! Integration test: assemble a two-sheet PDF and read it back.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::{Rgb, RgbImage};
use lopdf::{Document, Object};
use mapcutter_core::{Orientation, PaperFormat};
use mapcutter_export::pdf::mm_to_pt;
use mapcutter_export::{DocumentBuilder, PdfDocument, RasterFormat, RasterImage};

fn sheet(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
}

fn media_box(doc: &Document, page: lopdf::ObjectId) -> Vec<f32> {
    let dict = doc.get_dictionary(page).unwrap();
    dict.get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|o| match o {
            Object::Integer(i) => *i as f32,
            other => other.as_float().unwrap(),
        })
        .collect()
}

#[test]
fn pages_images_and_captions_survive_round_trip() {
    let jpeg = RasterImage::encode(&sheet(200, 280), RasterFormat::Jpeg, 90).unwrap();
    let png = RasterImage::encode(&sheet(280, 200), RasterFormat::Png, 0).unwrap();

    let mut pdf = PdfDocument::new();
    pdf.add_page(PaperFormat::A4, Orientation::Portrait);
    pdf.add_image(&jpeg, 5.0, 5.0, 200.0, 287.0).unwrap();
    pdf.add_text("Map 1 of 2 · 1.00km · 1.00km of 2.00km total", 5.0, 295.0)
        .unwrap();
    pdf.add_page(PaperFormat::A4, Orientation::Landscape);
    pdf.add_image(&png, 5.0, 5.0, 287.0, 200.0).unwrap();
    assert_eq!(pdf.page_count(), 2);

    let bytes = pdf.to_bytes().unwrap();
    assert!(bytes.starts_with(b"%PDF-1.5"));

    let doc = Document::load_mem(&bytes).expect("generated pdf should parse");
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 2);

    let portrait = media_box(&doc, pages[&1]);
    assert!((portrait[2] - mm_to_pt(210.0) as f32).abs() < 0.01);
    assert!((portrait[3] - mm_to_pt(297.0) as f32).abs() < 0.01);
    let landscape = media_box(&doc, pages[&2]);
    assert!(landscape[2] > landscape[3]);

    let filters: Vec<_> = doc
        .objects
        .values()
        .filter_map(|o| o.as_stream().ok())
        .filter(|s| s.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Image".as_slice()))
        .map(|s| s.dict.get(b"Filter").and_then(Object::as_name).ok().map(<[u8]>::to_vec))
        .collect();
    assert_eq!(filters.len(), 2);
    assert!(filters.contains(&Some(b"DCTDecode".to_vec())));
    assert!(filters.contains(&None));

    let content = doc.get_page_content(pages[&1]).unwrap();
    assert!(
        content.windows(10).any(|w| w == b"Map 1 of 2"),
        "caption missing from first page"
    );
    // The middle dot is WinAnsi 0xB7.
    assert!(content.contains(&0xB7));
}

#[test]
fn save_writes_file() {
    let dir = std::env::temp_dir().join(format!("mapcutter-export-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("sheets.pdf");

    let jpeg = RasterImage::encode(&sheet(10, 14), RasterFormat::Jpeg, 90).unwrap();
    let mut pdf = PdfDocument::new();
    pdf.add_page(PaperFormat::A6, Orientation::Portrait);
    pdf.add_image(&jpeg, 0.0, 0.0, 105.0, 148.0).unwrap();
    pdf.save(&path).unwrap();

    let written = std::fs::read(&path).unwrap();
    assert!(written.starts_with(b"%PDF"));
    std::fs::remove_dir_all(&dir).unwrap();
}
