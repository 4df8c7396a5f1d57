mod common;

use common::{engine, open};
use tempfile::TempDir;
use typeset_preview::export::{ExportError, save_surface_png, save_text_layer_json};
use typeset_preview::preview::TextItem;
use typeset_preview::test_utils::{FakeBackend, page_shade};

#[test]
fn painted_surface_saves_as_png_at_buffer_size() {
    let backend = FakeBackend::uniform(1);
    let mut engine = engine(&backend);
    open(&mut engine, "doc", 800.0);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("page-1.png");
    let surface = engine.surface(1).unwrap();
    save_surface_png(surface, &path).unwrap();

    let image = image::open(&path).unwrap().to_rgb8();
    assert_eq!(image.width(), surface.pixel_width);
    assert_eq!(image.height(), surface.pixel_height);
    assert_eq!(image.get_pixel(0, 0).0, [page_shade(1); 3]);
}

#[test]
fn unpainted_surface_is_rejected() {
    let backend = FakeBackend::uniform(1).fail_page(1);
    let mut engine = engine(&backend);
    open(&mut engine, "doc", 800.0);

    let dir = TempDir::new().unwrap();
    let result = save_surface_png(engine.surface(1).unwrap(), &dir.path().join("blank.png"));
    assert!(matches!(result, Err(ExportError::NotPainted)));
}

#[test]
fn text_layer_saves_as_json_in_css_pixels() {
    let backend = FakeBackend::uniform(1).text(
        1,
        vec![TextItem {
            text: "Abstract".to_string(),
            x: 306.0,
            y: 100.0,
            width: 60.0,
            height: 12.0,
            font_size: 10.0,
        }],
    );
    let mut engine = engine(&backend);
    open(&mut engine, "doc", 660.0);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("page-1.text.json");
    save_text_layer_json(engine.text_layer(1).unwrap(), &path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let span = &json["spans"][0];
    assert_eq!(span["text"], "Abstract");
    // 660 - 48 = 612: the page is shown at scale 1
    assert!((span["left"].as_f64().unwrap() - 306.0).abs() < 1e-9);
    assert!((json["width"].as_f64().unwrap() - 612.0).abs() < 1e-9);
}
