//! Batch Generation Tests
//!
//! End-to-end runs into temporary output directories.

use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use certforge_core::{
    fonts::BundledDir,
    templates::ArtifactKind,
    BatchGenerator, BatchRequest, CellValue, DataRow, FieldSpec, FontResolver, GenerationError, Layout, NamingPolicy,
    OutputFormat, RowEvent, Template,
};

fn fixture_fonts() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/fonts")
}

fn dejavu_generator() -> BatchGenerator {
    BatchGenerator::new(FontResolver::new(vec![Box::new(BundledDir::new(fixture_fonts()))]))
}

fn builtin_generator() -> BatchGenerator {
    BatchGenerator::new(FontResolver::builtin_only())
}

fn name_layout() -> Layout {
    Layout::new("names", vec![FieldSpec::new("Name").at(40, 40)])
}

fn named_rows(names: &[&str]) -> Vec<DataRow> {
    names
        .iter()
        .map(|n| DataRow::new().with("Name", *n).with("Course", "Web Development"))
        .collect()
}

fn file_names(paths: impl IntoIterator<Item = PathBuf>) -> Vec<String> {
    paths
        .into_iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn placed_name_is_inked_at_its_anchor() {
    let dir = tempfile::tempdir().unwrap();
    let template = Template::blank(1200, 800);
    let layout = Layout::new(
        "ada",
        vec![FieldSpec::new("Name").at(400, 300).with_font("DejaVuSans.ttf", 40)],
    );
    let rows = vec![DataRow::new().with("Name", "Ada Lovelace")];

    let report = dejavu_generator()
        .run(&template, &layout, &rows, dir.path(), OutputFormat::Png)
        .unwrap();
    assert_eq!(report.succeeded, 1);

    let output = &report.artifacts[0].output_path;
    assert_eq!(output, &dir.path().join("Ada_Lovelace.png"));
    let image = image::open(output).unwrap().to_rgb8();
    assert_eq!(image.dimensions(), (1200, 800));

    let font = FontResolver::new(vec![Box::new(BundledDir::new(fixture_fonts()))]).resolve("DejaVuSans.ttf", 40);
    assert!(!font.is_fallback());
    let right = 400 + font.text_width("Ada Lovelace");
    // no descenders, so ink ends above the next em
    let bottom = 300 + font.size() + font.size() / 4;

    let inked: Vec<(u32, u32)> = image
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0 != [255, 255, 255])
        .map(|(x, y, _)| (x, y))
        .collect();
    assert!(!inked.is_empty());
    assert!(inked.iter().all(|&(x, y)| x >= 400 && x < right && y >= 300 && y < bottom));
    assert!(inked.iter().any(|&(x, _)| x >= right - 40));
}

#[test]
fn duplicate_names_get_suffixes() {
    let dir = tempfile::tempdir().unwrap();
    let rows = named_rows(&["Grace Hopper", "Grace Hopper"]);

    let report = builtin_generator()
        .run(&Template::blank(300, 200), &name_layout(), &rows, dir.path(), OutputFormat::Png)
        .unwrap();

    let names = file_names(report.artifacts.iter().map(|a| a.output_path.clone()));
    assert_eq!(names, vec!["Grace_Hopper.png", "Grace_Hopper_1.png"]);
    assert!(dir.path().join("Grace_Hopper.png").is_file());
    assert!(dir.path().join("Grace_Hopper_1.png").is_file());
}

#[test]
fn colliding_identifiers_yield_distinct_paths() {
    let dir = tempfile::tempdir().unwrap();
    let rows = named_rows(&["Ada"; 6]);

    let report = builtin_generator()
        .run(&Template::blank(200, 100), &name_layout(), &rows, dir.path(), OutputFormat::Png)
        .unwrap();

    let mut paths: Vec<_> = report.artifacts.iter().map(|a| a.output_path.clone()).collect();
    assert_eq!(paths.len(), 6);
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 6);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 6);
}

#[test]
fn existing_files_are_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Ada.png"), b"from an earlier batch").unwrap();

    let report = builtin_generator()
        .run(&Template::blank(200, 100), &name_layout(), &named_rows(&["Ada"]), dir.path(), OutputFormat::Png)
        .unwrap();

    assert_eq!(report.artifacts[0].output_path, dir.path().join("Ada_1.png"));
    assert_eq!(fs::read(dir.path().join("Ada.png")).unwrap(), b"from an earlier batch");
}

#[test]
fn one_failing_row_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let mut rows = named_rows(&["Ada", "Grace", "Alan", "Edsger"]);
    rows[2].insert("Course", CellValue::Error { error: "#REF!".into() });

    let layout = Layout::new(
        "course",
        vec![FieldSpec::new("Name").at(10, 10), FieldSpec::new("Course").at(10, 50)],
    );
    let report = builtin_generator()
        .run(&Template::blank(400, 100), &layout, &rows, dir.path(), OutputFormat::Png)
        .unwrap();

    assert_eq!(report.attempted, 4);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].row_index, 2);
    assert!(report.errors[0].reason.contains("#REF!"));
    assert!(!dir.path().join("Alan.png").exists());
    assert!(dir.path().join("Edsger.png").exists());
}

#[test]
fn blank_identifier_row_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let rows = vec![
        DataRow::new().with("Name", "Ada"),
        DataRow::new().with("Name", CellValue::Empty),
        DataRow::new().with("Name", "  "),
        DataRow::new().with("Name", "Grace"),
    ];

    let report = builtin_generator()
        .run(&Template::blank(200, 100), &name_layout(), &rows, dir.path(), OutputFormat::Png)
        .unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.succeeded, 2);
    let skipped: Vec<_> = report.skipped.iter().map(|s| s.row_index).collect();
    assert_eq!(skipped, vec![1, 2]);
    assert!(report.errors.is_empty());
}

#[test]
fn composite_naming_policy() {
    let dir = tempfile::tempdir().unwrap();
    let mut layout = name_layout();
    layout.naming = NamingPolicy::Columns(vec!["Name".into(), "CertNo".into()]);
    let rows = vec![DataRow::new().with("Name", "Ada Lovelace").with("CertNo", "IN/042")];

    let report = builtin_generator()
        .run(&Template::blank(200, 100), &layout, &rows, dir.path(), OutputFormat::Png)
        .unwrap();

    assert_eq!(report.artifacts[0].output_path, dir.path().join("Ada_Lovelace_IN-042.png"));
}

#[test]
fn pdf_artifacts_are_single_page_documents() {
    let dir = tempfile::tempdir().unwrap();
    let report = builtin_generator()
        .run(&Template::blank(300, 200), &name_layout(), &named_rows(&["Ada"]), dir.path(), OutputFormat::Pdf)
        .unwrap();

    let artifact = &report.artifacts[0];
    assert_eq!(artifact.kind, ArtifactKind::Document);
    assert_eq!(artifact.output_path, dir.path().join("Ada.pdf"));

    let bytes = fs::read(&artifact.output_path).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(certforge_core::hashing::sha256_hex(&bytes), artifact.sha256);
    let doc = lopdf::Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

#[test]
fn jpeg_artifacts_decode() {
    let dir = tempfile::tempdir().unwrap();
    let report = builtin_generator()
        .run(&Template::blank(300, 200), &name_layout(), &named_rows(&["Ada"]), dir.path(), OutputFormat::Jpg)
        .unwrap();

    let image = image::open(&report.artifacts[0].output_path).unwrap();
    assert_eq!((image.width(), image.height()), (300, 200));
}

#[test]
fn observer_can_cancel_between_rows() {
    let dir = tempfile::tempdir().unwrap();
    let rows = named_rows(&["Ada", "Grace", "Alan"]);
    let mut seen = Vec::new();

    let report = builtin_generator()
        .run_with(&Template::blank(200, 100), &name_layout(), &rows, dir.path(), OutputFormat::Png, |event| {
            seen.push(event.row_index());
            if matches!(event, RowEvent::Generated { row_index: 1, .. }) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();

    assert_eq!(seen, vec![0, 1]);
    assert!(report.cancelled);
    assert_eq!(report.attempted, 2);
    assert!(!dir.path().join("Alan.png").exists());
}

#[test]
fn invalid_layout_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let layout = Layout::new("unplaced", vec![FieldSpec::new("Name")]);

    let err = builtin_generator()
        .run(&Template::blank(200, 100), &layout, &named_rows(&["Ada"]), &output, OutputFormat::Png)
        .unwrap_err();

    assert!(matches!(err, GenerationError::ValidationFailed(_)));
    assert!(!output.exists());
}

#[test]
fn manifest_is_written_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let report = builtin_generator()
        .with_manifest(true)
        .run(&Template::blank(200, 100), &name_layout(), &named_rows(&["Ada"]), dir.path(), OutputFormat::Png)
        .unwrap();

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest["batchId"], report.batch_id.as_str());
    assert_eq!(manifest["succeeded"], 1);
    assert_eq!(manifest["artifacts"][0]["sourceRowIndex"], 0);
}

#[test]
fn generate_loads_inputs_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("template.png");
    Template::blank(300, 200).image().save(&template_path).unwrap();
    let data_path = dir.path().join("rows.json");
    fs::write(&data_path, r#"[{"Name": "Ada"}, {"Name": "Grace"}]"#).unwrap();

    let request = BatchRequest {
        template_path,
        data_path,
        layout: name_layout(),
        output_dir: dir.path().join("certificates"),
        format: Some(OutputFormat::Jpg),
    };
    let report = builtin_generator().generate(&request).unwrap();

    let names = file_names(report.artifacts.iter().map(|a| a.output_path.clone()));
    assert_eq!(names, vec!["Ada.jpg", "Grace.jpg"]);
}

#[test]
fn unreadable_inputs_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("rows.json");
    fs::write(&data_path, r#"[{"Name": "Ada"}]"#).unwrap();

    let request = BatchRequest {
        template_path: dir.path().join("missing.png"),
        data_path: data_path.clone(),
        layout: name_layout(),
        output_dir: dir.path().join("out"),
        format: None,
    };
    assert!(matches!(builtin_generator().generate(&request), Err(GenerationError::Template(_))));

    let template_path = dir.path().join("template.png");
    Template::blank(100, 100).image().save(&template_path).unwrap();
    let request = BatchRequest {
        template_path,
        data_path: dir.path().join("missing.json"),
        ..request
    };
    assert!(matches!(builtin_generator().generate(&request), Err(GenerationError::Data(_))));
}
