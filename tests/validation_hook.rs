//! Validation call counting (requires `--features test-hooks`).
//!
//! Kept in its own test binary so no other test touches the counter.

#![cfg(feature = "test-hooks")]

use certforge_core::pipeline::{get_validation_call_count, reset_validation_call_count};
use certforge_core::{BatchGenerator, DataRow, FieldSpec, FontResolver, Layout, OutputFormat, Template};

#[test]
fn invariant_every_run_validates_once() {
    reset_validation_call_count();

    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new("hook", vec![FieldSpec::new("Name").at(10, 10)]);
    let rows = vec![DataRow::new().with("Name", "Ada"), DataRow::new().with("Name", "Grace")];
    let generator = BatchGenerator::new(FontResolver::builtin_only());

    generator
        .run(&Template::blank(200, 100), &layout, &rows, dir.path(), OutputFormat::Png)
        .unwrap();
    assert_eq!(get_validation_call_count(), 1);

    generator.preview(&Template::blank(200, 100), &layout, &rows).unwrap();
    assert_eq!(get_validation_call_count(), 1);
}
