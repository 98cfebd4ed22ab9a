//! End-to-end: parse the widget fixture header with libclang and check the
//! generated wrapper module.

use std::path::Path;
use std::sync::LazyLock;

// libclang allows one live `Clang` instance per process, so the fixture is
// generated once and shared.
static WIDGET_RS: LazyLock<String> = LazyLock::new(|| {
    let config =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../tests/fixtures/widget/widget.toml");
    let out_dir = tempfile::tempdir().expect("temp dir");
    let out = out_dir.path().join("widget_gen.rs");
    let written = bnd_wrapgen::run(&config, Some(&out)).expect("generate widget wrappers");
    assert_eq!(written, out);
    std::fs::read_to_string(&written).expect("read generated module")
});

fn assert_contains(needle: &str) {
    assert!(
        WIDGET_RS.contains(needle),
        "generated module should contain {needle:?}.\n{}",
        *WIDGET_RS
    );
}

#[test]
fn imports_configured_ffi_path() {
    assert_contains("use crate::sys as ffi;");
    assert_contains("fn string_handle_text(s: ffi::WGString) -> String {");
    assert_contains("c_text(unsafe { ffi::wg_getCString(s) })");
}

#[test]
fn opaque_handle_becomes_struct() {
    assert_contains("/// An opaque drawing context.\n");
    assert_contains("pub struct Context {\n    c: ffi::WGContext,\n}");
    assert_contains("    pub fn new_context(flags: i32) -> Context {");
    assert_contains("    pub fn dispose(self) {");
    assert_contains("    pub fn shape_kind(self, index: u32) -> ShapeKind {");
    assert_contains("    pub fn origin(self) -> Point {");
}

#[test]
fn string_handle_results_are_strings() {
    assert_contains("    /// Returns the name of the context.\n    pub fn name(self) -> String {");
    assert_contains("ffi::wg_disposeString(o)");
    assert_contains("    pub fn set_context_name(self, name: &str) -> i32 {");
    assert!(
        !WIDGET_RS.contains("pub struct String"),
        "the string handle must not get a wrapper of its own"
    );
}

#[test]
fn enum_constants_and_spelling() {
    assert_contains("/// Kinds of shapes a context can draw.\n");
    assert_contains("pub struct ShapeKind(pub u32);");
    assert_contains("    pub const Shape_Circle: Self = Self(1);");
    assert_contains("    pub const Shape_Box: Self = Self(2);");
    assert_contains("Self::Shape_Square | Self::Shape_Box => \"Shape=Square, Box\".to_string(),");
    assert_contains("    pub fn shape_filled(self) -> bool {");
    assert_contains("impl std::fmt::Display for ShapeKind {");
}

#[test]
fn plain_struct_gets_getters_and_methods() {
    assert_contains("pub struct Point {\n    c: ffi::WGPoint,\n}");
    assert_contains("    pub fn x(self) -> i32 {");
    assert_contains("    pub fn y(self) -> i32 {");
    assert_contains("    pub fn length(self) -> f64 {");
}

#[test]
fn ignored_functions_are_not_wrapped() {
    assert!(!WIDGET_RS.contains("pub fn c_string("), "wg_getCString is ignored");
    assert!(!WIDGET_RS.contains("pub fn dispose_string("), "wg_disposeString is ignored");
}
