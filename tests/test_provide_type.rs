//! End-to-end type queries over the `provide_type_pyi` fixture.
//!
//! `usage.py` imports a class, a function and a constant from
//! `types_stub.pyi`; each query position below points at one of them.

use std::path::Path;

use once_cell::sync::Lazy;
use rayon::prelude::*;
use rstest::rstest;
use stubtype::ide::{AnalysisHost, TypeDescriptor, TypeKind};
use stubtype::{FileId, LineCol};

const STUB: &str = include_str!("fixtures/provide_type_pyi/types_stub.pyi");
const USAGE: &str = include_str!("fixtures/provide_type_pyi/usage.py");

const STUB_PATH: &str = "/fixture/types_stub.pyi";
const USAGE_PATH: &str = "/fixture/usage.py";

// ============================================================================
// SHARED FIXTURE
// ============================================================================

struct Fixture {
    host: AnalysisHost,
    usage: FileId,
}

static FIXTURE: Lazy<Fixture> = Lazy::new(|| {
    let mut host = AnalysisHost::new();
    host.add_search_root("/fixture");
    host.set_file_content(STUB_PATH, STUB)
        .expect("stub should build");
    let usage = host
        .set_file_content(USAGE_PATH, USAGE)
        .expect("usage should build");
    Fixture { host, usage }
});

fn query(line: u32, col: u32) -> TypeDescriptor {
    let fixture = &*FIXTURE;
    fixture
        .host
        .analysis()
        .type_at_position(fixture.usage, LineCol::new(line, col))
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[rstest]
// `instance` at its definition
#[case::instance_definition(3, 0, TypeKind::Instance, "MyClass")]
// `MyClass(42)`
#[case::constructor_call(3, 18, TypeKind::Instance, "MyClass")]
#[case::class_reference(3, 11, TypeKind::Class, "type[MyClass]")]
// `instance.get_value()`
#[case::method_call(6, 27, TypeKind::Scalar, "bool")]
#[case::bound_method(6, 20, TypeKind::Function, "() -> bool")]
#[case::method_receiver(6, 9, TypeKind::Instance, "MyClass")]
#[case::result_definition(6, 0, TypeKind::Scalar, "bool")]
// `utility_function(10, "test")`
#[case::function_call(9, 23, TypeKind::Scalar, "bool")]
#[case::function_reference(9, 7, TypeKind::Function, "(a: int, b: str) -> bool")]
#[case::argument_literal(9, 24, TypeKind::Scalar, "int")]
#[case::flag_definition(9, 0, TypeKind::Scalar, "bool")]
// `MY_CONSTANT`
#[case::constant_usage(12, 8, TypeKind::Scalar, "int")]
#[case::value_definition(12, 0, TypeKind::Scalar, "int")]
// the import statement itself
#[case::imported_class(0, 23, TypeKind::Class, "type[MyClass]")]
#[case::imported_constant(0, 50, TypeKind::Scalar, "int")]
fn test_resolved_positions(
    #[case] line: u32,
    #[case] col: u32,
    #[case] kind: TypeKind,
    #[case] display_name: &str,
) {
    let descriptor = query(line, col);
    assert!(descriptor.resolved, "{line}:{col} should resolve");
    assert_eq!(descriptor.kind, Some(kind), "{line}:{col}");
    assert_eq!(descriptor.display_name, display_name, "{line}:{col}");
    assert_eq!(descriptor.unresolved_reason, None);
}

#[test]
fn test_instance_origin() {
    let descriptor = query(3, 0);
    assert_eq!(descriptor.origin_module.as_deref(), Some("types_stub"));
    assert_eq!(descriptor.qualified_name.as_deref(), Some("types_stub.MyClass"));
}

#[test]
fn test_scalar_origin_is_builtins() {
    let descriptor = query(12, 8);
    assert_eq!(descriptor.origin_module.as_deref(), Some("builtins"));
}

#[rstest]
// blank line between statements
#[case::blank_line(1, 0)]
// whitespace around `=`
#[case::between_tokens(3, 8)]
// inside a comment
#[case::comment(2, 4)]
// past the end of the file
#[case::past_end(40, 0)]
fn test_positions_without_nodes(#[case] line: u32, #[case] col: u32) {
    let descriptor = query(line, col);
    assert!(!descriptor.resolved, "{line}:{col}");
    assert_eq!(descriptor.kind, None);
    assert_eq!(descriptor.display_name, "");
}

#[test]
fn test_import_from_broken_module() {
    let mut host = AnalysisHost::new();
    let err = host
        .set_file_content("/broken/types_stub.pyi", "class MyClass(:\n    ...\n")
        .unwrap_err();
    assert_eq!(err.module().as_str(), "types_stub");

    let usage = host.set_file_content("/broken/usage.py", USAGE).unwrap();
    let descriptor = host
        .analysis()
        .type_at_position(usage, LineCol::new(3, 0));

    assert!(descriptor.resolved);
    assert_eq!(descriptor.kind, Some(TypeKind::Unknown));
    assert_eq!(descriptor.display_name, "Unknown");
    assert!(descriptor.unresolved_reason.is_some());
}

// ============================================================================
// BATCHES AND SNAPSHOTS
// ============================================================================

#[test]
fn test_provide_type_batch_preserves_order() {
    let fixture = &*FIXTURE;
    let positions = [LineCol::new(12, 8), LineCol::new(1, 0), LineCol::new(3, 0)];
    let response = fixture
        .host
        .analysis()
        .provide_type(fixture.usage, &positions)
        .expect("usage.py is tracked");

    let names: Vec<_> = response
        .contents
        .iter()
        .map(|d| d.display_name.as_str())
        .collect();
    assert_eq!(names, ["int", "", "MyClass"]);
}

#[test]
fn test_provide_type_for_untracked_file() {
    let analysis = FIXTURE.host.analysis();
    assert!(analysis.file_id(Path::new("/fixture/other.py")).is_none());
    assert!(
        analysis
            .provide_type(FileId::new(4242), &[LineCol::new(0, 0)])
            .is_none()
    );
}

#[test]
fn test_queries_are_idempotent() {
    let first = query(6, 27);
    let second = query(6, 27);
    assert_eq!(first, second);
}

#[test]
fn test_parallel_queries_agree() {
    let fixture = &*FIXTURE;
    let analysis = fixture.host.analysis();
    let positions: Vec<_> = (0..13).flat_map(|line| (0..30).map(move |col| (line, col))).collect();

    let serial: Vec<_> = positions
        .iter()
        .map(|&(line, col)| analysis.type_at_position(fixture.usage, LineCol::new(line, col)))
        .collect();
    let parallel: Vec<_> = positions
        .par_iter()
        .map(|&(line, col)| analysis.type_at_position(fixture.usage, LineCol::new(line, col)))
        .collect();

    assert_eq!(serial, parallel);
}

#[test]
fn test_fixture_has_no_diagnostics() {
    let fixture = &*FIXTURE;
    let analysis = fixture.host.analysis();
    assert!(analysis.diagnostics(fixture.usage).is_empty());

    let stub = analysis.file_id(Path::new(STUB_PATH)).unwrap();
    assert!(analysis.diagnostics(stub).is_empty());
}

#[cfg(feature = "serde")]
#[test]
fn test_descriptor_wire_format() {
    let descriptor = query(3, 0);
    let json = serde_json::to_value(&descriptor).unwrap();

    assert_eq!(json["resolved"], true);
    assert_eq!(json["kind"], "Instance");
    assert_eq!(json["displayName"], "MyClass");
    assert_eq!(json["originModule"], "types_stub");
    assert_eq!(json["qualifiedName"], "types_stub.MyClass");
}
