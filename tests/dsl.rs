//! DSL unit tests: syntax (parse success/failure) and the raw projection
//! (implicit numbering, namespaces, doc attachment).

use defwrangler::extract::extract;
use defwrangler::parse;
use defwrangler::syntax::{Item, TypeNode};
use std::path::Path;

// ==================== Syntax: valid programs ====================

#[test]
fn parse_empty_file() {
    let tree = parse("").expect("empty file can parse");
    assert!(tree.items.is_empty());
}

#[test]
fn parse_minimal_message() {
    let src = r#"
message M {
    field x: int
}
"#;
    let tree = parse(src).expect("parse");
    assert_eq!(tree.items.len(), 1);
    match &tree.items[0] {
        Item::Message(m) => {
            assert_eq!(m.name, "M");
            assert_eq!(m.body.len(), 1);
        }
        other => panic!("unexpected item: {:?}", other),
    }
}

#[test]
fn parse_all_base_types() {
    let src = r#"
message AllBase {
    field a: string
    field b: int
    field c: float
    field d: bool
    field e: byte
}
"#;
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    assert_eq!(raw.messages[0].fields.len(), 5);
}

#[test]
fn parse_field_with_semicolon_and_default() {
    let src = r#"
message M {
    field speed: int = 5;
    field label: string = "hello world";
}
"#;
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    assert_eq!(raw.messages[0].fields[0].default_value.as_deref(), Some("5"));
    assert_eq!(
        raw.messages[0].fields[1].default_value.as_deref(),
        Some("hello world")
    );
}

#[test]
fn parse_optional_modifier() {
    // The modifier is accepted both before the keyword and after the colon.
    let src = "message M { optional field note: string\n field tag: optional string }";
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    assert!(raw.messages[0].fields[0].optional);
    assert!(raw.messages[0].fields[1].optional);
}

#[test]
fn parse_array_and_map_types() {
    let src = r#"
message M {
    field tags: string[]
    field index: Map<string, int>
    field nested: Map<int, string[]>
}
"#;
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    assert!(matches!(raw.messages[0].fields[0].ty, TypeNode::Array(_)));
    assert!(matches!(raw.messages[0].fields[1].ty, TypeNode::Map { .. }));
    match &raw.messages[0].fields[2].ty {
        TypeNode::Map { value, .. } => assert!(matches!(**value, TypeNode::Array(_))),
        other => panic!("unexpected type: {:?}", other),
    }
}

#[test]
fn parse_inline_enum_and_options() {
    let src = r#"
message M {
    field mode: enum { IDLE, ACTIVE }
    field flags: options { A, B }
    field speed: open_enum { SLOW, FAST }
}
"#;
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    assert!(matches!(
        raw.messages[0].fields[0].ty,
        TypeNode::InlineEnum { is_open: false, .. }
    ));
    assert!(matches!(
        raw.messages[0].fields[1].ty,
        TypeNode::InlineOptions { .. }
    ));
    assert!(matches!(
        raw.messages[0].fields[2].ty,
        TypeNode::InlineEnum { is_open: true, .. }
    ));
}

#[test]
fn parse_enum_extension_type() {
    let src = "message M { field kind: enum Base::Kind + { EXTRA = 100 } }";
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    match &raw.messages[0].fields[0].ty {
        TypeNode::EnumExtension { base, values } => {
            assert_eq!(base, "Base::Kind");
            assert_eq!(values.len(), 1);
            assert_eq!(values[0].value, Some(100));
        }
        other => panic!("unexpected type: {:?}", other),
    }
}

#[test]
fn parse_inheritance() {
    let src = r#"
message Base { field id: int }
message Child : Base { field extra: int }
enum E2 : Ns::E1 { MORE }
"#;
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    assert_eq!(raw.messages[1].parent.as_deref(), Some("Base"));
    assert_eq!(raw.enums[0].parent.as_deref(), Some("Ns::E1"));
}

#[test]
fn parse_named_compound() {
    let src = "float Position { lat, lon, alt }";
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    assert_eq!(raw.compounds.len(), 1);
    assert_eq!(raw.compounds[0].components, vec!["lat", "lon", "alt"]);
}

#[test]
fn parse_imports() {
    let src = r#"
import "base.def" as Base
import "misc.def"
message M { field h: Base::Header }
"#;
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    assert_eq!(raw.imports.len(), 2);
    assert_eq!(raw.imports[0].alias.as_deref(), Some("Base"));
    assert_eq!(raw.imports[1].alias, None);
}

#[test]
fn parse_comments_everywhere() {
    let src = r#"
// leading comment
/* block
   comment */
/// Documented message.
message M {
    // inner
    /// Documented field.
    field x: int
}
"#;
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    assert_eq!(raw.messages[0].doc.as_deref(), Some("Documented message."));
    assert_eq!(
        raw.messages[0].fields[0].doc.as_deref(),
        Some("Documented field.")
    );
}

#[test]
fn enum_value_docs_are_kept() {
    let src = r#"
enum Mode {
    /// Doing nothing.
    IDLE,
    ACTIVE
}
"#;
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    assert_eq!(raw.enums[0].values[0].doc.as_deref(), Some("Doing nothing."));
    assert_eq!(raw.enums[0].values[1].doc, None);
}

#[test]
fn keyword_prefixed_identifiers_are_names() {
    // "enumerate" starts with "enum" but is an ordinary name.
    let src = "message M { field enumerate: int }";
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    assert_eq!(raw.messages[0].fields[0].name, "enumerate");
}

#[test]
fn trailing_commas_in_value_lists() {
    let src = "enum E { A, B, C, }";
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    assert_eq!(raw.enums[0].values.len(), 3);
}

// ==================== Syntax: invalid programs ====================

#[test]
fn reject_unclosed_message() {
    assert!(parse("message M { field x: int").is_err());
}

#[test]
fn reject_field_without_type() {
    assert!(parse("message M { field x: }").is_err());
}

#[test]
fn reject_stray_token() {
    assert!(parse("banana").is_err());
}

#[test]
fn reject_map_without_value_type() {
    assert!(parse("message M { field m: Map<string> }").is_err());
}

// ==================== Implicit numbering ====================

#[test]
fn enum_values_auto_increment() {
    let src = "enum E { A, B = 5, C }";
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    let pairs: Vec<(String, i64)> = raw.enums[0]
        .values
        .iter()
        .map(|v| (v.name.clone(), v.value))
        .collect();
    assert_eq!(
        pairs,
        vec![("A".into(), 0), ("B".into(), 5), ("C".into(), 6)]
    );
}

#[test]
fn options_values_are_bit_flags() {
    let src = "options Perm { R, W, X }";
    let tree = parse(src).expect("parse");
    let raw = extract(&tree, Path::new("t.def"));
    let flags: Vec<i64> = raw.options[0].values.iter().map(|v| v.value).collect();
    assert_eq!(flags, vec![1, 2, 4]);
}

#[test]
fn reject_enum_value_beyond_64_bits() {
    let err = parse("enum Big { A = 99999999999999999999 }").expect_err("overflow");
    assert!(err.contains("does not fit in 64 bits"), "got: {}", err);
}

#[test]
fn scan_imports_skips_block_comments() {
    let src = r#"
/*
import "ghost.def" as Ghost
*/
import "real.def" as Real
/* import "inline.def" as Inline */ import "tail.def"
"#;
    let found = defwrangler::scan_imports(src);
    let paths: Vec<&str> = found.iter().map(|(p, _, _)| p.as_str()).collect();
    assert_eq!(paths, vec!["real.def", "tail.def"]);
}
