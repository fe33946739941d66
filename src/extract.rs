//! First pass over a parsed file: flatten namespace nesting, attach doc
//! comments, and assign implicit enum/options values. No name resolution
//! happens here; references stay as raw tokens.

use crate::model::EnumValue;
use crate::syntax::*;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RawFile {
    pub file: PathBuf,
    /// Namespace implied by the file name, applied to top-level entities
    /// that declare none (at finalization, not here).
    pub file_namespace: String,
    pub imports: Vec<ImportNode>,
    pub messages: Vec<RawMessage>,
    pub enums: Vec<RawEnum>,
    pub options: Vec<RawOptions>,
    pub compounds: Vec<RawCompound>,
}

#[derive(Debug, Clone)]
pub struct RawMessage {
    pub name: String,
    pub parent: Option<String>,
    pub namespace: Option<String>,
    pub fields: Vec<RawField>,
    pub doc: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct RawField {
    pub name: String,
    pub optional: bool,
    pub ty: TypeNode,
    pub default_value: Option<String>,
    pub doc: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct RawEnum {
    pub name: String,
    pub is_open: bool,
    pub parent: Option<String>,
    pub namespace: Option<String>,
    pub values: Vec<EnumValue>,
    pub doc: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct RawOptions {
    pub name: String,
    pub namespace: Option<String>,
    pub values: Vec<EnumValue>,
    pub doc: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct RawCompound {
    pub base: BasicType,
    pub name: String,
    pub components: Vec<String>,
    pub namespace: Option<String>,
    pub doc: Option<String>,
    pub line: usize,
}

/// Project a syntax tree into the raw file form.
pub fn extract(tree: &SyntaxTree, file: &Path) -> RawFile {
    let file_namespace = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut raw = RawFile {
        file: file.to_path_buf(),
        file_namespace,
        imports: Vec::new(),
        messages: Vec::new(),
        enums: Vec::new(),
        options: Vec::new(),
        compounds: Vec::new(),
    };
    let mut ns_path: Vec<String> = Vec::new();
    walk_items(&tree.items, &mut ns_path, &mut raw);
    raw
}

fn current_namespace(ns_path: &[String]) -> Option<String> {
    if ns_path.is_empty() {
        None
    } else {
        Some(ns_path.join("::"))
    }
}

fn walk_items(items: &[Item], ns_path: &mut Vec<String>, raw: &mut RawFile) {
    let mut pending_doc: Vec<String> = Vec::new();
    for item in items {
        match item {
            Item::Comment(c) => {
                if let Some(text) = c.doc_text() {
                    pending_doc.push(text.to_string());
                }
            }
            Item::Import(imp) => {
                pending_doc.clear();
                raw.imports.push(imp.clone());
            }
            Item::Namespace(ns) => {
                pending_doc.clear();
                ns_path.push(ns.name.clone());
                walk_items(&ns.items, ns_path, raw);
                ns_path.pop();
            }
            Item::Message(m) => {
                let doc = take_doc(&mut pending_doc);
                raw.messages.push(extract_message(m, current_namespace(ns_path), doc));
            }
            Item::Enum(e) => {
                let doc = take_doc(&mut pending_doc);
                raw.enums.push(RawEnum {
                    name: e.name.clone(),
                    is_open: e.is_open,
                    parent: e.parent.clone(),
                    namespace: current_namespace(ns_path),
                    values: number_enum_values(&e.values),
                    doc,
                    line: e.line,
                });
            }
            Item::Options(o) => {
                let doc = take_doc(&mut pending_doc);
                raw.options.push(RawOptions {
                    name: o.name.clone(),
                    namespace: current_namespace(ns_path),
                    values: number_option_values(&o.values),
                    doc,
                    line: o.line,
                });
            }
            Item::Compound(c) => {
                let doc = take_doc(&mut pending_doc);
                raw.compounds.push(RawCompound {
                    base: c.base,
                    name: c.name.clone(),
                    components: c.components.clone(),
                    namespace: current_namespace(ns_path),
                    doc,
                    line: c.line,
                });
            }
        }
    }
}

fn extract_message(m: &MessageNode, namespace: Option<String>, doc: Option<String>) -> RawMessage {
    let mut fields = Vec::new();
    let mut pending_doc: Vec<String> = Vec::new();
    for item in &m.body {
        match item {
            MessageItem::Comment(c) => {
                if let Some(text) = c.doc_text() {
                    pending_doc.push(text.to_string());
                }
            }
            MessageItem::Field(f) => {
                fields.push(RawField {
                    name: f.name.clone(),
                    optional: f.optional,
                    ty: f.ty.clone(),
                    default_value: f.default_value.clone(),
                    doc: take_doc(&mut pending_doc),
                    line: f.line,
                });
            }
        }
    }
    RawMessage {
        name: m.name.clone(),
        parent: m.parent.clone(),
        namespace,
        fields,
        doc,
        line: m.line,
    }
}

fn take_doc(pending: &mut Vec<String>) -> Option<String> {
    if pending.is_empty() {
        None
    } else {
        let joined = pending.join("\n");
        pending.clear();
        Some(joined)
    }
}

/// Implicit enum values continue from the last assigned value; the first
/// implicit value is 0.
pub fn number_enum_values(values: &[ValueNode]) -> Vec<EnumValue> {
    let mut out = Vec::with_capacity(values.len());
    let mut next: i64 = 0;
    for v in values {
        let value = v.value.unwrap_or(next);
        next = value + 1;
        out.push(EnumValue {
            name: v.name.clone(),
            value,
            doc: v.doc.clone(),
        });
    }
    out
}

/// Options are bit flags: implicit values double the previous one, starting
/// at 1.
pub fn number_option_values(values: &[ValueNode]) -> Vec<EnumValue> {
    let mut out = Vec::with_capacity(values.len());
    let mut last: i64 = 0;
    for v in values {
        let value = v.value.unwrap_or(if last == 0 { 1 } else { last << 1 });
        last = value;
        out.push(EnumValue {
            name: v.name.clone(),
            value,
            doc: v.doc.clone(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    #[test]
    fn enum_auto_increment_resumes_after_explicit() {
        let vals = vec![
            ValueNode { name: "A".into(), value: None, doc: None, line: 1 },
            ValueNode { name: "B".into(), value: Some(5), doc: None, line: 2 },
            ValueNode { name: "C".into(), value: None, doc: None, line: 3 },
        ];
        let numbered = number_enum_values(&vals);
        let pairs: Vec<(&str, i64)> = numbered.iter().map(|v| (v.name.as_str(), v.value)).collect();
        assert_eq!(pairs, vec![("A", 0), ("B", 5), ("C", 6)]);
    }

    #[test]
    fn option_flags_are_powers_of_two() {
        let vals = vec![
            ValueNode { name: "R".into(), value: None, doc: None, line: 1 },
            ValueNode { name: "W".into(), value: None, doc: None, line: 2 },
            ValueNode { name: "X".into(), value: None, doc: None, line: 3 },
        ];
        let numbered = number_option_values(&vals);
        let flags: Vec<i64> = numbered.iter().map(|v| v.value).collect();
        assert_eq!(flags, vec![1, 2, 4]);
    }

    #[test]
    fn nested_namespaces_join_with_double_colon() {
        let src = r#"
            namespace Outer {
                namespace Inner {
                    message Ping {
                        field seq: int
                    }
                }
            }
        "#;
        let tree = parser::parse(src).expect("parse");
        let raw = extract(&tree, Path::new("net.def"));
        assert_eq!(raw.file_namespace, "net");
        assert_eq!(raw.messages.len(), 1);
        assert_eq!(raw.messages[0].namespace.as_deref(), Some("Outer::Inner"));
    }

    #[test]
    fn doc_comments_attach_to_next_declaration() {
        let src = r#"
            /// Robot state report.
            message State {
                /// Current mode.
                field mode: int
            }
        "#;
        let tree = parser::parse(src).expect("parse");
        let raw = extract(&tree, Path::new("robot.def"));
        assert_eq!(raw.messages[0].doc.as_deref(), Some("Robot state report."));
        assert_eq!(raw.messages[0].fields[0].doc.as_deref(), Some("Current mode."));
    }
}
