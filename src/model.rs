//! Resolved semantic model for .def files.
//!
//! Entities are stored in per-kind tables keyed by fully qualified name
//! (`Ns::Name`). Insertion order is preserved so dumps and generated output
//! are deterministic.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;

/// Scalar classification of a field after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    Byte,
    Enum,
    Options,
    Compound,
    MessageReference,
    Map,
    Unknown,
}

/// Type-specific payload of a field. Reference payloads carry the fully
/// qualified name of the target entity once resolution has run; until then
/// they hold the raw token under `Unresolved`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPayload {
    Scalar,
    Enum { fqn: String },
    Options { fqn: String },
    Compound { base: FieldType, components: Vec<String> },
    Map { key: Box<Field>, value: Box<Field> },
    Message { fqn: String },
    Unresolved { token: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub payload: FieldPayload,
    pub is_array: bool,
    pub optional: bool,
    pub default_value: Option<String>,
    pub doc: Option<String>,
    pub line: usize,
}

impl Field {
    /// Anonymous field used for map key/value slots.
    pub fn slot(ty: FieldType, payload: FieldPayload) -> Self {
        Field {
            name: String::new(),
            ty,
            payload,
            is_array: false,
            optional: false,
            default_value: None,
            doc: None,
            line: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub name: String,
    /// Parent message, as a fully qualified name after parent resolution.
    pub parent: Option<String>,
    pub namespace: Option<String>,
    pub fields: Vec<Field>,
    pub doc: Option<String>,
    pub source_file: PathBuf,
    pub line: usize,
}

impl Message {
    pub fn full_name(&self) -> String {
        full_name(self.namespace.as_deref(), &self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
    pub doc: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Enum {
    pub name: String,
    pub values: Vec<EnumValue>,
    /// Parent enum, as a fully qualified name after parent resolution.
    pub parent: Option<String>,
    pub is_open: bool,
    pub namespace: Option<String>,
    pub doc: Option<String>,
    pub source_file: PathBuf,
    pub line: usize,
}

impl Enum {
    pub fn full_name(&self) -> String {
        full_name(self.namespace.as_deref(), &self.name)
    }

    /// Smallest power-of-two bit width that holds this declaration's own
    /// values. Open enums reserve room for values outside the declared set.
    pub fn min_size_bits(&self) -> u32 {
        min_size_bits_for(self.values.iter().map(|v| v.value).max().unwrap_or(0), self.is_open)
    }
}

#[derive(Debug, Clone)]
pub struct OptionsDef {
    pub name: String,
    pub values: Vec<EnumValue>,
    pub namespace: Option<String>,
    pub doc: Option<String>,
    pub source_file: PathBuf,
    pub line: usize,
}

impl OptionsDef {
    pub fn full_name(&self) -> String {
        full_name(self.namespace.as_deref(), &self.name)
    }
}

/// A named compound type: a base scalar fanned out into named components,
/// like `float Vec3 { x, y, z }`.
#[derive(Debug, Clone)]
pub struct CompoundDef {
    pub name: String,
    pub base: FieldType,
    pub components: Vec<String>,
    pub namespace: Option<String>,
    pub doc: Option<String>,
    pub source_file: PathBuf,
    pub line: usize,
}

impl CompoundDef {
    pub fn full_name(&self) -> String {
        full_name(self.namespace.as_deref(), &self.name)
    }
}

/// Namespace membership: unqualified entity name to fully qualified name.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    pub name: String,
    pub messages: IndexMap<String, String>,
    pub enums: IndexMap<String, String>,
    pub options: IndexMap<String, String>,
    pub compounds: IndexMap<String, String>,
}

/// The resolved model of one .def file plus everything it imports.
#[derive(Debug, Clone, Default)]
pub struct MessageModel {
    pub messages: IndexMap<String, Message>,
    pub enums: IndexMap<String, Enum>,
    pub options: IndexMap<String, OptionsDef>,
    pub compounds: IndexMap<String, CompoundDef>,
    pub namespaces: IndexMap<String, Namespace>,
    /// Import alias to the resolved path of the imported file.
    pub imports: IndexMap<String, PathBuf>,
    /// Secondary lookup keys for synthesized enums (`Msg.field`, `Msg::field`,
    /// namespace-qualified variants) mapping to the canonical table key.
    pub enum_aliases: HashMap<String, String>,
    /// Same, for synthesized inline options.
    pub options_aliases: HashMap<String, String>,
    pub main_file_path: PathBuf,
}

impl MessageModel {
    pub fn new(main_file_path: PathBuf) -> Self {
        MessageModel {
            main_file_path,
            ..Default::default()
        }
    }

    /// Look up an enum by canonical key or alias key.
    pub fn find_enum(&self, key: &str) -> Option<&Enum> {
        if let Some(e) = self.enums.get(key) {
            return Some(e);
        }
        self.enum_aliases.get(key).and_then(|k| self.enums.get(k))
    }

    /// Canonical table key for an enum reference, following alias keys.
    pub fn canonical_enum_key(&self, key: &str) -> Option<String> {
        if self.enums.contains_key(key) {
            return Some(key.to_string());
        }
        self.enum_aliases.get(key).cloned()
    }

    /// Recompute the namespace membership tables from the entity tables.
    /// Called after any pass that moves or re-keys entities.
    pub fn rebuild_namespaces(&mut self) {
        self.namespaces.clear();
        let entries: Vec<(Option<String>, String, String, u8)> = self
            .messages
            .values()
            .map(|m| (m.namespace.clone(), m.name.clone(), m.full_name(), 0u8))
            .chain(
                self.enums
                    .values()
                    .map(|e| (e.namespace.clone(), e.name.clone(), e.full_name(), 1u8)),
            )
            .chain(
                self.options
                    .values()
                    .map(|o| (o.namespace.clone(), o.name.clone(), o.full_name(), 2u8)),
            )
            .chain(
                self.compounds
                    .values()
                    .map(|c| (c.namespace.clone(), c.name.clone(), c.full_name(), 3u8)),
            )
            .collect();
        for (ns, name, fqn, kind) in entries {
            let ns_name = ns.unwrap_or_default();
            let entry = self
                .namespaces
                .entry(ns_name.clone())
                .or_insert_with(|| Namespace {
                    name: ns_name,
                    ..Default::default()
                });
            match kind {
                0 => entry.messages.insert(name, fqn),
                1 => entry.enums.insert(name, fqn),
                2 => entry.options.insert(name, fqn),
                _ => entry.compounds.insert(name, fqn),
            };
        }
    }

    /// All values of an enum including inherited ones, ancestor values first.
    /// A child value whose name repeats an ancestor value is skipped; the
    /// ancestor entry stands. Returns None when the enum or one of its
    /// ancestors is missing.
    pub fn flattened_enum_values(&self, fqn: &str) -> Option<Vec<EnumValue>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.canonical_enum_key(fqn)?;
        loop {
            if !seen.insert(cursor.clone()) {
                break; // inheritance cycle, keep what we have
            }
            let e = self.enums.get(&cursor)?;
            chain.push(e);
            match &e.parent {
                Some(p) => cursor = self.canonical_enum_key(p)?,
                None => break,
            }
        }
        chain.reverse();
        let mut out: Vec<EnumValue> = Vec::new();
        for e in chain {
            for v in &e.values {
                if !out.iter().any(|x| x.name == v.name) {
                    out.push(v.clone());
                }
            }
        }
        Some(out)
    }

    /// Bit width of an enum computed over its flattened value set, so a child
    /// that adds large values widens the storage of the whole family member.
    pub fn enum_min_size_bits(&self, fqn: &str) -> Option<u32> {
        let values = self.flattened_enum_values(fqn)?;
        let is_open = self.find_enum(fqn)?.is_open;
        Some(min_size_bits_for(
            values.iter().map(|v| v.value).max().unwrap_or(0),
            is_open,
        ))
    }
}

pub fn full_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}::{}", ns, name),
        _ => name.to_string(),
    }
}

/// Closed enums take the smallest of 8/16/32/64 bits that fits the largest
/// value; open enums never go below 32 bits because undeclared values must
/// fit at runtime.
pub fn min_size_bits_for(max_value: i64, is_open: bool) -> u32 {
    let max_value = max_value.max(0) as u64;
    if is_open {
        if max_value < (1 << 32) {
            32
        } else {
            64
        }
    } else if max_value < (1 << 8) {
        8
    } else if max_value < (1 << 16) {
        16
    } else if max_value < (1 << 32) {
        32
    } else {
        64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_enum(name: &str, ns: Option<&str>, parent: Option<&str>, vals: &[(&str, i64)]) -> Enum {
        Enum {
            name: name.to_string(),
            values: vals
                .iter()
                .map(|(n, v)| EnumValue {
                    name: n.to_string(),
                    value: *v,
                    doc: None,
                })
                .collect(),
            parent: parent.map(|p| p.to_string()),
            is_open: false,
            namespace: ns.map(|n| n.to_string()),
            doc: None,
            source_file: PathBuf::from("test.def"),
            line: 1,
        }
    }

    #[test]
    fn min_size_bits_boundaries() {
        assert_eq!(min_size_bits_for(0, false), 8);
        assert_eq!(min_size_bits_for(255, false), 8);
        assert_eq!(min_size_bits_for(256, false), 16);
        assert_eq!(min_size_bits_for(65535, false), 16);
        assert_eq!(min_size_bits_for(65536, false), 32);
        assert_eq!(min_size_bits_for(1 << 32, false), 64);
        assert_eq!(min_size_bits_for(0, true), 32);
        assert_eq!(min_size_bits_for(1 << 40, true), 64);
    }

    #[test]
    fn flatten_is_ancestor_first_with_shadowing() {
        let mut model = MessageModel::new(PathBuf::from("test.def"));
        let base = mk_enum("Base", None, None, &[("A", 0), ("B", 1)]);
        let child = mk_enum("Child", None, Some("Base"), &[("B", 10), ("C", 2)]);
        model.enums.insert("Base".to_string(), base);
        model.enums.insert("Child".to_string(), child);

        let flat = model.flattened_enum_values("Child").unwrap();
        let names: Vec<&str> = flat.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(flat[1].value, 1); // ancestor value stands, child repeat skipped
    }

    #[test]
    fn flatten_three_levels() {
        let mut model = MessageModel::new(PathBuf::from("test.def"));
        model
            .enums
            .insert("A".to_string(), mk_enum("A", None, None, &[("X", 0)]));
        model
            .enums
            .insert("B".to_string(), mk_enum("B", None, Some("A"), &[("Y", 1)]));
        model
            .enums
            .insert("C".to_string(), mk_enum("C", None, Some("B"), &[("Z", 2)]));

        let flat = model.flattened_enum_values("C").unwrap();
        let names: Vec<&str> = flat.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["X", "Y", "Z"]);
    }

    #[test]
    fn enum_alias_lookup() {
        let mut model = MessageModel::new(PathBuf::from("test.def"));
        model.enums.insert(
            "Robot_mode_Enum".to_string(),
            mk_enum("Robot_mode_Enum", None, None, &[("IDLE", 0)]),
        );
        model
            .enum_aliases
            .insert("Robot.mode".to_string(), "Robot_mode_Enum".to_string());
        assert!(model.find_enum("Robot.mode").is_some());
        assert_eq!(
            model.canonical_enum_key("Robot.mode").as_deref(),
            Some("Robot_mode_Enum")
        );
    }

    #[test]
    fn full_name_roundtrip() {
        assert_eq!(full_name(Some("A::B"), "Msg"), "A::B::Msg");
        assert_eq!(full_name(None, "Msg"), "Msg");
    }
}
