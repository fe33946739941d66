//! Name resolution. Runs after all imports are merged into one model.
//!
//! A token resolves in this order:
//!   1. verbatim, for already-qualified names and synthesized-enum aliases;
//!   2. prefixed with the referencing entity's namespace, walking from the
//!      most specific namespace up to the root;
//!   3. prefixed with the file-level namespace;
//!   4. prefixed with each import alias, for unqualified references into
//!      imported files.
//! Anything still unresolved after the whole pipeline is a fatal error.

use crate::builder::PendingExtension;
use crate::error::{BuildError, DuplicateKind};
use crate::model::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// What a token resolved to: the kind and the canonical table key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Enum(String),
    Options(String),
    Compound(String),
    Message(String),
}

/// Immutable lookup snapshot of the model's name tables, so fields can be
/// rewritten while resolving against it.
pub struct Index {
    enums: HashSet<String>,
    enum_aliases: HashMap<String, String>,
    options: HashSet<String>,
    options_aliases: HashMap<String, String>,
    compounds: HashSet<String>,
    /// Shape of each named compound, copied into referencing fields.
    compound_shapes: HashMap<String, (FieldType, Vec<String>)>,
    messages: HashSet<String>,
    import_aliases: Vec<String>,
}

impl Index {
    pub fn of(model: &MessageModel) -> Self {
        Index {
            enums: model.enums.keys().cloned().collect(),
            enum_aliases: model.enum_aliases.clone(),
            options: model.options.keys().cloned().collect(),
            options_aliases: model.options_aliases.clone(),
            compounds: model.compounds.keys().cloned().collect(),
            compound_shapes: model
                .compounds
                .iter()
                .map(|(k, c)| (k.clone(), (c.base, c.components.clone())))
                .collect(),
            messages: model.messages.keys().cloned().collect(),
            import_aliases: model.imports.keys().cloned().collect(),
        }
    }

    /// Candidate keys for a token referenced from `context_ns`, most specific
    /// first. A token that is already qualified is only tried verbatim.
    fn candidates(&self, token: &str, context_ns: Option<&str>, file_ns: &str) -> Vec<String> {
        let mut out = vec![token.to_string()];
        if token.contains("::") {
            return out;
        }
        if let Some(ns) = context_ns {
            let parts: Vec<&str> = ns.split("::").collect();
            for i in (1..=parts.len()).rev() {
                out.push(format!("{}::{}", parts[..i].join("::"), token));
            }
        }
        if !file_ns.is_empty() {
            out.push(format!("{}::{}", file_ns, token));
        }
        for alias in &self.import_aliases {
            out.push(format!("{}::{}", alias, token));
        }
        out
    }

    pub fn resolve(&self, token: &str, context_ns: Option<&str>, file_ns: &str) -> Option<Target> {
        for cand in self.candidates(token, context_ns, file_ns) {
            if self.enums.contains(&cand) {
                return Some(Target::Enum(cand));
            }
            if let Some(canonical) = self.enum_aliases.get(&cand) {
                return Some(Target::Enum(canonical.clone()));
            }
            if self.options.contains(&cand) {
                return Some(Target::Options(cand));
            }
            if let Some(canonical) = self.options_aliases.get(&cand) {
                return Some(Target::Options(canonical.clone()));
            }
            if self.compounds.contains(&cand) {
                return Some(Target::Compound(cand));
            }
            if self.messages.contains(&cand) {
                return Some(Target::Message(cand));
            }
        }
        trace!(token, ?context_ns, "token did not resolve");
        None
    }

    fn resolve_in(
        &self,
        table: &HashSet<String>,
        token: &str,
        context_ns: Option<&str>,
        file_ns: &str,
    ) -> Option<String> {
        self.candidates(token, context_ns, file_ns)
            .into_iter()
            .find(|cand| table.contains(cand))
    }
}

/// Rewrite message and enum parent tokens to fully qualified names.
pub fn resolve_parents(model: &mut MessageModel, file_ns: &str) -> Result<(), BuildError> {
    let index = Index::of(model);

    let mut message_parents = Vec::new();
    for (key, m) in &model.messages {
        if let Some(token) = &m.parent {
            let fqn = index
                .resolve_in(&index.messages, token, m.namespace.as_deref(), file_ns)
                .ok_or_else(|| BuildError::UnresolvedParent {
                    entity: key.clone(),
                    token: token.clone(),
                })?;
            message_parents.push((key.clone(), fqn));
        }
    }
    for (key, fqn) in message_parents {
        if let Some(m) = model.messages.get_mut(&key) {
            m.parent = Some(fqn);
        }
    }

    let mut enum_parents = Vec::new();
    for (key, e) in &model.enums {
        if let Some(token) = &e.parent {
            let fqn = index
                .resolve_in(&index.enums, token, e.namespace.as_deref(), file_ns)
                .or_else(|| {
                    index
                        .enum_aliases
                        .get(token)
                        .filter(|c| index.enums.contains(*c))
                        .cloned()
                })
                .ok_or_else(|| BuildError::UnresolvedParent {
                    entity: key.clone(),
                    token: token.clone(),
                })?;
            enum_parents.push((key.clone(), fqn));
        }
    }
    for (key, fqn) in enum_parents {
        if let Some(e) = model.enums.get_mut(&key) {
            e.parent = Some(fqn);
        }
    }
    Ok(())
}

/// Merge `enum Base + { ... }` extension values into their synthesized enums.
/// The base's flattened values come first; extension values with no explicit
/// number continue after the base's largest value. Name and number collisions
/// within one merged instance are fatal, but two extensions of the same base
/// may each reuse the base's numbering space independently.
pub fn apply_extensions(
    model: &mut MessageModel,
    pending: &[PendingExtension],
    file_ns: &str,
) -> Result<(), BuildError> {
    for ext in pending {
        let index = Index::of(model);
        let context_ns = model
            .messages
            .get(&ext.message_fqn)
            .and_then(|m| m.namespace.clone());
        let base_key = index
            .resolve_in(&index.enums, &ext.base_token, context_ns.as_deref(), file_ns)
            .or_else(|| {
                index
                    .enum_aliases
                    .get(&ext.base_token)
                    .filter(|c| index.enums.contains(*c))
                    .cloned()
            })
            .ok_or_else(|| BuildError::UnresolvedReference {
                file: ext.file.clone(),
                line: ext.line,
                field: format!("{}.{}", ext.message_fqn, ext.field_name),
                token: ext.base_token.clone(),
            })?;
        debug!(base = %base_key, synthesized = %ext.enum_fqn, "applying enum extension");

        let mut merged = model
            .flattened_enum_values(&base_key)
            .unwrap_or_default();
        let base_is_open = model.enums.get(&base_key).map(|e| e.is_open).unwrap_or(false);
        let mut next = merged.iter().map(|v| v.value).max().map_or(0, |m| m + 1);

        let mut names: HashSet<String> = merged.iter().map(|v| v.name.clone()).collect();
        let mut numbers: HashSet<i64> = merged.iter().map(|v| v.value).collect();
        for v in &ext.ext_values {
            let value = v.value.unwrap_or(next);
            next = value + 1;
            if !names.insert(v.name.clone()) {
                return Err(BuildError::DuplicateDefinition {
                    file: ext.file.clone(),
                    line: ext.line,
                    kind: DuplicateKind::EnumValueName,
                    name: v.name.clone(),
                });
            }
            if !numbers.insert(value) {
                return Err(BuildError::DuplicateDefinition {
                    file: ext.file.clone(),
                    line: ext.line,
                    kind: DuplicateKind::EnumValueNumber,
                    name: format!("{} = {}", v.name, value),
                });
            }
            merged.push(EnumValue {
                name: v.name.clone(),
                value,
                doc: v.doc.clone(),
            });
        }

        let synth = model.enums.get_mut(&ext.enum_fqn).ok_or_else(|| {
            BuildError::UnresolvedReference {
                file: ext.file.clone(),
                line: ext.line,
                field: format!("{}.{}", ext.message_fqn, ext.field_name),
                token: ext.enum_fqn.clone(),
            }
        })?;
        synth.values = merged;
        synth.is_open = base_is_open;
    }
    Ok(())
}

/// Turn every `Unresolved` field payload into its resolved form. Tokens that
/// match nothing are left untouched; `escalate_unknowns` decides when that
/// becomes fatal.
pub fn resolve_field_types(model: &mut MessageModel, file_ns: &str) {
    let index = Index::of(model);
    for m in model.messages.values_mut() {
        let context_ns = m.namespace.clone();
        for field in &mut m.fields {
            resolve_field(field, &index, context_ns.as_deref(), file_ns);
        }
    }
}

fn resolve_field(field: &mut Field, index: &Index, context_ns: Option<&str>, file_ns: &str) {
    if let FieldPayload::Map { key, value } = &mut field.payload {
        resolve_field(key, index, context_ns, file_ns);
        resolve_field(value, index, context_ns, file_ns);
        return;
    }
    let token = match &field.payload {
        FieldPayload::Unresolved { token } => token.clone(),
        _ => return,
    };
    if let Some(target) = index.resolve(&token, context_ns, file_ns) {
        let (ty, payload) = match target {
            Target::Enum(fqn) => (FieldType::Enum, FieldPayload::Enum { fqn }),
            Target::Options(fqn) => (FieldType::Options, FieldPayload::Options { fqn }),
            Target::Compound(fqn) => {
                let (base, components) = index
                    .compound_shapes
                    .get(&fqn)
                    .cloned()
                    .unwrap_or((FieldType::Float, Vec::new()));
                (FieldType::Compound, FieldPayload::Compound { base, components })
            }
            Target::Message(fqn) => (FieldType::MessageReference, FieldPayload::Message { fqn }),
        };
        field.ty = ty;
        field.payload = payload;
    }
}

/// Any field payload still unresolved at this point references a name no
/// table knows.
pub fn escalate_unknowns(model: &MessageModel) -> Result<(), BuildError> {
    for m in model.messages.values() {
        for field in &m.fields {
            if let Some(token) = first_unresolved(&field.payload) {
                return Err(BuildError::UnresolvedReference {
                    file: m.source_file.clone(),
                    line: field.line,
                    field: format!("{}.{}", m.full_name(), field.name),
                    token,
                });
            }
        }
    }
    Ok(())
}

fn first_unresolved(payload: &FieldPayload) -> Option<String> {
    match payload {
        FieldPayload::Unresolved { token } => Some(token.clone()),
        FieldPayload::Map { key, value } => {
            first_unresolved(&key.payload).or_else(|| first_unresolved(&value.payload))
        }
        _ => None,
    }
}
