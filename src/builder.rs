//! Second pass: turn one raw file into an unresolved model. Duplicate names
//! are rejected here; inline enum/options types are synthesized into
//! standalone entities; every reference stays an `Unresolved` payload for the
//! resolver to fix up after imports are merged.

use crate::error::{BuildError, DuplicateKind};
use crate::extract::{RawField, RawFile};
use crate::model::*;
use crate::syntax::{BasicType, TypeNode, ValueNode};
use std::collections::HashSet;
use std::path::PathBuf;

/// An `enum Base + { ... }` field whose base is still a raw token. The
/// extension values are merged into the synthesized enum once the base
/// resolves.
#[derive(Debug, Clone)]
pub struct PendingExtension {
    /// Table key of the synthesized enum that will receive the merged values.
    pub enum_fqn: String,
    pub base_token: String,
    pub message_fqn: String,
    pub field_name: String,
    pub ext_values: Vec<ValueNode>,
    pub file: PathBuf,
    pub line: usize,
}

pub fn assemble(raw: &RawFile) -> Result<(MessageModel, Vec<PendingExtension>), BuildError> {
    let mut model = MessageModel::new(raw.file.clone());
    let mut pending = Vec::new();

    for e in &raw.enums {
        check_value_set(&e.values, &raw.file, e.line)?;
        let entity = Enum {
            name: e.name.clone(),
            values: e.values.clone(),
            parent: e.parent.clone(),
            is_open: e.is_open,
            namespace: e.namespace.clone(),
            doc: e.doc.clone(),
            source_file: raw.file.clone(),
            line: e.line,
        };
        insert_unique(
            &mut model.enums,
            entity.full_name(),
            entity,
            DuplicateKind::Enum,
            &raw.file,
            e.line,
        )?;
    }

    for o in &raw.options {
        check_value_set(&o.values, &raw.file, o.line)?;
        let entity = OptionsDef {
            name: o.name.clone(),
            values: o.values.clone(),
            namespace: o.namespace.clone(),
            doc: o.doc.clone(),
            source_file: raw.file.clone(),
            line: o.line,
        };
        insert_unique(
            &mut model.options,
            entity.full_name(),
            entity,
            DuplicateKind::Options,
            &raw.file,
            o.line,
        )?;
    }

    for c in &raw.compounds {
        let entity = CompoundDef {
            name: c.name.clone(),
            base: scalar_type(c.base),
            components: c.components.clone(),
            namespace: c.namespace.clone(),
            doc: c.doc.clone(),
            source_file: raw.file.clone(),
            line: c.line,
        };
        insert_unique(
            &mut model.compounds,
            entity.full_name(),
            entity,
            DuplicateKind::Compound,
            &raw.file,
            c.line,
        )?;
    }

    for m in &raw.messages {
        let msg_fqn = full_name(m.namespace.as_deref(), &m.name);
        let mut fields = Vec::with_capacity(m.fields.len());
        let mut field_names = HashSet::new();
        for f in &m.fields {
            if !field_names.insert(f.name.clone()) {
                return Err(BuildError::DuplicateDefinition {
                    file: raw.file.clone(),
                    line: f.line,
                    kind: DuplicateKind::Field,
                    name: format!("{}.{}", msg_fqn, f.name),
                });
            }
            fields.push(build_field(
                f,
                &m.name,
                &msg_fqn,
                m.namespace.as_deref(),
                &mut model,
                &mut pending,
                &raw.file,
            )?);
        }
        let entity = Message {
            name: m.name.clone(),
            parent: m.parent.clone(),
            namespace: m.namespace.clone(),
            fields,
            doc: m.doc.clone(),
            source_file: raw.file.clone(),
            line: m.line,
        };
        insert_unique(
            &mut model.messages,
            msg_fqn,
            entity,
            DuplicateKind::Message,
            &raw.file,
            m.line,
        )?;
    }

    model.rebuild_namespaces();
    Ok((model, pending))
}

fn insert_unique<T>(
    table: &mut indexmap::IndexMap<String, T>,
    key: String,
    value: T,
    kind: DuplicateKind,
    file: &std::path::Path,
    line: usize,
) -> Result<(), BuildError> {
    if table.contains_key(&key) {
        return Err(BuildError::DuplicateDefinition {
            file: file.to_path_buf(),
            line,
            kind,
            name: key,
        });
    }
    table.insert(key, value);
    Ok(())
}

/// Reject duplicate value names and duplicate numbers within one declaration.
fn check_value_set(
    values: &[EnumValue],
    file: &std::path::Path,
    line: usize,
) -> Result<(), BuildError> {
    let mut names = HashSet::new();
    let mut numbers = HashSet::new();
    for v in values {
        if !names.insert(v.name.as_str()) {
            return Err(BuildError::DuplicateDefinition {
                file: file.to_path_buf(),
                line,
                kind: DuplicateKind::EnumValueName,
                name: v.name.clone(),
            });
        }
        if !numbers.insert(v.value) {
            return Err(BuildError::DuplicateDefinition {
                file: file.to_path_buf(),
                line,
                kind: DuplicateKind::EnumValueNumber,
                name: format!("{} = {}", v.name, v.value),
            });
        }
    }
    Ok(())
}

fn scalar_type(b: BasicType) -> FieldType {
    match b {
        BasicType::String => FieldType::String,
        BasicType::Int => FieldType::Int,
        BasicType::Float => FieldType::Float,
        BasicType::Bool => FieldType::Bool,
        BasicType::Byte => FieldType::Byte,
    }
}

#[allow(clippy::too_many_arguments)]
fn build_field(
    raw: &RawField,
    msg_name: &str,
    msg_fqn: &str,
    namespace: Option<&str>,
    model: &mut MessageModel,
    pending: &mut Vec<PendingExtension>,
    file: &std::path::Path,
) -> Result<Field, BuildError> {
    let (ty, payload, is_array) = build_type(
        &raw.ty,
        raw,
        msg_name,
        msg_fqn,
        namespace,
        model,
        pending,
        file,
    )?;
    Ok(Field {
        name: raw.name.clone(),
        ty,
        payload,
        is_array,
        optional: raw.optional,
        default_value: raw.default_value.clone(),
        doc: raw.doc.clone(),
        line: raw.line,
    })
}

#[allow(clippy::too_many_arguments)]
fn build_type(
    ty: &TypeNode,
    raw: &RawField,
    msg_name: &str,
    msg_fqn: &str,
    namespace: Option<&str>,
    model: &mut MessageModel,
    pending: &mut Vec<PendingExtension>,
    file: &std::path::Path,
) -> Result<(FieldType, FieldPayload, bool), BuildError> {
    match ty {
        TypeNode::Basic(b) => Ok((scalar_type(*b), FieldPayload::Scalar, false)),
        TypeNode::Reference(token) => Ok((
            FieldType::Unknown,
            FieldPayload::Unresolved {
                token: token.clone(),
            },
            false,
        )),
        TypeNode::Array(inner) => {
            let (t, p, _) = build_type(inner, raw, msg_name, msg_fqn, namespace, model, pending, file)?;
            Ok((t, p, true))
        }
        TypeNode::Map { key, value } => {
            let (kt, kp, _) =
                build_type(key, raw, msg_name, msg_fqn, namespace, model, pending, file)?;
            let (vt, vp, v_array) =
                build_type(value, raw, msg_name, msg_fqn, namespace, model, pending, file)?;
            let mut value_slot = Field::slot(vt, vp);
            value_slot.is_array = v_array;
            Ok((
                FieldType::Map,
                FieldPayload::Map {
                    key: Box::new(Field::slot(kt, kp)),
                    value: Box::new(value_slot),
                },
                false,
            ))
        }
        TypeNode::Compound { base, components } => Ok((
            FieldType::Compound,
            FieldPayload::Compound {
                base: scalar_type(*base),
                components: components.clone(),
            },
            false,
        )),
        TypeNode::InlineEnum { is_open, values } => {
            let numbered = crate::extract::number_enum_values(values);
            check_value_set(&numbered, file, raw.line)?;
            let fqn = synthesize_enum(
                model,
                msg_name,
                msg_fqn,
                namespace,
                &raw.name,
                numbered,
                *is_open,
                file,
                raw.line,
            )?;
            Ok((FieldType::Enum, FieldPayload::Enum { fqn }, false))
        }
        TypeNode::InlineOptions { values } => {
            let numbered = crate::extract::number_option_values(values);
            check_value_set(&numbered, file, raw.line)?;
            let synth_name = format!("{}_{}_Options", msg_name, raw.name);
            let entity = OptionsDef {
                name: synth_name,
                values: numbered,
                namespace: namespace.map(|s| s.to_string()),
                doc: raw.doc.clone(),
                source_file: file.to_path_buf(),
                line: raw.line,
            };
            let fqn = entity.full_name();
            insert_unique(
                &mut model.options,
                fqn.clone(),
                entity,
                DuplicateKind::Options,
                file,
                raw.line,
            )?;
            for alias in [
                format!("{}.{}", msg_name, raw.name),
                format!("{}::{}", msg_name, raw.name),
                format!("{}.{}", msg_fqn, raw.name),
                format!("{}::{}", msg_fqn, raw.name),
            ] {
                model.options_aliases.entry(alias).or_insert_with(|| fqn.clone());
            }
            Ok((FieldType::Options, FieldPayload::Options { fqn }, false))
        }
        TypeNode::EnumExtension { base, values } => {
            let fqn = synthesize_enum(
                model,
                msg_name,
                msg_fqn,
                namespace,
                &raw.name,
                Vec::new(),
                false,
                file,
                raw.line,
            )?;
            pending.push(PendingExtension {
                enum_fqn: fqn.clone(),
                base_token: base.clone(),
                message_fqn: msg_fqn.to_string(),
                field_name: raw.name.clone(),
                ext_values: values.clone(),
                file: file.to_path_buf(),
                line: raw.line,
            });
            Ok((FieldType::Enum, FieldPayload::Enum { fqn }, false))
        }
    }
}

/// Register a synthesized enum under its canonical name plus the lookup
/// aliases other fields may use to reference it (`Msg.field`, `Msg::field`,
/// and the namespace-qualified forms).
#[allow(clippy::too_many_arguments)]
fn synthesize_enum(
    model: &mut MessageModel,
    msg_name: &str,
    msg_fqn: &str,
    namespace: Option<&str>,
    field_name: &str,
    values: Vec<EnumValue>,
    is_open: bool,
    file: &std::path::Path,
    line: usize,
) -> Result<String, BuildError> {
    let synth_name = format!("{}_{}_Enum", msg_name, field_name);
    let entity = Enum {
        name: synth_name,
        values,
        parent: None,
        is_open,
        namespace: namespace.map(|s| s.to_string()),
        doc: None,
        source_file: file.to_path_buf(),
        line,
    };
    let fqn = entity.full_name();
    insert_unique(
        &mut model.enums,
        fqn.clone(),
        entity,
        DuplicateKind::Enum,
        file,
        line,
    )?;
    for alias in [
        format!("{}.{}", msg_name, field_name),
        format!("{}::{}", msg_name, field_name),
        format!("{}.{}", msg_fqn, field_name),
        format!("{}::{}", msg_fqn, field_name),
    ] {
        model.enum_aliases.entry(alias).or_insert_with(|| fqn.clone());
    }
    Ok(fqn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract;
    use crate::parser;
    use std::path::Path;

    fn assemble_src(src: &str) -> Result<(MessageModel, Vec<PendingExtension>), BuildError> {
        let tree = parser::parse(src).expect("parse");
        let raw = extract::extract(&tree, Path::new("test.def"));
        assemble(&raw)
    }

    #[test]
    fn inline_enum_is_synthesized_with_aliases() {
        let (model, _) = assemble_src(
            r#"
            message Robot {
                field mode: enum { IDLE, ACTIVE }
            }
            "#,
        )
        .expect("assemble");
        let e = model.enums.get("Robot_mode_Enum").expect("synthesized");
        assert_eq!(e.values.len(), 2);
        assert!(model.find_enum("Robot.mode").is_some());
        assert!(model.find_enum("Robot::mode").is_some());
    }

    #[test]
    fn inline_options_get_bit_flags() {
        let (model, _) = assemble_src(
            r#"
            message File {
                field perms: options { R, W, X }
            }
            "#,
        )
        .expect("assemble");
        let o = model.options.get("File_perms_Options").expect("synthesized");
        let flags: Vec<i64> = o.values.iter().map(|v| v.value).collect();
        assert_eq!(flags, vec![1, 2, 4]);
    }

    #[test]
    fn duplicate_message_is_fatal() {
        let err = assemble_src("message A { field x: int }\nmessage A { field y: int }")
            .expect_err("duplicate");
        assert!(matches!(
            err,
            BuildError::DuplicateDefinition {
                kind: DuplicateKind::Message,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_field_is_fatal() {
        let err = assemble_src("message A { field x: int field x: string }").expect_err("duplicate");
        assert!(matches!(
            err,
            BuildError::DuplicateDefinition {
                kind: DuplicateKind::Field,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_enum_value_number_is_fatal() {
        let err = assemble_src("enum E { A = 1, B = 1 }").expect_err("duplicate");
        assert!(matches!(
            err,
            BuildError::DuplicateDefinition {
                kind: DuplicateKind::EnumValueNumber,
                ..
            }
        ));
    }

    #[test]
    fn extension_field_registers_pending_work() {
        let (model, pending) = assemble_src(
            r#"
            enum Base { A, B }
            message M {
                field kind: enum Base + { C }
            }
            "#,
        )
        .expect("assemble");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].base_token, "Base");
        assert!(model.enums.contains_key("M_kind_Enum"));
    }

    #[test]
    fn map_field_keeps_unresolved_value_reference() {
        let (model, _) = assemble_src(
            r#"
            message M {
                field index: Map<string, Other>
            }
            "#,
        )
        .expect("assemble");
        let field = &model.messages.get("M").expect("msg").fields[0];
        assert_eq!(field.ty, FieldType::Map);
        match &field.payload {
            FieldPayload::Map { value, .. } => {
                assert!(matches!(&value.payload, FieldPayload::Unresolved { token } if token == "Other"));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}
