//! Render a resolved model as an indented text tree or as JSON. Both forms
//! iterate the tables in insertion order, so output is stable across runs.

use crate::model::*;

/// Human-readable tree of the whole model.
pub fn dump_text(model: &MessageModel) -> String {
    let mut out = String::new();
    out.push_str(&format!("model {}\n", model.main_file_path.display()));
    for (alias, path) in &model.imports {
        out.push_str(&format!("  import {} -> {}\n", alias, path.display()));
    }
    for (key, m) in &model.messages {
        match &m.parent {
            Some(p) => out.push_str(&format!("  message {} : {}\n", key, p)),
            None => out.push_str(&format!("  message {}\n", key)),
        }
        for f in &m.fields {
            out.push_str(&format!("    field {}: {}", f.name, type_label(f)));
            if f.optional {
                out.push_str(" optional");
            }
            if let Some(d) = &f.default_value {
                out.push_str(&format!(" = {}", d));
            }
            out.push('\n');
        }
    }
    for (key, e) in &model.enums {
        let kind = if e.is_open { "open_enum" } else { "enum" };
        let bits = model.enum_min_size_bits(key).unwrap_or(8);
        match &e.parent {
            Some(p) => out.push_str(&format!("  {} {} : {} ({} bits)\n", kind, key, p, bits)),
            None => out.push_str(&format!("  {} {} ({} bits)\n", kind, key, bits)),
        }
        for v in &e.values {
            out.push_str(&format!("    {} = {}\n", v.name, v.value));
        }
    }
    for (key, o) in &model.options {
        out.push_str(&format!("  options {}\n", key));
        for v in &o.values {
            out.push_str(&format!("    {} = {}\n", v.name, v.value));
        }
    }
    for (key, c) in &model.compounds {
        out.push_str(&format!(
            "  compound {} ({} {{ {} }})\n",
            key,
            scalar_label(c.base),
            c.components.join(", ")
        ));
    }
    out
}

fn type_label(f: &Field) -> String {
    let base = match &f.payload {
        FieldPayload::Map { key, value } => {
            format!("Map<{}, {}>", type_label(key), type_label(value))
        }
        FieldPayload::Enum { fqn } => format!("enum {}", fqn),
        FieldPayload::Options { fqn } => format!("options {}", fqn),
        FieldPayload::Message { fqn } => fqn.clone(),
        FieldPayload::Compound { base, components } => {
            format!("{} {{ {} }}", scalar_label(*base), components.join(", "))
        }
        FieldPayload::Unresolved { token } => format!("?{}", token),
        FieldPayload::Scalar => scalar_label(f.ty).to_string(),
    };
    if f.is_array {
        format!("{}[]", base)
    } else {
        base
    }
}

fn scalar_label(ty: FieldType) -> &'static str {
    match ty {
        FieldType::String => "string",
        FieldType::Int => "int",
        FieldType::Float => "float",
        FieldType::Bool => "bool",
        FieldType::Byte => "byte",
        FieldType::Enum => "enum",
        FieldType::Options => "options",
        FieldType::Compound => "compound",
        FieldType::MessageReference => "message",
        FieldType::Map => "map",
        FieldType::Unknown => "unknown",
    }
}

/// JSON rendering of the model, for tooling.
pub fn dump_json(model: &MessageModel) -> String {
    let mut out = String::new();
    out.push_str("{\n");
    out.push_str(&format!(
        "  \"file\": {},\n",
        json_str(&model.main_file_path.display().to_string())
    ));

    out.push_str("  \"messages\": {\n");
    let mut first = true;
    for (key, m) in &model.messages {
        if !first {
            out.push_str(",\n");
        }
        first = false;
        out.push_str(&format!("    {}: {{", json_str(key)));
        match &m.parent {
            Some(p) => out.push_str(&format!("\"parent\": {}, ", json_str(p))),
            None => {}
        }
        out.push_str("\"fields\": [");
        for (i, f) in m.fields.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&format!(
                "{{\"name\": {}, \"type\": {}, \"array\": {}, \"optional\": {}}}",
                json_str(&f.name),
                json_str(&type_label(f)),
                f.is_array,
                f.optional
            ));
        }
        out.push_str("]}");
    }
    out.push_str("\n  },\n");

    out.push_str("  \"enums\": {\n");
    first = true;
    for (key, e) in &model.enums {
        if !first {
            out.push_str(",\n");
        }
        first = false;
        let bits = model.enum_min_size_bits(key).unwrap_or(8);
        out.push_str(&format!(
            "    {}: {{\"open\": {}, \"bits\": {}, \"values\": {{",
            json_str(key),
            e.is_open,
            bits
        ));
        for (i, v) in e.values.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&format!("{}: {}", json_str(&v.name), v.value));
        }
        out.push_str("}}");
    }
    out.push_str("\n  },\n");

    out.push_str("  \"options\": {\n");
    first = true;
    for (key, o) in &model.options {
        if !first {
            out.push_str(",\n");
        }
        first = false;
        out.push_str(&format!("    {}: {{", json_str(key)));
        for (i, v) in o.values.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&format!("{}: {}", json_str(&v.name), v.value));
        }
        out.push_str("}");
    }
    out.push_str("\n  }\n");
    out.push_str("}\n");
    out
}

fn json_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn json_escaping() {
        assert_eq!(json_str("a\"b"), "\"a\\\"b\"");
        assert_eq!(json_str("a\nb"), "\"a\\nb\"");
    }

    #[test]
    fn text_dump_lists_entities() {
        let mut model = MessageModel::new(PathBuf::from("robot.def"));
        model.enums.insert(
            "robot::Mode".into(),
            Enum {
                name: "Mode".into(),
                values: vec![EnumValue {
                    name: "IDLE".into(),
                    value: 0,
                    doc: None,
                }],
                parent: None,
                is_open: false,
                namespace: Some("robot".into()),
                doc: None,
                source_file: PathBuf::from("robot.def"),
                line: 1,
            },
        );
        let text = dump_text(&model);
        assert!(text.contains("enum robot::Mode (8 bits)"));
        assert!(text.contains("IDLE = 0"));
    }
}
