//! Parse .def source into a syntax tree using PEST.

use crate::syntax::*;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct DefParser;

/// Parse .def source into a syntax tree.
pub fn parse(source: &str) -> Result<SyntaxTree, String> {
    let pairs = DefParser::parse(Rule::file, source).map_err(|e| format!("Parse error: {}", e))?;
    let file = pairs.into_iter().next().ok_or("Empty parse")?;
    let mut items = Vec::new();
    for inner in file.into_inner() {
        match inner.as_rule() {
            Rule::EOI => {}
            _ => items.push(build_item(inner)?),
        }
    }
    Ok(SyntaxTree { items })
}

/// Scan source for `import "path" as Alias` statements without going through
/// the grammar, so imports are discovered even when the rest of the file has
/// parse problems. Block comments are tracked so a commented-out import is
/// not loaded. Returns `(path, alias, line)` per statement.
pub fn scan_imports(source: &str) -> Vec<(String, Option<String>, usize)> {
    let mut out = Vec::new();
    let mut in_block = false;
    for (i, raw_line) in source.lines().enumerate() {
        let mut text = String::new();
        let mut remaining = raw_line;
        loop {
            if in_block {
                match remaining.find("*/") {
                    Some(pos) => {
                        in_block = false;
                        remaining = &remaining[pos + 2..];
                    }
                    None => break,
                }
            } else {
                match remaining.find("/*") {
                    Some(pos) => {
                        text.push_str(&remaining[..pos]);
                        in_block = true;
                        remaining = &remaining[pos + 2..];
                    }
                    None => {
                        text.push_str(remaining);
                        break;
                    }
                }
            }
        }
        let line = text.trim();
        let Some(rest) = line.strip_prefix("import") else {
            continue;
        };
        let rest = rest.trim_start();
        if !rest.starts_with('"') {
            continue;
        }
        let Some(end) = rest[1..].find('"') else {
            continue;
        };
        let path = unescape_string(&rest[1..end + 1]);
        let after = rest[end + 2..].trim();
        let alias = after
            .strip_prefix("as")
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(|a| {
                a.chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                    .collect::<String>()
            })
            .filter(|a| !a.is_empty());
        out.push((path, alias, i + 1));
    }
    out
}

fn line_of(pair: &pest::iterators::Pair<Rule>) -> usize {
    pair.line_col().0
}

fn build_item(pair: pest::iterators::Pair<Rule>) -> Result<Item, String> {
    match pair.as_rule() {
        Rule::import_stmt => Ok(Item::Import(build_import(pair)?)),
        Rule::namespace => Ok(Item::Namespace(build_namespace(pair)?)),
        Rule::message => Ok(Item::Message(build_message(pair)?)),
        Rule::enum_def => Ok(Item::Enum(build_enum(pair)?)),
        Rule::options_def => Ok(Item::Options(build_options(pair)?)),
        Rule::compound_def => Ok(Item::Compound(build_compound(pair)?)),
        Rule::comment => Ok(Item::Comment(build_comment(pair)?)),
        other => Err(format!("Unexpected item rule: {:?}", other)),
    }
}

fn build_import(pair: pest::iterators::Pair<Rule>) -> Result<ImportNode, String> {
    let line = line_of(&pair);
    let mut path = None;
    let mut alias = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string => path = Some(unescape_string(strip_quotes(inner.as_str()))),
            Rule::name => alias = Some(inner.as_str().to_string()),
            _ => {}
        }
    }
    Ok(ImportNode {
        path: path.ok_or("import: missing path")?,
        alias,
        line,
    })
}

fn build_namespace(pair: pest::iterators::Pair<Rule>) -> Result<NamespaceNode, String> {
    let line = line_of(&pair);
    let mut name = String::new();
    let mut items = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => name = inner.as_str().to_string(),
            Rule::kw_namespace => {}
            _ => items.push(build_item(inner)?),
        }
    }
    if name.is_empty() {
        return Err("namespace: missing name".to_string());
    }
    Ok(NamespaceNode { name, items, line })
}

fn build_message(pair: pest::iterators::Pair<Rule>) -> Result<MessageNode, String> {
    let line = line_of(&pair);
    let mut name = String::new();
    let mut parent = None;
    let mut body = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => name = inner.as_str().to_string(),
            Rule::inheritance => parent = Some(inheritance_token(inner)?),
            Rule::field => body.push(MessageItem::Field(build_field(inner)?)),
            Rule::comment => body.push(MessageItem::Comment(build_comment(inner)?)),
            _ => {}
        }
    }
    if name.is_empty() {
        return Err("message: missing name".to_string());
    }
    Ok(MessageNode {
        name,
        parent,
        body,
        line,
    })
}

fn inheritance_token(pair: pest::iterators::Pair<Rule>) -> Result<String, String> {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::qualified_name)
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| "inheritance: missing name".to_string())
}

fn build_enum(pair: pest::iterators::Pair<Rule>) -> Result<EnumNode, String> {
    let line = line_of(&pair);
    let mut name = String::new();
    let mut is_open = false;
    let mut parent = None;
    let mut values = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::enum_kind => is_open = inner.as_str() == "open_enum",
            Rule::name => name = inner.as_str().to_string(),
            Rule::inheritance => parent = Some(inheritance_token(inner)?),
            Rule::value_list => values = build_value_list(inner)?,
            _ => {}
        }
    }
    if name.is_empty() {
        return Err("enum: missing name".to_string());
    }
    Ok(EnumNode {
        name,
        is_open,
        parent,
        values,
        line,
    })
}

fn build_options(pair: pest::iterators::Pair<Rule>) -> Result<OptionsNode, String> {
    let line = line_of(&pair);
    let mut name = String::new();
    let mut values = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => name = inner.as_str().to_string(),
            Rule::value_list => values = build_value_list(inner)?,
            _ => {}
        }
    }
    if name.is_empty() {
        return Err("options: missing name".to_string());
    }
    Ok(OptionsNode { name, values, line })
}

fn build_compound(pair: pest::iterators::Pair<Rule>) -> Result<CompoundNode, String> {
    let line = line_of(&pair);
    let mut base = None;
    let mut name = String::new();
    let mut components = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::basic_type => base = Some(parse_basic_type(inner.as_str())?),
            Rule::name => name = inner.as_str().to_string(),
            Rule::component_list => components = build_component_list(inner),
            _ => {}
        }
    }
    Ok(CompoundNode {
        base: base.ok_or("compound: missing base type")?,
        name,
        components,
        line,
    })
}

fn build_component_list(pair: pest::iterators::Pair<Rule>) -> Vec<String> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::name)
        .map(|p| p.as_str().to_string())
        .collect()
}

/// Values with interleaved comments: a doc comment attaches to the value
/// that follows it.
fn build_value_list(pair: pest::iterators::Pair<Rule>) -> Result<Vec<ValueNode>, String> {
    let mut out: Vec<ValueNode> = Vec::new();
    let mut pending_doc: Vec<String> = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::comment => {
                if let Some(text) = build_comment_text(inner) {
                    pending_doc.push(text);
                }
            }
            Rule::value_entry => {
                let line = line_of(&inner);
                let mut name = String::new();
                let mut value = None;
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::name => name = part.as_str().to_string(),
                        Rule::number => {
                            let parsed = part.as_str().parse::<i64>().map_err(|_| {
                                format!(
                                    "line {}: value '{} = {}' does not fit in 64 bits",
                                    line,
                                    name,
                                    part.as_str()
                                )
                            })?;
                            value = Some(parsed);
                        }
                        _ => {}
                    }
                }
                let doc = if pending_doc.is_empty() {
                    None
                } else {
                    Some(pending_doc.join("\n"))
                };
                pending_doc.clear();
                out.push(ValueNode {
                    name,
                    value,
                    doc,
                    line,
                });
            }
            _ => {}
        }
    }
    Ok(out)
}

fn build_field(pair: pest::iterators::Pair<Rule>) -> Result<FieldNode, String> {
    let line = line_of(&pair);
    let mut name = String::new();
    let mut optional = false;
    let mut ty = None;
    let mut default_value = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => name = inner.as_str().to_string(),
            Rule::field_modifier => optional = true,
            Rule::type_def => ty = Some(build_type(inner)?),
            Rule::field_default => {
                default_value = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::default_value)
                    .map(|p| clean_default(p.as_str()));
            }
            _ => {}
        }
    }
    Ok(FieldNode {
        name,
        optional,
        ty: ty.ok_or("field: missing type")?,
        default_value,
        line,
    })
}

fn build_type(pair: pest::iterators::Pair<Rule>) -> Result<TypeNode, String> {
    let inner = pair.into_inner().next().ok_or("Empty type_def")?;
    build_type_inner(inner)
}

fn build_type_inner(pair: pest::iterators::Pair<Rule>) -> Result<TypeNode, String> {
    match pair.as_rule() {
        Rule::basic_type => Ok(TypeNode::Basic(parse_basic_type(pair.as_str())?)),
        Rule::ref_type | Rule::qualified_name => Ok(TypeNode::Reference(pair.as_str().to_string())),
        Rule::enum_ref_type => {
            let token = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::qualified_name)
                .ok_or("enum reference: missing name")?;
            Ok(TypeNode::Reference(token.as_str().to_string()))
        }
        Rule::array_type => {
            let elem = pair.into_inner().next().ok_or("array: missing element")?;
            Ok(TypeNode::Array(Box::new(build_type_inner(elem)?)))
        }
        Rule::map_type => {
            let mut key = None;
            let mut value = None;
            for part in pair.into_inner() {
                match part.as_rule() {
                    Rule::map_key => {
                        let k = part.into_inner().next().ok_or("map: missing key type")?;
                        key = Some(build_type_inner(k)?);
                    }
                    Rule::map_value => {
                        let v = part.into_inner().next().ok_or("map: missing value type")?;
                        value = Some(build_type_inner(v)?);
                    }
                    _ => {}
                }
            }
            Ok(TypeNode::Map {
                key: Box::new(key.ok_or("map: missing key")?),
                value: Box::new(value.ok_or("map: missing value")?),
            })
        }
        Rule::compound_type => {
            let mut base = None;
            let mut components = Vec::new();
            for part in pair.into_inner() {
                match part.as_rule() {
                    Rule::basic_type => base = Some(parse_basic_type(part.as_str())?),
                    Rule::component_list => components = build_component_list(part),
                    _ => {}
                }
            }
            Ok(TypeNode::Compound {
                base: base.ok_or("compound type: missing base")?,
                components,
            })
        }
        Rule::enum_inline_type => {
            let mut is_open = false;
            let mut values = Vec::new();
            for part in pair.into_inner() {
                match part.as_rule() {
                    Rule::enum_kind => is_open = part.as_str() == "open_enum",
                    Rule::value_list => values = build_value_list(part)?,
                    _ => {}
                }
            }
            Ok(TypeNode::InlineEnum { is_open, values })
        }
        Rule::options_inline_type => {
            let values = match pair.into_inner().find(|p| p.as_rule() == Rule::value_list) {
                Some(list) => build_value_list(list)?,
                None => Vec::new(),
            };
            Ok(TypeNode::InlineOptions { values })
        }
        Rule::enum_ext_type => {
            let mut base = None;
            let mut values = Vec::new();
            for part in pair.into_inner() {
                match part.as_rule() {
                    Rule::qualified_name => base = Some(part.as_str().to_string()),
                    Rule::value_list => values = build_value_list(part)?,
                    _ => {}
                }
            }
            Ok(TypeNode::EnumExtension {
                base: base.ok_or("enum extension: missing base reference")?,
                values,
            })
        }
        other => Err(format!("Unhandled type rule: {:?}", other)),
    }
}

fn build_comment(pair: pest::iterators::Pair<Rule>) -> Result<CommentNode, String> {
    let inner = pair.into_inner().next().ok_or("Empty comment")?;
    Ok(match inner.as_rule() {
        Rule::doc_comment => CommentNode::Doc(inner.as_str().to_string()),
        Rule::local_comment => CommentNode::Local(inner.as_str().to_string()),
        Rule::c_comment => CommentNode::Block(inner.as_str().to_string()),
        other => return Err(format!("Unexpected comment rule: {:?}", other)),
    })
}

/// Doc text of a comment pair, or None for local/block comments.
fn build_comment_text(pair: pest::iterators::Pair<Rule>) -> Option<String> {
    let inner = pair.into_inner().next()?;
    if inner.as_rule() == Rule::doc_comment {
        Some(inner.as_str().trim_start_matches('/').trim().to_string())
    } else {
        None
    }
}

fn parse_basic_type(s: &str) -> Result<BasicType, String> {
    match s {
        "string" => Ok(BasicType::String),
        "int" => Ok(BasicType::Int),
        "float" => Ok(BasicType::Float),
        "bool" => Ok(BasicType::Bool),
        "byte" => Ok(BasicType::Byte),
        other => Err(format!("Unknown basic type: {}", other)),
    }
}

fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

fn unescape_string(s: &str) -> String {
    s.replace("\\\"", "\"")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\\", "\\")
}

fn clean_default(s: &str) -> String {
    let s = s.trim();
    if s.starts_with('"') && s.ends_with('"') && s.len() >= 2 {
        unescape_string(strip_quotes(s))
    } else {
        // The default token runs to end of line; drop a trailing // comment.
        match s.find("//") {
            Some(i) => s[..i].trim().to_string(),
            None => s.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_imports_finds_aliased_and_plain() {
        let src = "import \"base.def\" as Base\nnamespace X {\n}\nimport \"other.def\"\n";
        let found = scan_imports(src);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "base.def");
        assert_eq!(found[0].1.as_deref(), Some("Base"));
        assert_eq!(found[0].2, 1);
        assert_eq!(found[1].0, "other.def");
        assert_eq!(found[1].1, None);
    }

    #[test]
    fn scan_imports_survives_broken_body() {
        // The rest of the file would never parse; the scanner does not care.
        let src = "import \"a.def\" as A\nmessage {{{ nonsense\n";
        let found = scan_imports(src);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1.as_deref(), Some("A"));
    }

    #[test]
    fn clean_default_strips_trailing_comment() {
        assert_eq!(clean_default("5 // speed"), "5");
        assert_eq!(clean_default("\"a b\""), "a b");
    }
}
