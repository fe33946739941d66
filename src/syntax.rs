//! Syntax tree for the .def DSL.
//!
//! This is the contract between the parser and the semantic stages: a fixed,
//! closed node vocabulary (namespaces, messages, enums, options, compounds,
//! imports, fields, comments) that the extractor matches on exhaustively.
//! Nothing here is resolved; type positions carry raw tokens only.

/// A parsed .def file: the ordered top-level items.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub enum Item {
    Import(ImportNode),
    Namespace(NamespaceNode),
    Message(MessageNode),
    Enum(EnumNode),
    Options(OptionsNode),
    Compound(CompoundNode),
    Comment(CommentNode),
}

/// `import "path" as Alias` — alias is optional in the grammar.
#[derive(Debug, Clone)]
pub struct ImportNode {
    pub path: String,
    pub alias: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct NamespaceNode {
    pub name: String,
    pub items: Vec<Item>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct MessageNode {
    pub name: String,
    /// Raw inheritance token, possibly namespace-qualified.
    pub parent: Option<String>,
    pub body: Vec<MessageItem>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum MessageItem {
    Field(FieldNode),
    Comment(CommentNode),
}

#[derive(Debug, Clone)]
pub struct FieldNode {
    pub name: String,
    pub optional: bool,
    pub ty: TypeNode,
    pub default_value: Option<String>,
    pub line: usize,
}

/// A type position in a field. References stay as raw tokens; inline enum and
/// options bodies keep their (still unnumbered) value lists.
#[derive(Debug, Clone)]
pub enum TypeNode {
    Basic(BasicType),
    /// `Name`, `Ns::Name`, or `Msg.field` — resolved later.
    Reference(String),
    Array(Box<TypeNode>),
    Map {
        key: Box<TypeNode>,
        value: Box<TypeNode>,
    },
    Compound {
        base: BasicType,
        components: Vec<String>,
    },
    InlineEnum {
        is_open: bool,
        values: Vec<ValueNode>,
    },
    InlineOptions {
        values: Vec<ValueNode>,
    },
    /// `Base.ref + { EXTRA = 100 }`: an enum reference extended in place.
    EnumExtension {
        base: String,
        values: Vec<ValueNode>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicType {
    String,
    Int,
    Float,
    Bool,
    Byte,
}

impl BasicType {
    pub fn as_str(self) -> &'static str {
        match self {
            BasicType::String => "string",
            BasicType::Int => "int",
            BasicType::Float => "float",
            BasicType::Bool => "bool",
            BasicType::Byte => "byte",
        }
    }
}

/// One `NAME (= NUMBER)?` entry in an enum or options body. The numeric value
/// is still optional here; the extractor assigns implicit values.
#[derive(Debug, Clone)]
pub struct ValueNode {
    pub name: String,
    pub value: Option<i64>,
    pub doc: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct EnumNode {
    pub name: String,
    pub is_open: bool,
    pub parent: Option<String>,
    pub values: Vec<ValueNode>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct OptionsNode {
    pub name: String,
    pub values: Vec<ValueNode>,
    pub line: usize,
}

/// Standalone compound definition, e.g. `float Vec3 { x, y, z }`.
#[derive(Debug, Clone)]
pub struct CompoundNode {
    pub base: BasicType,
    pub name: String,
    pub components: Vec<String>,
    pub line: usize,
}

/// Doc comments attach to the next declaration; the other kinds are dropped
/// from the model but kept in the tree so attachment order is visible.
#[derive(Debug, Clone)]
pub enum CommentNode {
    Doc(String),
    Local(String),
    Block(String),
}

impl CommentNode {
    /// Doc text without the `///` marker, trimmed; None for non-doc comments.
    pub fn doc_text(&self) -> Option<&str> {
        match self {
            CommentNode::Doc(text) => Some(text.trim_start_matches('/').trim()),
            _ => None,
        }
    }
}
