//! # defwrangler — .def Message Definition Compiler Front End
//!
//! Parses `.def` message-definition files with a PEST grammar and builds a
//! fully resolved semantic model: messages, enums, options sets, and compound
//! types, keyed by fully qualified name (`Namespace::Name`).
//!
//! ## DSL structure
//!
//! - **Imports**: `import "other.def" as Alias` pulls another file's
//!   entities in under the `Alias::` qualifier
//! - **Namespaces**: nestable; a file also implies a namespace named after
//!   itself for top-level entities that declare none
//! - **Messages**: named field lists with single inheritance
//! - **Enums**: `enum` / `open_enum`, with inheritance and value flattening
//! - **Options**: bit-flag sets (implicit values 1, 2, 4, ...)
//! - **Compounds**: a scalar fanned into named components, `float Vec3 { x, y, z }`
//!
//! ## Field types
//!
//! - Base: `string`, `int`, `float`, `bool`, `byte`
//! - Arrays `T[]`, maps `Map<K, V>`
//! - Inline `enum { ... }` / `options { ... }` (synthesized into standalone
//!   entities named `{Message}_{field}_Enum` / `_Options`)
//! - Enum extensions `enum Base + { EXTRA }` (base values merged in, new
//!   values numbered after the base's largest)
//! - References to any named entity, resolved hierarchically
//!
//! ## Example
//!
//! ```text
//! import "base.def" as Base
//!
//! namespace robot {
//!     enum Mode { IDLE, ACTIVE, FAULT }
//!
//!     message Status : Base::Header {
//!         /// Current operating mode.
//!         field mode: Mode
//!         field flags: options { LOW_POWER, DEGRADED }
//!     }
//! }
//! ```
//!
//! ## Usage
//!
//! [`load_def_file`] is the entry point; it returns the resolved
//! [`MessageModel`] plus any warnings. See `tests/integration.rs` for full
//! examples.

pub mod builder;
pub mod diag;
pub mod dump;
pub mod error;
pub mod extract;
pub mod loader;
pub mod model;
pub mod parser;
pub mod resolve;
pub mod syntax;

pub use diag::{Diagnostic, Diagnostics, Severity};
pub use dump::{dump_json, dump_text};
pub use error::{BuildError, DuplicateKind};
pub use loader::{load_def_file, Build};
pub use model::{
    Enum, EnumValue, Field, FieldPayload, FieldType, Message, MessageModel, OptionsDef,
};
pub use parser::{parse, scan_imports};
