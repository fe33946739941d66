//! Loading and linking of .def files.
//!
//! `load_def_file` is the crate entry point: it parses the requested file,
//! recursively builds every imported file, merges the imported models into
//! the current one under their import aliases, and runs resolution over the
//! merged whole. Each file is built once per top-level call; repeated imports
//! come from a path-keyed cache.

use crate::builder;
use crate::diag::{Diagnostic, Diagnostics};
use crate::error::BuildError;
use crate::extract;
use crate::model::*;
use crate::parser;
use crate::resolve;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of a successful build: the resolved model and the warnings
/// produced along the way.
#[derive(Debug)]
pub struct Build {
    pub model: MessageModel,
    pub diagnostics: Vec<Diagnostic>,
}

/// Build the model for one .def file and everything it imports.
pub fn load_def_file(path: &Path) -> Result<Build, BuildError> {
    let mut loader = Loader::default();
    let model = loader.load(path)?;
    Ok(Build {
        model,
        diagnostics: loader.diags.into_vec(),
    })
}

#[derive(Default)]
struct Loader {
    cache: HashMap<PathBuf, MessageModel>,
    in_progress: Vec<PathBuf>,
    diags: Diagnostics,
}

impl Loader {
    fn load(&mut self, path: &Path) -> Result<MessageModel, BuildError> {
        let path = std::fs::canonicalize(path).map_err(|e| BuildError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if let Some(cached) = self.cache.get(&path) {
            return Ok(cached.clone());
        }
        if let Some(start) = self.in_progress.iter().position(|p| p == &path) {
            let mut names: Vec<String> = self.in_progress[start..]
                .iter()
                .map(|p| file_label(p))
                .collect();
            names.push(file_label(&path));
            return Err(BuildError::CircularImport {
                cycle: names.join(" -> "),
            });
        }
        self.in_progress.push(path.clone());
        let result = self.load_inner(&path);
        self.in_progress.pop();
        let model = result?;
        self.cache.insert(path, model.clone());
        Ok(model)
    }

    fn load_inner(&mut self, path: &Path) -> Result<MessageModel, BuildError> {
        debug!(file = %path.display(), "building");
        let source = std::fs::read_to_string(path).map_err(|e| BuildError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        // Imports are discovered with the line scanner, not the grammar, and
        // built before this file is parsed, so a cycle is still reported even
        // when a file mid-cycle has a syntax error of its own.
        let mut loaded = Vec::new();
        for (import_path, alias, line) in parser::scan_imports(&source) {
            let target = match path.parent() {
                Some(dir) => dir.join(&import_path),
                None => PathBuf::from(&import_path),
            };
            let alias = alias.unwrap_or_else(|| {
                Path::new(&import_path)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| import_path.clone())
            });
            let imported = self.load(&target)?;
            loaded.push((alias, imported, line));
        }

        let tree = parser::parse(&source).map_err(|message| BuildError::Syntax {
            file: path.to_path_buf(),
            message,
        })?;
        let raw = extract::extract(&tree, path);
        let file_ns = raw.file_namespace.clone();
        let (mut model, mut pending) = builder::assemble(&raw)?;

        for (alias, imported, line) in loaded {
            if model.imports.contains_key(&alias) {
                self.diags.warn(
                    path,
                    line,
                    format!("duplicate import alias '{}', later import wins", alias),
                );
            }
            let resolved_path = imported.main_file_path.clone();
            self.merge(&mut model, imported, &alias, path, line);
            model.imports.insert(alias, resolved_path);
        }

        // File-level namespace: top-level entities that declare none belong
        // to a namespace named after the file.
        let finalize_map = assign_file_namespace(&mut model, &file_ns);
        rewrite_references(&mut model, &finalize_map);
        qualify_alias_keys(&mut model.enum_aliases, &finalize_map);
        qualify_alias_keys(&mut model.options_aliases, &finalize_map);
        for ext in &mut pending {
            if let Some(new_key) = finalize_map.get(&ext.enum_fqn) {
                ext.enum_fqn = new_key.clone();
            }
            if let Some(new_key) = finalize_map.get(&ext.message_fqn) {
                ext.message_fqn = new_key.clone();
            }
        }
        model.rebuild_namespaces();

        resolve::resolve_parents(&mut model, &file_ns)?;
        resolve::apply_extensions(&mut model, &pending, &file_ns)?;
        resolve::resolve_field_types(&mut model, &file_ns);
        resolve::escalate_unknowns(&model)?;
        Ok(model)
    }

    /// Fold an imported model into `model`. Every imported entity's namespace
    /// becomes the import alias, whatever namespace it carried inside its own
    /// file, so `Base::Command` imported as `B` becomes `B::Command`.
    /// Collisions with existing entities warn and the later definition wins.
    fn merge(
        &mut self,
        model: &mut MessageModel,
        mut imported: MessageModel,
        alias: &str,
        file: &Path,
        line: usize,
    ) {
        let mut rename: HashMap<String, String> = HashMap::new();
        for (old_key, _) in collect_namespaces(&imported) {
            let name = old_key.rsplit("::").next().unwrap_or(&old_key).to_string();
            rename.insert(old_key, full_name(Some(alias), &name));
        }
        rewrite_references(&mut imported, &rename);

        for (old_key, mut m) in std::mem::take(&mut imported.messages) {
            m.namespace = Some(alias.to_string());
            let key = rename.get(&old_key).cloned().unwrap_or(old_key);
            if model.messages.insert(key.clone(), m).is_some() {
                self.warn_override(file, line, "message", &key);
            }
        }
        for (old_key, mut e) in std::mem::take(&mut imported.enums) {
            e.namespace = Some(alias.to_string());
            let key = rename.get(&old_key).cloned().unwrap_or(old_key);
            if model.enums.insert(key.clone(), e).is_some() {
                self.warn_override(file, line, "enum", &key);
            }
        }
        for (old_key, mut o) in std::mem::take(&mut imported.options) {
            o.namespace = Some(alias.to_string());
            let key = rename.get(&old_key).cloned().unwrap_or(old_key);
            if model.options.insert(key.clone(), o).is_some() {
                self.warn_override(file, line, "options", &key);
            }
        }
        for (old_key, mut c) in std::mem::take(&mut imported.compounds) {
            c.namespace = Some(alias.to_string());
            let key = rename.get(&old_key).cloned().unwrap_or(old_key);
            if model.compounds.insert(key.clone(), c).is_some() {
                self.warn_override(file, line, "compound", &key);
            }
        }
        // Synthesized-enum aliases from the imported file stay reachable
        // under the import alias qualifier.
        for (alias_key, canonical) in imported.enum_aliases {
            let canonical = rename.get(&canonical).cloned().unwrap_or(canonical);
            model
                .enum_aliases
                .insert(format!("{}::{}", alias, alias_key), canonical);
        }
        for (alias_key, canonical) in imported.options_aliases {
            let canonical = rename.get(&canonical).cloned().unwrap_or(canonical);
            model
                .options_aliases
                .insert(format!("{}::{}", alias, alias_key), canonical);
        }
    }

    fn warn_override(&mut self, file: &Path, line: usize, kind: &str, key: &str) {
        self.diags.warn(
            file,
            line,
            format!("imported {} '{}' overrides an earlier definition", kind, key),
        );
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Add namespace-qualified spellings of synthesized-type alias keys after
/// the owning message moved into the file-level namespace, so
/// `robot::Robot.mode` resolves alongside `Robot.mode`.
fn qualify_alias_keys(aliases: &mut HashMap<String, String>, rename: &HashMap<String, String>) {
    let additions: Vec<(String, String)> = aliases
        .iter()
        .flat_map(|(key, canonical)| {
            rename.iter().filter_map(move |(old, new)| {
                let rest = key.strip_prefix(old.as_str())?;
                if rest.starts_with("::") || rest.starts_with('.') {
                    Some((format!("{}{}", new, rest), canonical.clone()))
                } else {
                    None
                }
            })
        })
        .collect();
    for (key, canonical) in additions {
        aliases.entry(key).or_insert(canonical);
    }
}

/// (old key, namespace) of every entity in the model.
fn collect_namespaces(model: &MessageModel) -> Vec<(String, Option<String>)> {
    let mut out = Vec::new();
    for (k, m) in &model.messages {
        out.push((k.clone(), m.namespace.clone()));
    }
    for (k, e) in &model.enums {
        out.push((k.clone(), e.namespace.clone()));
    }
    for (k, o) in &model.options {
        out.push((k.clone(), o.namespace.clone()));
    }
    for (k, c) in &model.compounds {
        out.push((k.clone(), c.namespace.clone()));
    }
    out
}

/// Move namespace-less entities into the file-level namespace, re-keying
/// their table entries. Returns the old-key to new-key map.
fn assign_file_namespace(model: &mut MessageModel, file_ns: &str) -> HashMap<String, String> {
    let mut rename = HashMap::new();
    if file_ns.is_empty() {
        return rename;
    }

    let messages = std::mem::take(&mut model.messages);
    for (key, mut m) in messages {
        if m.namespace.is_none() {
            m.namespace = Some(file_ns.to_string());
            let new_key = m.full_name();
            rename.insert(key, new_key.clone());
            model.messages.insert(new_key, m);
        } else {
            model.messages.insert(key, m);
        }
    }
    let enums = std::mem::take(&mut model.enums);
    for (key, mut e) in enums {
        if e.namespace.is_none() {
            e.namespace = Some(file_ns.to_string());
            let new_key = e.full_name();
            rename.insert(key, new_key.clone());
            model.enums.insert(new_key, e);
        } else {
            model.enums.insert(key, e);
        }
    }
    let options = std::mem::take(&mut model.options);
    for (key, mut o) in options {
        if o.namespace.is_none() {
            o.namespace = Some(file_ns.to_string());
            let new_key = o.full_name();
            rename.insert(key, new_key.clone());
            model.options.insert(new_key, o);
        } else {
            model.options.insert(key, o);
        }
    }
    let compounds = std::mem::take(&mut model.compounds);
    for (key, mut c) in compounds {
        if c.namespace.is_none() {
            c.namespace = Some(file_ns.to_string());
            let new_key = c.full_name();
            rename.insert(key, new_key.clone());
            model.compounds.insert(new_key, c);
        } else {
            model.compounds.insert(key, c);
        }
    }
    rename
}

/// Rewrite parent links, resolved field payloads, and alias targets through
/// a key rename map.
fn rewrite_references(model: &mut MessageModel, rename: &HashMap<String, String>) {
    if rename.is_empty() {
        return;
    }
    let map = |s: &mut String| {
        if let Some(new) = rename.get(s.as_str()) {
            *s = new.clone();
        }
    };
    for m in model.messages.values_mut() {
        if let Some(parent) = &mut m.parent {
            map(parent);
        }
        for f in &mut m.fields {
            rewrite_field(f, rename);
        }
    }
    for e in model.enums.values_mut() {
        if let Some(parent) = &mut e.parent {
            map(parent);
        }
    }
    for canonical in model.enum_aliases.values_mut() {
        map(canonical);
    }
    for canonical in model.options_aliases.values_mut() {
        map(canonical);
    }
}

fn rewrite_field(field: &mut Field, rename: &HashMap<String, String>) {
    match &mut field.payload {
        FieldPayload::Enum { fqn }
        | FieldPayload::Options { fqn }
        | FieldPayload::Message { fqn } => {
            if let Some(new) = rename.get(fqn.as_str()) {
                *fqn = new.clone();
            }
        }
        FieldPayload::Map { key, value } => {
            rewrite_field(key, rename);
            rewrite_field(value, rename);
        }
        _ => {}
    }
}
