//! Message catalog files.
//!
//! A catalog is a YAML mapping of message id to template. Nested mappings are
//! flattened with `.` so that
//!
//! ```yaml
//! errors:
//!   record_not_found: "{{.name}} record not found!"
//! ```
//!
//! yields the id `errors.record_not_found`. A mapping whose keys are plural
//! forms (`one`, `other`, ...) is a single message and resolves to its
//! `other` form.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Message id to template mapping for a single language.
pub type Catalog = HashMap<String, String>;

const MESSAGE_KEYS: &[&str] = &[
    "id",
    "description",
    "hash",
    "zero",
    "one",
    "two",
    "few",
    "many",
    "other",
];

/// Read and parse the catalog at `path`.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let raw = fs::read_to_string(path).map_err(|source| Error::CatalogRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog(&raw, path)
}

/// Parse catalog text. `path` is only used for error reporting.
pub fn parse_catalog(raw: &str, path: &Path) -> Result<Catalog> {
    let value: Value = serde_yaml::from_str(raw).map_err(|source| Error::CatalogParse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut catalog = Catalog::new();
    match value {
        Value::Null => {}
        Value::Mapping(mapping) => flatten(None, &mapping, &mut catalog),
        _ => {
            return Err(Error::CatalogShape {
                path: path.to_path_buf(),
            })
        }
    }
    Ok(catalog)
}

fn flatten(prefix: Option<&str>, mapping: &Mapping, out: &mut Catalog) {
    for (key, value) in mapping {
        let Some(key) = scalar_text(key) else {
            continue;
        };
        let id = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key,
        };

        match value {
            Value::Mapping(inner) if is_message(inner) => {
                if let Some(template) = inner.get("other").and_then(scalar_text) {
                    out.insert(id, template);
                }
            }
            Value::Mapping(inner) => flatten(Some(&id), inner, out),
            other => {
                if let Some(template) = scalar_text(other) {
                    out.insert(id, template);
                }
            }
        }
    }
}

fn is_message(mapping: &Mapping) -> bool {
    mapping.contains_key("other")
        && mapping
            .keys()
            .all(|k| k.as_str().is_some_and(|k| MESSAGE_KEYS.contains(&k)))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
