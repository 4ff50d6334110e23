//! Loading uploaded documents: either a JSON collection of dependency trees or
//! a CycloneDX SBOM that still has to be turned into one.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Largest upload accepted, in bytes.
pub const MAX_INPUT_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file too large ({size} bytes, limit is {MAX_INPUT_BYTES})")]
    TooLarge { size: u64 },
    #[error("invalid JSON: {0}")]
    Syntax(String),
    #[error("expected a JSON object or array at the top level")]
    UnexpectedShape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Already a tree collection (or a single tree).
    Trees,
    /// A CycloneDX bill of materials.
    Sbom,
}

impl DocumentKind {
    pub fn classify(document: &Value) -> Self {
        let Some(object) = document.as_object() else {
            return Self::Trees;
        };
        let declared = object
            .get("bomFormat")
            .and_then(Value::as_str)
            .is_some_and(|format| format.eq_ignore_ascii_case("cyclonedx"));
        if declared || (object.contains_key("components") && object.contains_key("dependencies")) {
            Self::Sbom
        } else {
            Self::Trees
        }
    }
}

/// Reads the input from `path`, or stdin for `None` and `-`.
pub fn read_source(path: Option<&Path>) -> Result<String, InputError> {
    match path {
        Some(path) if path != Path::new("-") => {
            let read_err = |source| InputError::Read {
                path: path.to_path_buf(),
                source,
            };
            let size = std::fs::metadata(path).map_err(read_err)?.len();
            if size > MAX_INPUT_BYTES {
                return Err(InputError::TooLarge { size });
            }
            std::fs::read_to_string(path).map_err(read_err)
        }
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .take(MAX_INPUT_BYTES + 1)
                .read_to_string(&mut buf)
                .map_err(|source| InputError::Read {
                    path: PathBuf::from("-"),
                    source,
                })?;
            let size = buf.len() as u64;
            if size > MAX_INPUT_BYTES {
                return Err(InputError::TooLarge { size });
            }
            Ok(buf)
        }
    }
}

/// Parses strict JSON, falling back to JSON5 for hand-edited files.
pub fn parse_document(text: &str) -> Result<Value, InputError> {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(strict) => {
            debug!("strict JSON parse failed, retrying as JSON5: {strict}");
            json5::from_str::<Value>(text).map_err(|_| InputError::Syntax(strict.to_string()))?
        }
    };
    if value.is_object() || value.is_array() {
        Ok(value)
    } else {
        Err(InputError::UnexpectedShape)
    }
}

/// Writes the tree collection that was rendered, pretty-printed.
pub fn write_tree_output(trees: &Value, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(trees)?;
    std::fs::write(path, json)?;
    Ok(())
}
