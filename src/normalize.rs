use crate::error::TreeError;
use crate::ir::{CanonicalNode, DisplayName, RawNode};

/// Deepest nesting [`normalize`] accepts before giving up.
pub const MAX_NORMALIZE_DEPTH: usize = 512;

/// Converts a raw record into its canonical form.
///
/// `deps` becomes `children` one-to-one and in order. The display name is the
/// first non-empty value of `error`, `name` and `ref`, in that order.
pub fn normalize(raw: Option<&RawNode>) -> Result<Option<CanonicalNode>, TreeError> {
    match raw {
        Some(raw) => normalize_node(raw, 0).map(Some),
        None => Ok(None),
    }
}

pub fn resolve_display_name(raw: &RawNode) -> DisplayName {
    [&raw.error, &raw.name, &raw.reference]
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .map(|value| DisplayName::Named(value.clone()))
        .unwrap_or(DisplayName::Unknown)
}

fn normalize_node(raw: &RawNode, depth: usize) -> Result<CanonicalNode, TreeError> {
    if depth >= MAX_NORMALIZE_DEPTH {
        return Err(TreeError::DepthLimit {
            limit: MAX_NORMALIZE_DEPTH,
        });
    }
    let children = raw
        .deps
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|dep| normalize_node(dep, depth + 1))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CanonicalNode {
        display_name: resolve_display_name(raw),
        children,
    })
}
