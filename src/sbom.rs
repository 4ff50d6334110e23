//! CycloneDX SBOM to dependency-tree conversion.
//!
//! Components of type `application` (and the document's own metadata
//! component) are dropped, the `dependencies` section becomes a
//! `ref -> dependsOn` graph, and every ref nobody depends on is expanded into
//! one tree. Expansion tracks the refs on the current path, so a cycle ends in
//! an error node (or a [`TreeError::CyclicStructure`]) instead of recursing
//! forever.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::TreeError;
use crate::ir::RawNode;

pub const DEFAULT_MAX_DEPTH: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CyclePolicy {
    /// Replace the repeated ref with an error node and keep going.
    #[default]
    Annotate,
    /// Abort the conversion.
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyOptions {
    pub max_depth: usize,
    pub cycles: CyclePolicy,
}

impl Default for HierarchyOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            cycles: CyclePolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SbomError {
    #[error("No valid root dependencies found or circular dependencies detected.")]
    NoRoots,
    #[error(transparent)]
    Cycle(#[from] TreeError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub bom_ref: String,
    pub name: String,
    pub version: String,
    pub licenses: Vec<String>,
    pub kind: String,
}

impl Component {
    fn metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("version".into(), json!(self.version));
        map.insert(
            "licenses".into(),
            Value::Array(self.licenses.iter().map(|name| json!({ "name": name })).collect()),
        );
        map.insert("type".into(), json!(self.kind));
        map
    }
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: IndexMap<String, Vec<String>>,
    components: HashMap<String, Component>,
}

impl DependencyGraph {
    pub fn from_document(document: &Value) -> Self {
        let mut ignored: HashSet<String> = HashSet::new();
        if let Some(bom_ref) = document
            .pointer("/metadata/component/bom-ref")
            .and_then(Value::as_str)
        {
            ignored.insert(bom_ref.to_string());
        }

        let mut components = HashMap::new();
        for item in array_at(document, "components") {
            let bom_ref = item.get("bom-ref").and_then(Value::as_str);
            if item.get("type").and_then(Value::as_str) == Some("application") {
                if let Some(bom_ref) = bom_ref {
                    ignored.insert(bom_ref.to_string());
                }
                continue;
            }
            let Some(bom_ref) = bom_ref else {
                debug!("component without bom-ref skipped");
                continue;
            };
            let component = Component {
                bom_ref: bom_ref.to_string(),
                name: string_or(item.get("name"), "Unknown"),
                version: string_or(item.get("version"), "Unknown"),
                licenses: extract_licenses(item.get("licenses")),
                kind: component_kind(item),
            };
            components.insert(component.bom_ref.clone(), component);
        }

        let mut edges: IndexMap<String, Vec<String>> = IndexMap::new();
        for dependency in array_at(document, "dependencies") {
            let Some(reference) = dependency.get("ref").and_then(Value::as_str) else {
                continue;
            };
            if reference.is_empty() || ignored.contains(reference) {
                continue;
            }
            let depends_on = array_at(dependency, "dependsOn")
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string);
            edges.entry(reference.to_string()).or_default().extend(depends_on);
        }

        Self { edges, components }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Refs that no other ref depends on, in document order.
    pub fn roots(&self) -> Vec<&str> {
        let depended: HashSet<&str> = self
            .edges
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        self.edges
            .keys()
            .map(String::as_str)
            .filter(|node| !depended.contains(node))
            .collect()
    }

    pub fn expand(&self, root: &str, options: &HierarchyOptions) -> Result<RawNode, TreeError> {
        let mut path = Vec::new();
        self.expand_node(root, &mut path, options)
    }

    fn expand_node(
        &self,
        node: &str,
        path: &mut Vec<String>,
        options: &HierarchyOptions,
    ) -> Result<RawNode, TreeError> {
        if path.iter().any(|seen| seen == node) {
            let cycle = TreeError::CyclicStructure {
                node: node.to_string(),
                path: path.clone(),
            };
            return match options.cycles {
                CyclePolicy::Annotate => {
                    warn!("{cycle}");
                    Ok(error_node(node, cycle.to_string()))
                }
                CyclePolicy::Fail => Err(cycle),
            };
        }
        if path.len() > options.max_depth {
            return Ok(error_node(node, "recursion depth limit reached".to_string()));
        }

        let mut raw = RawNode {
            reference: Some(node.to_string()),
            ..Default::default()
        };
        if let Some(component) = self.components.get(node) {
            raw.name = Some(component.name.clone());
            raw.extra = component.metadata();
        }

        path.push(node.to_string());
        let children = self.edges.get(node).map(Vec::as_slice).unwrap_or_default();
        let deps = children
            .iter()
            .map(|child| self.expand_node(child, path, options))
            .collect::<Result<Vec<_>, _>>();
        path.pop();

        raw.deps = Some(deps?);
        Ok(raw)
    }
}

/// Converts a CycloneDX document into one tree per root dependency.
pub fn build_dependency_trees(document: &Value, options: &HierarchyOptions) -> Result<Vec<RawNode>, SbomError> {
    let graph = DependencyGraph::from_document(document);
    let roots = graph.roots();
    debug!(refs = graph.len(), roots = roots.len(), "dependency graph built");
    if roots.is_empty() {
        return Err(SbomError::NoRoots);
    }
    roots
        .into_iter()
        .map(|root| graph.expand(root, options).map_err(SbomError::from))
        .collect()
}

fn error_node(node: &str, message: String) -> RawNode {
    RawNode {
        reference: Some(node.to_string()),
        error: Some(message),
        deps: Some(Vec::new()),
        ..Default::default()
    }
}

fn array_at<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn string_or(value: Option<&Value>, fallback: &str) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

fn extract_licenses(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|entry| entry.get("license"))
        .map(|license| {
            license
                .get("name")
                .or_else(|| license.get("id"))
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string()
        })
        .collect()
}

/// The component type lives in the second entry of `properties`.
fn component_kind(item: &Value) -> String {
    array_at(item, "properties")
        .get(1)
        .and_then(|property| property.get("value"))
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
