use serde::Serialize;
use serde_json::{Map, Value};

/// One record of an incoming dependency tree.
///
/// Every field is optional; whatever the producer sent beyond the four known
/// keys is kept in `extra` so it survives a round trip through
/// [`serde_json::to_value`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawNode {
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deps: Option<Vec<RawNode>>,
}

impl RawNode {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn with_deps(mut self, deps: Vec<RawNode>) -> Self {
        self.deps = Some(deps);
        self
    }

    /// Lenient conversion from untrusted JSON.
    ///
    /// Objects map field by field; `null` and any other non-object value map to
    /// an empty record. Label fields accept strings, numbers and `true`;
    /// `deps` is only honoured when it is an array.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        let mut node = Self::default();
        for (key, field) in object {
            match key.as_str() {
                "name" => node.name = label_field(field),
                "ref" => node.reference = label_field(field),
                "error" => node.error = label_field(field),
                "deps" => {
                    node.deps = field
                        .as_array()
                        .map(|items| items.iter().map(RawNode::from_value).collect());
                }
                _ => {
                    node.extra.insert(key.clone(), field.clone());
                }
            }
        }
        node
    }
}

impl From<&Value> for RawNode {
    fn from(value: &Value) -> Self {
        Self::from_value(value)
    }
}

fn label_field(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayName {
    Named(String),
    /// None of `error`, `name` or `ref` carried a value.
    Unknown,
}

impl DisplayName {
    pub fn as_label(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name.as_str()),
            Self::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalNode {
    pub display_name: DisplayName,
    pub children: Vec<CanonicalNode>,
}

impl CanonicalNode {
    pub fn leaf(name: &str) -> Self {
        Self {
            display_name: DisplayName::Named(name.to_string()),
            children: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        self.display_name.as_label().unwrap_or("")
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}
