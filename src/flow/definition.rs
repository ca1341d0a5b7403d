use crate::error::FlowConversionError;
use serde::{Deserialize, Serialize};

/// The complete, canonical definition of a flowchart, ready for structuring.
/// This is the target structure for any custom flowchart format conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub nodes: Vec<FlowNodeDefinition>,
    pub edges: Vec<FlowEdgeDefinition>,
}

/// Defines a single flowchart node.
///
/// `kind` is resolved through the structurer's parser registry; `text` is the
/// node's payload (an assignment, a condition, an output expression, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNodeDefinition {
    pub id: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Defines a control edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdgeDefinition {
    pub source: String,
    pub target: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "next".to_string()
}

impl FlowNodeDefinition {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            text: None,
            prompt: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

impl FlowEdgeDefinition {
    pub fn new(source: impl Into<String>, target: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            role: role.into(),
        }
    }
}

impl FlowDefinition {
    pub fn from_json(json: &str) -> Result<Self, FlowConversionError> {
        serde_json::from_str(json).map_err(|e| FlowConversionError::Json(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, FlowConversionError> {
        serde_json::to_string_pretty(self).map_err(|e| FlowConversionError::Json(e.to_string()))
    }
}
