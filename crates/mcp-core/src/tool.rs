use std::{borrow::Cow, sync::Arc};

/// Tools represent a routine that a server can execute
/// Tool calls represent requests from the client to execute one
use serde::{Deserialize, Serialize};

use super::JsonObject;

/// A tool that can be used by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// The name of the tool
    pub name: Cow<'static, str>,
    /// A description of what the tool does
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Cow<'static, str>>,
    /// A JSON Schema object defining the expected parameters for the tool
    pub input_schema: Arc<JsonObject>,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D, S>(name: N, description: D, input_schema: S) -> Self
    where
        N: Into<Cow<'static, str>>,
        D: Into<Cow<'static, str>>,
        S: Into<Arc<JsonObject>>,
    {
        Tool {
            name: name.into(),
            description: Some(description.into()),
            input_schema: input_schema.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::object;

    #[test]
    fn test_tool_serialization_uses_camel_case() {
        let tool = Tool::new(
            "send_message",
            "Send a message in a conversation",
            object(json!({"type": "object", "properties": {}})),
        );
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("inputSchema"));
        assert!(!json.contains("input_schema"));
    }

    #[test]
    fn test_tool_round_trips_input_schema() {
        let schema = json!({"type": "object", "required": ["taskId"]});
        let tool = Tool::new("update_task", "Update an existing task", object(schema.clone()));
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["inputSchema"], schema);
        assert_eq!(serde_json::from_value::<Tool>(json).unwrap(), tool);
    }
}
