//! Routes capability requests through the [`Registry`].
//!
//! The dispatcher keeps no per-request state: each call resolves its target in
//! the frozen registry, runs it and reports the outcome once. Nothing is
//! retried.
use std::{collections::BTreeMap, sync::Arc};

use futures::{FutureExt, future::BoxFuture};
use mcp_core::{
    Content, JsonObject, Prompt, Resource, ResourceContents, Tool,
    protocol::{
        CallToolResult, GetPromptResult, Implementation, ListPromptsResult, ListResourcesResult,
        ListToolsResult, ReadResourceResult, ServerCapabilities,
    },
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    RouterError,
    registry::{CapabilityClass, Registry},
    router::{CapabilitiesBuilder, Router},
};

pub const DEFAULT_RESOURCE_MIME_TYPE: &str = "application/json";

/// The answer to a list request for one capability class.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Listing {
    Tools(ListToolsResult),
    Resources(ListResourcesResult),
    Prompts(ListPromptsResult),
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    info: Implementation,
    instructions: Option<String>,
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(info: Implementation, registry: Registry) -> Self {
        Self {
            info,
            instructions: None,
            registry: Arc::new(registry),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn handle_list(&self, class: CapabilityClass) -> Listing {
        match class {
            CapabilityClass::Tool => Listing::Tools(ListToolsResult {
                tools: self.registry.list_tools(),
            }),
            CapabilityClass::Resource => Listing::Resources(ListResourcesResult {
                resources: self.registry.list_resources(),
            }),
            CapabilityClass::Prompt => Listing::Prompts(ListPromptsResult {
                prompts: self.registry.list_prompts(),
            }),
        }
    }

    /// Resolve, validate, invoke and confirm.
    pub async fn handle_tool_call(
        &self,
        name: &str,
        arguments: Option<&JsonObject>,
    ) -> Result<CallToolResult, RouterError> {
        let route = self
            .registry
            .resolve_tool(name)
            .ok_or_else(|| RouterError::UnknownCapability {
                class: CapabilityClass::Tool,
                name: name.to_string(),
            })?;

        let arguments = route.shape.validate(arguments).inspect_err(|e| {
            tracing::debug!(tool = name, error = %e, "rejected tool arguments");
        })?;

        let output = route.invoke(arguments.clone()).await.inspect_err(|e| {
            tracing::warn!(tool = name, error = %e, "tool handler failed");
        })?;

        let subject = route.confirmation.subject(name, &output, &arguments);
        let values = BTreeMap::from([("subject".to_string(), subject)]);
        let text = self
            .registry
            .renderer()
            .render(route.confirmation.template(), &values)
            .map_err(|e| RouterError::Internal(e.to_string()))?;

        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    pub fn handle_get_prompt(
        &self,
        name: &str,
        arguments: Option<&JsonObject>,
    ) -> Result<GetPromptResult, RouterError> {
        let route = self
            .registry
            .resolve_prompt(name)
            .ok_or_else(|| RouterError::UnknownCapability {
                class: CapabilityClass::Prompt,
                name: name.to_string(),
            })?;

        route
            .render(self.registry.renderer(), arguments)
            .map_err(|e| RouterError::Internal(e.to_string()))
    }

    /// Read the resource with the longest registered prefix of `uri`. The
    /// requested URI, not the prefix, is echoed in the contents.
    pub async fn handle_resource_read(&self, uri: &str) -> Result<ReadResourceResult, RouterError> {
        let route = self
            .registry
            .resolve_resource(uri)
            .ok_or_else(|| RouterError::UnknownCapability {
                class: CapabilityClass::Resource,
                name: uri.to_string(),
            })?;

        let body = route.read().await.inspect_err(|e| {
            tracing::warn!(uri, error = %e, "resource read failed");
        })?;
        let text = render_body(&body)?;
        let mime_type = route
            .attr
            .mime_type
            .as_deref()
            .unwrap_or(DEFAULT_RESOURCE_MIME_TYPE);

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, uri).with_mime_type(mime_type)],
        })
    }
}

fn render_body(body: &Value) -> Result<String, RouterError> {
    match body {
        Value::String(text) => Ok(text.clone()),
        other => serde_json::to_string_pretty(other).map_err(|e| RouterError::Internal(e.to_string())),
    }
}

impl Router for Dispatcher {
    fn name(&self) -> String {
        self.info.name.clone()
    }

    fn version(&self) -> String {
        self.info.version.clone()
    }

    fn instructions(&self) -> Option<String> {
        self.instructions.clone()
    }

    fn capabilities(&self) -> ServerCapabilities {
        CapabilitiesBuilder::new()
            .with_tools(false)
            .with_resources(false, false)
            .with_prompts(false)
            .with_logging()
            .build()
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.registry.list_tools()
    }

    fn call_tool(
        &self,
        tool_name: &str,
        arguments: Option<JsonObject>,
    ) -> BoxFuture<'static, Result<CallToolResult, RouterError>> {
        let this = self.clone();
        let tool_name = tool_name.to_string();
        async move { this.handle_tool_call(&tool_name, arguments.as_ref()).await }.boxed()
    }

    fn list_resources(&self) -> Vec<Resource> {
        self.registry.list_resources()
    }

    fn read_resource(&self, uri: &str) -> BoxFuture<'static, Result<ReadResourceResult, RouterError>> {
        let this = self.clone();
        let uri = uri.to_string();
        async move { this.handle_resource_read(&uri).await }.boxed()
    }

    fn list_prompts(&self) -> Vec<Prompt> {
        self.registry.list_prompts()
    }

    fn get_prompt(
        &self,
        prompt_name: &str,
        arguments: Option<JsonObject>,
    ) -> BoxFuture<'static, Result<GetPromptResult, RouterError>> {
        futures::future::ready(self.handle_get_prompt(prompt_name, arguments.as_ref())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use mcp_core::{PromptMessageRole, object};
    use serde_json::json;

    use super::*;
    use crate::{
        BoxError,
        registry::{Confirmation, PromptParam, PromptRoute, ResourceRoute, ToolRoute},
        schema::{FieldShape, ObjectShape},
    };

    fn dispatcher() -> Dispatcher {
        let mut registry = Registry::new();
        registry
            .register_tool(ToolRoute::new(
                "create_note",
                "Create a note",
                ObjectShape::new().field(FieldShape::string("title").required()),
                Confirmation::new("Note created successfully: {{ subject }}")
                    .subject_from_result("title")
                    .or_text("New Note"),
                |args: JsonObject| async move { Ok::<_, BoxError>(json!({"id": "n1", "title": args["title"]})) },
            )
            .unwrap())
            .unwrap();
        registry
            .register_tool(ToolRoute::new(
                "archive",
                "Archive everything",
                ObjectShape::new(),
                Confirmation::new("Archived {{ subject }}").or_text("all"),
                |_: JsonObject| async move { Err::<Value, BoxError>("Not connected to Huly".into()) },
            )
            .unwrap())
            .unwrap();
        registry
            .register_tool(ToolRoute::new(
                "touch_note",
                "Touch a note",
                ObjectShape::new(),
                Confirmation::new("Note created successfully: {{ subject }}")
                    .subject_from_result("title")
                    .or_text("New Note"),
                |_: JsonObject| async move { Ok::<_, BoxError>(json!({})) },
            )
            .unwrap())
            .unwrap();
        registry
            .register_resource(ResourceRoute::new(
                Resource::new("memo://notes", "Notes").with_mime_type("application/json"),
                || async { Ok::<_, BoxError>(json!([{"id": "n1"}])) },
            ))
            .unwrap();
        registry
            .register_prompt(
                PromptRoute::new("review", "Review template")
                    .argument(PromptParam::new("topic", "the change").required())
                    .description("Review of {{ topic }}")
                    .message(PromptMessageRole::User, "Please review {{ topic }}."),
            )
            .unwrap();
        Dispatcher::new(
            Implementation {
                name: "test".into(),
                version: "0.0.1".into(),
            },
            registry,
        )
    }

    #[tokio::test]
    async fn test_tool_call_confirms_with_result_title() {
        let dispatcher = dispatcher();
        let result = dispatcher
            .handle_tool_call("create_note", Some(&object(json!({"title": "Groceries"}))))
            .await
            .unwrap();
        assert_eq!(result.content[0].as_text(), Some("Note created successfully: Groceries"));
    }

    #[tokio::test]
    async fn test_tool_call_without_result_title_uses_placeholder() {
        let dispatcher = dispatcher();
        let result = dispatcher.handle_tool_call("touch_note", None).await.unwrap();
        assert_eq!(result.content[0].as_text(), Some("Note created successfully: New Note"));

        let result = dispatcher
            .handle_tool_call("create_note", Some(&object(json!({"title": ""}))))
            .await
            .unwrap();
        assert_eq!(result.content[0].as_text(), Some("Note created successfully: New Note"));
    }

    #[tokio::test]
    async fn test_tool_call_validation_runs_before_handler() {
        let dispatcher = dispatcher();
        let err = dispatcher.handle_tool_call("create_note", None).await.unwrap_err();
        match err {
            RouterError::InvalidArguments(e) => {
                assert_eq!(e.fields().collect::<Vec<_>>(), vec!["title"])
            }
            other => panic!("expected invalid arguments, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = dispatcher()
            .handle_tool_call("delete_everything", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RouterError::UnknownCapability { class: CapabilityClass::Tool, ref name } if name == "delete_everything"
        ));
    }

    #[tokio::test]
    async fn test_handler_failure_is_not_masked() {
        let err = dispatcher().handle_tool_call("archive", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Not connected to Huly");
    }

    #[tokio::test]
    async fn test_resource_read_echoes_requested_uri() {
        let result = dispatcher()
            .handle_resource_read("memo://notes/n1")
            .await
            .unwrap();
        let contents = &result.contents[0];
        assert_eq!(contents.uri, "memo://notes/n1");
        assert_eq!(contents.mime_type.as_deref(), Some("application/json"));
        let body: Value = serde_json::from_str(&contents.text).unwrap();
        assert_eq!(body, json!([{"id": "n1"}]));
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let err = dispatcher().handle_resource_read("memo://other").await.unwrap_err();
        assert!(matches!(
            err,
            RouterError::UnknownCapability { class: CapabilityClass::Resource, .. }
        ));
    }

    #[test]
    fn test_prompt_defaults_and_description() {
        let result = dispatcher().handle_get_prompt("review", None).unwrap();
        assert_eq!(result.description.as_deref(), Some("Review of the change"));
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].role, PromptMessageRole::User);
        assert_eq!(result.messages[0].content.as_text(), "Please review the change.");
    }

    #[test]
    fn test_list_is_stable() {
        let dispatcher = dispatcher();
        let first = dispatcher.handle_list(CapabilityClass::Tool);
        assert_eq!(first, dispatcher.handle_list(CapabilityClass::Tool));
        let json = serde_json::to_value(&first).unwrap();
        assert_eq!(json["tools"][0]["name"], "create_note");
        assert_eq!(json["tools"][1]["name"], "archive");
        let empty = Dispatcher::new(
            Implementation {
                name: "empty".into(),
                version: "0".into(),
            },
            Registry::new(),
        );
        assert_eq!(
            serde_json::to_value(empty.handle_list(CapabilityClass::Prompt)).unwrap(),
            json!({"prompts": []})
        );
    }
}
