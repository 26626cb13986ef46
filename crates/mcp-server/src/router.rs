use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures::future::BoxFuture;
use mcp_core::{
    ErrorData, JsonObject, Prompt, Resource, Tool,
    protocol::{
        CallToolRequestParam, CallToolResult, EmptyResult, GetPromptRequestParam, GetPromptResult,
        Implementation, InitializeResult, JsonRpcRequest, JsonRpcResponse, ListPromptsResult,
        ListResourcesResult, ListToolsResult, PROTOCOL_VERSION, PromptsCapability,
        ReadResourceRequestParam, ReadResourceResult, ResourcesCapability, ServerCapabilities,
        ToolsCapability,
    },
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tower_service::Service;

use crate::{BoxError, RouterError};

/// Builder for configuring and constructing capabilities
pub struct CapabilitiesBuilder {
    tools: Option<ToolsCapability>,
    prompts: Option<PromptsCapability>,
    resources: Option<ResourcesCapability>,
    logging: bool,
}

impl Default for CapabilitiesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilitiesBuilder {
    pub fn new() -> Self {
        Self {
            tools: None,
            prompts: None,
            resources: None,
            logging: false,
        }
    }

    /// Add multiple tools to the router
    pub fn with_tools(mut self, list_changed: bool) -> Self {
        self.tools = Some(ToolsCapability {
            list_changed: Some(list_changed),
        });
        self
    }

    /// Enable prompts capability
    pub fn with_prompts(mut self, list_changed: bool) -> Self {
        self.prompts = Some(PromptsCapability {
            list_changed: Some(list_changed),
        });
        self
    }

    /// Enable resources capability
    pub fn with_resources(mut self, subscribe: bool, list_changed: bool) -> Self {
        self.resources = Some(ResourcesCapability {
            subscribe: Some(subscribe),
            list_changed: Some(list_changed),
        });
        self
    }

    pub fn with_logging(mut self) -> Self {
        self.logging = true;
        self
    }

    /// Build the router with automatic capability inference
    pub fn build(self) -> ServerCapabilities {
        ServerCapabilities {
            tools: self.tools,
            prompts: self.prompts,
            resources: self.resources,
            logging: self.logging.then(JsonObject::new),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RouterError> {
    serde_json::from_value(params.unwrap_or(Value::Object(JsonObject::new())))
        .map_err(|e| RouterError::InvalidParams(e.to_string()))
}

fn respond<T: Serialize>(req: &JsonRpcRequest, result: T) -> Result<JsonRpcResponse, RouterError> {
    let result = serde_json::to_value(result).map_err(|e| RouterError::Internal(e.to_string()))?;
    Ok(JsonRpcResponse::success(req.id.clone(), result))
}

/// The per-method surface of an MCP server.
///
/// Implementors answer the six capability endpoints; the provided `handle_*`
/// methods decode parameters and wrap results into JSON-RPC responses.
pub trait Router: Send + Sync + 'static {
    fn name(&self) -> String;
    fn version(&self) -> String;
    fn instructions(&self) -> Option<String>;
    fn capabilities(&self) -> ServerCapabilities;
    fn list_tools(&self) -> Vec<Tool>;
    fn call_tool(
        &self,
        tool_name: &str,
        arguments: Option<JsonObject>,
    ) -> BoxFuture<'static, Result<CallToolResult, RouterError>>;
    fn list_resources(&self) -> Vec<Resource>;
    fn read_resource(&self, uri: &str) -> BoxFuture<'static, Result<ReadResourceResult, RouterError>>;
    fn list_prompts(&self) -> Vec<Prompt>;
    fn get_prompt(
        &self,
        prompt_name: &str,
        arguments: Option<JsonObject>,
    ) -> BoxFuture<'static, Result<GetPromptResult, RouterError>>;

    fn handle_initialize(
        &self,
        req: JsonRpcRequest,
    ) -> impl Future<Output = Result<JsonRpcResponse, RouterError>> + Send {
        async move {
            let result = InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: self.capabilities(),
                server_info: Implementation {
                    name: self.name(),
                    version: self.version(),
                },
                instructions: self.instructions(),
            };
            respond(&req, result)
        }
    }

    fn handle_ping(
        &self,
        req: JsonRpcRequest,
    ) -> impl Future<Output = Result<JsonRpcResponse, RouterError>> + Send {
        async move { respond(&req, EmptyResult {}) }
    }

    fn handle_tools_list(
        &self,
        req: JsonRpcRequest,
    ) -> impl Future<Output = Result<JsonRpcResponse, RouterError>> + Send {
        async move {
            let tools = self.list_tools();
            respond(&req, ListToolsResult { tools })
        }
    }

    fn handle_tools_call(
        &self,
        req: JsonRpcRequest,
    ) -> impl Future<Output = Result<JsonRpcResponse, RouterError>> + Send {
        async move {
            let params: CallToolRequestParam = parse_params(req.params.clone())?;
            let result = self.call_tool(&params.name, params.arguments).await?;
            respond(&req, result)
        }
    }

    fn handle_resources_list(
        &self,
        req: JsonRpcRequest,
    ) -> impl Future<Output = Result<JsonRpcResponse, RouterError>> + Send {
        async move {
            let resources = self.list_resources();
            respond(&req, ListResourcesResult { resources })
        }
    }

    fn handle_resources_read(
        &self,
        req: JsonRpcRequest,
    ) -> impl Future<Output = Result<JsonRpcResponse, RouterError>> + Send {
        async move {
            let params: ReadResourceRequestParam = parse_params(req.params.clone())?;
            let result = self.read_resource(&params.uri).await?;
            respond(&req, result)
        }
    }

    fn handle_prompts_list(
        &self,
        req: JsonRpcRequest,
    ) -> impl Future<Output = Result<JsonRpcResponse, RouterError>> + Send {
        async move {
            let prompts = self.list_prompts();
            respond(&req, ListPromptsResult { prompts })
        }
    }

    fn handle_prompts_get(
        &self,
        req: JsonRpcRequest,
    ) -> impl Future<Output = Result<JsonRpcResponse, RouterError>> + Send {
        async move {
            let params: GetPromptRequestParam = parse_params(req.params.clone())?;
            let result = self.get_prompt(&params.name, params.arguments).await?;
            respond(&req, result)
        }
    }
}

/// Adapts a [`Router`] to a tower [`Service`] over JSON-RPC requests.
///
/// Every failure becomes an error response carrying the request id, so the
/// service itself never errors.
#[derive(Clone)]
pub struct RouterService<T>(pub T);

impl<T> Service<JsonRpcRequest> for RouterService<T>
where
    T: Router + Clone + Send + Sync + 'static,
{
    type Response = JsonRpcResponse;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: JsonRpcRequest) -> Self::Future {
        let this = self.0.clone();

        Box::pin(async move {
            let id = req.id.clone();
            let method = req.method.clone();
            let result = match method.as_str() {
                "initialize" => this.handle_initialize(req).await,
                "ping" => this.handle_ping(req).await,
                "tools/list" => this.handle_tools_list(req).await,
                "tools/call" => this.handle_tools_call(req).await,
                "resources/list" => this.handle_resources_list(req).await,
                "resources/read" => this.handle_resources_read(req).await,
                "prompts/list" => this.handle_prompts_list(req).await,
                "prompts/get" => this.handle_prompts_get(req).await,
                _ => Err(RouterError::MethodNotFound(method.clone())),
            };

            let response = result.unwrap_or_else(|error| {
                tracing::debug!(request_id = %id, method = %method, %error, "request failed");
                JsonRpcResponse::error(id, ErrorData::from(error))
            });
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_builder() {
        let capabilities = CapabilitiesBuilder::new()
            .with_tools(false)
            .with_resources(false, false)
            .with_prompts(false)
            .with_logging()
            .build();
        let json = serde_json::to_value(&capabilities).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "tools": {"listChanged": false},
                "resources": {"subscribe": false, "listChanged": false},
                "prompts": {"listChanged": false},
                "logging": {}
            })
        );
    }

    #[test]
    fn test_missing_params_decode_as_empty_object() {
        let err = parse_params::<CallToolRequestParam>(None).unwrap_err();
        assert!(matches!(err, RouterError::InvalidParams(_)));
        let params: EmptyResult = parse_params(None).unwrap();
        assert_eq!(params, EmptyResult {});
    }
}
