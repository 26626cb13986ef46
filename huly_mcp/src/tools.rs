use std::sync::Arc;

use mcp_server::{
    Registry, RegistryError,
    registry::{Confirmation, ToolRoute},
    schema::{FieldShape, ObjectShape},
};
use serde::Deserialize;

use crate::{
    gateway::WorkspaceGateway,
    model::{NewDocument, NewTask, Priority, TaskUpdate},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub task_id: String,
    #[serde(flatten)]
    pub update: TaskUpdate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub message: String,
}

pub fn register(registry: &mut Registry, gateway: Arc<dyn WorkspaceGateway>) -> Result<(), RegistryError> {
    registry.register_tool(create_task(gateway.clone())?)?;
    registry.register_tool(update_task(gateway.clone())?)?;
    registry.register_tool(create_document(gateway.clone())?)?;
    registry.register_tool(send_message(gateway)?)?;
    Ok(())
}

fn priority() -> FieldShape {
    FieldShape::string("priority").one_of(Priority::ALL)
}

fn create_task(gateway: Arc<dyn WorkspaceGateway>) -> Result<ToolRoute, RegistryError> {
    let shape = ObjectShape::new()
        .field(FieldShape::string("title").required().describe("Task title"))
        .field(FieldShape::string("description").describe("Task description"))
        .field(FieldShape::string("projectId").required().describe("Project ID"))
        .field(FieldShape::string("assigneeId").describe("Assignee user ID"))
        .field(priority())
        .field(FieldShape::string("dueDate").describe("Due date (ISO format)"));

    ToolRoute::new(
        "create_task",
        "Create a new task in Huly.io",
        shape,
        Confirmation::new("Task created successfully: {{ subject }}")
            .subject_from_result("title")
            .or_text("New Task"),
        move |task: NewTask| {
            let gateway = gateway.clone();
            async move { gateway.create_task(task).await }
        },
    )
}

fn update_task(gateway: Arc<dyn WorkspaceGateway>) -> Result<ToolRoute, RegistryError> {
    let shape = ObjectShape::new()
        .field(FieldShape::string("taskId").required().describe("Task ID to update"))
        .field(FieldShape::string("title").describe("New task title"))
        .field(FieldShape::string("description").describe("New task description"))
        .field(FieldShape::string("status").describe("Task status"))
        .field(FieldShape::string("assigneeId").describe("New assignee user ID"))
        .field(priority())
        .field(FieldShape::string("dueDate").describe("New due date (ISO format)"));

    ToolRoute::new(
        "update_task",
        "Update an existing task",
        shape,
        Confirmation::new("Task updated successfully: {{ subject }}")
            .subject_from_result("title")
            .subject_from_argument("taskId"),
        move |request: UpdateTaskRequest| {
            let gateway = gateway.clone();
            async move { gateway.update_task(&request.task_id, request.update).await }
        },
    )
}

fn create_document(gateway: Arc<dyn WorkspaceGateway>) -> Result<ToolRoute, RegistryError> {
    let shape = ObjectShape::new()
        .field(FieldShape::string("title").required().describe("Document title"))
        .field(FieldShape::string("content").required().describe("Document content"))
        .field(FieldShape::string("projectId").describe("Project ID"))
        .field(FieldShape::string("template").describe("Document template to use"));

    ToolRoute::new(
        "create_document",
        "Create a new document in Huly.io",
        shape,
        Confirmation::new("Document created successfully: {{ subject }}")
            .subject_from_result("title")
            .or_text("New Document"),
        move |document: NewDocument| {
            let gateway = gateway.clone();
            async move { gateway.create_document(document).await }
        },
    )
}

fn send_message(gateway: Arc<dyn WorkspaceGateway>) -> Result<ToolRoute, RegistryError> {
    let shape = ObjectShape::new()
        .field(FieldShape::string("conversationId").required().describe("Conversation ID"))
        .field(FieldShape::string("message").required().describe("Message content"));

    ToolRoute::new(
        "send_message",
        "Send a message in a conversation",
        shape,
        Confirmation::new("Message sent successfully to conversation {{ subject }}")
            .subject_from_argument("conversationId"),
        move |request: SendMessageRequest| {
            let gateway = gateway.clone();
            async move {
                gateway
                    .send_message(&request.conversation_id, &request.message)
                    .await
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        client::HulyClient,
        config::{AuthConfig, HulyConfig},
    };

    #[test]
    fn test_update_request_splits_task_id_from_changes() {
        let request: UpdateTaskRequest = serde_json::from_value(json!({
            "taskId": "T-1",
            "status": "done",
            "priority": "high"
        }))
        .unwrap();
        assert_eq!(request.task_id, "T-1");
        assert_eq!(request.update.status.as_deref(), Some("done"));
        assert_eq!(request.update.priority, Some(Priority::High));
        assert!(request.update.title.is_none());
    }

    #[test]
    fn test_create_task_schema_matches_declared_fields() {
        let route = create_task(Arc::new(HulyClient::new(HulyConfig {
            endpoint: "https://huly.example.com".parse().unwrap(),
            workspace: "acme".into(),
            auth: AuthConfig::Token { token: "t".into() },
        })))
        .unwrap();
        let schema = route.attr.input_schema.as_ref();
        assert_eq!(schema["required"], json!(["title", "projectId"]));
        assert_eq!(
            schema["properties"]["priority"],
            json!({"type": "string", "enum": ["low", "medium", "high", "urgent"]})
        );
        assert_eq!(schema["properties"]["dueDate"]["description"], "Due date (ISO format)");
    }
}
