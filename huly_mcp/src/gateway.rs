//! The boundary between the capability handlers and Huly.
use async_trait::async_trait;
use thiserror::Error;

use crate::model::{
    Conversation, Document, DocumentUpdate, Message, NewDocument, NewTask, Project, Task,
    TaskUpdate,
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Not connected to Huly")]
    Unavailable,

    #[error("Huly request failed: {0}")]
    Request(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

/// Operations the tools and resources need from a Huly workspace.
///
/// One instance is created at startup and shared as `Arc<dyn WorkspaceGateway>`
/// by every handler. Calls may overlap; implementations serialize internally
/// where they have to.
#[async_trait]
pub trait WorkspaceGateway: Send + Sync {
    async fn connect(&self) -> Result<(), GatewayError>;

    /// Best effort and idempotent. Failures are logged, not returned.
    async fn disconnect(&self);

    async fn is_connected(&self) -> bool;

    /// Tasks, optionally restricted to one project.
    async fn list_tasks(&self, project_id: Option<&str>) -> Result<Vec<Task>, GatewayError>;
    async fn get_task(&self, task_id: &str) -> Result<Task, GatewayError>;
    async fn create_task(&self, task: NewTask) -> Result<Task, GatewayError>;
    async fn update_task(&self, task_id: &str, update: TaskUpdate) -> Result<Task, GatewayError>;
    async fn delete_task(&self, task_id: &str) -> Result<(), GatewayError>;

    async fn list_projects(&self) -> Result<Vec<Project>, GatewayError>;
    async fn get_project(&self, project_id: &str) -> Result<Project, GatewayError>;

    async fn list_documents(&self) -> Result<Vec<Document>, GatewayError>;
    async fn get_document(&self, document_id: &str) -> Result<Document, GatewayError>;
    async fn create_document(&self, document: NewDocument) -> Result<Document, GatewayError>;
    async fn update_document(
        &self,
        document_id: &str,
        update: DocumentUpdate,
    ) -> Result<Document, GatewayError>;

    async fn list_conversations(&self) -> Result<Vec<Conversation>, GatewayError>;
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, GatewayError>;
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<Message, GatewayError>;
}
