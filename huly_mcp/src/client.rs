//! `HulyClient`: the shipped [`WorkspaceGateway`].
//!
//! It does not talk to a Huly server yet. While connected it keeps an
//! in-memory workspace, so every tool and resource behaves end to end.
//! Projects and conversations referenced by new tasks, documents or messages
//! are created on first use.
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    config::HulyConfig,
    gateway::{GatewayError, WorkspaceGateway},
    model::{
        Conversation, Document, DocumentUpdate, Message, NewDocument, NewTask, Project, Task,
        TaskUpdate,
    },
};

const DEFAULT_TASK_STATUS: &str = "open";

#[derive(Debug, Default)]
struct Workspace {
    tasks: Vec<Task>,
    projects: Vec<Project>,
    documents: Vec<Document>,
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
}

impl Workspace {
    fn ensure_project(&mut self, project_id: &str) {
        if !self.projects.iter().any(|p| p.id == project_id) {
            self.projects.push(Project {
                id: project_id.to_string(),
                name: project_id.to_string(),
                description: None,
                created_at: Utc::now(),
            });
        }
    }

    fn ensure_conversation(&mut self, conversation_id: &str) {
        if !self.conversations.iter().any(|c| c.id == conversation_id) {
            self.conversations.push(Conversation {
                id: conversation_id.to_string(),
                name: conversation_id.to_string(),
                created_at: Utc::now(),
            });
        }
    }

    fn task_mut(&mut self, task_id: &str) -> Result<&mut Task, GatewayError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| not_found("task", task_id))
    }

    fn document_mut(&mut self, document_id: &str) -> Result<&mut Document, GatewayError> {
        self.documents
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or_else(|| not_found("document", document_id))
    }
}

fn not_found(kind: &'static str, id: &str) -> GatewayError {
    GatewayError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug)]
pub struct HulyClient {
    config: HulyConfig,
    workspace: RwLock<Option<Workspace>>,
}

impl HulyClient {
    pub fn new(config: HulyConfig) -> Self {
        Self {
            config,
            workspace: RwLock::new(None),
        }
    }

    async fn read<T>(&self, f: impl FnOnce(&Workspace) -> Result<T, GatewayError>) -> Result<T, GatewayError> {
        let guard = self.workspace.read().await;
        let workspace = guard.as_ref().ok_or(GatewayError::Unavailable)?;
        f(workspace)
    }

    async fn write<T>(
        &self,
        f: impl FnOnce(&mut Workspace) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let mut guard = self.workspace.write().await;
        let workspace = guard.as_mut().ok_or(GatewayError::Unavailable)?;
        f(workspace)
    }
}

#[async_trait]
impl WorkspaceGateway for HulyClient {
    async fn connect(&self) -> Result<(), GatewayError> {
        tracing::info!(
            endpoint = %self.config.endpoint,
            workspace = %self.config.workspace,
            auth_method = self.config.auth.method(),
            "connecting to Huly"
        );
        let mut guard = self.workspace.write().await;
        if guard.is_none() {
            *guard = Some(Workspace::default());
        }
        tracing::info!("connected to Huly");
        Ok(())
    }

    async fn disconnect(&self) {
        if self.workspace.write().await.take().is_some() {
            tracing::info!("disconnected from Huly");
        }
    }

    async fn is_connected(&self) -> bool {
        self.workspace.read().await.is_some()
    }

    async fn list_tasks(&self, project_id: Option<&str>) -> Result<Vec<Task>, GatewayError> {
        self.read(|ws| {
            Ok(ws
                .tasks
                .iter()
                .filter(|t| project_id.is_none_or(|p| t.project_id == p))
                .cloned()
                .collect())
        })
        .await
    }

    async fn get_task(&self, task_id: &str) -> Result<Task, GatewayError> {
        self.read(|ws| {
            ws.tasks
                .iter()
                .find(|t| t.id == task_id)
                .cloned()
                .ok_or_else(|| not_found("task", task_id))
        })
        .await
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, GatewayError> {
        self.write(|ws| {
            ws.ensure_project(&task.project_id);
            let now = Utc::now();
            let created = Task {
                id: new_id(),
                title: task.title,
                description: task.description,
                project_id: task.project_id,
                assignee_id: task.assignee_id,
                priority: task.priority,
                status: DEFAULT_TASK_STATUS.to_string(),
                due_date: task.due_date,
                created_at: now,
                updated_at: now,
            };
            ws.tasks.push(created.clone());
            tracing::debug!(task_id = %created.id, "task created");
            Ok(created)
        })
        .await
    }

    async fn update_task(&self, task_id: &str, update: TaskUpdate) -> Result<Task, GatewayError> {
        self.write(|ws| {
            let task = ws.task_mut(task_id)?;
            if let Some(title) = update.title {
                task.title = title;
            }
            if let Some(description) = update.description {
                task.description = Some(description);
            }
            if let Some(status) = update.status {
                task.status = status;
            }
            if let Some(assignee_id) = update.assignee_id {
                task.assignee_id = Some(assignee_id);
            }
            if let Some(priority) = update.priority {
                task.priority = Some(priority);
            }
            if let Some(due_date) = update.due_date {
                task.due_date = Some(due_date);
            }
            task.updated_at = Utc::now();
            Ok(task.clone())
        })
        .await
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), GatewayError> {
        self.write(|ws| {
            let position = ws
                .tasks
                .iter()
                .position(|t| t.id == task_id)
                .ok_or_else(|| not_found("task", task_id))?;
            ws.tasks.remove(position);
            Ok(())
        })
        .await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, GatewayError> {
        self.read(|ws| Ok(ws.projects.clone())).await
    }

    async fn get_project(&self, project_id: &str) -> Result<Project, GatewayError> {
        self.read(|ws| {
            ws.projects
                .iter()
                .find(|p| p.id == project_id)
                .cloned()
                .ok_or_else(|| not_found("project", project_id))
        })
        .await
    }

    async fn list_documents(&self) -> Result<Vec<Document>, GatewayError> {
        self.read(|ws| Ok(ws.documents.clone())).await
    }

    async fn get_document(&self, document_id: &str) -> Result<Document, GatewayError> {
        self.read(|ws| {
            ws.documents
                .iter()
                .find(|d| d.id == document_id)
                .cloned()
                .ok_or_else(|| not_found("document", document_id))
        })
        .await
    }

    async fn create_document(&self, document: NewDocument) -> Result<Document, GatewayError> {
        self.write(|ws| {
            if let Some(project_id) = &document.project_id {
                ws.ensure_project(project_id);
            }
            let created = Document {
                id: new_id(),
                title: document.title,
                content: document.content,
                project_id: document.project_id,
                template: document.template,
                created_at: Utc::now(),
            };
            ws.documents.push(created.clone());
            Ok(created)
        })
        .await
    }

    async fn update_document(
        &self,
        document_id: &str,
        update: DocumentUpdate,
    ) -> Result<Document, GatewayError> {
        self.write(|ws| {
            let document = ws.document_mut(document_id)?;
            if let Some(title) = update.title {
                document.title = title;
            }
            if let Some(content) = update.content {
                document.content = content;
            }
            if let Some(project_id) = update.project_id {
                document.project_id = Some(project_id);
            }
            if let Some(template) = update.template {
                document.template = Some(template);
            }
            let updated = document.clone();
            if let Some(project_id) = &updated.project_id {
                ws.ensure_project(project_id);
            }
            tracing::debug!(document_id, "document updated");
            Ok(updated)
        })
        .await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, GatewayError> {
        self.read(|ws| Ok(ws.conversations.clone())).await
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, GatewayError> {
        self.read(|ws| {
            if !ws.conversations.iter().any(|c| c.id == conversation_id) {
                return Err(not_found("conversation", conversation_id));
            }
            Ok(ws
                .messages
                .iter()
                .filter(|m| m.conversation_id == conversation_id)
                .cloned()
                .collect())
        })
        .await
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<Message, GatewayError> {
        self.write(|ws| {
            ws.ensure_conversation(conversation_id);
            let message = Message {
                id: new_id(),
                conversation_id: conversation_id.to_string(),
                text: text.to_string(),
                sent_at: Utc::now(),
            };
            ws.messages.push(message.clone());
            Ok(message)
        })
        .await
    }
}
