//! Workspace entities as exchanged with Huly and returned by resources.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [&'static str; 4] = ["low", "medium", "high", "urgent"];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a task to be created. Doubles as the `create_task` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub project_id: String,
    pub assignee_id: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
}

/// A partial task update; `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub assignee_id: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    pub project_id: Option<String>,
    pub template: Option<String>,
}

/// A partial document update; `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub project_id: Option<String>,
    pub template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_from_tool_arguments() {
        let task: NewTask = serde_json::from_value(serde_json::json!({
            "title": "Fix bug",
            "projectId": "P1",
            "priority": "urgent"
        }))
        .unwrap();
        assert_eq!(task.project_id, "P1");
        assert_eq!(task.priority, Some(Priority::Urgent));
        assert!(task.assignee_id.is_none());
    }

    #[test]
    fn test_task_serializes_camel_case_and_skips_empty() {
        let now = Utc::now();
        let task = Task {
            id: "t1".into(),
            title: "Fix bug".into(),
            description: None,
            project_id: "P1".into(),
            assignee_id: None,
            priority: Some(Priority::High),
            status: "open".into(),
            due_date: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["projectId"], "P1");
        assert_eq!(json["priority"], "high");
        assert!(json.get("description").is_none());
        assert!(json.get("createdAt").is_some());
    }
}
