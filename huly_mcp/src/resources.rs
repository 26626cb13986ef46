use std::sync::Arc;

use mcp_core::Resource;
use mcp_server::{Registry, RegistryError, registry::ResourceRoute};

use crate::gateway::WorkspaceGateway;

const JSON_MIME_TYPE: &str = "application/json";

fn listing(uri: &str, name: &str, description: &str) -> Resource {
    Resource::new(uri, name)
        .with_description(description)
        .with_mime_type(JSON_MIME_TYPE)
}

/// Register the four collection resources. Each is served for its URI and
/// every URI below it, e.g. `huly://tasks/123`.
pub fn register(registry: &mut Registry, gateway: Arc<dyn WorkspaceGateway>) -> Result<(), RegistryError> {
    let tasks = gateway.clone();
    registry.register_resource(ResourceRoute::new(
        listing("huly://tasks", "All Tasks", "List all tasks in the workspace"),
        move || {
            let gateway = tasks.clone();
            async move { gateway.list_tasks(None).await }
        },
    ))?;

    let projects = gateway.clone();
    registry.register_resource(ResourceRoute::new(
        listing("huly://projects", "Projects", "List all projects in the workspace"),
        move || {
            let gateway = projects.clone();
            async move { gateway.list_projects().await }
        },
    ))?;

    let documents = gateway.clone();
    registry.register_resource(ResourceRoute::new(
        listing("huly://documents", "Documents", "List all documents in the workspace"),
        move || {
            let gateway = documents.clone();
            async move { gateway.list_documents().await }
        },
    ))?;

    registry.register_resource(ResourceRoute::new(
        listing(
            "huly://conversations",
            "Conversations",
            "List all conversations in the workspace",
        ),
        move || {
            let gateway = gateway.clone();
            async move { gateway.list_conversations().await }
        },
    ))?;

    Ok(())
}
