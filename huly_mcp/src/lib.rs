//! Huly.io workspace adapter for the Model Context Protocol.
//!
//! Exposes tasks, projects, documents and conversations as resources, four
//! mutating tools and four planning prompts, all served by the generic
//! [`mcp_server::Dispatcher`].
use std::sync::Arc;

use mcp_core::protocol::Implementation;
use mcp_server::{CapabilityClass, Dispatcher, Registry, RegistryError};

pub mod client;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod prompts;
pub mod resources;
pub mod tools;

pub use client::HulyClient;
pub use config::Config;
pub use gateway::{GatewayError, WorkspaceGateway};

const INSTRUCTIONS: &str = "Read Huly workspace data through the huly:// resources, \
create and update tasks, documents and messages with the tools, and use the prompts \
to plan tasks, sprints, status reports and meetings.";

/// Register every Huly capability against `gateway`.
pub fn build_registry(gateway: Arc<dyn WorkspaceGateway>) -> Result<Registry, RegistryError> {
    let mut registry = Registry::new();
    resources::register(&mut registry, gateway.clone())?;
    tools::register(&mut registry, gateway)?;
    prompts::register(&mut registry)?;

    tracing::info!(
        resources = registry.len(CapabilityClass::Resource),
        tools = registry.len(CapabilityClass::Tool),
        prompts = registry.len(CapabilityClass::Prompt),
        "capabilities registered"
    );
    Ok(registry)
}

pub fn build_dispatcher(
    config: &Config,
    gateway: Arc<dyn WorkspaceGateway>,
) -> Result<Dispatcher, RegistryError> {
    let server = &config.mcp.server;
    let info = Implementation {
        name: server.name.clone(),
        version: server.version.clone(),
    };
    Ok(Dispatcher::new(info, build_registry(gateway)?).with_instructions(INSTRUCTIONS))
}
