//! Wire-level data model shared by the dispatch core and the Huly adapter.
//!
//! Everything in this crate is plain data: JSON-RPC envelopes, error payloads
//! and the descriptors of the three capability classes (tools, resources and
//! prompts). Nothing here performs I/O.

pub mod content;
pub mod prompt;
pub mod protocol;
pub mod resource;
pub mod tool;

pub use content::{Content, TextContent};
pub use prompt::{Prompt, PromptArgument, PromptMessage, PromptMessageContent, PromptMessageRole};
pub use protocol::{ErrorData, RequestId};
pub use resource::{Resource, ResourceContents};
pub use tool::Tool;

/// A JSON object, the shape of every argument bag and schema on the wire.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Build a [`JsonObject`] from a value, yielding an empty object for anything else.
pub fn object(value: serde_json::Value) -> JsonObject {
    match value {
        serde_json::Value::Object(object) => object,
        _ => JsonObject::default(),
    }
}
