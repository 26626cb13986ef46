//! The capability catalog.
//!
//! Tools, resources and prompts are registered once at startup, before the
//! server reads its first request. The registry is then frozen behind an `Arc`
//! and only read; there is no deregistration.
use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    fmt,
    future::Future,
    sync::Arc,
};

use futures::{FutureExt, future::BoxFuture};
use mcp_core::{
    JsonObject, Prompt, PromptArgument, PromptMessage, PromptMessageRole, Resource, Tool,
    protocol::GetPromptResult,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    errors::{BoxError, RegistryError, RouterError},
    schema::{Arguments, CompiledShape, ObjectShape},
    template::{TemplateError, TemplateRenderer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityClass {
    Resource,
    Tool,
    Prompt,
}

impl CapabilityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityClass::Resource => "resource",
            CapabilityClass::Tool => "tool",
            CapabilityClass::Prompt => "prompt",
        }
    }
}

impl fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type DynToolHandler =
    dyn Fn(Arguments) -> BoxFuture<'static, Result<Value, RouterError>> + Send + Sync;

pub type DynResourceHandler =
    dyn Fn() -> BoxFuture<'static, Result<Value, RouterError>> + Send + Sync;

/// Where the entity named in a tool's confirmation text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectSource {
    /// A string field of the handler's result.
    ResultField(Cow<'static, str>),
    /// A string argument of the call.
    Argument(Cow<'static, str>),
    /// A fixed placeholder.
    Text(Cow<'static, str>),
}

/// The human-readable text returned by a successful tool call.
///
/// Sources are tried in order; the first one that yields a string is used as
/// `{{ subject }}` in the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    template: Cow<'static, str>,
    sources: Vec<SubjectSource>,
}

impl Confirmation {
    pub fn new(template: impl Into<Cow<'static, str>>) -> Self {
        Self {
            template: template.into(),
            sources: Vec::new(),
        }
    }

    pub fn subject_from_result(mut self, field: impl Into<Cow<'static, str>>) -> Self {
        self.sources.push(SubjectSource::ResultField(field.into()));
        self
    }

    pub fn subject_from_argument(mut self, field: impl Into<Cow<'static, str>>) -> Self {
        self.sources.push(SubjectSource::Argument(field.into()));
        self
    }

    pub fn or_text(mut self, text: impl Into<Cow<'static, str>>) -> Self {
        self.sources.push(SubjectSource::Text(text.into()));
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Find the first source that yields a non-empty string, with its position
    /// in the source list.
    pub fn pick<'a>(&'a self, output: &'a Value, arguments: &'a Arguments) -> Option<(usize, &'a str)> {
        self.sources.iter().enumerate().find_map(|(position, source)| {
            let found = match source {
                SubjectSource::ResultField(field) => output.get(field.as_ref()).and_then(Value::as_str),
                SubjectSource::Argument(field) => arguments.get_str(field),
                SubjectSource::Text(text) => Some(text.as_ref()),
            };
            found.filter(|s| !s.is_empty()).map(|s| (position, s))
        })
    }

    /// Pick the subject for this call. Falling back past the first source is
    /// logged, since it means the backend answered without the expected field.
    pub fn subject(&self, tool: &str, output: &Value, arguments: &Arguments) -> String {
        match self.pick(output, arguments) {
            Some((0, subject)) => subject.to_string(),
            Some((position, subject)) => {
                tracing::warn!(
                    tool,
                    source = ?self.sources[0],
                    fallback = ?self.sources[position],
                    "confirmation subject missing, using fallback"
                );
                subject.to_string()
            }
            None => {
                tracing::warn!(tool, "no confirmation subject available");
                String::new()
            }
        }
    }
}

pub struct ToolRoute {
    pub attr: Tool,
    pub shape: CompiledShape,
    pub confirmation: Confirmation,
    call: Arc<DynToolHandler>,
}

impl fmt::Debug for ToolRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRoute")
            .field("name", &self.attr.name)
            .field("description", &self.attr.description)
            .field("shape", &self.shape)
            .finish()
    }
}

impl Clone for ToolRoute {
    fn clone(&self) -> Self {
        Self {
            attr: self.attr.clone(),
            shape: self.shape.clone(),
            confirmation: self.confirmation.clone(),
            call: self.call.clone(),
        }
    }
}

impl ToolRoute {
    /// Pair a tool descriptor with a typed handler.
    ///
    /// The handler receives the validated arguments deserialized into `T`; its
    /// output is serialized back to JSON for the confirmation text. Fails when
    /// the shape's schema does not compile.
    pub fn new<N, D, F, Fut, T, R, E>(
        name: N,
        description: D,
        shape: ObjectShape,
        confirmation: Confirmation,
        handler: F,
    ) -> Result<Self, RegistryError>
    where
        N: Into<Cow<'static, str>>,
        D: Into<Cow<'static, str>>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        T: DeserializeOwned + 'static,
        R: Serialize + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let attr = Tool::new(name, description, shape.to_json_schema());
        let shape = shape.compile().map_err(|e| RegistryError::InvalidSchema {
            name: attr.name.to_string(),
            reason: e.to_string(),
        })?;
        let tool_name = attr.name.clone();
        let call = Arc::new(move |arguments: Arguments| {
            let request = match arguments.into_typed::<T>() {
                Ok(request) => request,
                Err(e) => {
                    let message = format!("arguments of {tool_name} do not match its handler: {e}");
                    return futures::future::ready(Err(RouterError::Internal(message))).boxed();
                }
            };
            let pending = handler(request);
            async move {
                let output = pending.await.map_err(RouterError::handler)?;
                serde_json::to_value(output).map_err(|e| RouterError::Internal(e.to_string()))
            }
            .boxed()
        });
        Ok(Self {
            attr,
            shape,
            confirmation,
            call,
        })
    }

    pub fn name(&self) -> &str {
        &self.attr.name
    }

    pub fn invoke(&self, arguments: Arguments) -> BoxFuture<'static, Result<Value, RouterError>> {
        (self.call)(arguments)
    }
}

#[derive(Clone)]
pub struct ResourceRoute {
    pub attr: Resource,
    read: Arc<DynResourceHandler>,
}

impl fmt::Debug for ResourceRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRoute")
            .field("uri", &self.attr.uri)
            .field("name", &self.attr.name)
            .finish()
    }
}

impl ResourceRoute {
    /// Serve every URI starting with `attr.uri` from a zero-argument fetch.
    pub fn new<F, Fut, R, E>(attr: Resource, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Serialize + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let read = Arc::new(move || {
            let pending = handler();
            async move {
                let output = pending.await.map_err(RouterError::handler)?;
                serde_json::to_value(output).map_err(|e| RouterError::Internal(e.to_string()))
            }
            .boxed()
        });
        Self { attr, read }
    }

    pub fn prefix(&self) -> &str {
        &self.attr.uri
    }

    pub fn read(&self) -> BoxFuture<'static, Result<Value, RouterError>> {
        (self.read)()
    }
}

/// A declared prompt argument with the value used when the caller omits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptParam {
    name: Cow<'static, str>,
    description: Option<Cow<'static, str>>,
    required: bool,
    default: Cow<'static, str>,
}

impl PromptParam {
    pub fn new(name: impl Into<Cow<'static, str>>, default: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            description: None,
            required: false,
            default: default.into(),
        }
    }

    /// Advertise the argument as required. Omitting it still falls back to the default.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn resolve(&self, raw: Option<&JsonObject>) -> String {
        match raw.and_then(|raw| raw.get(self.name.as_ref())) {
            None | Some(Value::Null) => self.default.to_string(),
            Some(Value::String(s)) if s.is_empty() => self.default.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptRoute {
    name: Cow<'static, str>,
    summary: Cow<'static, str>,
    params: Vec<PromptParam>,
    description: Cow<'static, str>,
    messages: Vec<(PromptMessageRole, Cow<'static, str>)>,
}

impl PromptRoute {
    /// `summary` is what `prompts/list` shows; the rendered description is set
    /// with [`PromptRoute::description`].
    pub fn new(name: impl Into<Cow<'static, str>>, summary: impl Into<Cow<'static, str>>) -> Self {
        let summary = summary.into();
        Self {
            name: name.into(),
            description: summary.clone(),
            summary,
            params: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn argument(mut self, param: PromptParam) -> Self {
        self.params.push(param);
        self
    }

    pub fn description(mut self, template: impl Into<Cow<'static, str>>) -> Self {
        self.description = template.into();
        self
    }

    pub fn message(mut self, role: PromptMessageRole, template: impl Into<Cow<'static, str>>) -> Self {
        self.messages.push((role, template.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self) -> Prompt {
        let arguments = self
            .params
            .iter()
            .map(|param| PromptArgument {
                name: param.name.to_string(),
                description: param.description.as_ref().map(|d| d.to_string()),
                required: Some(param.required),
            })
            .collect();
        Prompt::new(self.name.as_ref(), Some(self.summary.as_ref()), Some(arguments))
    }

    /// Values for every declared argument, defaults filled in. Undeclared
    /// arguments are ignored.
    pub fn resolve_arguments(&self, raw: Option<&JsonObject>) -> BTreeMap<String, String> {
        self.params
            .iter()
            .map(|param| (param.name.to_string(), param.resolve(raw)))
            .collect()
    }

    pub fn render(
        &self,
        renderer: &TemplateRenderer,
        raw: Option<&JsonObject>,
    ) -> Result<GetPromptResult, TemplateError> {
        let values = self.resolve_arguments(raw);
        let description = renderer.render(&self.description, &values)?;
        let messages = self
            .messages
            .iter()
            .map(|(role, template)| {
                renderer
                    .render(template, &values)
                    .map(|text| PromptMessage::new_text(*role, text))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GetPromptResult {
            description: Some(description),
            messages,
        })
    }
}

/// Insertion-ordered map from name to entry.
#[derive(Debug)]
struct Catalog<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Catalog<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Catalog<T> {
    fn insert(&mut self, class: CapabilityClass, key: &str, entry: T) -> Result<(), RegistryError> {
        if self.index.contains_key(key) {
            return Err(RegistryError::DuplicateName {
                class,
                name: key.to_string(),
            });
        }
        self.index.insert(key.to_string(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&i| &self.entries[i])
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    tools: Catalog<ToolRoute>,
    resources: Catalog<ResourceRoute>,
    prompts: Catalog<PromptRoute>,
    renderer: TemplateRenderer,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_tool(&mut self, route: ToolRoute) -> Result<(), RegistryError> {
        let sample = BTreeMap::from([("subject".to_string(), String::new())]);
        self.renderer
            .check(route.confirmation.template(), &sample)
            .map_err(|e| RegistryError::InvalidTemplate {
                name: route.name().to_string(),
                reason: e.to_string(),
            })?;
        let name = route.name().to_string();
        self.tools.insert(CapabilityClass::Tool, &name, route)?;
        tracing::debug!(name, "registered tool");
        Ok(())
    }

    pub fn register_resource(&mut self, route: ResourceRoute) -> Result<(), RegistryError> {
        let uri = route.prefix().to_string();
        self.resources.insert(CapabilityClass::Resource, &uri, route)?;
        tracing::debug!(uri, "registered resource");
        Ok(())
    }

    pub fn register_prompt(&mut self, route: PromptRoute) -> Result<(), RegistryError> {
        route
            .render(&self.renderer, None)
            .map_err(|e| RegistryError::InvalidTemplate {
                name: route.name().to_string(),
                reason: e.to_string(),
            })?;
        let name = route.name().to_string();
        self.prompts.insert(CapabilityClass::Prompt, &name, route)?;
        tracing::debug!(name, "registered prompt");
        Ok(())
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.entries.iter().map(|r| r.attr.clone()).collect()
    }

    pub fn list_resources(&self) -> Vec<Resource> {
        self.resources.entries.iter().map(|r| r.attr.clone()).collect()
    }

    pub fn list_prompts(&self) -> Vec<Prompt> {
        self.prompts.entries.iter().map(PromptRoute::attr).collect()
    }

    pub fn len(&self, class: CapabilityClass) -> usize {
        match class {
            CapabilityClass::Tool => self.tools.entries.len(),
            CapabilityClass::Resource => self.resources.entries.len(),
            CapabilityClass::Prompt => self.prompts.entries.len(),
        }
    }

    pub fn resolve_tool(&self, name: &str) -> Option<&ToolRoute> {
        self.tools.get(name)
    }

    pub fn resolve_prompt(&self, name: &str) -> Option<&PromptRoute> {
        self.prompts.get(name)
    }

    /// Longest registered prefix of `uri`.
    pub fn resolve_resource(&self, uri: &str) -> Option<&ResourceRoute> {
        self.resources
            .entries
            .iter()
            .filter(|route| uri.starts_with(route.prefix()))
            .max_by_key(|route| route.prefix().len())
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }
}
