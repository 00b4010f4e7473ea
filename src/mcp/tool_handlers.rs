// ABOUTME: Tool dispatch table mapping MCP tool names to learning API handlers
// ABOUTME: Executes tools with the session's credentials and retries once after a credential refresh
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use learnhub_core::errors::AppResult;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::sampling_peer::SamplingPeer;
use crate::providers::{LearningApi, LearningApiError, Page};

/// Produces a fresh upstream access token after the current one was rejected
pub type RefreshCallback = Arc<dyn Fn() -> BoxFuture<'static, AppResult<String>> + Send + Sync>;

/// Credentials a tool call runs with
#[derive(Clone, Default)]
pub struct AuthContext {
    /// Upstream access token from the session's credential snapshot
    pub access_token: Option<String>,
    refresh: Option<RefreshCallback>,
}

impl AuthContext {
    /// Context carrying `access_token` and an optional refresh callback
    #[must_use]
    pub fn new(access_token: Option<String>, refresh: Option<RefreshCallback>) -> Self {
        Self {
            access_token,
            refresh,
        }
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("refresh", &self.refresh.is_some())
            .finish()
    }
}

/// Tool failure
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool registered under that name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments missing or of the wrong type
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The session holds no upstream credentials
    #[error("No upstream credentials for this session; re-authorize to continue")]
    AuthenticationRequired,

    /// Credentials were rejected and refreshing did not help
    #[error("Upstream authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Learning API failure other than an expired credential
    #[error(transparent)]
    Api(#[from] LearningApiError),

    /// The client could not complete a sampling request
    #[error("Sampling failed: {0}")]
    Sampling(String),
}

/// Everything a handler needs for one attempt
#[derive(Clone)]
pub struct ToolInvocation {
    /// Learning API client
    pub api: Arc<dyn LearningApi>,
    /// Upstream access token for this attempt
    pub access_token: String,
    /// `arguments` object of the `tools/call` request
    pub arguments: Map<String, Value>,
    /// Client sampling channel of the calling session
    pub sampling: Option<Arc<SamplingPeer>>,
}

type ToolFuture = BoxFuture<'static, Result<Value, ToolError>>;
type ToolHandler = fn(ToolInvocation) -> ToolFuture;

/// Tool schema as advertised by `tools/list`
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    /// Tool name
    pub name: &'static str,
    /// What the tool does
    pub description: &'static str,
    /// JSON Schema of the arguments
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

struct RegisteredTool {
    schema: ToolSchema,
    handler: ToolHandler,
}

/// Dispatch table from tool name to schema and handler
pub struct ToolRegistry {
    api: Arc<dyn LearningApi>,
    tools: HashMap<&'static str, RegisteredTool>,
    order: Vec<&'static str>,
}

impl ToolRegistry {
    /// Registry with the course and lesson tools backed by `api`
    #[must_use]
    pub fn learning_tools(api: Arc<dyn LearningApi>) -> Self {
        let mut registry = Self {
            api,
            tools: HashMap::new(),
            order: Vec::new(),
        };

        registry.register(
            "list_courses",
            "List the courses of the authorized user",
            paging_schema(json!({}), &[]),
            list_courses,
        );
        registry.register(
            "get_course",
            "Get one course by id",
            object_schema(json!({ "course_id": string_prop("Course id") }), &["course_id"]),
            get_course,
        );
        registry.register(
            "create_course",
            "Create a course",
            object_schema(
                json!({
                    "title": string_prop("Course title"),
                    "description": string_prop("Course description"),
                    "visibility": { "type": "string", "enum": ["draft", "private", "public"] },
                }),
                &["title"],
            ),
            create_course,
        );
        registry.register(
            "update_course",
            "Update fields of a course",
            object_schema(
                json!({
                    "course_id": string_prop("Course id"),
                    "title": string_prop("New title"),
                    "description": string_prop("New description"),
                    "visibility": { "type": "string", "enum": ["draft", "private", "public"] },
                }),
                &["course_id"],
            ),
            update_course,
        );
        registry.register(
            "delete_course",
            "Delete a course and its lessons",
            object_schema(json!({ "course_id": string_prop("Course id") }), &["course_id"]),
            delete_course,
        );
        registry.register(
            "list_lessons",
            "List the lessons of a course",
            paging_schema(json!({ "course_id": string_prop("Course id") }), &["course_id"]),
            list_lessons,
        );
        registry.register(
            "get_lesson",
            "Get one lesson",
            lesson_key_schema(json!({})),
            get_lesson,
        );
        registry.register(
            "create_lesson",
            "Create a lesson inside a course",
            object_schema(
                json!({
                    "course_id": string_prop("Course id"),
                    "title": string_prop("Lesson title"),
                    "content": string_prop("Lesson body in Markdown"),
                    "position": { "type": "integer", "minimum": 0, "description": "Position in the course" },
                }),
                &["course_id", "title"],
            ),
            create_lesson,
        );
        registry.register(
            "update_lesson",
            "Update fields of a lesson",
            lesson_key_schema(json!({
                "title": string_prop("New title"),
                "content": string_prop("New body in Markdown"),
                "position": { "type": "integer", "minimum": 0, "description": "New position" },
            })),
            update_lesson,
        );
        registry.register(
            "delete_lesson",
            "Delete a lesson",
            lesson_key_schema(json!({})),
            delete_lesson,
        );
        registry.register(
            "suggest_lesson_improvements",
            "Ask the client's model to review a lesson against the lesson structure guidelines",
            lesson_key_schema(json!({
                "max_tokens": { "type": "integer", "minimum": 1, "description": "Response budget" },
            })),
            suggest_lesson_improvements,
        );

        registry
    }

    fn register(
        &mut self,
        name: &'static str,
        description: &'static str,
        input_schema: Value,
        handler: ToolHandler,
    ) {
        self.order.push(name);
        self.tools.insert(
            name,
            RegisteredTool {
                schema: ToolSchema {
                    name,
                    description,
                    input_schema,
                },
                handler,
            },
        );
    }

    /// Schemas in registration order
    #[must_use]
    pub fn schemas(&self) -> Vec<&ToolSchema> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|tool| &tool.schema))
            .collect()
    }

    /// Whether `name` is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Run a tool.
    ///
    /// A credential rejection from the learning API triggers exactly one
    /// refresh through `auth` and one retried attempt with the new token.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::AuthenticationFailed`] when the retried attempt is
    /// rejected too, and the handler's own error otherwise
    pub async fn execute(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        auth: &AuthContext,
        sampling: Option<Arc<SamplingPeer>>,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_owned()))?;
        let access_token = auth
            .access_token
            .clone()
            .ok_or(ToolError::AuthenticationRequired)?;

        let invocation = ToolInvocation {
            api: Arc::clone(&self.api),
            access_token,
            arguments,
            sampling,
        };

        match (tool.handler)(invocation.clone()).await {
            Err(ToolError::Api(LearningApiError::Unauthorized)) => {
                let Some(refresh) = auth.refresh.as_ref() else {
                    return Err(ToolError::AuthenticationFailed(
                        "access token rejected and no refresh is available".into(),
                    ));
                };
                info!(
                    tool = name,
                    "Upstream credentials rejected; refreshing once"
                );
                let access_token = (**refresh)().await.map_err(|e| {
                    warn!(tool = name, "Credential refresh failed: {e}");
                    ToolError::AuthenticationFailed(e.message)
                })?;

                debug!(tool = name, "Retrying tool call with refreshed credentials");
                match (tool.handler)(ToolInvocation {
                    access_token,
                    ..invocation
                })
                .await
                {
                    Err(ToolError::Api(LearningApiError::Unauthorized)) => {
                        Err(ToolError::AuthenticationFailed(
                            "access token rejected again after refresh".into(),
                        ))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }
}

fn string_prop(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn paging_schema(mut properties: Value, required: &[&str]) -> Value {
    if let Some(map) = properties.as_object_mut() {
        map.insert(
            "page".into(),
            json!({ "type": "integer", "minimum": 1, "description": "Page number" }),
        );
        map.insert(
            "per_page".into(),
            json!({ "type": "integer", "minimum": 1, "maximum": 100, "description": "Items per page" }),
        );
    }
    object_schema(properties, required)
}

fn lesson_key_schema(mut properties: Value) -> Value {
    if let Some(map) = properties.as_object_mut() {
        map.insert("course_id".into(), string_prop("Course id"));
        map.insert("lesson_id".into(), string_prop("Lesson id"));
    }
    object_schema(properties, &["course_id", "lesson_id"])
}

fn required_str(arguments: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    match arguments.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(ToolError::InvalidArguments(format!("{key} must be a string"))),
        None => Err(ToolError::InvalidArguments(format!("{key} is required"))),
    }
}

fn optional_u32(arguments: &Map<String, Value>, key: &str) -> Result<Option<u32>, ToolError> {
    arguments.get(key).map_or(Ok(None), |value| {
        value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| ToolError::InvalidArguments(format!("{key} must be a positive integer")))
    })
}

fn page(arguments: &Map<String, Value>) -> Result<Page, ToolError> {
    Ok(Page {
        page: optional_u32(arguments, "page")?,
        per_page: optional_u32(arguments, "per_page")?,
    })
}

/// Arguments minus the addressing keys; rejects an empty change set
fn changes(arguments: &Map<String, Value>, keys: &[&str]) -> Result<Value, ToolError> {
    let fields: Map<String, Value> = arguments
        .iter()
        .filter(|(k, _)| !keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if fields.is_empty() {
        return Err(ToolError::InvalidArguments("no fields to update".into()));
    }
    Ok(Value::Object(fields))
}

fn list_courses(call: ToolInvocation) -> ToolFuture {
    Box::pin(async move {
        let page = page(&call.arguments)?;
        Ok(call.api.list_courses(&call.access_token, page).await?)
    })
}

fn get_course(call: ToolInvocation) -> ToolFuture {
    Box::pin(async move {
        let course_id = required_str(&call.arguments, "course_id")?;
        Ok(call.api.get_course(&call.access_token, &course_id).await?)
    })
}

fn create_course(call: ToolInvocation) -> ToolFuture {
    Box::pin(async move {
        required_str(&call.arguments, "title")?;
        let course = Value::Object(call.arguments.clone());
        Ok(call.api.create_course(&call.access_token, &course).await?)
    })
}

fn update_course(call: ToolInvocation) -> ToolFuture {
    Box::pin(async move {
        let course_id = required_str(&call.arguments, "course_id")?;
        let fields = changes(&call.arguments, &["course_id"])?;
        Ok(call
            .api
            .update_course(&call.access_token, &course_id, &fields)
            .await?)
    })
}

fn delete_course(call: ToolInvocation) -> ToolFuture {
    Box::pin(async move {
        let course_id = required_str(&call.arguments, "course_id")?;
        Ok(call.api.delete_course(&call.access_token, &course_id).await?)
    })
}

fn list_lessons(call: ToolInvocation) -> ToolFuture {
    Box::pin(async move {
        let course_id = required_str(&call.arguments, "course_id")?;
        let page = page(&call.arguments)?;
        Ok(call
            .api
            .list_lessons(&call.access_token, &course_id, page)
            .await?)
    })
}

fn get_lesson(call: ToolInvocation) -> ToolFuture {
    Box::pin(async move {
        let course_id = required_str(&call.arguments, "course_id")?;
        let lesson_id = required_str(&call.arguments, "lesson_id")?;
        Ok(call
            .api
            .get_lesson(&call.access_token, &course_id, &lesson_id)
            .await?)
    })
}

fn create_lesson(call: ToolInvocation) -> ToolFuture {
    Box::pin(async move {
        let course_id = required_str(&call.arguments, "course_id")?;
        required_str(&call.arguments, "title")?;
        let lesson = changes(&call.arguments, &["course_id"])?;
        Ok(call
            .api
            .create_lesson(&call.access_token, &course_id, &lesson)
            .await?)
    })
}

fn update_lesson(call: ToolInvocation) -> ToolFuture {
    Box::pin(async move {
        let course_id = required_str(&call.arguments, "course_id")?;
        let lesson_id = required_str(&call.arguments, "lesson_id")?;
        let fields = changes(&call.arguments, &["course_id", "lesson_id"])?;
        Ok(call
            .api
            .update_lesson(&call.access_token, &course_id, &lesson_id, &fields)
            .await?)
    })
}

fn delete_lesson(call: ToolInvocation) -> ToolFuture {
    Box::pin(async move {
        let course_id = required_str(&call.arguments, "course_id")?;
        let lesson_id = required_str(&call.arguments, "lesson_id")?;
        Ok(call
            .api
            .delete_lesson(&call.access_token, &course_id, &lesson_id)
            .await?)
    })
}

fn suggest_lesson_improvements(call: ToolInvocation) -> ToolFuture {
    Box::pin(async move {
        let course_id = required_str(&call.arguments, "course_id")?;
        let lesson_id = required_str(&call.arguments, "lesson_id")?;
        let max_tokens = optional_u32(&call.arguments, "max_tokens")?.unwrap_or(800);
        let sampling = call.sampling.clone().ok_or_else(|| {
            ToolError::Sampling("client did not declare the sampling capability".into())
        })?;

        let lesson = call
            .api
            .get_lesson(&call.access_token, &course_id, &lesson_id)
            .await?;

        let request = json!({
            "messages": [{
                "role": "user",
                "content": {
                    "type": "text",
                    "text": format!(
                        "Review this lesson against the structure hook, concept, practice, recap \
                         and suggest concrete edits:\n\n{}",
                        serde_json::to_string_pretty(&lesson).unwrap_or_default()
                    ),
                }
            }],
            "systemPrompt": "You are an instructional designer reviewing LearnHub lessons.",
            "maxTokens": max_tokens,
        });

        let result = sampling
            .create_message(request)
            .await
            .map_err(|e| ToolError::Sampling(e.message))?;

        Ok(json!({
            "lesson_id": lesson_id,
            "suggestions": result.get("content").cloned().unwrap_or(Value::Null),
            "model": result.get("model").cloned().unwrap_or(Value::Null),
        }))
    })
}
