//! Request model consumed and produced by the cache point manager.
//!
//! A request is the provider-neutral view of one LLM call: model name,
//! optional system message, ordered conversation messages and tool
//! definitions. The manager only reads content and token estimates, and only
//! writes cache markers (`cache_control` on messages, the tools-cache flag).

use serde::{Deserialize, Serialize};

use crate::cache::segment::{
    SegmentKind, FIRST_MESSAGE_POSITION, SYSTEM_POSITION, TOOLS_POSITION,
};
use crate::estimator::{EstimateError, TokenEstimator};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of cache marker. Providers currently only know ephemeral caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    #[default]
    Ephemeral,
}

/// A cache marker on a message, serialized the way providers expect
/// `cache_control` (`{"type": "ephemeral"}`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CachePoint {
    #[serde(rename = "type", default)]
    pub kind: CacheKind,

    /// Provider TTL hint such as `"5m"` or `"1h"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

impl CachePoint {
    pub fn ephemeral() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: impl Into<String>) -> Self {
        Self {
            kind: CacheKind::Ephemeral,
            ttl: Some(ttl.into()),
        }
    }
}

/// One prompt message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    #[serde(default)]
    pub content: String,

    #[serde(
        rename = "cache_control",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cache_point: Option<CachePoint>,

    /// Estimated token cost, filled by [`Request::calculate_token_estimates`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_estimate: Option<usize>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            cache_point: None,
            token_estimate: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Builder: pre-set the token estimate.
    pub fn with_tokens(mut self, tokens: usize) -> Self {
        self.token_estimate = Some(tokens);
        self
    }

    /// Builder: mark this message as a user-requested breakpoint.
    pub fn with_cache_point(mut self, point: CachePoint) -> Self {
        self.cache_point = Some(point);
        self
    }

    pub fn cache_point(&self) -> Option<&CachePoint> {
        self.cache_point.as_ref()
    }

    pub fn set_cache_point(&mut self, point: Option<CachePoint>) {
        self.cache_point = point;
    }

    pub fn token_estimate(&self) -> Option<usize> {
        self.token_estimate
    }
}

/// A tool made available to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({ "type": "object" }),
        }
    }
}

/// A prompt about to be sent to a caching-capable provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<Message>,

    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Whether the tools block carries a cache marker.
    #[serde(default)]
    pub tools_cache: bool,

    /// Estimated token cost of the whole tools block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_token_estimate: Option<usize>,
}

impl Request {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages: Vec::new(),
            tools: Vec::new(),
            tools_cache: false,
            tools_token_estimate: None,
        }
    }

    /// Builder: set the system message.
    pub fn with_system(mut self, system: Message) -> Self {
        self.system = Some(system);
        self
    }

    /// Builder: append a conversation message.
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Builder: append a tool definition.
    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    /// Builder: pre-set the tools block token estimate.
    pub fn with_tools_tokens(mut self, tokens: usize) -> Self {
        self.tools_token_estimate = Some(tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system(&self) -> Option<&Message> {
        self.system.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn tools_cache(&self) -> bool {
        self.tools_cache
    }

    pub fn set_tools_cache(&mut self, enabled: bool) {
        self.tools_cache = enabled;
    }

    /// Canonical JSON of the tool list, or the empty string when there are none.
    pub fn tools_json(&self) -> String {
        if self.tools.is_empty() {
            return String::new();
        }
        serde_json::to_string(&self.tools).unwrap_or_default()
    }

    /// Clear every cache marker: tools flag off, no message marked.
    pub fn reset_cache_points(&mut self) {
        self.tools_cache = false;
        if let Some(system) = self.system.as_mut() {
            system.set_cache_point(None);
        }
        for message in &mut self.messages {
            message.set_cache_point(None);
        }
    }

    /// Segment positions the caller marked before the manager ran.
    pub fn requested_cache_points(&self) -> Vec<usize> {
        let mut positions = Vec::new();
        if self.tools_cache {
            positions.push(TOOLS_POSITION);
        }
        if self.system.as_ref().is_some_and(|m| m.cache_point().is_some()) {
            positions.push(SYSTEM_POSITION);
        }
        positions.extend(
            self.messages
                .iter()
                .enumerate()
                .filter(|(_, m)| m.cache_point().is_some())
                .map(|(i, _)| FIRST_MESSAGE_POSITION + i),
        );
        positions
    }

    /// Place (or clear) a marker on the segment at `position`.
    ///
    /// Returns `false` when the position does not exist in this request.
    pub fn set_cache_point_at(&mut self, position: usize, point: Option<CachePoint>) -> bool {
        match SegmentKind::for_position(position) {
            SegmentKind::Tools => {
                self.set_tools_cache(point.is_some());
                true
            }
            SegmentKind::System => match self.system.as_mut() {
                Some(system) => {
                    system.set_cache_point(point);
                    true
                }
                None => false,
            },
            SegmentKind::Message => match self.messages.get_mut(position - FIRST_MESSAGE_POSITION) {
                Some(message) => {
                    message.set_cache_point(point);
                    true
                }
                None => false,
            },
        }
    }

    /// Whether every segment already carries a token estimate.
    pub fn has_token_estimates(&self) -> bool {
        self.tools_token_estimate.is_some()
            && self.system.as_ref().map_or(true, |m| m.token_estimate.is_some())
            && self.messages.iter().all(|m| m.token_estimate.is_some())
    }

    /// Fill in missing token estimates, one estimator call per segment.
    pub fn calculate_token_estimates(
        &mut self,
        estimator: &dyn TokenEstimator,
    ) -> Result<(), EstimateError> {
        if self.tools_token_estimate.is_none() {
            let tokens = if self.tools.is_empty() {
                0
            } else {
                estimator.estimate(&self.tools_json())?
            };
            self.tools_token_estimate = Some(tokens);
        }

        let system = self.system.iter_mut();
        for message in system.chain(self.messages.iter_mut()) {
            if message.token_estimate.is_none() {
                message.token_estimate = Some(estimator.estimate(&message.content)?);
            }
        }

        Ok(())
    }
}
