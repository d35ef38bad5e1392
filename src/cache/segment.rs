//! Prompt segments and the segment model.
//!
//! A segment is one addressable, hashable, token-costed piece of the prompt.
//! Segments are the unit of breakpoint placement: a breakpoint at position
//! `p` asks the provider to cache the prompt prefix up to and including `p`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::request::{Message, Request};

/// Position of the tools block.
pub const TOOLS_POSITION: usize = 0;

/// Position of the system message, when there is one.
pub const SYSTEM_POSITION: usize = 1;

/// Position of the first conversation message.
pub const FIRST_MESSAGE_POSITION: usize = 2;

/// Identifies which part of the prompt a segment covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    Tools,
    System,
    Message,
}

impl SegmentKind {
    pub fn for_position(position: usize) -> SegmentKind {
        match position {
            TOOLS_POSITION => SegmentKind::Tools,
            SYSTEM_POSITION => SegmentKind::System,
            _ => SegmentKind::Message,
        }
    }
}

/// Hex SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// A single prompt segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Absolute position in the prompt.
    pub position: usize,

    /// Content hash. Records written without one deserialize to "" and never
    /// match a live segment.
    #[serde(default)]
    pub content_hash: String,

    /// Estimated token cost.
    #[serde(default)]
    pub token_estimate: usize,
}

impl Segment {
    pub fn new(position: usize, content_hash: impl Into<String>, token_estimate: usize) -> Self {
        Self {
            position,
            content_hash: content_hash.into(),
            token_estimate,
        }
    }

    fn from_message(position: usize, message: &Message) -> Self {
        let hash = content_hash(&format!("{}:{}", message.role, message.content));
        Self::new(position, hash, message.token_estimate.unwrap_or(0))
    }
}

/// The ordered segments of one request.
///
/// Position 1 may be absent; conversation messages always start at
/// [`FIRST_MESSAGE_POSITION`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentModel {
    pub tools: Segment,
    pub system: Option<Segment>,
    pub messages: Vec<Segment>,
}

impl SegmentModel {
    /// Build the model from a request whose estimates have been computed.
    /// Missing estimates count as zero tokens.
    pub fn from_request(request: &Request) -> Self {
        let tools = Segment::new(
            TOOLS_POSITION,
            content_hash(&request.tools_json()),
            request.tools_token_estimate.unwrap_or(0),
        );
        let system = request
            .system()
            .map(|m| Segment::from_message(SYSTEM_POSITION, m));
        let messages = request
            .messages()
            .iter()
            .enumerate()
            .map(|(i, m)| Segment::from_message(FIRST_MESSAGE_POSITION + i, m))
            .collect();

        Self {
            tools,
            system,
            messages,
        }
    }

    /// Segment at an absolute position.
    pub fn get(&self, position: usize) -> Option<&Segment> {
        match position {
            TOOLS_POSITION => Some(&self.tools),
            SYSTEM_POSITION => self.system.as_ref(),
            _ => self.messages.get(position - FIRST_MESSAGE_POSITION),
        }
    }

    /// All segments in position order.
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        std::iter::once(&self.tools)
            .chain(self.system.iter())
            .chain(self.messages.iter())
    }

    /// Number of segments present.
    pub fn len(&self) -> usize {
        1 + usize::from(self.system.is_some()) + self.messages.len()
    }

    /// Always false: the tools segment exists even with no tools.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn tools_tokens(&self) -> usize {
        self.tools.token_estimate
    }

    pub fn system_tokens(&self) -> usize {
        self.system.as_ref().map_or(0, |s| s.token_estimate)
    }

    pub fn total_tokens(&self) -> usize {
        self.iter().map(|s| s.token_estimate).sum()
    }

    /// Position of the last conversation message, if any.
    pub fn last_message_position(&self) -> Option<usize> {
        self.messages.last().map(|s| s.position)
    }

    /// Conversation fingerprint: model plus the two fixed-slot hashes.
    ///
    /// Ordinary messages are ignored, so unrelated conversations sharing
    /// tools, system prompt and model share one record.
    pub fn fingerprint(&self, model: &str) -> String {
        let system_hash = match &self.system {
            Some(system) => system.content_hash.clone(),
            None => content_hash(""),
        };
        content_hash(&format!("{model}{}{system_hash}", self.tools.content_hash))
    }

    /// Owned copy of every segment, for persisting.
    pub fn to_segments(&self) -> Vec<Segment> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ToolDefinition;

    #[test]
    fn test_fixed_positions() {
        assert_eq!(SegmentKind::for_position(0), SegmentKind::Tools);
        assert_eq!(SegmentKind::for_position(1), SegmentKind::System);
        assert_eq!(SegmentKind::for_position(7), SegmentKind::Message);
    }

    #[test]
    fn test_empty_request_model() {
        let model = SegmentModel::from_request(&Request::new("m"));
        assert_eq!(model.len(), 1);
        assert_eq!(model.tools.token_estimate, 0);
        assert_eq!(model.tools.content_hash, content_hash(""));
        assert!(model.system.is_none());
        assert_eq!(model.last_message_position(), None);
    }

    #[test]
    fn test_messages_start_at_two_without_system() {
        let request = Request::new("m")
            .with_message(Message::user("a").with_tokens(5))
            .with_message(Message::assistant("b").with_tokens(7));
        let model = SegmentModel::from_request(&request);

        assert!(model.get(SYSTEM_POSITION).is_none());
        assert_eq!(model.get(2).unwrap().token_estimate, 5);
        assert_eq!(model.get(3).unwrap().token_estimate, 7);
        assert!(model.get(4).is_none());
        let positions: Vec<usize> = model.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 2, 3]);
    }

    #[test]
    fn test_hash_depends_on_role() {
        let a = SegmentModel::from_request(&Request::new("m").with_message(Message::user("x")));
        let b =
            SegmentModel::from_request(&Request::new("m").with_message(Message::assistant("x")));
        assert_ne!(a.messages[0].content_hash, b.messages[0].content_hash);
    }

    #[test]
    fn test_fingerprint_ignores_messages() {
        let base = Request::new("m")
            .with_tool(ToolDefinition::new("search", "web search"))
            .with_system(Message::system("rules"));
        let longer = base.clone().with_message(Message::user("q"));

        let fp1 = SegmentModel::from_request(&base).fingerprint("m");
        let fp2 = SegmentModel::from_request(&longer).fingerprint("m");
        let fp3 = SegmentModel::from_request(&base).fingerprint("other-model");

        assert_eq!(fp1, fp2);
        assert_ne!(fp1, fp3);
    }

    #[test]
    fn test_deterministic_build() {
        let request = Request::new("m")
            .with_tool(ToolDefinition::new("t", "d"))
            .with_message(Message::user("hello").with_tokens(3));
        assert_eq!(
            SegmentModel::from_request(&request),
            SegmentModel::from_request(&request)
        );
    }

    #[test]
    fn test_segment_without_hash_deserializes_empty() {
        let seg: Segment = serde_json::from_str(r#"{"position": 3, "token_estimate": 10}"#).unwrap();
        assert_eq!(seg.content_hash, "");
    }
}
