//! Token estimation for conversation messages.
//!
//! Exact tokenization varies by provider, so the default estimator counts
//! characters. Planning only needs a consistent estimate: the same message
//! must always cost the same, or breakpoints over a stable prefix would move.

use crate::models::{Message, ReasoningSegment};

/// Characters per token for the default heuristic
pub const CHARS_PER_TOKEN: usize = 4;

/// Tag overhead added to every visible reasoning segment
pub const REASONING_TAG_OVERHEAD: usize = 10;

/// Flat cost of a redacted reasoning segment
pub const REDACTED_REASONING_TOKENS: usize = 15;

/// Flat cost of an image attachment
pub const IMAGE_ATTACHMENT_TOKENS: usize = 1500;

/// Estimates the token cost of a message.
///
/// Implementations must be pure and total: every message gets a cost, and a
/// message whose active branch does not resolve costs nothing.
pub trait TokenEstimator: Send + Sync {
    /// Estimate tokens for a single message
    fn estimate(&self, message: &Message) -> usize;

    /// Estimate tokens for a list of messages
    fn total_tokens(&self, messages: &[Message]) -> usize {
        messages.iter().map(|message| self.estimate(message)).sum()
    }
}

/// Length-based token estimator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterEstimator {
    chars_per_token: usize,
    reasoning_overhead: usize,
    redacted_reasoning_tokens: usize,
    image_tokens: usize,
}

impl Default for CharacterEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl CharacterEstimator {
    pub fn new() -> Self {
        Self {
            chars_per_token: CHARS_PER_TOKEN,
            reasoning_overhead: REASONING_TAG_OVERHEAD,
            redacted_reasoning_tokens: REDACTED_REASONING_TOKENS,
            image_tokens: IMAGE_ATTACHMENT_TOKENS,
        }
    }

    /// Use a different characters-per-token ratio. Zero is treated as one.
    pub fn with_chars_per_token(mut self, chars_per_token: usize) -> Self {
        self.chars_per_token = chars_per_token.max(1);
        self
    }

    /// Estimate tokens for a string
    pub fn estimate_text(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }

    fn estimate_reasoning(&self, segment: &ReasoningSegment) -> usize {
        match segment {
            ReasoningSegment::Thinking { text } => self.estimate_text(text) + self.reasoning_overhead,
            ReasoningSegment::Redacted { .. } => self.redacted_reasoning_tokens,
        }
    }
}

impl TokenEstimator for CharacterEstimator {
    fn estimate(&self, message: &Message) -> usize {
        let Some(branch) = message.active_branch() else {
            return 0;
        };

        let content_tokens = self.estimate_text(&branch.content);

        let reasoning_tokens: usize = branch
            .reasoning
            .iter()
            .map(|segment| self.estimate_reasoning(segment))
            .sum();

        let attachment_tokens: usize = branch
            .attachments
            .iter()
            .map(|attachment| {
                if attachment.is_image() {
                    self.image_tokens
                } else {
                    self.estimate_text(&attachment.content)
                }
            })
            .sum();

        content_tokens + reasoning_tokens + attachment_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attachment, Branch, BranchId, MessageId, Role};

    fn message_with(branch: Branch) -> Message {
        Message::new(MessageId::from("m"), branch)
    }

    #[test]
    fn test_text_rounds_up() {
        let estimator = CharacterEstimator::new();
        assert_eq!(estimator.estimate(&Message::user("")), 0);
        assert_eq!(estimator.estimate(&Message::user("abcd")), 1);
        assert_eq!(estimator.estimate(&Message::user("abcde")), 2);
        assert_eq!(estimator.estimate(&Message::user("x".repeat(4000))), 1000);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let estimator = CharacterEstimator::new();
        // four characters, twelve bytes
        assert_eq!(estimator.estimate(&Message::user("日本語だ")), 1);
    }

    #[test]
    fn test_reasoning_segments() {
        let estimator = CharacterEstimator::new();
        let branch = Branch::new(BranchId::from("b"), Role::Assistant, "abcd")
            .with_reasoning(ReasoningSegment::Thinking { text: "x".repeat(9) })
            .with_reasoning(ReasoningSegment::Redacted { data: "opaque".repeat(100) });
        // 1 (content) + 3 + 10 (thinking) + 15 (redacted)
        assert_eq!(estimator.estimate(&message_with(branch)), 29);
    }

    #[test]
    fn test_attachments() {
        let estimator = CharacterEstimator::new();
        let branch = Branch::new(BranchId::from("b"), Role::User, "")
            .with_attachment(Attachment::image("cat.png"))
            .with_attachment(Attachment::document("notes.txt", "y".repeat(40)));
        assert_eq!(estimator.estimate(&message_with(branch)), 1500 + 10);
    }

    #[test]
    fn test_unresolved_branch_costs_nothing() {
        let estimator = CharacterEstimator::new();
        let mut message = Message::user("x".repeat(400));
        message.active_branch_id = BranchId::from("missing");
        assert_eq!(estimator.estimate(&message), 0);
    }

    #[test]
    fn test_only_active_branch_counts() {
        let estimator = CharacterEstimator::new();
        let mut message = Message::user("x".repeat(400));
        message.push_branch(Branch::new(BranchId::from("short"), Role::User, "abcd"));
        assert_eq!(estimator.estimate(&message), 1);
    }

    #[test]
    fn test_total_tokens() {
        let estimator = CharacterEstimator::new();
        let messages = vec![Message::user("abcd"), Message::assistant("abcdefgh")];
        assert_eq!(estimator.total_tokens(&messages), 3);
        assert_eq!(estimator.total_tokens(&[]), 0);
    }

    #[test]
    fn test_custom_ratio() {
        let estimator = CharacterEstimator::new().with_chars_per_token(2);
        assert_eq!(estimator.estimate_text("abcde"), 3);
        let degenerate = CharacterEstimator::new().with_chars_per_token(0);
        assert_eq!(degenerate.estimate_text("abc"), 3);
    }
}
