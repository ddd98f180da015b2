//! Conversation data model.
//!
//! Messages as supplied by the conversation store: each message carries a set
//! of alternate branches and a pointer to the active one.

mod types;

pub use types::{
    Attachment, AttachmentKind, Branch, BranchId, Message, MessageId, ReasoningSegment, Role,
};
