use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a message in the conversation store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of one branch (edit or regeneration) of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(String);

impl BranchId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BranchId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    #[serde(default)]
    pub name: Option<String>,
    /// Extracted text for documents; ignored for images.
    #[serde(default)]
    pub content: String,
}

impl Attachment {
    pub fn image<S: Into<String>>(name: S) -> Self {
        Self {
            kind: AttachmentKind::Image,
            name: Some(name.into()),
            content: String::new(),
        }
    }

    pub fn document<S: Into<String>, C: Into<String>>(name: S, content: C) -> Self {
        Self {
            kind: AttachmentKind::Document,
            name: Some(name.into()),
            content: content.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == AttachmentKind::Image
    }
}

/// A reasoning ("thinking") segment attached to a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReasoningSegment {
    Thinking { text: String },
    /// Provider-encrypted reasoning; the payload is opaque.
    Redacted { data: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reasoning: Vec<ReasoningSegment>,
}

impl Branch {
    pub fn new<S: Into<String>>(id: BranchId, role: Role, content: S) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            attachments: Vec::new(),
            reasoning: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_reasoning(mut self, segment: ReasoningSegment) -> Self {
        self.reasoning.push(segment);
        self
    }
}

/// A conversation message with one or more alternate branches.
///
/// Only the branch selected by `active_branch_id` counts toward content and
/// tokens. A message whose pointer does not resolve to any branch is treated
/// as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub branches: Vec<Branch>,
    pub active_branch_id: BranchId,
}

impl Message {
    /// Create a message with a single, active branch
    pub fn new(id: MessageId, branch: Branch) -> Self {
        Self {
            id,
            active_branch_id: branch.id.clone(),
            branches: vec![branch],
        }
    }

    /// Create a single-branch message with generated identifiers
    pub fn with_role<S: Into<String>>(role: Role, content: S) -> Self {
        Self::new(
            MessageId::generate(),
            Branch::new(BranchId::generate(), role, content),
        )
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn tool<S: Into<String>>(content: S) -> Self {
        Self::with_role(Role::Tool, content)
    }

    pub fn active_branch(&self) -> Option<&Branch> {
        self.branches
            .iter()
            .find(|branch| branch.id == self.active_branch_id)
    }

    pub fn active_branch_mut(&mut self) -> Option<&mut Branch> {
        let active = &self.active_branch_id;
        self.branches.iter_mut().find(|branch| &branch.id == active)
    }

    /// Role of the active branch, if it resolves
    pub fn role(&self) -> Option<Role> {
        self.active_branch().map(|branch| branch.role)
    }

    pub fn is_user(&self) -> bool {
        self.role() == Some(Role::User)
    }

    /// Add a branch and make it active, as an edit or regeneration does.
    pub fn push_branch(&mut self, branch: Branch) {
        self.active_branch_id = branch.id.clone();
        self.branches.push(branch);
    }

    /// Point the message at another existing branch.
    ///
    /// Returns false, leaving the pointer untouched, if no branch has that id.
    pub fn switch_branch(&mut self, branch_id: &BranchId) -> bool {
        if self.branches.iter().any(|branch| &branch.id == branch_id) {
            self.active_branch_id = branch_id.clone();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_branch_resolution() {
        let mut message = Message::new(
            MessageId::from("m1"),
            Branch::new(BranchId::from("b1"), Role::User, "first"),
        );
        assert_eq!(message.active_branch().map(|b| b.content.as_str()), Some("first"));

        message.push_branch(Branch::new(BranchId::from("b2"), Role::User, "edited"));
        assert_eq!(message.active_branch_id, BranchId::from("b2"));
        assert_eq!(message.active_branch().map(|b| b.content.as_str()), Some("edited"));

        assert!(message.switch_branch(&BranchId::from("b1")));
        assert_eq!(message.active_branch().map(|b| b.content.as_str()), Some("first"));

        assert!(!message.switch_branch(&BranchId::from("missing")));
        assert_eq!(message.active_branch_id, BranchId::from("b1"));
    }

    #[test]
    fn test_dangling_active_branch() {
        let mut message = Message::user("hello");
        message.active_branch_id = BranchId::from("gone");
        assert!(message.active_branch().is_none());
        assert_eq!(message.role(), None);
        assert!(!message.is_user());
    }

    #[test]
    fn test_message_serde_shape() {
        let message = Message::new(
            MessageId::from("m1"),
            Branch::new(BranchId::from("b1"), Role::Assistant, "hi")
                .with_reasoning(ReasoningSegment::Redacted { data: "xyz".to_string() }),
        );
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["id"], "m1");
        assert_eq!(json["active_branch_id"], "b1");
        assert_eq!(json["branches"][0]["role"], "assistant");
        assert_eq!(json["branches"][0]["reasoning"][0]["type"], "redacted");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }
}
