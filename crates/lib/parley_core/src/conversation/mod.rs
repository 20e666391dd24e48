// @zen-component: CONV-ConversationModel
//
//! Conversation continuity: identifiers, continuation tokens and the store
//! that links them.

pub mod store;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use store::{ConversationStore, ConversationTurn, StoreConfig};

/// Length of the hyphenated textual form of a UUID.
const HYPHENATED_UUID_LEN: usize = 36;

/// Client-issued identifier for one logical conversation thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

/// Errors from parsing a [`ConversationId`].
#[derive(Debug, Error)]
pub enum ConversationIdError {
    #[error("expected a hyphenated UUID")]
    NotHyphenated,

    #[error(transparent)]
    Invalid(#[from] uuid::Error),
}

/// Only the hyphenated form (`xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`) is accepted.
impl FromStr for ConversationId {
    type Err = ConversationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Uuid::try_parse(s)?;
        if s.len() != HYPHENATED_UUID_LEN {
            return Err(ConversationIdError::NotHyphenated);
        }
        Ok(Self(id))
    }
}

impl From<Uuid> for ConversationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Opaque provider-issued token that resumes a conversation from its last turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContinuationToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl From<String> for ContinuationToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hyphenated_uuid() {
        let id: ConversationId = "11111111-1111-1111-1111-111111111111".parse().unwrap();
        assert_eq!(id.to_string(), "11111111-1111-1111-1111-111111111111");
    }

    #[test]
    fn display_is_lowercase_hyphenated() {
        let id: ConversationId = "ABCDEF01-2345-6789-ABCD-EF0123456789".parse().unwrap();
        assert_eq!(id.to_string(), "abcdef01-2345-6789-abcd-ef0123456789");
    }

    #[test]
    fn rejects_simple_and_braced_forms() {
        assert!("11111111111111111111111111111111".parse::<ConversationId>().is_err());
        assert!("{11111111-1111-1111-1111-111111111111}".parse::<ConversationId>().is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!("not-a-uuid".parse::<ConversationId>().is_err());
        assert!("".parse::<ConversationId>().is_err());
        assert!("1111111g-1111-1111-1111-111111111111".parse::<ConversationId>().is_err());
    }
}
