//! # parley_core
//!
//! Core domain logic for Parley: the conversation store, completion
//! providers and the chat turn service.

pub mod chat;
pub mod completion;
pub mod conversation;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
