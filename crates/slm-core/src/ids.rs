//! Branded ID newtypes.
//!
//! IDs are UUID v7 strings (time-ordered) so that two messages created in the
//! same millisecond still receive distinct ids. An id is never reused once
//! minted, which is what lets the message store address messages by id for
//! in-place updates and deletion.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh id (UUID v7).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Borrow the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

branded_id! {
    /// Unique identifier of a conversation message.
    MessageId
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn new_ids_are_distinct() {
        let ids: HashSet<MessageId> = (0..1000).map(|_| MessageId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = MessageId::from("model-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""model-1""#);
        let back: MessageId = serde_json::from_str(r#""model-1""#).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_matches_inner() {
        let id = MessageId::from("user-42");
        assert_eq!(id.to_string(), "user-42");
        assert_eq!(id.as_str(), "user-42");
    }
}
