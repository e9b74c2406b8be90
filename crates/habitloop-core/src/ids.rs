//! Canonical identifier types.
//!
//! Every record reference goes through one of these newtypes so equality and
//! hashing are defined once, on trimmed strings, instead of by ad hoc
//! coercion at each comparison site.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl AsRef<str>) -> Self {
                Self(raw.as_ref().trim().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self::new(raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Identifies a platform user.
    UserId
);
define_id!(
    /// Identifies a personal habit or a workspace habit template.
    HabitId
);
define_id!(
    /// Identifies a challenge document.
    ChallengeId
);
define_id!(
    /// Identifies a workspace.
    WorkspaceId
);

impl ChallengeId {
    /// Fresh random identifier for a newly created challenge.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_compare_after_trimming() {
        assert_eq!(HabitId::new(" h1 "), HabitId::from("h1"));

        let mut set = HashSet::new();
        set.insert(HabitId::new("h1"));
        assert!(set.contains(&HabitId::new("h1\n")));
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = UserId::new("u-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"u-42\"");

        let back: UserId = serde_json::from_str("\" u-42\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_generated_challenge_ids_are_unique() {
        assert_ne!(ChallengeId::generate(), ChallengeId::generate());
    }
}
