use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh id. v7 uuids keep ids roughly insertion-ordered.
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            /// Wrap a value read back from storage.
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

branded_id!(AccountId, "acct");
branded_id!(ProjectId, "proj");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_has_prefix() {
        let id = AccountId::new();
        assert!(id.as_str().starts_with("acct_"), "got: {id}");
    }

    #[test]
    fn project_id_has_prefix() {
        let id = ProjectId::new();
        assert!(id.as_str().starts_with("proj_"), "got: {id}");
    }

    #[test]
    fn ids_are_unique() {
        let a = AccountId::new();
        let b = AccountId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn from_raw_preserves_value() {
        let id = AccountId::from_raw("acct_custom-123");
        assert_eq!(id.as_str(), "acct_custom-123");
        assert_eq!(id.into_string(), "acct_custom-123");
    }

    #[test]
    fn serde_is_transparent() {
        let id = AccountId::from_raw("acct_abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""acct_abc""#);
        let parsed: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn monotonic_ordering() {
        let ids: Vec<ProjectId> = (0..50).map(|_| ProjectId::new()).collect();
        for w in ids.windows(2) {
            assert!(w[0].as_str() < w[1].as_str(), "not monotonic: {} >= {}", w[0], w[1]);
        }
    }
}
