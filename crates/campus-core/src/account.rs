use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::ids::AccountId;

/// Reference to an external scheduling entity linked to a profile.
/// `label` is what the client renders; `kind` selects the schedule source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleProfile {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
}

/// Caller-facing account projection. Credential material never appears here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: AccountId,
    pub full_name: String,
    pub email: String,
    pub university_id: String,
    pub university_title: String,
    pub course: String,
    pub group_label: String,
    pub schedule_profile: Option<ScheduleProfile>,
    pub created_at: String,
    pub updated_at: String,
}

/// Plaintext password in transit (redacted in Debug, zeroized on drop).
#[derive(Clone)]
pub struct Password(SecretString);

impl Password {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(SecretString::from(raw.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

impl From<&str> for Password {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Password {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

/// Registration payload accepted by the accounts repository. Field
/// normalization (trimming, email casing) happens in the repository.
#[derive(Clone, Debug)]
pub struct AccountDraft {
    pub full_name: String,
    pub email: String,
    pub course: String,
    pub group_label: String,
    pub university_id: String,
    pub university_title: String,
    pub schedule_profile: Option<ScheduleProfile>,
    pub password: Password,
}
