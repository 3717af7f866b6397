use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A stored early-access signup.
///
/// `email` is always the normalized address (see [`normalize_email`]) and is
/// the unique key of the waitlist. Records are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarlyAccessSignup {
    pub id: Uuid,
    pub email: String,
    pub imvu_name: String,
    pub discord_tag: String,
    pub motivation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The form as submitted by the landing page.
///
/// Nothing here is trusted: it goes through [`SignupRequest::validate`]
/// before it can become an [`EarlyAccessSignup`].
/// Required fields sent as `null` deserialize as empty, so they get the
/// same field message as a missing value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub imvu_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub discord_tag: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub motivation: String,
    #[serde(default)]
    pub social_link: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A request that passed validation, with every field trimmed, the email
/// normalized and blank optional fields dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignup {
    pub email: String,
    pub imvu_name: String,
    pub discord_tag: String,
    pub motivation: String,
    pub social_link: Option<String>,
    pub notes: Option<String>,
}

impl ValidSignup {
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> EarlyAccessSignup {
        EarlyAccessSignup {
            id,
            email: self.email,
            imvu_name: self.imvu_name,
            discord_tag: self.discord_tag,
            motivation: self.motivation,
            social_link: self.social_link,
            notes: self.notes,
            created_at,
        }
    }
}

/// What a submission did.
///
/// Both variants are a success for the submitter. Whether the HTTP layer
/// tells them apart is a server setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created { id: Uuid },
    AlreadyRegistered,
}

impl SubmitOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, SubmitOutcome::AlreadyRegistered)
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            SubmitOutcome::Created { id } => Some(*id),
            SubmitOutcome::AlreadyRegistered => None,
        }
    }
}

/// Canonical form of an address used as the uniqueness key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
