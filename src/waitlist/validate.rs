//! Field validation for signups.
//!
//! The landing page runs the same checks in the browser (this module builds
//! for `wasm32`) before posting, and the server runs them again.

use std::{collections::BTreeMap, fmt, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::waitlist::model::{SignupRequest, ValidSignup, normalize_email};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_HANDLE_LEN: usize = 64;
pub const MAX_TEXT_LEN: usize = 2000;
pub const MAX_LINK_LEN: usize = 512;

/// Field-level validation failures, keyed by the camelCase field name the
/// form uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, String>);

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        // keep the first problem per field
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Basic `user@domain.tld` shape check. Does not normalize.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

fn required(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &str,
    max_len: usize,
    empty_message: &str,
) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, empty_message);
    } else if value.chars().count() > max_len {
        errors.add(field, format!("Must be at most {max_len} characters"));
    }
    value.to_string()
}

fn optional(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> Option<String> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    if value.chars().count() > max_len {
        errors.add(field, format!("Must be at most {max_len} characters"));
    }
    Some(value.to_string())
}

impl SignupRequest {
    /// Check every field and report all problems at once.
    pub fn validate(&self) -> Result<ValidSignup, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let email = normalize_email(&self.email);
        if email.is_empty() {
            errors.add("email", "Email is required");
        } else if email.chars().count() > MAX_EMAIL_LEN {
            errors.add("email", format!("Must be at most {MAX_EMAIL_LEN} characters"));
        } else if !is_valid_email(&email) {
            errors.add("email", "Please enter a valid email address");
        }

        let imvu_name = required(
            &mut errors,
            "imvuName",
            &self.imvu_name,
            MAX_HANDLE_LEN,
            "IMVU name is required",
        );
        let discord_tag = required(
            &mut errors,
            "discordTag",
            &self.discord_tag,
            MAX_HANDLE_LEN,
            "Discord tag is required",
        );
        let motivation = required(
            &mut errors,
            "motivation",
            &self.motivation,
            MAX_TEXT_LEN,
            "Tell us why you want early access",
        );
        let social_link = optional(
            &mut errors,
            "socialLink",
            self.social_link.as_deref(),
            MAX_LINK_LEN,
        );
        let notes = optional(&mut errors, "notes", self.notes.as_deref(), MAX_TEXT_LEN);

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(ValidSignup {
            email,
            imvu_name,
            discord_tag,
            motivation,
            social_link,
            notes,
        })
    }
}
