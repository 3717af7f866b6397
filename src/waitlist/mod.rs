//! Early-access waitlist.
//!
//! - `model` holds the signup record, the incoming form and email normalization
//! - `validate` checks a form field by field (also compiled for the browser)
//! - `store` persists signups with a unique email index (memory or JSON file)
//! - `service` exposes submit / list / count / lookup
//! - `api` serves those operations over HTTP with axum
//! - `config` reads the server settings from the environment

pub mod model;
pub mod validate;

#[cfg(not(target_arch = "wasm32"))]
pub mod api;
#[cfg(not(target_arch = "wasm32"))]
pub mod config;
#[cfg(not(target_arch = "wasm32"))]
pub mod error;
#[cfg(not(target_arch = "wasm32"))]
pub mod service;
#[cfg(not(target_arch = "wasm32"))]
pub mod store;

pub use model::{EarlyAccessSignup, SignupRequest, SubmitOutcome, normalize_email};
pub use validate::ValidationErrors;
#[cfg(not(target_arch = "wasm32"))]
pub use service::Waitlist;
