use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::waitlist::{
    error::WaitlistError,
    model::{EarlyAccessSignup, SignupRequest, SubmitOutcome, normalize_email},
    store::{Insert, SignupStore},
    validate::is_valid_email,
};

/// Source of `createdAt` timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The four waitlist operations on top of a [`SignupStore`].
#[derive(Clone)]
pub struct Waitlist {
    store: Arc<dyn SignupStore>,
    clock: Arc<dyn Clock>,
}

impl Waitlist {
    pub fn new(store: Arc<dyn SignupStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn SignupStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Validate and store a signup.
    ///
    /// Submitting an address that is already on the list is a success that
    /// writes nothing.
    pub async fn submit(&self, request: &SignupRequest) -> Result<SubmitOutcome, WaitlistError> {
        let signup = request.validate()?;
        let id = Uuid::new_v4();
        let record = signup.into_record(id, self.clock.now());
        match self.store.insert_if_absent(record).await? {
            Insert::Inserted => {
                log::info!("Early-access signup {id} stored");
                Ok(SubmitOutcome::Created { id })
            }
            Insert::Exists => {
                log::info!("Early-access signup for an existing address ignored");
                Ok(SubmitOutcome::AlreadyRegistered)
            }
        }
    }

    /// Every signup, newest first.
    pub async fn list(&self) -> Result<Vec<EarlyAccessSignup>, WaitlistError> {
        Ok(self.store.list_newest_first().await?)
    }

    pub async fn count(&self) -> Result<usize, WaitlistError> {
        Ok(self.store.count().await?)
    }

    /// Whether `email` (in any casing or padding) is on the list.
    pub async fn lookup(&self, email: &str) -> Result<bool, WaitlistError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Ok(false);
        }
        Ok(self.store.find_by_email(&email).await?.is_some())
    }
}
