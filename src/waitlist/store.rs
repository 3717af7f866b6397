//! Persistence for signups.
//!
//! The waitlist works exclusively through [`SignupStore`], so the in-memory
//! table used by tests and small deployments and the JSON snapshot store are
//! interchangeable.

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::waitlist::{error::StoreError, model::EarlyAccessSignup};

/// Result of [`SignupStore::insert_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    Inserted,
    Exists,
}

#[async_trait]
pub trait SignupStore: Send + Sync {
    /// Insert `signup` unless a record with the same email exists.
    ///
    /// The existence check and the insert are one atomic step.
    async fn insert_if_absent(&self, signup: EarlyAccessSignup) -> Result<Insert, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<EarlyAccessSignup>, StoreError>;
    /// All records, newest `created_at` first.
    async fn list_newest_first(&self) -> Result<Vec<EarlyAccessSignup>, StoreError>;
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Rows plus the two indices: unique email and creation time.
#[derive(Debug, Default)]
struct Table {
    rows: Vec<EarlyAccessSignup>,
    by_email: HashMap<String, usize>,
    // (created_at, row) so equal timestamps keep insertion order
    by_created: BTreeSet<(DateTime<Utc>, usize)>,
}

impl Table {
    fn from_rows(rows: Vec<EarlyAccessSignup>) -> Result<Self, StoreError> {
        let mut table = Table::default();
        for row in rows {
            let email = row.email.clone();
            if table.insert(row) == Insert::Exists {
                return Err(StoreError::Corrupt(format!(
                    "duplicate email {email} in snapshot"
                )));
            }
        }
        Ok(table)
    }

    fn insert(&mut self, signup: EarlyAccessSignup) -> Insert {
        if self.by_email.contains_key(&signup.email) {
            return Insert::Exists;
        }
        let row = self.rows.len();
        self.by_email.insert(signup.email.clone(), row);
        self.by_created.insert((signup.created_at, row));
        self.rows.push(signup);
        Insert::Inserted
    }

    /// Undo the most recent successful insert.
    fn pop(&mut self) {
        if let Some(signup) = self.rows.pop() {
            let row = self.rows.len();
            self.by_email.remove(&signup.email);
            self.by_created.remove(&(signup.created_at, row));
        }
    }

    fn find(&self, email: &str) -> Option<EarlyAccessSignup> {
        self.by_email.get(email).map(|row| self.rows[*row].clone())
    }

    fn newest_first(&self) -> Vec<EarlyAccessSignup> {
        self.by_created
            .iter()
            .rev()
            .map(|(_, row)| self.rows[*row].clone())
            .collect()
    }
}

/// Process-local store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignupStore for MemoryStore {
    async fn insert_if_absent(&self, signup: EarlyAccessSignup) -> Result<Insert, StoreError> {
        Ok(self.table.write().await.insert(signup))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<EarlyAccessSignup>, StoreError> {
        Ok(self.table.read().await.find(email))
    }

    async fn list_newest_first(&self) -> Result<Vec<EarlyAccessSignup>, StoreError> {
        Ok(self.table.read().await.newest_first())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.table.read().await.rows.len())
    }
}

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    signups: Vec<EarlyAccessSignup>,
}

/// In-memory table mirrored to a JSON file.
///
/// The whole snapshot is rewritten after every insert (temp file + rename),
/// which is plenty for waitlist traffic.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    table: RwLock<Table>,
}

impl JsonFileStore {
    /// Open `path`, loading existing signups. A missing file is an empty
    /// waitlist; it is created on the first insert.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let rows = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                if snapshot.version != SNAPSHOT_VERSION {
                    return Err(StoreError::Corrupt(format!(
                        "unsupported snapshot version {}",
                        snapshot.version
                    )));
                }
                snapshot.signups
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        log::info!("Loaded {} signups from {}", rows.len(), path.display());
        Ok(Self {
            table: RwLock::new(Table::from_rows(rows)?),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, table: &Table) -> Result<(), StoreError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            signups: table.rows.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl SignupStore for JsonFileStore {
    async fn insert_if_absent(&self, signup: EarlyAccessSignup) -> Result<Insert, StoreError> {
        let mut table = self.table.write().await;
        if table.insert(signup) == Insert::Exists {
            return Ok(Insert::Exists);
        }
        if let Err(e) = self.persist(&table).await {
            table.pop();
            return Err(e);
        }
        Ok(Insert::Inserted)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<EarlyAccessSignup>, StoreError> {
        Ok(self.table.read().await.find(email))
    }

    async fn list_newest_first(&self) -> Result<Vec<EarlyAccessSignup>, StoreError> {
        Ok(self.table.read().await.newest_first())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.table.read().await.rows.len())
    }
}
