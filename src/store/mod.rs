// Package record persistence
//
// The pipeline only reads packages and partially updates them; everything
// else (serializing writes to the same id, storage layout) belongs to the
// store implementation:
// - MemoryStore: process-local map, used by tests and dry runs
// - JsonFileStore: one JSON document per package on disk

pub mod json_file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::model::{MediaPackage, PackageErrorRecord, PackageMetadata, PackageState, PublishStatus, PackageType};

/// CRUD access to package records
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Fetch every record matching the filter
    async fn get(&self, filter: &PackageFilter) -> Result<Vec<MediaPackage>>;

    /// Insert records, returning how many were written
    async fn insert(&self, packages: Vec<MediaPackage>) -> Result<usize>;

    /// Apply a partial update to a single record
    async fn update(&self, id: &str, update: PackageUpdate) -> Result<()>;

    /// Remove every record matching the filter, returning how many were removed
    async fn remove(&self, filter: &PackageFilter) -> Result<usize>;

    /// Fetch a single record by id
    async fn get_one(&self, id: &str) -> Result<Option<MediaPackage>> {
        let mut found = self.get(&PackageFilter::by_id(id)).await?;
        Ok(found.pop())
    }
}

/// Selection criteria; an empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    pub ids: Option<Vec<String>>,
    pub states: Option<Vec<PackageState>>,
}

impl PackageFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id<S: Into<String>>(id: S) -> Self {
        Self {
            ids: Some(vec![id.into()]),
            states: None,
        }
    }

    pub fn by_states(states: Vec<PackageState>) -> Self {
        Self {
            ids: None,
            states: Some(states),
        }
    }

    pub fn matches(&self, package: &MediaPackage) -> bool {
        let id_matches = self
            .ids
            .as_ref()
            .is_none_or(|ids| ids.iter().any(|id| id == &package.id));
        let state_matches = self
            .states
            .as_ref()
            .is_none_or(|states| states.contains(&package.state));
        id_matches && state_matches
    }
}

/// Partial update of a package record. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageUpdate {
    pub state: Option<PackageState>,
    pub last_state: Option<PackageState>,
    pub last_transition: Option<String>,
    pub status: Option<PublishStatus>,
    pub package_type: Option<PackageType>,
    pub metadata: Option<PackageMetadata>,
    pub date: Option<DateTime<Utc>>,
    pub media_id: Option<String>,
    /// `Some(None)` clears a recorded error
    pub error: Option<Option<PackageErrorRecord>>,
    pub last_transition_date: Option<DateTime<Utc>>,
}

impl PackageUpdate {
    pub fn state(mut self, state: PackageState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn last_state(mut self, state: PackageState) -> Self {
        self.last_state = Some(state);
        self
    }

    pub fn last_transition<S: Into<String>>(mut self, transition: S) -> Self {
        self.last_transition = Some(transition.into());
        self
    }

    pub fn status(mut self, status: PublishStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn package_type(mut self, package_type: PackageType) -> Self {
        self.package_type = Some(package_type);
        self
    }

    pub fn metadata(mut self, metadata: PackageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn media_id<S: Into<String>>(mut self, media_id: S) -> Self {
        self.media_id = Some(media_id.into());
        self
    }

    pub fn error(mut self, error: Option<PackageErrorRecord>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn last_transition_date(mut self, date: DateTime<Utc>) -> Self {
        self.last_transition_date = Some(date);
        self
    }

    /// Write the set fields onto a record
    pub fn apply_to(self, package: &mut MediaPackage) {
        if let Some(state) = self.state {
            package.state = state;
        }
        if let Some(last_state) = self.last_state {
            package.last_state = last_state;
        }
        if let Some(transition) = self.last_transition {
            package.last_transition = Some(transition);
        }
        if let Some(status) = self.status {
            package.status = status;
        }
        if let Some(package_type) = self.package_type {
            package.package_type = Some(package_type);
        }
        if let Some(metadata) = self.metadata {
            package.metadata = metadata;
        }
        if let Some(date) = self.date {
            package.date = Some(date);
        }
        if let Some(media_id) = self.media_id {
            package.media_id = Some(media_id);
        }
        if let Some(error) = self.error {
            package.error = error;
        }
        if let Some(date) = self.last_transition_date {
            package.last_transition_date = Some(date);
        }
    }
}
