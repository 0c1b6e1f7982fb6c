use std::collections::{HashMap, HashSet};

use crate::error::{ErrorCode, PublishError, Result};
use crate::model::{PackageState, PublishStatus};

/// Named unit of pipeline work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Init,
    CopyPackage,
    RemoveOriginalPackage,
    ExtractPackage,
    ValidatePackage,
    PreparePublicDirectory,
    UploadMedia,
    ConfigureMedia,
    SaveTimecodes,
    CopyImages,
    CleanFile,
    CleanDirectory,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Init => "initPackage",
            Transition::CopyPackage => "copyPackage",
            Transition::RemoveOriginalPackage => "removeOriginalPackage",
            Transition::ExtractPackage => "extractPackage",
            Transition::ValidatePackage => "validatePackage",
            Transition::PreparePublicDirectory => "preparePublicDirectory",
            Transition::UploadMedia => "uploadMedia",
            Transition::ConfigureMedia => "configureMedia",
            Transition::SaveTimecodes => "saveTimecodes",
            Transition::CopyImages => "copyImages",
            Transition::CleanFile => "cleanFile",
            Transition::CleanDirectory => "cleanDirectory",
        }
    }

    /// Error code recorded when this transition fails
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Transition::Init => ErrorCode::Init,
            Transition::CopyPackage => ErrorCode::CopyPackage,
            Transition::RemoveOriginalPackage => ErrorCode::RemoveOriginalPackage,
            Transition::ExtractPackage => ErrorCode::Extract,
            Transition::ValidatePackage => ErrorCode::Validation,
            Transition::PreparePublicDirectory => ErrorCode::CreatePublicDirectory,
            Transition::UploadMedia => ErrorCode::MediaUpload,
            Transition::ConfigureMedia => ErrorCode::MediaConfigure,
            Transition::SaveTimecodes => ErrorCode::SaveTimecodes,
            Transition::CopyImages => ErrorCode::CopyImages,
            Transition::CleanFile => ErrorCode::CleanFile,
            Transition::CleanDirectory => ErrorCode::CleanDirectory,
        }
    }

    /// Activity shown while the transition runs. `Init` creates the record
    /// and therefore has none.
    pub fn status(&self) -> Option<PublishStatus> {
        match self {
            Transition::Init => None,
            Transition::CopyPackage | Transition::RemoveOriginalPackage => Some(PublishStatus::Copying),
            Transition::ExtractPackage => Some(PublishStatus::Extracting),
            Transition::ValidatePackage => Some(PublishStatus::Validating),
            Transition::PreparePublicDirectory => Some(PublishStatus::Preparing),
            Transition::UploadMedia => Some(PublishStatus::Uploading),
            Transition::ConfigureMedia => Some(PublishStatus::Configuring),
            Transition::SaveTimecodes => Some(PublishStatus::SavingTimecodes),
            Transition::CopyImages => Some(PublishStatus::CopyingImages),
            Transition::CleanFile | Transition::CleanDirectory => Some(PublishStatus::Cleaning),
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEntry {
    pub name: Transition,
    pub from: PackageState,
    pub to: PackageState,
}

impl TransitionEntry {
    pub const fn new(name: Transition, from: PackageState, to: PackageState) -> Self {
        Self { name, from, to }
    }
}

const BASE_TABLE: [TransitionEntry; 6] = [
    TransitionEntry::new(Transition::Init, PackageState::Pending, PackageState::Initialized),
    TransitionEntry::new(Transition::CopyPackage, PackageState::Initialized, PackageState::PackageCopied),
    TransitionEntry::new(
        Transition::RemoveOriginalPackage,
        PackageState::PackageCopied,
        PackageState::OriginalPackageRemoved,
    ),
    TransitionEntry::new(
        Transition::UploadMedia,
        PackageState::OriginalPackageRemoved,
        PackageState::MediaUploaded,
    ),
    TransitionEntry::new(Transition::ConfigureMedia, PackageState::MediaUploaded, PackageState::MediaConfigured),
    TransitionEntry::new(Transition::CleanFile, PackageState::MediaConfigured, PackageState::FileCleaned),
];

/// Transition table forming a single linear chain of states.
///
/// Every state has at most one outgoing and one incoming transition, so the
/// persisted state alone determines the next step to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachine {
    entries: Vec<TransitionEntry>,
}

impl StateMachine {
    /// Build a table, rejecting anything but one linear chain. Entries are
    /// kept in chain order.
    pub fn new(entries: Vec<TransitionEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(PublishError::Config("state machine has no transitions".to_string()));
        }

        let mut names = HashSet::new();
        let mut outgoing: HashMap<PackageState, TransitionEntry> = HashMap::new();
        let mut incoming = HashSet::new();
        for entry in &entries {
            if entry.from == entry.to {
                return Err(invalid(format!("{} loops on {}", entry.name, entry.from)));
            }
            if entry.from == PackageState::Error || entry.to == PackageState::Error {
                return Err(invalid(format!("{} involves the error state", entry.name)));
            }
            if !names.insert(entry.name) {
                return Err(invalid(format!("{} is declared twice", entry.name)));
            }
            if outgoing.insert(entry.from, *entry).is_some() {
                return Err(invalid(format!("{} has several outgoing transitions", entry.from)));
            }
            if !incoming.insert(entry.to) {
                return Err(invalid(format!("{} has several incoming transitions", entry.to)));
            }
        }

        let starts: Vec<PackageState> = entries
            .iter()
            .map(|entry| entry.from)
            .filter(|state| !incoming.contains(state))
            .collect();
        let [start] = starts[..] else {
            return Err(invalid(format!("expected one initial state, found {}", starts.len())));
        };

        let mut ordered = Vec::with_capacity(entries.len());
        let mut state = start;
        while let Some(entry) = outgoing.get(&state) {
            ordered.push(*entry);
            state = entry.to;
        }
        if ordered.len() != entries.len() {
            return Err(invalid("transitions do not form a single chain".to_string()));
        }

        Ok(Self { entries: ordered })
    }

    /// Transitions shared by every package variant
    pub fn base() -> Self {
        Self {
            entries: BASE_TABLE.to_vec(),
        }
    }

    /// Add variant transitions. An entry named like an existing transition
    /// replaces it.
    pub fn extend(&self, overrides: Vec<TransitionEntry>) -> Result<Self> {
        let mut entries = self.entries.clone();
        for entry in overrides {
            match entries.iter_mut().find(|existing| existing.name == entry.name) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
        Self::new(entries)
    }

    /// The transition leaving `state`, if any
    pub fn next_from(&self, state: PackageState) -> Option<&TransitionEntry> {
        self.entries.iter().find(|entry| entry.from == state)
    }

    pub fn entries(&self) -> &[TransitionEntry] {
        &self.entries
    }

    /// Transition names in execution order
    pub fn transition_names(&self) -> Vec<Transition> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    pub fn initial_state(&self) -> PackageState {
        self.entries[0].from
    }

    pub fn terminal_state(&self) -> PackageState {
        self.entries[self.entries.len() - 1].to
    }

    /// States a package may be persisted in while following this table
    pub fn states(&self) -> Vec<PackageState> {
        let mut states = vec![self.initial_state()];
        states.extend(self.entries.iter().map(|entry| entry.to));
        states
    }
}

fn invalid(message: String) -> PublishError {
    PublishError::Config(format!("invalid state machine: {}", message))
}
