use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const SCHEMA_VERSION: u32 = 1;

/// Commits fetched per history page. The API caps history pagination at 100.
pub const HISTORY_PAGE_SIZE: u32 = 100;

/// Repositories fetched per listing page. Larger pages time out on the
/// server side when every node also resolves its default-branch history.
pub const REPO_PAGE_SIZE: u32 = 60;

/// Hex-encoded SHA-256 of an arbitrary identifier. Used both for cache
/// entry keys (hash of `owner/name`) and for the per-user ledger filename,
/// so the persisted format never embeds raw names.
pub fn cache_key(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    format!("{digest:x}")
}

/// A repository the user can access, as enumerated by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    pub full_name: String,
}

impl RepoRef {
    pub fn new(full_name: &str) -> Self {
        let (owner, name) = full_name.split_once('/').unwrap_or((full_name, ""));
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            full_name: full_name.to_string(),
        }
    }

    pub fn key(&self) -> String {
        cache_key(&self.full_name)
    }
}

/// One enumerated repository plus its live default-branch commit count.
/// `total_commits` is `None` for an empty repository (no default branch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoListing {
    pub repo: RepoRef,
    pub total_commits: Option<u64>,
}

/// One persisted ledger line: the last-observed state of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub total_commits: u64,
    pub my_commits: u64,
    pub additions: u64,
    pub deletions: u64,
}

impl CacheEntry {
    pub fn zeroed(key: String) -> Self {
        Self {
            key,
            total_commits: 0,
            my_commits: 0,
            additions: 0,
            deletions: 0,
        }
    }

    pub fn reset(&mut self) {
        self.total_commits = 0;
        self.my_commits = 0;
        self.additions = 0;
        self.deletions = 0;
    }
}

/// Transient accumulator carried through one repository's history walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkTotals {
    pub additions: u64,
    pub deletions: u64,
    pub my_commits: u64,
}

/// Totals recovered from the static archive of deleted repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSnapshot {
    pub additions: u64,
    pub deletions: u64,
    pub net: i64,
    pub commits: u64,
    pub repo_count: u64,
}

/// The engine's final output for one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub total_additions: u64,
    pub total_deletions: u64,
    pub net_loc: i64,
    pub my_commits: u64,
    pub repo_count: usize,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub login: String,
    pub archive_included: bool,
    #[serde(flatten)]
    pub aggregate: Aggregate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub snapshot: ArchiveSnapshot,
}
