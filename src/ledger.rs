use crate::error::{Result, TallyError};
use crate::model::{cache_key, CacheEntry, RepoListing};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const PLACEHOLDER_COMMENT: &str = "This line is reserved for comments.";

/// The persisted per-user cache: a fixed-size comment block followed by one
/// line per repository, `<key> <total_commits> <my_commits> <additions>
/// <deletions>`. Entries are matched by key, never by line position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLedger {
    path: PathBuf,
    header: Vec<String>,
    entries: Vec<CacheEntry>,
}

impl CacheLedger {
    pub fn path_for(cache_dir: &Path, login: &str) -> PathBuf {
        cache_dir.join(format!("{}.txt", cache_key(login)))
    }

    /// Load the ledger for `login`, creating an empty one (comment block
    /// only) on first run. `comment_size` is the fixed header line count.
    pub fn load_or_create(cache_dir: &Path, login: &str, comment_size: usize) -> Result<Self> {
        fs::create_dir_all(cache_dir)?;
        let path = Self::path_for(cache_dir, login);

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let ledger = Self {
                    path,
                    header: vec![PLACEHOLDER_COMMENT.to_string(); comment_size],
                    entries: Vec::new(),
                };
                ledger.save()?;
                return Ok(ledger);
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self::from_text(path, &text, comment_size))
    }

    /// Read-only load for queries against an existing ledger. Unlike
    /// [`CacheLedger::load_or_create`], a missing ledger is an error and
    /// nothing is written to disk.
    pub fn load(cache_dir: &Path, login: &str, comment_size: usize) -> Result<Self> {
        let path = Self::path_for(cache_dir, login);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TallyError::Cache(format!(
                    "no cache ledger at {} (run a tally first)",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self::from_text(path, &text, comment_size))
    }

    fn from_text(path: PathBuf, text: &str, comment_size: usize) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let header: Vec<String> = lines
            .iter()
            .take(comment_size)
            .map(|l| l.to_string())
            .collect();

        let mut entries = Vec::new();
        for line in lines.iter().skip(comment_size) {
            if let Some(entry) = parse_entry(line) {
                entries.push(entry);
            }
        }

        Self { path, header, entries }
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn entry_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.entries.iter_mut().find(|e| e.key == key)
    }

    /// True when the persisted entry set no longer matches the live
    /// repository set: an added, removed, or renamed repository.
    pub fn needs_rebuild(&self, live: &[RepoListing]) -> bool {
        if self.entries.len() != live.len() {
            return true;
        }
        live.iter()
            .any(|l| !self.entries.iter().any(|e| e.key == l.repo.key()))
    }

    /// Reset the ledger to zero-valued entries keyed by the live
    /// repositories, in enumeration order.
    pub fn rebuild(&mut self, live: &[RepoListing]) {
        self.entries = live
            .iter()
            .map(|l| CacheEntry::zeroed(l.repo.key()))
            .collect();
    }

    /// Sum of (additions, deletions, my_commits) over all entries.
    pub fn totals(&self) -> (u64, u64, u64) {
        self.entries.iter().fold((0, 0, 0), |(a, d, c), e| {
            (a + e.additions, d + e.deletions, c + e.my_commits)
        })
    }

    /// Persist the full ledger. The write goes to a sibling temp file which
    /// is renamed over the target, so a crash mid-write never leaves a
    /// truncated ledger behind.
    pub fn save(&self) -> Result<()> {
        let tmp = self.path.with_extension("txt.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            for line in &self.header {
                writeln!(file, "{line}")?;
            }
            for entry in &self.entries {
                writeln!(
                    file,
                    "{} {} {} {} {}",
                    entry.key, entry.total_commits, entry.my_commits, entry.additions, entry.deletions
                )?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| {
            TallyError::Cache(format!("failed to replace {}: {e}", self.path.display()))
        })
    }
}

/// Parse one `<key> <count> <commits> <adds> <dels>` line. A line whose
/// numeric fields are damaged keeps its key with zeroed counters, so the
/// entry simply looks stale; a line with no key at all is dropped and the
/// resulting count mismatch forces a rebuild.
fn parse_entry(line: &str) -> Option<CacheEntry> {
    let mut fields = line.split_whitespace();
    let key = fields.next()?.to_string();

    let mut numbers = [0u64; 4];
    for slot in &mut numbers {
        match fields.next().and_then(|f| f.parse().ok()) {
            Some(n) => *slot = n,
            None => return Some(CacheEntry::zeroed(key)),
        }
    }

    Some(CacheEntry {
        key,
        total_commits: numbers[0],
        my_commits: numbers[1],
        additions: numbers[2],
        deletions: numbers[3],
    })
}
