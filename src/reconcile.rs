use crate::error::{Result, TallyError};
use crate::github::RepoSource;
use crate::ledger::CacheLedger;
use crate::model::{Aggregate, CacheEntry, RepoListing};
use crate::walker::walk_repo;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub login: String,
    pub cache_dir: PathBuf,
    /// Fixed number of opaque comment lines at the top of the ledger.
    pub comment_size: usize,
    /// Repository full names (`owner/name`) to leave out of the tally.
    pub excluded: Vec<String>,
    /// Affiliation filters passed through to the repository listing.
    pub affiliations: Vec<String>,
    /// Reset every cache entry before reconciling, as if the ledger were new.
    pub force_rebuild: bool,
}

impl ReconcileOptions {
    pub fn new(login: &str, cache_dir: PathBuf) -> Self {
        Self {
            login: login.to_string(),
            cache_dir,
            comment_size: 7,
            excluded: Vec::new(),
            affiliations: default_affiliations(),
            force_rebuild: false,
        }
    }
}

pub fn default_affiliations() -> Vec<String> {
    ["OWNER", "COLLABORATOR", "ORGANIZATION_MEMBER"]
        .map(String::from)
        .to_vec()
}

/// Split a comma-separated exclusion list, trimming entries and dropping
/// empty ones.
pub fn clean_exclusions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub aggregate: Aggregate,
    /// Final per-repository cache state, for downstream detail output.
    pub entries: Vec<CacheEntry>,
}

/// Reconcile the persisted ledger against the live repository list and
/// return the aggregated LOC totals.
///
/// A structural mismatch (repository added, removed, or renamed) or a
/// forced rebuild resets the whole ledger first; after that, only entries
/// whose live commit count differs from the cached one are re-walked.
/// The ledger is persisted once after the rebuild and once at the end of
/// the run; if a remote call fails mid-run, whatever has been reconciled so
/// far is flushed before the failure surfaces.
pub fn reconcile<C: RepoSource>(client: &mut C, opts: &ReconcileOptions) -> Result<ReconcileOutcome> {
    let author_id = client.user_id(&opts.login)?;

    let mut live = client.list_repositories(&opts.login, &opts.affiliations)?;
    live.retain(|l| !opts.excluded.contains(&l.repo.full_name));

    let mut ledger = CacheLedger::load_or_create(&opts.cache_dir, &opts.login, opts.comment_size)?;

    let mut cache_hit = true;
    if opts.force_rebuild || ledger.needs_rebuild(&live) {
        ledger.rebuild(&live);
        ledger.save()?;
        cache_hit = false;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    for listing in &live {
        if let Err(e) = reconcile_entry(client, &mut ledger, listing, &author_id, &mut cache_hit, &pb) {
            // Crash recovery: keep the entries already reconciled this run.
            if let Err(flush) = ledger.save() {
                eprintln!("cache flush after failure also failed: {flush}");
            }
            pb.finish_and_clear();
            return Err(e);
        }
    }
    pb.finish_and_clear();

    ledger.save()?;

    let (total_additions, total_deletions, my_commits) = ledger.totals();
    Ok(ReconcileOutcome {
        aggregate: Aggregate {
            total_additions,
            total_deletions,
            net_loc: total_additions as i64 - total_deletions as i64,
            my_commits,
            repo_count: live.len(),
            cache_hit,
        },
        entries: ledger.entries().to_vec(),
    })
}

fn reconcile_entry<C: RepoSource>(
    client: &mut C,
    ledger: &mut CacheLedger,
    listing: &RepoListing,
    author_id: &str,
    cache_hit: &mut bool,
    pb: &ProgressBar,
) -> Result<()> {
    let key = listing.repo.key();
    let entry = ledger
        .entry_mut(&key)
        .ok_or_else(|| TallyError::Cache(format!("no ledger entry for {}", listing.repo.full_name)))?;

    match listing.total_commits {
        // Empty repository (no default branch): zero the entry without
        // issuing any history request.
        None => {
            if entry.total_commits != 0
                || entry.my_commits != 0
                || entry.additions != 0
                || entry.deletions != 0
            {
                entry.reset();
                *cache_hit = false;
            }
        }
        Some(live_count) if live_count != entry.total_commits => {
            pb.set_message(format!("Walking {}...", listing.repo.full_name));
            let totals = walk_repo(client, &listing.repo, author_id)?;
            entry.total_commits = live_count;
            entry.my_commits = totals.my_commits;
            entry.additions = totals.additions;
            entry.deletions = totals.deletions;
            *cache_hit = false;
        }
        // Commit count unchanged, cached numbers stand.
        Some(_) => {}
    }
    Ok(())
}
