use crate::cli::CommonArgs;
use crate::error::{Result, TallyError};
use crate::model::{Aggregate, ArchiveOutput, ArchiveSnapshot, SCHEMA_VERSION};
use anyhow::Context;
use chrono::Utc;
use console::style;
use std::fs;
use std::path::{Path, PathBuf};

pub const ARCHIVE_FILE: &str = "repository_archive.txt";

/// The archive ledger carries a 7-line comment header and a 3-line trailer;
/// everything between is one line per archived repository in the same
/// format as the cache ledger.
const HEADER_LINES: usize = 7;
const TRAILER_LINES: usize = 3;

/// Token position on the last trailer line holding the aggregate commit
/// count recorded before archiving began. The token carries one trailing
/// punctuation character.
const TRAILER_COMMIT_TOKEN: usize = 4;

/// Load the static archive of contributions to repositories that no longer
/// exist. The archive never changes at runtime; it is summed once and
/// folded into the final aggregate.
pub fn load_archive(path: &Path) -> Result<ArchiveSnapshot> {
    let text = fs::read_to_string(path)
        .map_err(|e| TallyError::Archive(format!("cannot read {}: {e}", path.display())))?;
    parse_archive(&text)
}

pub fn default_archive_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(ARCHIVE_FILE)
}

/// `archive` subcommand: print the archive snapshot without touching the
/// network or the live cache.
pub fn exec(common: CommonArgs, json: bool, path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(|| default_archive_path(&common.cache_dir));
    let snapshot = load_archive(&path).context("Failed to load repository archive")?;

    if json {
        let output = ArchiveOutput {
            version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            snapshot,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", style("Archived repositories").bold());
    println!("{}", "─".repeat(40));
    println!("{:<16} {:>12}", "Added", snapshot.additions);
    println!("{:<16} {:>12}", "Deleted", snapshot.deletions);
    println!("{:<16} {:>12}", "Net", snapshot.net);
    println!("{:<16} {:>12}", "Commits", snapshot.commits);
    println!("{:<16} {:>12}", "Repositories", snapshot.repo_count);
    Ok(())
}

/// Fold archived totals into a reconciliation aggregate. Purely additive;
/// the cache-hit flag is untouched.
pub fn merge(aggregate: &mut Aggregate, snapshot: &ArchiveSnapshot) {
    aggregate.total_additions += snapshot.additions;
    aggregate.total_deletions += snapshot.deletions;
    aggregate.net_loc += snapshot.net;
    aggregate.my_commits += snapshot.commits;
    aggregate.repo_count += snapshot.repo_count as usize;
}

fn parse_archive(text: &str) -> Result<ArchiveSnapshot> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < HEADER_LINES + TRAILER_LINES {
        return Err(TallyError::Archive(format!(
            "archive too short: {} lines, need at least {}",
            lines.len(),
            HEADER_LINES + TRAILER_LINES
        )));
    }

    let body = &lines[HEADER_LINES..lines.len() - TRAILER_LINES];
    let mut additions = 0u64;
    let mut deletions = 0u64;
    let mut commits = 0u64;
    for line in body {
        let fields: Vec<&str> = line.split_whitespace().collect();
        // <key> <total_commits> <my_commits> <additions> <deletions>
        if let Some(n) = fields.get(2).and_then(|f| f.parse::<u64>().ok()) {
            commits += n;
        }
        additions += fields.get(3).and_then(|f| f.parse().ok()).unwrap_or(0);
        deletions += fields.get(4).and_then(|f| f.parse().ok()).unwrap_or(0);
    }

    let last = lines[lines.len() - 1];
    let token = last
        .split_whitespace()
        .nth(TRAILER_COMMIT_TOKEN)
        .ok_or_else(|| TallyError::Archive("trailer is missing the commit-count token".into()))?;
    // The trailing punctuation character may be multi-byte, so strip it by
    // char rather than by byte offset.
    let mut digits = token.chars();
    digits.next_back();
    let recorded: u64 = digits
        .as_str()
        .parse()
        .map_err(|_| TallyError::Archive(format!("bad trailer commit count '{token}'")))?;
    commits += recorded;

    Ok(ArchiveSnapshot {
        additions,
        deletions,
        net: additions as i64 - deletions as i64,
        commits,
        repo_count: body.len() as u64,
    })
}
