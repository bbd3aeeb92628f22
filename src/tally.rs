use crate::archive::{self, default_archive_path};
use crate::cli::CommonArgs;
use crate::github::{GitHubClient, QueryCounts};
use crate::ledger::CacheLedger;
use crate::model::{Aggregate, CacheEntry, TallyOutput, SCHEMA_VERSION};
use crate::reconcile::{clean_exclusions, default_affiliations, reconcile, ReconcileOptions};
use anyhow::Context;
use chrono::Utc;
use console::style;
use std::path::PathBuf;
use std::time::Instant;

pub fn exec(
    common: CommonArgs,
    json: bool,
    ndjson: bool,
    rebuild: bool,
    include_archive: bool,
    archive_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let login = common
        .login
        .clone()
        .context("A GitHub login is required (--login)")?;
    let token = common
        .token
        .clone()
        .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .context("A GitHub token is required (--token or GITHUB_TOKEN)")?;

    let mut client = GitHubClient::new(token).context("Failed to build API client")?;

    let opts = ReconcileOptions {
        login: login.clone(),
        cache_dir: common.cache_dir.clone(),
        comment_size: common.comment_size,
        excluded: common
            .exclude
            .as_deref()
            .map(clean_exclusions)
            .unwrap_or_default(),
        affiliations: common
            .affiliations
            .clone()
            .unwrap_or_else(default_affiliations),
        force_rebuild: rebuild,
    };

    let started = Instant::now();
    let outcome = reconcile(&mut client, &opts).context("Failed to reconcile repository cache")?;
    let elapsed = started.elapsed();

    let mut aggregate = outcome.aggregate;
    if include_archive {
        let path = archive_path.unwrap_or_else(|| default_archive_path(&common.cache_dir));
        let snapshot = archive::load_archive(&path).context("Failed to load repository archive")?;
        archive::merge(&mut aggregate, &snapshot);
    }

    if json {
        output_json(&aggregate, &login, include_archive)?;
    } else if ndjson {
        output_ndjson(&outcome.entries)?;
    } else {
        output_table(&aggregate, elapsed.as_secs_f64(), client.query_counts());
    }

    Ok(())
}

fn output_json(aggregate: &Aggregate, login: &str, archive_included: bool) -> anyhow::Result<()> {
    let output = TallyOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        login: login.to_string(),
        archive_included,
        aggregate: aggregate.clone(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn output_ndjson(entries: &[CacheEntry]) -> anyhow::Result<()> {
    for entry in entries {
        println!("{}", serde_json::to_string(entry)?);
    }
    Ok(())
}

fn output_table(aggregate: &Aggregate, seconds: f64, counts: QueryCounts) {
    let source = if aggregate.cache_hit { "cache" } else { "fresh walk" };

    println!("{}", style("Lines of code").bold());
    println!("{}", "─".repeat(40));
    println!("{:<18} {:>14}", "Added", group_digits(aggregate.total_additions));
    println!("{:<18} {:>14}", "Deleted", group_digits(aggregate.total_deletions));
    println!("{:<18} {:>14}", "Net", group_digits_i64(aggregate.net_loc));
    println!("{:<18} {:>14}", "Commits", group_digits(aggregate.my_commits));
    println!("{:<18} {:>14}", "Repositories", aggregate.repo_count);
    println!();
    println!("Computed in {seconds:.2}s from {source}");

    println!();
    println!("{} ({} total)", style("API calls").bold(), counts.total());
    for (name, count) in counts.report() {
        println!("{:<18} {:>6}", name, count);
    }
}

fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn group_digits_i64(n: i64) -> String {
    if n < 0 {
        format!("-{}", group_digits(n.unsigned_abs()))
    } else {
        group_digits(n as u64)
    }
}

/// Sum the commit column of an already-persisted ledger without touching
/// the network or the cache. Used when only the commit total is needed
/// after a run.
pub fn commit_count_from_cache(common: &CommonArgs, login: &str) -> anyhow::Result<u64> {
    let ledger = CacheLedger::load(&common.cache_dir, login, common.comment_size)
        .context("Failed to load cache ledger")?;
    let (_, _, my_commits) = ledger.totals();
    Ok(my_commits)
}
