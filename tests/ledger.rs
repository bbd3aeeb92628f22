use loctally::ledger::CacheLedger;
use loctally::model::{cache_key, RepoListing, RepoRef};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

fn listing(full_name: &str) -> RepoListing {
    RepoListing {
        repo: RepoRef::new(full_name),
        total_commits: Some(1),
    }
}

#[test]
fn first_load_creates_a_comment_only_ledger() {
    let dir = tempdir().unwrap();
    let ledger = CacheLedger::load_or_create(dir.path(), "someone", 3).unwrap();
    assert!(ledger.entries().is_empty());

    let path = CacheLedger::path_for(dir.path(), "someone");
    assert!(path.exists());
    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn ledger_filename_is_a_hash_of_the_login() {
    let dir = tempdir().unwrap();
    let path = CacheLedger::path_for(dir.path(), "someone");
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(name, format!("{}.txt", cache_key("someone")));
}

#[test]
fn rebuild_then_save_then_reload_roundtrips() {
    let dir = tempdir().unwrap();
    let live = vec![listing("me/alpha"), listing("me/beta")];

    let mut ledger = CacheLedger::load_or_create(dir.path(), "someone", 7).unwrap();
    assert!(ledger.needs_rebuild(&live));
    ledger.rebuild(&live);

    let entry = ledger.entry_mut(&cache_key("me/beta")).unwrap();
    entry.total_commits = 12;
    entry.my_commits = 4;
    entry.additions = 300;
    entry.deletions = 75;
    ledger.save().unwrap();

    let reloaded = CacheLedger::load_or_create(dir.path(), "someone", 7).unwrap();
    assert_eq!(reloaded.entries().len(), 2);
    assert!(!reloaded.needs_rebuild(&live));
    assert_eq!(reloaded.totals(), (300, 75, 4));
    assert_eq!(reloaded, ledger);

    // No temp file left behind after the atomic replace.
    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn read_only_load_errors_on_a_missing_ledger() {
    let dir = tempdir().unwrap();
    assert!(CacheLedger::load(dir.path(), "someone", 7).is_err());
    // Nothing was created by the attempt.
    assert!(!CacheLedger::path_for(dir.path(), "someone").exists());

    let mut ledger = CacheLedger::load_or_create(dir.path(), "someone", 7).unwrap();
    ledger.rebuild(&[listing("me/alpha")]);
    ledger.save().unwrap();

    let read_back = CacheLedger::load(dir.path(), "someone", 7).unwrap();
    assert_eq!(read_back, ledger);
}

#[test]
fn renamed_repository_forces_a_rebuild() {
    let dir = tempdir().unwrap();
    let mut ledger = CacheLedger::load_or_create(dir.path(), "someone", 0).unwrap();
    ledger.rebuild(&[listing("me/old-name"), listing("me/other")]);
    ledger.save().unwrap();

    // Same count, different key set.
    let live = vec![listing("me/new-name"), listing("me/other")];
    let reloaded = CacheLedger::load_or_create(dir.path(), "someone", 0).unwrap();
    assert!(reloaded.needs_rebuild(&live));
}

#[test]
fn comment_block_survives_saves() {
    let dir = tempdir().unwrap();
    let path = CacheLedger::path_for(dir.path(), "someone");
    fs::create_dir_all(dir.path()).unwrap();
    fs::write(&path, "custom line one\ncustom line two\n").unwrap();

    let mut ledger = CacheLedger::load_or_create(dir.path(), "someone", 2).unwrap();
    ledger.rebuild(&[listing("me/alpha")]);
    ledger.save().unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "custom line one");
    assert_eq!(lines[1], "custom line two");
    assert_eq!(lines.len(), 3);
}

#[test]
fn damaged_entry_lines_surface_as_staleness_not_errors() {
    let dir = tempdir().unwrap();
    let path = CacheLedger::path_for(dir.path(), "someone");
    fs::create_dir_all(dir.path()).unwrap();
    let key = cache_key("me/alpha");
    fs::write(&path, format!("{key} 5 bogus 100 20\n")).unwrap();

    let ledger = CacheLedger::load_or_create(dir.path(), "someone", 0).unwrap();
    let entry = &ledger.entries()[0];
    assert_eq!(entry.key, key);
    assert_eq!(entry.total_commits, 0);
}
