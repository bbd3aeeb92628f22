use crate::error::Result;
use crate::github::RepoSource;
use crate::model::{RepoRef, WalkTotals};

/// Walk every page of `repo`'s default-branch history, accumulating
/// additions, deletions, and commit count for commits authored by
/// `author_id`. Pages are fetched until the API reports no further page;
/// failures propagate to the caller unretried so it can flush cache state.
pub fn walk_repo<C: RepoSource>(client: &mut C, repo: &RepoRef, author_id: &str) -> Result<WalkTotals> {
    let mut totals = WalkTotals::default();
    let mut cursor: Option<String> = None;

    loop {
        let page = client.history_page(&repo.owner, &repo.name, cursor.as_deref())?;

        for commit in &page.commits {
            if commit.author_id.as_deref() == Some(author_id) {
                totals.my_commits += 1;
                totals.additions += commit.additions;
                totals.deletions += commit.deletions;
            }
        }

        if page.commits.is_empty() || !page.has_next_page {
            return Ok(totals);
        }
        cursor = page.end_cursor;
    }
}
