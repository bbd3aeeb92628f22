use crate::error::{Result, TallyError};
use crate::model::{RepoListing, RepoRef, HISTORY_PAGE_SIZE, REPO_PAGE_SIZE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";

const USER_ID_QUERY: &str = "
query($login: String!) {
    user(login: $login) { id }
}";

const REPO_LIST_QUERY: &str = "
query($affiliations: [RepositoryAffiliation], $login: String!, $count: Int!, $cursor: String) {
    user(login: $login) {
        repositories(first: $count, after: $cursor, ownerAffiliations: $affiliations) {
            edges {
                node {
                    ... on Repository {
                        nameWithOwner
                        defaultBranchRef {
                            target { ... on Commit { history { totalCount } } }
                        }
                    }
                }
            }
            pageInfo { endCursor hasNextPage }
        }
    }
}";

const HISTORY_QUERY: &str = "
query($owner: String!, $name: String!, $count: Int!, $cursor: String) {
    repository(owner: $owner, name: $name) {
        defaultBranchRef {
            target {
                ... on Commit {
                    history(first: $count, after: $cursor) {
                        edges {
                            node {
                                ... on Commit {
                                    author { user { id } }
                                    additions
                                    deletions
                                }
                            }
                        }
                        pageInfo { endCursor hasNextPage }
                    }
                }
            }
        }
    }
}";

/// One commit's contribution as reported by the history query. `author_id`
/// is `None` when the commit's author has no associated account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDelta {
    pub author_id: Option<String>,
    pub additions: u64,
    pub deletions: u64,
}

/// One page of a repository's default-branch commit history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryPage {
    pub commits: Vec<CommitDelta>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

/// Remote-call counters, one per query category. Incremented on every call
/// issued, including the one that ultimately fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryCounts {
    pub user_lookup: u32,
    pub repo_list: u32,
    pub history: u32,
}

impl QueryCounts {
    pub fn total(&self) -> u32 {
        self.user_lookup + self.repo_list + self.history
    }

    pub fn report(&self) -> [(&'static str, u32); 3] {
        [
            ("user lookup", self.user_lookup),
            ("repo list", self.repo_list),
            ("commit history", self.history),
        ]
    }
}

/// The engine's view of the remote API. The reconciler and walker depend on
/// this seam only, so tests drive them with a scripted implementation.
pub trait RepoSource {
    /// Resolve a login to the opaque author id used for commit matching.
    fn user_id(&mut self, login: &str) -> Result<String>;

    /// Enumerate every repository the user can access under the given
    /// affiliations, with each repository's live default-branch commit
    /// count (`None` for an empty repository).
    fn list_repositories(&mut self, login: &str, affiliations: &[String]) -> Result<Vec<RepoListing>>;

    /// Fetch one page of a repository's default-branch commit history.
    /// An empty repository yields an empty page with `has_next_page == false`.
    fn history_page(&mut self, owner: &str, name: &str, cursor: Option<&str>) -> Result<HistoryPage>;
}

pub struct GitHubClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    token: String,
    counts: QueryCounts,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
    #[serde(rename = "hasNextPage")]
    has_next_page: bool,
}

impl GitHubClient {
    pub fn new(token: String) -> Result<Self> {
        Self::with_endpoint(token, DEFAULT_ENDPOINT)
    }

    /// Endpoint override for tests pointed at a local server.
    pub fn with_endpoint(token: String, endpoint: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("loctally/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            token,
            counts: QueryCounts::default(),
        })
    }

    pub fn query_counts(&self) -> QueryCounts {
        self.counts
    }

    fn post(&self, name: &'static str, query: &str, variables: Value) -> Result<Value> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            // 403 here is the undocumented anti-abuse limit, not a
            // permission failure; treat it like 429.
            if status.as_u16() == 403 || status.as_u16() == 429 {
                return Err(TallyError::RateLimited {
                    status: status.as_u16(),
                    body,
                });
            }
            return Err(TallyError::Api {
                query: name,
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json()?;
        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(TallyError::Api {
                    query: name,
                    status: status.as_u16(),
                    body: serde_json::to_string(errors)?,
                });
            }
        }
        Ok(body)
    }
}

impl RepoSource for GitHubClient {
    fn user_id(&mut self, login: &str) -> Result<String> {
        self.counts.user_lookup += 1;
        let body = self.post("user_id", USER_ID_QUERY, json!({ "login": login }))?;
        body.pointer("/data/user/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TallyError::Parse(format!("no such user: {login}")))
    }

    fn list_repositories(&mut self, login: &str, affiliations: &[String]) -> Result<Vec<RepoListing>> {
        let mut listings = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            self.counts.repo_list += 1;
            let body = self.post(
                "list_repositories",
                REPO_LIST_QUERY,
                json!({
                    "affiliations": affiliations,
                    "login": login,
                    "count": REPO_PAGE_SIZE,
                    "cursor": cursor,
                }),
            )?;

            let repos = body
                .pointer("/data/user/repositories")
                .ok_or_else(|| TallyError::Parse("malformed repository listing".into()))?;

            for edge in repos.get("edges").and_then(Value::as_array).into_iter().flatten() {
                let Some(full_name) = edge.pointer("/node/nameWithOwner").and_then(Value::as_str)
                else {
                    continue;
                };
                let total_commits = edge
                    .pointer("/node/defaultBranchRef/target/history/totalCount")
                    .and_then(Value::as_u64);
                listings.push(RepoListing {
                    repo: RepoRef::new(full_name),
                    total_commits,
                });
            }

            let page: PageInfo = serde_json::from_value(
                repos
                    .get("pageInfo")
                    .cloned()
                    .ok_or_else(|| TallyError::Parse("repository listing missing pageInfo".into()))?,
            )?;
            if !page.has_next_page {
                return Ok(listings);
            }
            cursor = page.end_cursor;
        }
    }

    fn history_page(&mut self, owner: &str, name: &str, cursor: Option<&str>) -> Result<HistoryPage> {
        self.counts.history += 1;
        let body = self.post(
            "history_page",
            HISTORY_QUERY,
            json!({
                "owner": owner,
                "name": name,
                "count": HISTORY_PAGE_SIZE,
                "cursor": cursor,
            }),
        )?;

        // A null defaultBranchRef means the repository is empty; report an
        // exhausted page rather than an error.
        let Some(history) = body.pointer("/data/repository/defaultBranchRef/target/history") else {
            return Ok(HistoryPage::default());
        };

        let mut commits = Vec::new();
        for edge in history.get("edges").and_then(Value::as_array).into_iter().flatten() {
            let node = &edge["node"];
            commits.push(CommitDelta {
                author_id: node
                    .pointer("/author/user/id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                additions: node.get("additions").and_then(Value::as_u64).unwrap_or(0),
                deletions: node.get("deletions").and_then(Value::as_u64).unwrap_or(0),
            });
        }

        let page: PageInfo = serde_json::from_value(
            history
                .get("pageInfo")
                .cloned()
                .ok_or_else(|| TallyError::Parse("commit history missing pageInfo".into()))?,
        )?;

        Ok(HistoryPage {
            commits,
            end_cursor: page.end_cursor,
            has_next_page: page.has_next_page,
        })
    }
}
