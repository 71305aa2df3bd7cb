use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Account type reported by `GET /users/{login}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    User,
    Bot,
}

impl ActorKind {
    /// Anything other than `Bot` is checked as a user.
    pub fn from_api_type(raw: &str) -> Self {
        if raw == "Bot" { Self::Bot } else { Self::User }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActorKind::User => "User",
            ActorKind::Bot => "Bot",
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserRecord {
    #[serde(rename = "type")]
    pub(crate) kind: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InstallationRecord {
    #[serde(default)]
    pub(crate) permissions: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CollaboratorPermissionRecord {
    pub(crate) permission: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdRecord {
    pub(crate) id: u64,
}

// ── REST pull request ──

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestDetails {
    pub head: PullRequestHead,
    pub base: PullRequestBase,
    #[serde(default)]
    pub draft: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestHead {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Absent when the head repository was deleted.
    #[serde(default)]
    pub repo: Option<HeadRepository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadRepository {
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestBase {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

// ── GraphQL pull request ──

/// Aggregate review state GitHub computes for a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approved,
    ReviewRequired,
    ChangesRequested,
}

impl ReviewDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewDecision::Approved => "APPROVED",
            ReviewDecision::ReviewRequired => "REVIEW_REQUIRED",
            ReviewDecision::ChangesRequested => "CHANGES_REQUESTED",
        }
    }
}

/// `statusCheckRollup.state` of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusState {
    Error,
    Expected,
    Failure,
    Pending,
    Success,
}

impl StatusState {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusState::Error => "ERROR",
            StatusState::Expected => "EXPECTED",
            StatusState::Failure => "FAILURE",
            StatusState::Pending => "PENDING",
            StatusState::Success => "SUCCESS",
        }
    }
}

/// `repository.pullRequest` from the review/CI query. Every level below the
/// review decision may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestState {
    #[serde(default)]
    pub review_decision: Option<ReviewDecision>,
    #[serde(default)]
    pub commits: Option<CommitConnection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitConnection {
    #[serde(default)]
    pub nodes: Option<Vec<Option<CommitNode>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitNode {
    #[serde(default)]
    pub commit: Option<CommitFacts>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitFacts {
    #[serde(default, deserialize_with = "lenient")]
    pub check_suites: Option<CheckSuiteCount>,
    #[serde(default, deserialize_with = "lenient")]
    pub status_check_rollup: Option<StatusRollup>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSuiteCount {
    #[serde(default)]
    pub total_count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusRollup {
    #[serde(default, deserialize_with = "lenient")]
    pub state: Option<StatusState>,
}

/// CI facts that do not match their expected shape read as `null`, so the
/// decision table sees an undefined value instead of a fetch failure.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}

impl PullRequestState {
    fn last_commit(&self) -> Option<&CommitFacts> {
        self.commits
            .as_ref()?
            .nodes
            .as_ref()?
            .first()?
            .as_ref()?
            .commit
            .as_ref()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlEnvelope {
    #[serde(default)]
    pub(crate) data: Option<GraphqlRepositoryData>,
    #[serde(default)]
    pub(crate) errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlRepositoryData {
    #[serde(default)]
    pub(crate) repository: Option<GraphqlRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphqlRepository {
    #[serde(default)]
    pub(crate) pull_request: Option<PullRequestState>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlError {
    pub(crate) message: String,
}

// ── Hydrated snapshot ──

/// Read-only facts about a pull request, gathered once per evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSnapshot {
    pub head_ref: String,
    pub head_sha: String,
    pub head_label: String,
    pub head_full_name: Option<String>,
    pub base_ref: String,
    pub is_fork: bool,
    pub is_draft: bool,
    pub review_decision: Option<ReviewDecision>,
    /// Check suites on the last commit; `None` when the commit data was missing.
    pub check_suite_count: Option<u64>,
    /// Rollup state of the last commit; `None` when GitHub reported none.
    pub status_rollup: Option<StatusState>,
}

/// Fork coordinates handed to whatever checks the code out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkInfo {
    pub label: String,
    pub ref_name: String,
    /// `<owner>-<branch> <branch>`, the remote/branch pair for checkout.
    pub checkout: String,
    pub full_name: Option<String>,
}

impl PullRequestSnapshot {
    pub fn hydrate(details: PullRequestDetails, state: PullRequestState) -> Self {
        let last_commit = state.last_commit();
        let check_suite_count = last_commit
            .and_then(|commit| commit.check_suites.as_ref())
            .and_then(|suites| suites.total_count);
        let status_rollup = last_commit
            .and_then(|commit| commit.status_check_rollup.as_ref())
            .and_then(|rollup| rollup.state);

        let (is_fork, head_full_name) = match details.head.repo {
            Some(repo) => (repo.fork, repo.full_name),
            None => {
                log::warn!("head repository of PR is gone, treating it as a fork");
                (true, None)
            }
        };

        Self {
            head_label: details
                .head
                .label
                .unwrap_or_else(|| details.head.ref_name.clone()),
            head_ref: details.head.ref_name,
            head_sha: details.head.sha,
            head_full_name,
            base_ref: details.base.ref_name,
            is_fork,
            is_draft: details.draft.unwrap_or(false),
            review_decision: state.review_decision,
            check_suite_count,
            status_rollup,
        }
    }

    pub fn fork_info(&self) -> Option<ForkInfo> {
        if !self.is_fork {
            return None;
        }
        Some(ForkInfo {
            label: self.head_label.clone(),
            ref_name: self.head_ref.clone(),
            checkout: format!("{} {}", self.head_label.replace(':', "-"), self.head_ref),
            full_name: self.head_full_name.clone(),
        })
    }
}

impl fmt::Display for PullRequestSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "head={} sha={} base={} fork={} draft={} review={} suites={} rollup={}",
            self.head_ref,
            self.head_sha,
            self.base_ref,
            self.is_fork,
            self.is_draft,
            self.review_decision.map_or("null", ReviewDecision::as_str),
            self.check_suite_count
                .map_or_else(|| "unknown".to_string(), |n| n.to_string()),
            self.status_rollup.map_or("null", StatusState::as_str),
        )
    }
}
