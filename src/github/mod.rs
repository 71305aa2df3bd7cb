//! GitHub platform access: the [`GithubApi`] seam, the three-way [`Lookup`]
//! result every call returns, and the reqwest-backed [`GithubClient`].

/// reqwest implementation of [`GithubApi`] with bounded retry.
pub mod client;
/// Wire types and the typed [`PullRequestSnapshot`](types::PullRequestSnapshot).
pub mod types;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;

use crate::error::{GateError, Result};

pub use client::GithubClient;
pub use types::{
    ActorKind, ForkInfo, PullRequestDetails, PullRequestSnapshot, PullRequestState,
    ReviewDecision, StatusState,
};

/// `owner/name` of the repository the command was issued in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(GateError::Config(format!(
                "invalid repository '{trimmed}': expected owner/repo"
            ))),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Why a lookup produced no value (other than a plain 404).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Non-success HTTP status after retries.
    Status(u16),
    /// The request never produced a response.
    Transport(String),
    /// A success response whose body did not have the expected shape.
    Decode(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Status(status) => write!(f, "{status}"),
            FetchFailure::Transport(message) => write!(f, "transport error ({message})"),
            FetchFailure::Decode(message) => write!(f, "malformed response ({message})"),
        }
    }
}

/// Result of one platform lookup.
///
/// `NotFound` is a normal answer (a 404), kept apart from real failures so
/// callers branch on the tag instead of sniffing status codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Failed(FetchFailure),
}

impl<T> Lookup<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Failed(failure) => Lookup::Failed(failure),
        }
    }

    /// Collapse into a `Result`, reporting a 404 as `Status(404)`.
    pub fn found(self) -> std::result::Result<T, FetchFailure> {
        match self {
            Lookup::Found(value) => Ok(value),
            Lookup::NotFound => Err(FetchFailure::Status(404)),
            Lookup::Failed(failure) => Err(failure),
        }
    }
}

/// Read-only platform calls the gate depends on.
///
/// Repository-scoped calls target the repository the implementation was
/// built for.
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// `GET /users/{login}` → `type`.
    async fn actor_kind(&self, login: &str) -> Lookup<ActorKind>;

    /// `GET /repos/{owner}/{repo}/installation` → `permissions`.
    async fn installation_permissions(&self) -> Lookup<BTreeMap<String, String>>;

    /// `GET /repos/{owner}/{repo}/collaborators/{login}/permission` → `permission`.
    async fn collaborator_permission(&self, login: &str) -> Lookup<String>;

    /// `GET /orgs/{org}` → `id`.
    async fn organization_id(&self, org: &str) -> Lookup<u64>;

    /// `GET /orgs/{org}/teams/{team_slug}` → `id`.
    async fn team_id(&self, org: &str, team_slug: &str) -> Lookup<u64>;

    /// `GET /organizations/{org_id}/team/{team_id}/members/{login}`; 204 means member.
    async fn team_membership(&self, org_id: u64, team_id: u64, login: &str) -> Lookup<()>;

    /// `GET /repos/{owner}/{repo}/pulls/{number}`.
    async fn pull_request(&self, number: u64) -> Lookup<PullRequestDetails>;

    /// GraphQL review decision and last-commit CI rollup.
    async fn pull_request_state(&self, number: u64) -> Lookup<PullRequestState>;
}

#[cfg(test)]
pub(crate) mod fake;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_ref_parse_accepts_owner_repo_shape() {
        let repo = RepoRef::parse("corp/app").unwrap();
        assert_eq!(repo.owner, "corp");
        assert_eq!(repo.name, "app");
        assert_eq!(repo.to_string(), "corp/app");
    }

    #[test]
    fn repo_ref_parse_rejects_other_shapes() {
        for raw in ["missing", "/app", "corp/", "a/b/c", ""] {
            let err = RepoRef::parse(raw).unwrap_err();
            assert!(err.to_string().contains("expected owner/repo"), "{raw}");
        }
    }

    #[test]
    fn lookup_found_maps_not_found_to_404() {
        assert_eq!(Lookup::<u8>::NotFound.found(), Err(FetchFailure::Status(404)));
        assert_eq!(Lookup::Found(3).map(|v| v * 2).found(), Ok(6));
        let failed: Lookup<u8> = Lookup::Failed(FetchFailure::Status(502));
        assert_eq!(failed.found(), Err(FetchFailure::Status(502)));
    }

    #[test]
    fn fetch_failure_display() {
        assert_eq!(FetchFailure::Status(500).to_string(), "500");
        assert_eq!(
            FetchFailure::Transport("connection refused".into()).to_string(),
            "transport error (connection refused)"
        );
    }
}
