use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::types::{
    CollaboratorPermissionRecord, GraphqlEnvelope, IdRecord, InstallationRecord, UserRecord,
};
use super::{
    ActorKind, FetchFailure, GithubApi, Lookup, PullRequestDetails, PullRequestState, RepoRef,
};
use crate::error::{GateError, Result};

const PULL_REQUEST_STATE_QUERY: &str = r#"query($owner:String!, $name:String!, $number:Int!) {
  repository(owner:$owner, name:$name) {
    pullRequest(number:$number) {
      reviewDecision
      commits(last: 1) {
        nodes {
          commit {
            checkSuites { totalCount }
            statusCheckRollup { state }
          }
        }
      }
    }
  }
}"#;

const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// reqwest-backed [`GithubApi`] scoped to one repository.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    graphql_url: String,
    repo: RepoRef,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl GithubClient {
    pub fn new(
        api_base: &str,
        token: &str,
        repo: RepoRef,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("issueops-gate"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_header)
                .map_err(|_| GateError::Config("invalid github authorization header".into()))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()?;
        let api_base = api_base.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            graphql_url: graphql_url_for(&api_base),
            api_base,
            repo,
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{path}",
            self.api_base, self.repo.owner, self.repo.name
        )
    }

    /// Send with retry on 429/5xx and on connect/timeout errors.
    /// Any response that is not retried is returned as-is.
    async fn send<F>(
        &self,
        operation: &str,
        mut request_builder: F,
    ) -> std::result::Result<reqwest::Response, FetchFailure>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            match request_builder().send().await {
                Ok(response) => {
                    let status = response.status();
                    if attempt < self.retry_max_attempts && is_retryable_status(status.as_u16()) {
                        let delay = retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            parse_retry_after(response.headers()),
                        );
                        log::debug!("github {operation} returned {status}, retrying in {delay:?}");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts
                        && (error.is_timeout() || error.is_connect())
                    {
                        let delay = retry_delay(self.retry_base_delay_ms, attempt, None);
                        log::debug!("github {operation} request failed ({error}), retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(FetchFailure::Transport(error.to_string()));
                }
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &str, url: String) -> Lookup<T> {
        match self.send(operation, || self.http.get(&url)).await {
            Ok(response) => decode(operation, response).await,
            Err(failure) => Lookup::Failed(failure),
        }
    }
}

async fn decode<T: DeserializeOwned>(operation: &str, response: reqwest::Response) -> Lookup<T> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Lookup::NotFound;
    }
    if !status.is_success() {
        return Lookup::Failed(FetchFailure::Status(status.as_u16()));
    }
    match response.json::<T>().await {
        Ok(parsed) => Lookup::Found(parsed),
        Err(error) => Lookup::Failed(FetchFailure::Decode(format!("{operation}: {error}"))),
    }
}

/// REST base → GraphQL endpoint. GHES serves REST under `/api/v3` and
/// GraphQL under `/api/graphql`.
fn graphql_url_for(api_base: &str) -> String {
    match api_base.strip_suffix("/api/v3") {
        Some(host) => format!("{host}/api/graphql"),
        None => format!("{api_base}/graphql"),
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    if let Some(retry_after) = retry_after {
        return retry_after.min(Duration::from_millis(MAX_RETRY_DELAY_MS));
    }
    let exponent = attempt.saturating_sub(1).min(16) as u32;
    let delay = base_delay_ms.saturating_mul(1_u64 << exponent);
    Duration::from_millis(delay.min(MAX_RETRY_DELAY_MS))
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn actor_kind(&self, login: &str) -> Lookup<ActorKind> {
        let url = format!("{}/users/{login}", self.api_base);
        self.get_json::<UserRecord>("fetch user", url)
            .await
            .map(|user| ActorKind::from_api_type(&user.kind))
    }

    async fn installation_permissions(&self) -> Lookup<BTreeMap<String, String>> {
        self.get_json::<InstallationRecord>("fetch installation", self.repo_url("/installation"))
            .await
            .map(|installation| installation.permissions)
    }

    async fn collaborator_permission(&self, login: &str) -> Lookup<String> {
        let url = self.repo_url(&format!("/collaborators/{login}/permission"));
        self.get_json::<CollaboratorPermissionRecord>("fetch collaborator permission", url)
            .await
            .map(|record| record.permission)
    }

    async fn organization_id(&self, org: &str) -> Lookup<u64> {
        let url = format!("{}/orgs/{org}", self.api_base);
        self.get_json::<IdRecord>("fetch organization", url)
            .await
            .map(|record| record.id)
    }

    async fn team_id(&self, org: &str, team_slug: &str) -> Lookup<u64> {
        let url = format!("{}/orgs/{org}/teams/{team_slug}", self.api_base);
        self.get_json::<IdRecord>("fetch team", url)
            .await
            .map(|record| record.id)
    }

    async fn team_membership(&self, org_id: u64, team_id: u64, login: &str) -> Lookup<()> {
        let url = format!(
            "{}/organizations/{org_id}/team/{team_id}/members/{login}",
            self.api_base
        );
        match self.send("check team membership", || self.http.get(&url)).await {
            Ok(response) => match response.status() {
                StatusCode::NO_CONTENT => Lookup::Found(()),
                StatusCode::NOT_FOUND => Lookup::NotFound,
                status => Lookup::Failed(FetchFailure::Status(status.as_u16())),
            },
            Err(failure) => Lookup::Failed(failure),
        }
    }

    async fn pull_request(&self, number: u64) -> Lookup<PullRequestDetails> {
        self.get_json("fetch pull request", self.repo_url(&format!("/pulls/{number}")))
            .await
    }

    async fn pull_request_state(&self, number: u64) -> Lookup<PullRequestState> {
        let payload = json!({
            "query": PULL_REQUEST_STATE_QUERY,
            "variables": {
                "owner": self.repo.owner,
                "name": self.repo.name,
                "number": number,
            }
        });
        let response = self
            .send("query pull request state", || {
                self.http
                    .post(&self.graphql_url)
                    .header(ACCEPT, "application/vnd.github.merge-info-preview+json")
                    .json(&payload)
            })
            .await;
        let envelope = match response {
            Ok(response) => decode::<GraphqlEnvelope>("query pull request state", response).await,
            Err(failure) => return Lookup::Failed(failure),
        };
        let envelope = match envelope {
            Lookup::Found(envelope) => envelope,
            Lookup::NotFound => return Lookup::NotFound,
            Lookup::Failed(failure) => return Lookup::Failed(failure),
        };

        let pull_request = envelope
            .data
            .and_then(|data| data.repository)
            .and_then(|repository| repository.pull_request);
        match (pull_request, envelope.errors.first()) {
            (Some(state), _) => Lookup::Found(state),
            (None, Some(error)) => Lookup::Failed(FetchFailure::Decode(error.message.clone())),
            (None, None) => Lookup::NotFound,
        }
    }
}
