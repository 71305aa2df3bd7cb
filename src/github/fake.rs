//! In-memory [`GithubApi`] for unit tests. Unset answers are 404s.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ActorKind, GithubApi, Lookup, PullRequestDetails, PullRequestState};

#[derive(Default)]
pub(crate) struct FakeGithub {
    pub(crate) actor_kinds: HashMap<String, Lookup<ActorKind>>,
    pub(crate) installation: Option<Lookup<BTreeMap<String, String>>>,
    pub(crate) permissions: HashMap<String, Lookup<String>>,
    pub(crate) orgs: HashMap<String, Lookup<u64>>,
    pub(crate) teams: HashMap<(String, String), Lookup<u64>>,
    pub(crate) members: HashMap<(u64, u64, String), Lookup<()>>,
    pub(crate) pull: Option<Lookup<PullRequestDetails>>,
    pub(crate) pull_state: Option<Lookup<PullRequestState>>,
    calls: Mutex<Vec<String>>,
}

impl FakeGithub {
    pub(crate) fn user(mut self, login: &str, level: &str) -> Self {
        self.actor_kinds
            .insert(login.into(), Lookup::Found(ActorKind::User));
        self.permissions
            .insert(login.into(), Lookup::Found(level.into()));
        self
    }

    pub(crate) fn bot(mut self, login: &str, permissions: &[(&str, &str)]) -> Self {
        self.actor_kinds
            .insert(login.into(), Lookup::Found(ActorKind::Bot));
        self.installation = Some(Lookup::Found(
            permissions
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        self
    }

    pub(crate) fn team(mut self, org: &str, org_id: u64, team: &str, team_id: u64) -> Self {
        self.orgs.insert(org.into(), Lookup::Found(org_id));
        self.teams
            .insert((org.into(), team.into()), Lookup::Found(team_id));
        self
    }

    pub(crate) fn member(mut self, org_id: u64, team_id: u64, login: &str) -> Self {
        self.members
            .insert((org_id, team_id, login.into()), Lookup::Found(()));
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|call| call.starts_with(prefix))
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl GithubApi for FakeGithub {
    async fn actor_kind(&self, login: &str) -> Lookup<ActorKind> {
        self.record(format!("user {login}"));
        self.actor_kinds
            .get(login)
            .cloned()
            .unwrap_or(Lookup::NotFound)
    }

    async fn installation_permissions(&self) -> Lookup<BTreeMap<String, String>> {
        self.record("installation".into());
        self.installation.clone().unwrap_or(Lookup::NotFound)
    }

    async fn collaborator_permission(&self, login: &str) -> Lookup<String> {
        self.record(format!("permission {login}"));
        self.permissions
            .get(login)
            .cloned()
            .unwrap_or(Lookup::NotFound)
    }

    async fn organization_id(&self, org: &str) -> Lookup<u64> {
        self.record(format!("org {org}"));
        self.orgs.get(org).cloned().unwrap_or(Lookup::NotFound)
    }

    async fn team_id(&self, org: &str, team_slug: &str) -> Lookup<u64> {
        self.record(format!("team {org}/{team_slug}"));
        self.teams
            .get(&(org.to_string(), team_slug.to_string()))
            .cloned()
            .unwrap_or(Lookup::NotFound)
    }

    async fn team_membership(&self, org_id: u64, team_id: u64, login: &str) -> Lookup<()> {
        self.record(format!("member {org_id}/{team_id}/{login}"));
        self.members
            .get(&(org_id, team_id, login.to_string()))
            .cloned()
            .unwrap_or(Lookup::NotFound)
    }

    async fn pull_request(&self, number: u64) -> Lookup<PullRequestDetails> {
        self.record(format!("pull {number}"));
        self.pull.clone().unwrap_or(Lookup::NotFound)
    }

    async fn pull_request_state(&self, number: u64) -> Lookup<PullRequestState> {
        self.record(format!("graphql {number}"));
        self.pull_state.clone().unwrap_or(Lookup::NotFound)
    }
}
