use std::collections::HashSet;

use crate::auth::username::{is_valid_team_slug, is_valid_username};
use crate::github::{GithubApi, Lookup};

/// One configured operator reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AllowlistEntry {
    Handle(String),
    OrgTeam { org: String, team: String },
}

impl AllowlistEntry {
    /// Parse one trimmed, lowercased entry. Invalid syntax yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let entry = raw.trim().to_ascii_lowercase();
        if entry.is_empty() {
            return None;
        }
        if let Some((org, team)) = entry.split_once('/') {
            if is_valid_username(org) && is_valid_team_slug(team) {
                return Some(AllowlistEntry::OrgTeam {
                    org: org.to_string(),
                    team: team.to_string(),
                });
            }
            log::debug!("{entry} is not a valid org/team reference... skipping allowlist check");
            return None;
        }
        let handle = entry.strip_prefix('@').unwrap_or(&entry);
        if is_valid_username(handle) {
            return Some(AllowlistEntry::Handle(handle.to_string()));
        }
        log::debug!("{entry} is not a valid GitHub username... skipping allowlist check");
        None
    }
}

/// Parsed operator allowlist: a handle set plus org/team pairs in
/// configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlist {
    handles: HashSet<String>,
    org_teams: Vec<(String, String)>,
}

impl Allowlist {
    /// Parse configured entries. Each entry may itself be a comma-separated list.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Self {
        let mut allowlist = Allowlist::default();
        for entry in entries.iter().flat_map(|e| e.as_ref().split(',')) {
            match AllowlistEntry::parse(entry) {
                Some(AllowlistEntry::Handle(handle)) => {
                    allowlist.handles.insert(handle);
                }
                Some(AllowlistEntry::OrgTeam { org, team }) => {
                    if !allowlist
                        .org_teams
                        .iter()
                        .any(|(o, t)| *o == org && *t == team)
                    {
                        allowlist.org_teams.push((org, team));
                    }
                }
                None => {}
            }
        }
        allowlist
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty() && self.org_teams.is_empty()
    }

    pub fn has_handle(&self, actor: &str) -> bool {
        let actor = actor.trim().trim_start_matches('@').to_ascii_lowercase();
        self.handles.contains(&actor)
    }

    pub fn org_teams(&self) -> &[(String, String)] {
        &self.org_teams
    }
}

/// Decides whether an actor is an allowlisted operator. Never fails: every
/// lookup problem degrades to "not allowlisted".
pub struct AllowlistResolver<'a> {
    allowlist: Allowlist,
    /// Client built from the elevated credential, if one is configured.
    org_api: Option<&'a dyn GithubApi>,
}

impl<'a> AllowlistResolver<'a> {
    pub fn new(allowlist: Allowlist, org_api: Option<&'a dyn GithubApi>) -> Self {
        Self { allowlist, org_api }
    }

    pub async fn is_allowlisted(&self, actor: &str) -> bool {
        if self.allowlist.has_handle(actor) {
            log::debug!("{actor} is an allowlisted operator via handle reference");
            return true;
        }

        if !self.allowlist.org_teams().is_empty() && self.is_team_member(actor).await {
            log::debug!("{actor} is an allowlisted operator via org team reference");
            return true;
        }

        log::debug!("{actor} is not an allowed operator for this command");
        false
    }

    async fn is_team_member(&self, actor: &str) -> bool {
        let Some(api) = self.org_api else {
            log::warn!(
                "no allowlist token provided, skipping allowlist check for org team membership"
            );
            return false;
        };

        for (org, team) in self.allowlist.org_teams() {
            let org_team = format!("{org}/{team}");

            let org_id = match api.organization_id(org).await {
                Lookup::Found(id) => id,
                Lookup::NotFound => {
                    log::debug!("{actor} is not a member of the {org_team} team (org not found)");
                    continue;
                }
                Lookup::Failed(failure) => {
                    log::warn!("Error checking org team membership for {org_team}: {failure}");
                    continue;
                }
            };

            let team_id = match api.team_id(org, team).await {
                Lookup::Found(id) => id,
                Lookup::NotFound => {
                    log::debug!("{actor} is not a member of the {org_team} team (team not found)");
                    continue;
                }
                Lookup::Failed(failure) => {
                    log::warn!("Error checking org team membership for {org_team}: {failure}");
                    continue;
                }
            };

            match api.team_membership(org_id, team_id, actor).await {
                Lookup::Found(()) => {
                    log::debug!("{actor} is in {org_team}");
                    return true;
                }
                Lookup::NotFound => {
                    log::debug!("{actor} is not a member of the {org_team} team");
                }
                Lookup::Failed(failure) => {
                    log::warn!("non 204 response from org team check for {org_team}: {failure}");
                }
            }
        }
        false
    }
}
