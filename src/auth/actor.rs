use crate::auth::PermissionResult;
use crate::config::PermissionsConfig;
use crate::github::{ActorKind, GithubApi};

/// Result of [`ActorAuthorizer::authorize`]. `kind` is `None` only when the
/// user lookup itself failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub actor: String,
    pub kind: Option<ActorKind>,
    pub result: PermissionResult,
}

/// Checks the invoking actor against the repository permission threshold,
/// independent of the operator allowlist.
pub struct ActorAuthorizer<'a> {
    api: &'a dyn GithubApi,
    policy: &'a PermissionsConfig,
}

impl<'a> ActorAuthorizer<'a> {
    pub fn new(api: &'a dyn GithubApi, policy: &'a PermissionsConfig) -> Self {
        Self { api, policy }
    }

    pub async fn authorize(&self, actor: &str) -> Authorization {
        log::info!("authorizing actor {actor}");

        let kind = match self.api.actor_kind(actor).await.found() {
            Ok(kind) => kind,
            Err(failure) => {
                return Authorization {
                    actor: actor.to_string(),
                    kind: None,
                    result: PermissionResult::Error(format!(
                        "Fetch user details returns non-200 status: {failure}"
                    )),
                };
            }
        };
        log::info!("detected actor type: {} ({actor})", kind.as_str());

        let result = match kind {
            ActorKind::Bot => self.authorize_bot(actor).await,
            ActorKind::User => self.authorize_user(actor).await,
        };
        Authorization {
            actor: actor.to_string(),
            kind: Some(kind),
            result,
        }
    }

    async fn authorize_bot(&self, actor: &str) -> PermissionResult {
        if !self.policy.allow_bots {
            return PermissionResult::Denied(format!(
                "👋 __{actor}__ is a GitHub App and bot actors are not permitted to run this command"
            ));
        }

        let permissions = match self.api.installation_permissions().await.found() {
            Ok(permissions) => permissions,
            Err(failure) => {
                return PermissionResult::Error(format!(
                    "Failed to fetch GitHub App installation details: Status {failure}"
                ));
            }
        };

        let key = &self.policy.bot_permission;
        let required = &self.policy.bot_access;
        if permissions.get(key) == Some(required) {
            return PermissionResult::Allowed;
        }
        let current = serde_json::to_string(&permissions).unwrap_or_default();
        PermissionResult::Denied(format!(
            "👋 __{actor}__ does not have \"{key}\" permission set to \"{required}\". Current permissions: {current}"
        ))
    }

    async fn authorize_user(&self, actor: &str) -> PermissionResult {
        let level = match self.api.collaborator_permission(actor).await.found() {
            Ok(level) => level,
            Err(failure) => {
                return PermissionResult::Error(format!(
                    "Permission check returns non-200 status: {failure}"
                ));
            }
        };

        if self
            .policy
            .allowed
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&level))
        {
            log::debug!("{actor} has {level} permission - OK");
            return PermissionResult::Allowed;
        }
        PermissionResult::Denied(format!(
            "👋 __{actor}__, seems as if you have not {} permissions in this repo, permissions: {level}",
            self.policy.allowed.join("/")
        ))
    }
}
