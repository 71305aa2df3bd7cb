pub mod context;
pub mod decision;
pub mod policy;
pub mod table;

pub use context::{COMMENT_EVENT, CommentEvent, ContextCheck, ContextType, classify};
pub use decision::Decision;
pub use policy::{PolicyEvaluator, PolicyInputs};

use crate::auth::{ActorAuthorizer, Allowlist, AllowlistResolver, Authorization};
use crate::command;
use crate::config::PolicyConfig;
use crate::error::{GateError, Result};
use crate::github::{GithubApi, PullRequestSnapshot};

/// One command invocation: the event plus the trigger settings.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub event: &'a CommentEvent,
    pub actor: &'a str,
    pub command: &'a str,
    pub param_separator: &'a str,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not ours to decide (wrong context or no trigger). Not a failure.
    SafeExit(String),
    Decided(Decision),
}

/// Everything a run learned, for outputs, saved state and the decision log.
#[derive(Debug, Clone)]
pub struct Report {
    /// Resolved context type, or the raw event name when rejected.
    pub context: String,
    pub triggered: bool,
    pub outcome: Outcome,
    pub comment_id: Option<u64>,
    pub comment_body: Option<String>,
    /// Login of the comment author.
    pub actor_handle: Option<String>,
    pub params: Option<String>,
    pub authorization: Option<Authorization>,
    pub snapshot: Option<PullRequestSnapshot>,
    pub allowlisted: bool,
}

impl Report {
    fn safe_exit(context: &str, reason: impl Into<String>) -> Self {
        Self {
            context: context.to_string(),
            triggered: false,
            outcome: Outcome::SafeExit(reason.into()),
            comment_id: None,
            comment_body: None,
            actor_handle: None,
            params: None,
            authorization: None,
            snapshot: None,
            allowlisted: false,
        }
    }

    pub fn decision(&self) -> Option<&Decision> {
        match &self.outcome {
            Outcome::Decided(decision) => Some(decision),
            Outcome::SafeExit(_) => None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision().is_some_and(|d| d.allowed)
    }

    /// Suppress the completion step. Only an allowed run leaves it to `post`;
    /// denials are reported in-line.
    pub fn bypass(&self) -> bool {
        !self.is_allowed()
    }
}

/// Full pipeline: context → trigger → actor → snapshot → allowlist → policy.
pub struct Gate<'a> {
    config: &'a PolicyConfig,
    api: &'a dyn GithubApi,
    /// Client holding the elevated allowlist credential, if configured.
    org_api: Option<&'a dyn GithubApi>,
}

impl<'a> Gate<'a> {
    pub fn new(
        config: &'a PolicyConfig,
        api: &'a dyn GithubApi,
        org_api: Option<&'a dyn GithubApi>,
    ) -> Self {
        Self {
            config,
            api,
            org_api,
        }
    }

    /// Run one invocation. Errors only for a payload that is missing the
    /// fields a valid comment event must carry.
    pub async fn run(&self, invocation: &Invocation<'_>) -> Result<Report> {
        let event = invocation.event;
        let context = match classify(event, &self.config.contexts.allowed) {
            ContextCheck::Valid(context) => context,
            ContextCheck::Invalid { context, reason } => {
                return Ok(Report::safe_exit(&context, reason));
            }
        };

        let comment = event
            .payload
            .comment
            .as_ref()
            .ok_or_else(|| GateError::Event("comment event without a comment".into()))?;
        let body = comment.body.as_deref().unwrap_or_default().trim();

        if !command::is_triggered(body, invocation.command) {
            log::info!("no command detected in comment - exiting");
            return Ok(Report::safe_exit(
                context.as_str(),
                "no command detected in comment",
            ));
        }

        let number = event
            .payload
            .issue
            .as_ref()
            .map(|issue| issue.number)
            .ok_or_else(|| GateError::Event("comment event without an issue".into()))?;

        let mut report = Report {
            context: context.as_str().to_string(),
            triggered: true,
            outcome: Outcome::SafeExit(String::new()),
            comment_id: Some(comment.id),
            comment_body: Some(body.to_string()),
            actor_handle: comment.user.as_ref().map(|user| user.login.clone()),
            params: command::parameters(body, invocation.param_separator),
            authorization: None,
            snapshot: None,
            allowlisted: false,
        };

        let authorization = ActorAuthorizer::new(self.api, &self.config.permissions)
            .authorize(invocation.actor)
            .await;
        let permission = authorization.result.clone();
        report.authorization = Some(authorization);
        if let Some(message) = permission.message() {
            report.outcome = Outcome::Decided(Decision::deny(message));
            return Ok(report);
        }

        let evaluator = PolicyEvaluator::new(&self.config.pull_request);
        if context == ContextType::Issue {
            report.outcome = Outcome::Decided(evaluator.evaluate(&PolicyInputs {
                context,
                snapshot: None,
                allowlisted: false,
            }));
            return Ok(report);
        }

        let snapshot = match self.fetch_snapshot(number).await {
            Ok(snapshot) => snapshot,
            Err(message) => {
                report.outcome = Outcome::Decided(Decision::deny(message));
                return Ok(report);
            }
        };
        log::debug!("pull request #{number}: {snapshot}");
        if let Some(fork) = snapshot.fork_info() {
            log::info!(
                "fork detected: label={} ref={} checkout={}",
                fork.label,
                fork.ref_name,
                fork.checkout
            );
        }

        // Operators only matter when a review is still outstanding.
        let raw_review = table::EffectiveReview::from_raw(snapshot.review_decision);
        report.allowlisted =
            raw_review.is_outstanding() && self.is_allowlisted(invocation.actor).await;

        let decision = evaluator.evaluate(&PolicyInputs {
            context,
            snapshot: Some(&snapshot),
            allowlisted: report.allowlisted,
        });
        report.snapshot = Some(snapshot);
        report.outcome = Outcome::Decided(decision);
        Ok(report)
    }

    async fn fetch_snapshot(&self, number: u64) -> std::result::Result<PullRequestSnapshot, String> {
        let details = self
            .api
            .pull_request(number)
            .await
            .found()
            .map_err(|failure| format!("Could not retrieve PR info: {failure}"))?;
        let state = self
            .api
            .pull_request_state(number)
            .await
            .found()
            .map_err(|failure| format!("Could not retrieve PR info: {failure}"))?;
        Ok(PullRequestSnapshot::hydrate(details, state))
    }

    async fn is_allowlisted(&self, actor: &str) -> bool {
        let allowlist = Allowlist::parse(&self.config.allowlist.operators);
        if allowlist.is_empty() {
            return false;
        }
        AllowlistResolver::new(allowlist, self.org_api)
            .is_allowlisted(actor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::fake::FakeGithub;
    use crate::github::{FetchFailure, Lookup, PullRequestDetails, PullRequestState};
    use serde_json::json;

    fn pr_event(body: &str) -> CommentEvent {
        CommentEvent::from_json(
            COMMENT_EVENT,
            &json!({
                "comment": {"id": 42, "body": body, "user": {"login": "monalisa"}},
                "issue": {"number": 7, "pull_request": {"url": "https://api.github.test/pulls/7"}}
            })
            .to_string(),
        )
        .unwrap()
    }

    fn issue_event(body: &str) -> CommentEvent {
        CommentEvent::from_json(
            COMMENT_EVENT,
            &json!({
                "comment": {"id": 42, "body": body, "user": {"login": "monalisa"}},
                "issue": {"number": 7}
            })
            .to_string(),
        )
        .unwrap()
    }

    fn details(fork: bool) -> PullRequestDetails {
        serde_json::from_value(json!({
            "head": {
                "ref": "feature",
                "sha": "abc123",
                "label": "octocat:feature",
                "repo": {"fork": fork, "full_name": "octocat/app"}
            },
            "base": {"ref": "main"},
            "draft": false
        }))
        .unwrap()
    }

    fn state(review: Option<&str>, rollup: &str) -> PullRequestState {
        serde_json::from_value(json!({
            "reviewDecision": review,
            "commits": {"nodes": [{"commit": {
                "checkSuites": {"totalCount": 1},
                "statusCheckRollup": {"state": rollup}
            }}]}
        }))
        .unwrap()
    }

    fn with_pull(mut api: FakeGithub, review: Option<&str>, rollup: &str) -> FakeGithub {
        api.pull = Some(Lookup::Found(details(false)));
        api.pull_state = Some(Lookup::Found(state(review, rollup)));
        api
    }

    async fn run(config: &PolicyConfig, api: &FakeGithub, event: &CommentEvent) -> Report {
        run_with_org(config, api, None, event).await
    }

    async fn run_with_org(
        config: &PolicyConfig,
        api: &FakeGithub,
        org_api: Option<&dyn GithubApi>,
        event: &CommentEvent,
    ) -> Report {
        Gate::new(config, api, org_api)
            .run(&Invocation {
                event,
                actor: "monalisa",
                command: ".deploy",
                param_separator: "|",
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn approved_pull_request_is_allowed_with_target() {
        let config = PolicyConfig::default_config();
        let api = with_pull(
            FakeGithub::default().user("monalisa", "write"),
            Some("APPROVED"),
            "SUCCESS",
        );
        let report = run(&config, &api, &pr_event(".deploy | cpu=2")).await;
        assert!(report.triggered);
        assert!(!report.bypass());
        let decision = report.decision().unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.ref_name.as_deref(), Some("feature"));
        assert_eq!(decision.sha.as_deref(), Some("abc123"));
        assert_eq!(report.params.as_deref(), Some("cpu=2"));
        assert_eq!(report.comment_id, Some(42));
        assert_eq!(report.actor_handle.as_deref(), Some("monalisa"));
        assert_eq!(report.context, "pull_request");
    }

    #[tokio::test]
    async fn issue_context_makes_no_pull_request_fetch() {
        let config = PolicyConfig::default_config();
        let api = FakeGithub::default().user("monalisa", "admin");
        let report = run(&config, &api, &issue_event(".deploy")).await;
        let decision = report.decision().unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.ref_name, None);
        assert!(!api.called("pull"));
        assert!(!api.called("graphql"));
    }

    #[tokio::test]
    async fn untriggered_comment_is_a_safe_exit() {
        let config = PolicyConfig::default_config();
        let api = FakeGithub::default();
        let report = run(&config, &api, &pr_event("I want to .deploy")).await;
        assert!(!report.triggered);
        assert!(report.bypass());
        assert!(matches!(report.outcome, Outcome::SafeExit(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn wrong_event_is_a_safe_exit_with_raw_context() {
        let config = PolicyConfig::default_config();
        let api = FakeGithub::default();
        let event = CommentEvent::from_json("push", "{}").unwrap();
        let report = run(&config, &api, &event).await;
        assert!(report.bypass());
        assert_eq!(report.context, "push");
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn insufficient_permission_denies_before_pull_request_fetch() {
        let config = PolicyConfig::default_config();
        let api = with_pull(
            FakeGithub::default().user("monalisa", "read"),
            Some("APPROVED"),
            "SUCCESS",
        );
        let report = run(&config, &api, &pr_event(".deploy")).await;
        let decision = report.decision().unwrap();
        assert!(!decision.allowed);
        assert!(decision.message.contains("permissions: read"));
        assert!(!api.called("pull"));
    }

    #[tokio::test]
    async fn bot_with_bots_disabled_skips_the_installation_call() {
        let mut config = PolicyConfig::default_config();
        config.permissions.allow_bots = false;
        let mut api = FakeGithub::default().bot("monalisa", &[("issues", "write")]);
        api.pull = Some(Lookup::Found(details(false)));
        let report = run(&config, &api, &pr_event(".deploy")).await;
        assert!(!report.is_allowed());
        assert!(!api.called("installation"));
    }

    #[tokio::test]
    async fn pull_request_fetch_failure_is_a_deny_with_status() {
        let config = PolicyConfig::default_config();
        let mut api = FakeGithub::default().user("monalisa", "write");
        api.pull = Some(Lookup::Failed(FetchFailure::Status(500)));
        let report = run(&config, &api, &pr_event(".deploy")).await;
        let decision = report.decision().unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.message, "Could not retrieve PR info: 500");
        assert!(report.snapshot.is_none());
    }

    #[tokio::test]
    async fn review_state_failure_is_a_deny() {
        let config = PolicyConfig::default_config();
        let mut api = FakeGithub::default().user("monalisa", "write");
        api.pull = Some(Lookup::Found(details(false)));
        let report = run(&config, &api, &pr_event(".deploy")).await;
        assert_eq!(
            report.decision().unwrap().message,
            "Could not retrieve PR info: 404"
        );
    }

    #[tokio::test]
    async fn approved_review_skips_allowlist_lookup() {
        let mut config = PolicyConfig::default_config();
        config.allowlist.operators = vec!["corp/ops".into()];
        let api = with_pull(
            FakeGithub::default().user("monalisa", "write"),
            Some("APPROVED"),
            "SUCCESS",
        );
        let org = FakeGithub::default();
        let report = run_with_org(&config, &api, Some(&org as &dyn GithubApi), &pr_event(".deploy")).await;
        assert!(report.is_allowed());
        assert!(!report.allowlisted);
        assert!(org.calls().is_empty());
    }

    #[tokio::test]
    async fn allowlisted_operator_bypasses_required_review() {
        let mut config = PolicyConfig::default_config();
        config.allowlist.operators = vec!["corp/ops".into()];
        let api = with_pull(
            FakeGithub::default().user("monalisa", "write"),
            Some("REVIEW_REQUIRED"),
            "SUCCESS",
        );
        let org = FakeGithub::default()
            .team("corp", 1, "ops", 10)
            .member(1, 10, "monalisa");
        let report = run_with_org(&config, &api, Some(&org as &dyn GithubApi), &pr_event(".deploy")).await;
        assert!(report.allowlisted);
        assert!(report.is_allowed());
        assert!(!api.called("org"));
    }

    #[tokio::test]
    async fn required_review_without_operator_is_denied() {
        let config = PolicyConfig::default_config();
        let api = with_pull(
            FakeGithub::default().user("monalisa", "write"),
            Some("REVIEW_REQUIRED"),
            "SUCCESS",
        );
        let report = run(&config, &api, &pr_event(".deploy")).await;
        assert!(!report.is_allowed());
        assert!(report.bypass());
        assert!(report.snapshot.is_some());
    }

    fn deleted_head(mut api: FakeGithub, review: &str) -> FakeGithub {
        let details = serde_json::from_value(json!({
            "head": {"ref": "main", "sha": "def456", "label": "evil:main", "repo": null},
            "base": {"ref": "main"},
            "draft": false
        }))
        .unwrap();
        api.pull = Some(Lookup::Found(details));
        api.pull_state = Some(Lookup::Found(state(Some(review), "SUCCESS")));
        api
    }

    #[tokio::test]
    async fn deleted_head_repo_cannot_skip_reviews() {
        let mut config = PolicyConfig::default_config();
        config.pull_request.skip_reviews = true;
        let api = deleted_head(
            FakeGithub::default().user("monalisa", "write"),
            "REVIEW_REQUIRED",
        );
        let report = run(&config, &api, &pr_event(".deploy")).await;
        let decision = report.decision().unwrap();
        assert!(!decision.allowed);
        assert!(decision.message.contains("forks must be reviewed"));
        assert!(report.snapshot.as_ref().unwrap().is_fork);
    }

    #[tokio::test]
    async fn deleted_head_repo_acts_on_head_sha() {
        let config = PolicyConfig::default_config();
        let api = deleted_head(FakeGithub::default().user("monalisa", "write"), "APPROVED");
        let report = run(&config, &api, &pr_event(".deploy")).await;
        let decision = report.decision().unwrap();
        assert!(decision.allowed, "{}", decision.message);
        assert_eq!(decision.ref_name.as_deref(), Some("def456"));
        assert_eq!(decision.sha.as_deref(), Some("def456"));
    }

    #[tokio::test]
    async fn comment_event_without_comment_is_an_error() {
        let config = PolicyConfig::default_config();
        let api = FakeGithub::default();
        let event = CommentEvent::from_json(COMMENT_EVENT, r#"{"issue": {"number": 1}}"#).unwrap();
        let err = Gate::new(&config, &api, None)
            .run(&Invocation {
                event: &event,
                actor: "monalisa",
                command: ".deploy",
                param_separator: "|",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Event(_)));
    }
}
