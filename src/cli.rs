//! Command-line and GitHub Actions environment surface.
//!
//! Every policy input is optional here; unset values keep whatever the
//! embedded defaults and the `--config` overlay provide. Flags are read as
//! strings because Actions exports declared-but-unset inputs as empty values.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    AllowlistOverlay, ConfigOverlay, ContextsOverlay, PermissionsOverlay, PullRequestOverlay,
    SettingsOverlay, split_list,
};
use crate::error::{GateError, Result};

#[derive(Debug, Parser)]
#[command(
    name = "issueops-gate",
    about = "Authorization and pull request policy gate for IssueOps commands",
    version
)]
pub struct Cli {
    #[arg(
        long = "log-level",
        env = "INPUT_LOG_LEVEL",
        default_value = "info",
        global = true,
        help = "Diagnostic verbosity: error, warn, info, debug or trace"
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decide whether the triggering comment may run its command.
    Check(CheckArgs),
    /// Plan the completion reaction once the workflow has finished.
    Post(PostArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[arg(long, env = "INPUT_COMMAND", help = "Trigger phrase, e.g. .deploy")]
    pub command: String,

    #[arg(
        long = "param-separator",
        env = "INPUT_PARAM_SEPARATOR",
        default_value = "|",
        help = "Everything after this separator is passed on as parameters"
    )]
    pub param_separator: String,

    #[arg(
        long,
        env = "INPUT_GITHUB_TOKEN",
        hide_env_values = true,
        help = "Token for repository-scoped API calls"
    )]
    pub token: String,

    #[arg(long = "event-name", env = "GITHUB_EVENT_NAME")]
    pub event_name: String,

    #[arg(long = "event-path", env = "GITHUB_EVENT_PATH", help = "Webhook payload JSON file")]
    pub event_path: PathBuf,

    #[arg(long, env = "GITHUB_REPOSITORY", help = "owner/repo the comment was posted in")]
    pub repository: String,

    #[arg(long, env = "GITHUB_ACTOR", help = "Login that triggered the event")]
    pub actor: String,

    #[arg(
        long = "api-url",
        env = "GITHUB_API_URL",
        default_value = "https://api.github.com",
        help = "REST API base; the GraphQL endpoint is derived from it"
    )]
    pub api_url: String,

    #[arg(
        long = "reaction-id",
        env = "INPUT_REACTION_ID",
        help = "Id of the initial reaction placed on the comment, removed by the post step"
    )]
    pub reaction_id: Option<u64>,

    #[arg(long, env = "INPUT_CONFIG", help = "TOML policy overlay file")]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "INPUT_PERMISSIONS",
        help = "Comma-separated collaborator permission levels allowed to run the command"
    )]
    pub permissions: Option<String>,

    #[arg(long = "allow-bots", env = "INPUT_BOT_PERMISSION_ALLOW")]
    pub allow_bots: Option<String>,

    #[arg(long = "bot-permission", env = "INPUT_BOT_PERMISSION")]
    pub bot_permission: Option<String>,

    #[arg(long = "bot-access", env = "INPUT_BOT_ACCESS")]
    pub bot_access: Option<String>,

    #[arg(
        long,
        env = "INPUT_ALLOWLIST",
        help = "Comma-separated operator handles and org/team references"
    )]
    pub allowlist: Option<String>,

    #[arg(
        long = "allowlist-token",
        env = "INPUT_ALLOWLIST_PAT",
        hide_env_values = true,
        help = "Token with read:org scope for org/team allowlist entries"
    )]
    pub allowlist_token: Option<String>,

    #[arg(long = "allow-forks", env = "INPUT_ALLOW_FORKS")]
    pub allow_forks: Option<String>,

    #[arg(long = "skip-ci", env = "INPUT_SKIP_CI")]
    pub skip_ci: Option<String>,

    #[arg(long = "skip-reviews", env = "INPUT_SKIP_REVIEWS")]
    pub skip_reviews: Option<String>,

    #[arg(long = "allow-drafts", env = "INPUT_ALLOW_DRAFTS")]
    pub allow_drafts: Option<String>,

    #[arg(long = "fork-review-bypass", env = "INPUT_FORK_REVIEW_BYPASS")]
    pub fork_review_bypass: Option<String>,

    #[arg(
        long = "allowed-contexts",
        env = "INPUT_ALLOWED_CONTEXTS",
        help = "Comma-separated subset of pull_request, issue"
    )]
    pub allowed_contexts: Option<String>,

    #[arg(long = "decision-log", env = "INPUT_DECISION_LOG")]
    pub decision_log: Option<PathBuf>,

    #[arg(long = "github-output", env = "GITHUB_OUTPUT")]
    pub github_output: Option<PathBuf>,

    #[arg(long = "github-state", env = "GITHUB_STATE")]
    pub github_state: Option<PathBuf>,

    #[arg(long = "request-timeout-ms", env = "INPUT_REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
    pub request_timeout_ms: u64,

    #[arg(long = "retry-max-attempts", env = "INPUT_RETRY_MAX_ATTEMPTS", default_value_t = 3)]
    pub retry_max_attempts: usize,

    #[arg(long = "retry-base-delay-ms", env = "INPUT_RETRY_BASE_DELAY_MS", default_value_t = 500)]
    pub retry_base_delay_ms: u64,
}

impl CheckArgs {
    /// Policy values given on the command line or in the environment.
    pub fn overlay(&self) -> Result<ConfigOverlay> {
        let list = |raw: &Option<String>| raw.as_deref().map(split_list);
        let text = |raw: &Option<String>| {
            raw.as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(ConfigOverlay {
            settings: SettingsOverlay {
                decision_log: self.decision_log.clone(),
            },
            permissions: PermissionsOverlay {
                allowed: list(&self.permissions).filter(|items| !items.is_empty()),
                allow_bots: parse_flag("allow-bots", self.allow_bots.as_deref())?,
                bot_permission: text(&self.bot_permission),
                bot_access: text(&self.bot_access),
            },
            allowlist: AllowlistOverlay {
                operators: list(&self.allowlist),
                token: text(&self.allowlist_token),
            },
            pull_request: PullRequestOverlay {
                allow_forks: parse_flag("allow-forks", self.allow_forks.as_deref())?,
                skip_ci: parse_flag("skip-ci", self.skip_ci.as_deref())?,
                skip_reviews: parse_flag("skip-reviews", self.skip_reviews.as_deref())?,
                allow_drafts: parse_flag("allow-drafts", self.allow_drafts.as_deref())?,
                fork_review_bypass: parse_flag(
                    "fork-review-bypass",
                    self.fork_review_bypass.as_deref(),
                )?,
            },
            contexts: ContextsOverlay {
                allowed: list(&self.allowed_contexts).filter(|items| !items.is_empty()),
            },
        })
    }
}

#[derive(Debug, Args)]
pub struct PostArgs {
    #[arg(long, env = "INPUT_STATUS", help = "Workflow outcome; `success` earns a +1 reaction")]
    pub status: Option<String>,

    #[arg(long = "skip-completing", env = "INPUT_SKIP_COMPLETING")]
    pub skip_completing: Option<String>,

    #[arg(long, env = "STATE_bypass")]
    pub bypass: Option<String>,

    #[arg(long = "comment-id", env = "STATE_comment_id")]
    pub comment_id: Option<String>,

    #[arg(long = "reaction-id", env = "STATE_reaction_id")]
    pub reaction_id: Option<String>,

    #[arg(long = "ref", env = "STATE_ref")]
    pub ref_name: Option<String>,
}

impl PostArgs {
    pub fn skip_completing(&self) -> Result<bool> {
        Ok(parse_flag("skip-completing", self.skip_completing.as_deref())?.unwrap_or(false))
    }
}

/// Actions-style boolean: `true`/`false` in any case. Blank means unset.
pub fn parse_flag(name: &str, raw: Option<&str>) -> Result<Option<bool>> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if raw.eq_ignore_ascii_case("true") {
        Ok(Some(true))
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(Some(false))
    } else {
        Err(GateError::Config(format!(
            "{name}: expected true or false, got '{raw}'"
        )))
    }
}
