use serde::Deserialize;

use crate::error::{GateError, Result};

/// The only event IssueOps commands arrive on.
pub const COMMENT_EVENT: &str = "issue_comment";

/// Where a comment was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextType {
    PullRequest,
    Issue,
}

impl ContextType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContextType::PullRequest => "pull_request",
            ContextType::Issue => "issue",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pull_request" => Some(ContextType::PullRequest),
            "issue" => Some(ContextType::Issue),
            _ => None,
        }
    }
}

/// Triggering event: its name plus the parts of the webhook payload we read.
#[derive(Debug, Clone)]
pub struct CommentEvent {
    pub name: String,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub comment: Option<Comment>,
    #[serde(default)]
    pub issue: Option<Issue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<Account>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    /// Present only when the issue is a pull request.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub login: String,
}

impl CommentEvent {
    pub fn from_json(name: &str, payload: &str) -> Result<Self> {
        let payload = serde_json::from_str(payload)
            .map_err(|e| GateError::Event(format!("failed to parse event payload: {e}")))?;
        Ok(Self {
            name: name.to_string(),
            payload,
        })
    }

    pub fn is_pull_request(&self) -> bool {
        self.payload
            .issue
            .as_ref()
            .is_some_and(|issue| issue.pull_request.is_some())
    }
}

/// Result of classifying the triggering event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextCheck {
    Valid(ContextType),
    /// Rejected. Carries the raw event name and why.
    Invalid { context: String, reason: String },
}

/// Classify `event` and check it against the allowed context types.
pub fn classify(event: &CommentEvent, allowed_contexts: &[String]) -> ContextCheck {
    log::debug!("checking if the context of '{}' is valid", event.name);

    let invalid = |reason: String| {
        log::warn!("{reason}");
        ContextCheck::Invalid {
            context: event.name.clone(),
            reason,
        }
    };

    if event.name != COMMENT_EVENT {
        return invalid(format!(
            "this command can only be run in the context of an {COMMENT_EVENT}"
        ));
    }

    let allows = |wanted: ContextType| {
        allowed_contexts
            .iter()
            .any(|raw| ContextType::parse(raw) == Some(wanted))
    };
    let context = if event.is_pull_request() {
        ContextType::PullRequest
    } else {
        ContextType::Issue
    };

    match (allows(ContextType::PullRequest), allows(ContextType::Issue)) {
        (false, false) => invalid(
            "the allowed contexts must contain at least one of the following: pull_request, issue"
                .into(),
        ),
        (true, false) if context == ContextType::Issue => invalid(
            "this command can only be run in the context of a pull request comment".into(),
        ),
        (false, true) if context == ContextType::PullRequest => {
            invalid("this command can only be run in the context of an issue comment".into())
        }
        _ => ContextCheck::Valid(context),
    }
}
