//! GitHub Actions file commands (`GITHUB_OUTPUT`, `GITHUB_STATE`) and the
//! completion plan the post step hands to the reaction collaborator.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{GateError, Result};
use crate::eval::Report;

pub const SUCCESS_REACTION: &str = "+1";
pub const FAILURE_REACTION: &str = "-1";

const DELIMITER: &str = "ISSUEOPS_GATE_EOF";

/// Append-only `name=value` target for one Actions file command.
#[derive(Debug, Clone)]
pub struct FileCommand {
    path: PathBuf,
}

impl FileCommand {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn write(&self, entries: &[(&str, String)]) -> Result<()> {
        let io_err = |source| GateError::FileCommand {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        let buf: String = entries
            .iter()
            .map(|(name, value)| format_entry(name, value))
            .collect();
        file.write_all(buf.as_bytes()).map_err(io_err)
    }
}

/// Single-line values use `name=value`; anything with a line break uses a
/// heredoc whose delimiter never occurs as a line of the value.
fn format_entry(name: &str, value: &str) -> String {
    if !value.contains(['\n', '\r']) {
        return format!("{name}={value}\n");
    }
    let mut delimiter = DELIMITER.to_string();
    while value.lines().any(|line| line == delimiter) {
        delimiter.push('_');
    }
    format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
}

fn flag(value: bool) -> String {
    value.to_string()
}

/// Step outputs for a finished run.
pub fn outputs(report: &Report) -> Vec<(&'static str, String)> {
    let mut out = vec![("triggered", flag(report.triggered))];
    if !report.triggered {
        return out;
    }

    if let Some(body) = &report.comment_body {
        out.push(("comment_body", body.clone()));
    }
    if let Some(id) = report.comment_id {
        out.push(("comment_id", id.to_string()));
    }
    if let Some(handle) = &report.actor_handle {
        out.push(("actor_handle", handle.clone()));
    }
    if let Some(authorization) = &report.authorization {
        out.push(("actor", authorization.actor.clone()));
    }
    out.push(("params", report.params.clone().unwrap_or_default()));

    if let Some(snapshot) = &report.snapshot {
        out.push(("base_ref", snapshot.base_ref.clone()));
        out.push(("fork", flag(snapshot.is_fork)));
        if let Some(fork) = snapshot.fork_info() {
            out.push(("fork_ref", fork.ref_name));
            out.push(("fork_label", fork.label));
            out.push(("fork_checkout", fork.checkout));
            out.push(("fork_full_name", fork.full_name.unwrap_or_default()));
        }
    }

    if let Some(decision) = report.decision() {
        out.push(("ref", decision.ref_name.clone().unwrap_or_default()));
        out.push(("sha", decision.sha.clone().unwrap_or_default()));
        out.push(("message", decision.message.clone()));
        if decision.allowed {
            out.push(("continue", flag(true)));
        }
    }
    out
}

/// State saved by `check` and read back by `post`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostState {
    pub bypass: bool,
    pub comment_id: Option<u64>,
    pub reaction_id: Option<u64>,
    pub ref_name: Option<String>,
}

impl PostState {
    /// `reaction_id` is the initial reaction another step placed on the comment.
    pub fn from_report(report: &Report, reaction_id: Option<u64>) -> Self {
        Self {
            bypass: report.bypass(),
            comment_id: report.comment_id,
            reaction_id,
            ref_name: report.decision().and_then(|d| d.ref_name.clone()),
        }
    }

    /// Rebuild from raw `STATE_*` values. Unparseable ids read as absent.
    pub fn from_raw(
        bypass: Option<&str>,
        comment_id: Option<&str>,
        reaction_id: Option<&str>,
        ref_name: Option<&str>,
    ) -> Self {
        let id = |raw: Option<&str>| raw.and_then(|v| v.trim().parse().ok());
        Self {
            bypass: bypass.is_some_and(|v| v.trim() == "true"),
            comment_id: id(comment_id),
            reaction_id: id(reaction_id),
            ref_name: ref_name
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        }
    }

    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![("isPost", flag(true)), ("bypass", flag(self.bypass))];
        if let Some(id) = self.comment_id {
            out.push(("comment_id", id.to_string()));
        }
        if let Some(id) = self.reaction_id {
            out.push(("reaction_id", id.to_string()));
        }
        if let Some(ref_name) = &self.ref_name {
            out.push(("ref", ref_name.clone()));
        }
        out
    }
}

/// What the reaction collaborator should do once the workflow finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionPlan {
    pub comment_id: u64,
    pub reaction: &'static str,
    pub remove_reaction_id: Option<u64>,
    #[serde(rename = "ref")]
    pub ref_name: Option<String>,
}

/// Plan the post step. `Ok(None)` means there is nothing to complete.
pub fn completion_plan(
    state: &PostState,
    status: Option<&str>,
    skip_completing: bool,
) -> Result<Option<CompletionPlan>> {
    if state.bypass {
        log::warn!("bypass set, exiting");
        return Ok(None);
    }
    if skip_completing {
        log::info!("skip_completing set, exiting");
        return Ok(None);
    }

    let comment_id = state
        .comment_id
        .ok_or_else(|| GateError::Post("no comment_id provided".into()))?;
    let status = status
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GateError::Post("no status provided".into()))?;

    let reaction = if status == "success" {
        SUCCESS_REACTION
    } else {
        FAILURE_REACTION
    };
    Ok(Some(CompletionPlan {
        comment_id,
        reaction,
        remove_reaction_id: state.reaction_id,
        ref_name: state.ref_name.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{Decision, Outcome};
    use crate::github::PullRequestSnapshot;

    fn report(outcome: Outcome, fork: bool) -> Report {
        Report {
            context: "pull_request".into(),
            triggered: true,
            outcome,
            comment_id: Some(42),
            comment_body: Some(".deploy | cpu=2".into()),
            actor_handle: Some("octocat".into()),
            params: Some("cpu=2".into()),
            authorization: None,
            snapshot: Some(PullRequestSnapshot {
                head_ref: "feature".into(),
                head_sha: "abc123".into(),
                head_label: "octocat:feature".into(),
                head_full_name: Some("octocat/app".into()),
                base_ref: "main".into(),
                is_fork: fork,
                is_draft: false,
                review_decision: None,
                check_suite_count: Some(0),
                status_rollup: None,
            }),
            allowlisted: false,
        }
    }

    fn allowed() -> Outcome {
        Outcome::Decided(Decision::allow("ok").with_target("abc123", "abc123"))
    }

    fn value<'a>(entries: &'a [(&str, String)], name: &str) -> Option<&'a str> {
        entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn single_line_entry() {
        assert_eq!(format_entry("ref", "main"), "ref=main\n");
    }

    #[test]
    fn multi_line_entry_uses_heredoc() {
        assert_eq!(
            format_entry("message", "a\nb"),
            "message<<ISSUEOPS_GATE_EOF\na\nb\nISSUEOPS_GATE_EOF\n"
        );
    }

    #[test]
    fn heredoc_delimiter_avoids_value_lines() {
        let entry = format_entry("body", "x\nISSUEOPS_GATE_EOF\ny");
        assert!(entry.starts_with("body<<ISSUEOPS_GATE_EOF_\n"));
        assert!(entry.ends_with("\nISSUEOPS_GATE_EOF_\n"));
    }

    #[test]
    fn file_command_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output");
        let file = FileCommand::new(&path);
        file.write(&[("triggered", "true".into())]).unwrap();
        file.write(&[("message", "line one\nline two".into())]).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("triggered=true\nmessage<<"));
        assert!(written.contains("line one\nline two\n"));
    }

    #[test]
    fn file_command_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileCommand::new(dir.path().join("missing").join("output"));
        let err = file.write(&[("a", "b".into())]).unwrap_err();
        assert!(matches!(err, GateError::FileCommand { .. }));
    }

    #[test]
    fn untriggered_outputs_only_triggered() {
        let mut r = report(Outcome::SafeExit("no command".into()), false);
        r.triggered = false;
        assert_eq!(outputs(&r), vec![("triggered", "false".to_string())]);
    }

    #[test]
    fn allowed_fork_outputs() {
        let out = outputs(&report(allowed(), true));
        assert_eq!(value(&out, "continue"), Some("true"));
        assert_eq!(value(&out, "ref"), Some("abc123"));
        assert_eq!(value(&out, "fork"), Some("true"));
        assert_eq!(value(&out, "fork_checkout"), Some("octocat-feature feature"));
        assert_eq!(value(&out, "fork_full_name"), Some("octocat/app"));
        assert_eq!(value(&out, "base_ref"), Some("main"));
        assert_eq!(value(&out, "params"), Some("cpu=2"));
    }

    #[test]
    fn denied_outputs_have_no_continue_or_target() {
        let out = outputs(&report(Outcome::Decided(Decision::deny("nope")), false));
        assert_eq!(value(&out, "continue"), None);
        assert_eq!(value(&out, "ref"), Some(""));
        assert_eq!(value(&out, "message"), Some("nope"));
        assert_eq!(value(&out, "fork"), Some("false"));
        assert_eq!(value(&out, "fork_ref"), None);
    }

    #[test]
    fn state_from_report() {
        let state = PostState::from_report(&report(allowed(), false), Some(9));
        assert!(!state.bypass);
        let entries = state.entries();
        assert_eq!(value(&entries, "isPost"), Some("true"));
        assert_eq!(value(&entries, "comment_id"), Some("42"));
        assert_eq!(value(&entries, "reaction_id"), Some("9"));
        assert_eq!(value(&entries, "ref"), Some("abc123"));

        let denied = PostState::from_report(&report(Outcome::Decided(Decision::deny("x")), false), None);
        assert!(denied.bypass);
        assert_eq!(denied.ref_name, None);
    }

    #[test]
    fn state_from_raw_values() {
        let state = PostState::from_raw(Some("false"), Some("42"), Some("oops"), Some(""));
        assert_eq!(
            state,
            PostState {
                bypass: false,
                comment_id: Some(42),
                reaction_id: None,
                ref_name: None,
            }
        );
        assert!(PostState::from_raw(Some("true"), None, None, None).bypass);
    }

    #[test]
    fn plan_reacts_to_status() {
        let state = PostState::from_raw(None, Some("42"), Some("9"), Some("main"));
        let plan = completion_plan(&state, Some("success"), false).unwrap().unwrap();
        assert_eq!(plan.reaction, SUCCESS_REACTION);
        assert_eq!(plan.remove_reaction_id, Some(9));
        let plan = completion_plan(&state, Some("failure"), false).unwrap().unwrap();
        assert_eq!(plan.reaction, FAILURE_REACTION);
    }

    #[test]
    fn plan_skipped_for_bypass_or_skip_completing() {
        let bypassed = PostState::from_raw(Some("true"), None, None, None);
        assert_eq!(completion_plan(&bypassed, None, false).unwrap(), None);
        let state = PostState::from_raw(None, Some("42"), None, None);
        assert_eq!(completion_plan(&state, Some("success"), true).unwrap(), None);
    }

    #[test]
    fn plan_requires_comment_and_status() {
        let empty = PostState::default();
        let err = completion_plan(&empty, Some("success"), false).unwrap_err();
        assert!(err.to_string().contains("no comment_id provided"));
        let state = PostState::from_raw(None, Some("42"), None, None);
        let err = completion_plan(&state, Some(" "), false).unwrap_err();
        assert!(err.to_string().contains("no status provided"));
    }

    #[test]
    fn plan_serializes_ref() {
        let state = PostState::from_raw(None, Some("1"), None, Some("main"));
        let plan = completion_plan(&state, Some("success"), false).unwrap().unwrap();
        let json = serde_json::to_value(plan).unwrap();
        assert_eq!(json["ref"], "main");
        assert_eq!(json["reaction"], "+1");
    }
}
