//! issueops-gate: decides whether an IssueOps comment may run its command.
//!
//! `check` runs in the main step of a workflow: it reads the webhook payload,
//! evaluates the policy, and writes step outputs and saved state.
//! `post` runs in the post step and prints the completion plan as JSON.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use issueops_gate::action::{self, FileCommand, PostState};
use issueops_gate::cli::{CheckArgs, Cli, Command, PostArgs};
use issueops_gate::config::PolicyConfig;
use issueops_gate::eval::{CommentEvent, Gate, Invocation, Outcome};
use issueops_gate::github::{GithubApi, GithubClient, RepoRef};
use issueops_gate::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(logging::parse_level(&cli.log_level));

    let result = match cli.command {
        Command::Check(args) => {
            let state_path = args.github_state.clone();
            let result = check(args).await;
            if result.is_err()
                && let Some(path) = state_path
            {
                // A run that never decided must not be completed by `post`.
                let state = PostState {
                    bypass: true,
                    ..PostState::default()
                };
                if let Err(err) = FileCommand::new(path).write(&state.entries()) {
                    log::warn!("could not save bypass state: {err}");
                }
            }
            result
        }
        Command::Post(args) => post(&args),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn check(args: CheckArgs) -> Result<ExitCode> {
    let config = PolicyConfig::load(args.config.as_deref(), args.overlay()?)
        .context("failed to load policy")?;

    let payload = std::fs::read_to_string(&args.event_path)
        .with_context(|| format!("failed to read event payload {}", args.event_path.display()))?;
    let event = CommentEvent::from_json(&args.event_name, &payload)?;

    let repo = RepoRef::parse(&args.repository)?;
    let client = |token: &str| {
        GithubClient::new(
            &args.api_url,
            token,
            repo.clone(),
            args.request_timeout_ms,
            args.retry_max_attempts,
            args.retry_base_delay_ms,
        )
    };
    let api = client(&args.token)?;
    let org_api = config.allowlist.token().map(client).transpose()?;

    let gate = Gate::new(
        &config,
        &api,
        org_api.as_ref().map(|client| client as &dyn GithubApi),
    );
    let report = gate
        .run(&Invocation {
            event: &event,
            actor: &args.actor,
            command: &args.command,
            param_separator: &args.param_separator,
        })
        .await?;

    if let Some(path) = &args.github_output {
        FileCommand::new(path).write(&action::outputs(&report))?;
    }
    if let Some(path) = &args.github_state {
        FileCommand::new(path).write(&PostState::from_report(&report, args.reaction_id).entries())?;
    }
    if let Some(path) = &config.settings.decision_log {
        logging::log_decision(path, &api.repo().to_string(), &args.actor, &report);
    }

    Ok(match &report.outcome {
        Outcome::SafeExit(reason) => {
            log::info!("safe exit: {reason}");
            ExitCode::SUCCESS
        }
        Outcome::Decided(decision) if decision.allowed => {
            log::info!("{}", decision.message);
            ExitCode::SUCCESS
        }
        Outcome::Decided(decision) => {
            log::error!("{}", decision.message);
            ExitCode::FAILURE
        }
    })
}

fn post(args: &PostArgs) -> Result<ExitCode> {
    let state = PostState::from_raw(
        args.bypass.as_deref(),
        args.comment_id.as_deref(),
        args.reaction_id.as_deref(),
        args.ref_name.as_deref(),
    );
    let plan = action::completion_plan(&state, args.status.as_deref(), args.skip_completing()?)?;
    if let Some(plan) = plan {
        println!("{}", serde_json::to_string(&plan)?);
    }
    Ok(ExitCode::SUCCESS)
}
