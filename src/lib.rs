//! issueops-gate: authorization and pull request policy gate for IssueOps
//! commands posted as GitHub issue or pull request comments.
//!
//! A run classifies the triggering event, checks the trigger phrase, checks
//! the actor's repository permission, and for pull requests evaluates review
//! and CI state against a fixed decision table. The result is a single
//! [`eval::Decision`] with a human-readable message.
//!
//! # Architecture
//!
//! - **[`eval`]**: the [`Gate`](eval::Gate) pipeline, context classification, policy evaluator and decision table.
//! - **[`auth`]**: actor permission check and the operator allowlist.
//! - **[`github`]**: the [`GithubApi`](github::GithubApi) seam and its reqwest client.
//! - **[`config`]**: embedded defaults, overlay file and action inputs.
//! - **[`action`]**: step outputs, saved state and the post-step completion plan.
//! - **[`logging`]**: stderr logger and the append-only decision log.

/// Step outputs, saved state and the post-step completion plan.
pub mod action;
/// Actor permission and operator allowlist checks.
pub mod auth;
/// Command-line and Actions environment surface.
pub mod cli;
/// Trigger phrase and parameter handling.
pub mod command;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Fatal error type.
pub mod error;
/// Evaluation pipeline and decision table.
pub mod eval;
/// GitHub REST/GraphQL access.
pub mod github;
/// Logger setup and decision logging.
pub mod logging;

pub use error::{GateError, Result};
