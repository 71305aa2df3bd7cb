//! Review/CI decision table for pull requests.
//!
//! Both axes are reduced to an "effective" value first: the raw GitHub state,
//! `null` when GitHub reports nothing, or a `skip_*` sentinel when policy
//! waives the requirement. [`lookup`] then walks the table top to bottom and
//! the first matching row wins. Combinations no row names are denied.

use std::fmt;

use crate::eval::Decision;
use crate::github::{ReviewDecision, StatusState};

/// Review axis after applying `skip_reviews` and the operator allowlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveReview {
    Approved,
    ReviewRequired,
    ChangesRequested,
    /// No review policy on the base branch (`null`).
    Undefined,
    /// `skip_reviews` applies.
    Skipped,
    /// Review still outstanding, but the actor is an allowlisted operator.
    OperatorBypass(ReviewDecision),
}

impl EffectiveReview {
    pub fn from_raw(raw: Option<ReviewDecision>) -> Self {
        match raw {
            Some(ReviewDecision::Approved) => Self::Approved,
            Some(ReviewDecision::ReviewRequired) => Self::ReviewRequired,
            Some(ReviewDecision::ChangesRequested) => Self::ChangesRequested,
            None => Self::Undefined,
        }
    }

    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::ReviewRequired | Self::ChangesRequested)
    }
}

impl fmt::Display for EffectiveReview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => f.write_str("APPROVED"),
            Self::ReviewRequired => f.write_str("REVIEW_REQUIRED"),
            Self::ChangesRequested => f.write_str("CHANGES_REQUESTED"),
            Self::Undefined => f.write_str("null"),
            Self::Skipped => f.write_str("skip_reviews"),
            Self::OperatorBypass(raw) => f.write_str(raw.as_str()),
        }
    }
}

/// CI axis after applying `skip_ci` and the "no check suites" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveStatus {
    Success,
    Failure,
    Pending,
    Errored,
    Expected,
    /// No CI defined, or the CI data could not be read (`null`).
    Undefined,
    /// `skip_ci` applies.
    Skipped,
}

impl From<StatusState> for EffectiveStatus {
    fn from(state: StatusState) -> Self {
        match state {
            StatusState::Success => Self::Success,
            StatusState::Failure => Self::Failure,
            StatusState::Pending => Self::Pending,
            StatusState::Error => Self::Errored,
            StatusState::Expected => Self::Expected,
        }
    }
}

impl fmt::Display for EffectiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Pending => "PENDING",
            Self::Errored => "ERROR",
            Self::Expected => "EXPECTED",
            Self::Undefined => "null",
            Self::Skipped => "skip_ci",
        })
    }
}

fn cannot_proceed(review: EffectiveReview, status: EffectiveStatus, note: &str) -> Decision {
    Decision::deny(format!(
        "### ⚠️ Cannot proceed with operation\n\n- reviewDecision: `{review}`\n- commitStatus: `{status}`\n\n> {note}"
    ))
}

/// Look up the table row for `(review, status)`.
pub fn lookup(review: EffectiveReview, status: EffectiveStatus) -> Decision {
    use EffectiveReview as R;
    use EffectiveStatus as S;

    match (review, status) {
        (R::Approved, S::Success) => {
            Decision::allow("✔️ PR is approved and all CI checks passed - OK")
        }
        (R::Undefined, S::Undefined) => Decision::allow(
            "⚠️ CI checks have not been defined and required reviewers have not been defined... proceeding - OK",
        ),
        (R::Undefined, S::Success) => Decision::allow(
            "⚠️ CI checks have been defined but required reviewers have not been defined... proceeding - OK",
        ),
        (R::Skipped, S::Success) => Decision::allow(
            "✔️ CI checks passed and required reviewers have been disabled for this operation - OK",
        ),
        (R::Approved, S::Skipped) => Decision::allow(
            "✔️ CI requirements have been disabled for this operation and the PR has been approved - OK",
        ),
        (R::Undefined, S::Skipped) => Decision::allow(
            "⚠️ CI requirements have been disabled for this operation and required reviewers have not been defined... proceeding - OK",
        ),
        (R::ReviewRequired | R::ChangesRequested, S::Skipped) => Decision::deny(
            "### ⚠️ Cannot proceed with operation\n\n> CI checks are not required for this operation but the PR has not been reviewed",
        ),
        (R::OperatorBypass(_), S::Skipped) => Decision::allow(
            "✔️ CI is not required for this operation and approval is bypassed due to allowed operator rights - OK",
        ),
        (R::Skipped, S::Skipped) => {
            Decision::allow("✔️ CI and PR reviewers are not required for this operation - OK")
        }
        (R::ReviewRequired | R::ChangesRequested, S::Success) => Decision::deny(
            "### ⚠️ Cannot proceed with operation\n\n> CI checks are passing but the PR has not been reviewed",
        ),
        (R::OperatorBypass(_), S::Success) => Decision::allow(
            "✔️ CI is passing and approval is bypassed due to allowed operator rights - OK",
        ),
        (R::OperatorBypass(_), S::Undefined) => Decision::allow(
            "✔️ CI checks have not been defined and approval is bypassed due to allowed operator rights - OK",
        ),
        (R::Approved, S::Undefined) => {
            Decision::allow("✔️ CI checks have not been defined but the PR has been approved - OK")
        }
        (R::ReviewRequired | R::ChangesRequested, S::Pending) => cannot_proceed(
            review,
            status,
            "Reviews are required and CI checks must be passing in order to continue",
        ),
        (R::Undefined, S::Pending) => {
            cannot_proceed(review, status, "CI checks must be passing in order to continue")
        }
        (R::ReviewRequired | R::ChangesRequested, S::Undefined) => cannot_proceed(
            review,
            status,
            "CI checks have not been defined but the PR has not been reviewed",
        ),
        (R::Approved | R::OperatorBypass(_) | R::Skipped, S::Pending) => {
            cannot_proceed(review, status, "CI checks must be passing in order to continue")
        }
        (R::Approved | R::OperatorBypass(_), S::Failure) => cannot_proceed(
            review,
            status,
            "Your pull request is approved but CI checks are failing",
        ),
        (R::Undefined | R::Skipped, S::Failure) => cannot_proceed(
            review,
            status,
            "Your pull request does not require approvals but CI checks are failing",
        ),
        _ => cannot_proceed(
            review,
            status,
            "This combination of review and CI state is not covered by the policy, so the operation is blocked",
        ),
    }
}
