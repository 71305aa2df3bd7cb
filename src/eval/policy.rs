use crate::config::PullRequestConfig;
use crate::eval::Decision;
use crate::eval::context::ContextType;
use crate::eval::table::{self, EffectiveReview, EffectiveStatus};
use crate::github::PullRequestSnapshot;

pub const ISSUE_MESSAGE: &str = "✔️ operation requested on an issue - OK";

pub const FORKS_DISABLED_MESSAGE: &str = "### ⚠️ Cannot proceed with operation\n\nThis command has been explicitly configured to prevent operations from forks. You can change this via the `allow_forks` input if needed";

pub const DRAFT_MESSAGE: &str =
    "### ⚠️ Cannot proceed with operation\n\n> Your pull request is in a draft state";

/// Facts the evaluator decides on. `snapshot` is `None` for issues.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInputs<'a> {
    pub context: ContextType,
    pub snapshot: Option<&'a PullRequestSnapshot>,
    pub allowlisted: bool,
}

/// Single-pass decision tree: issue → fork → draft → fork review → table.
pub struct PolicyEvaluator<'a> {
    policy: &'a PullRequestConfig,
}

impl<'a> PolicyEvaluator<'a> {
    pub fn new(policy: &'a PullRequestConfig) -> Self {
        Self { policy }
    }

    pub fn evaluate(&self, inputs: &PolicyInputs<'_>) -> Decision {
        if inputs.context == ContextType::Issue {
            return Decision::allow(ISSUE_MESSAGE);
        }
        let Some(pr) = inputs.snapshot else {
            return Decision::deny("Could not retrieve PR info: no pull request data");
        };

        // Forks act on the immutable head sha so nothing pushed after
        // approval can slip through.
        let target_ref = if pr.is_fork {
            if !self.policy.allow_forks {
                return Decision::deny(FORKS_DISABLED_MESSAGE);
            }
            log::info!("PR is a fork, using head sha {} as the ref", pr.head_sha);
            pr.head_sha.as_str()
        } else {
            pr.head_ref.as_str()
        };

        if pr.is_draft {
            if !self.policy.allow_drafts {
                log::warn!("operation requested on a draft PR when draft PRs are not allowed");
                return Decision::deny(DRAFT_MESSAGE);
            }
            log::info!("operation requested on a draft PR - OK");
        }

        let raw_review = EffectiveReview::from_raw(pr.review_decision);
        if pr.is_fork && !self.policy.fork_review_bypass && raw_review.is_outstanding() {
            return Decision::deny(format!(
                "### ⚠️ Cannot proceed with operation\n\n- reviewDecision: `{raw_review}`\n\n> Pull requests from forks must be reviewed before this operation can proceed. Review requirements cannot be skipped for forks"
            ));
        }

        let review = self.effective_review(pr, raw_review, inputs.allowlisted);
        let status = self.effective_status(pr);
        log::debug!(
            "precheck values: review={review} status={status} allowlisted={} fork={} draft={}",
            inputs.allowlisted,
            pr.is_fork,
            pr.is_draft
        );

        table::lookup(review, status).with_target(target_ref, &pr.head_sha)
    }

    fn effective_review(
        &self,
        pr: &PullRequestSnapshot,
        raw: EffectiveReview,
        allowlisted: bool,
    ) -> EffectiveReview {
        if self.policy.skip_reviews && (!pr.is_fork || self.policy.fork_review_bypass) {
            return EffectiveReview::Skipped;
        }
        match pr.review_decision {
            Some(decision) if allowlisted && raw.is_outstanding() => {
                EffectiveReview::OperatorBypass(decision)
            }
            _ => raw,
        }
    }

    fn effective_status(&self, pr: &PullRequestSnapshot) -> EffectiveStatus {
        if self.policy.skip_ci {
            log::info!("CI checks are not required for this operation - proceeding - OK");
            return EffectiveStatus::Skipped;
        }
        match pr.check_suite_count {
            None => {
                log::info!(
                    "could not retrieve PR commit status - Handled: OK, treating CI as undefined"
                );
                EffectiveStatus::Undefined
            }
            Some(0) => {
                log::info!("no CI checks have been defined for this pull request, proceeding - OK");
                EffectiveStatus::Undefined
            }
            Some(_) => pr
                .status_rollup
                .map_or(EffectiveStatus::Undefined, EffectiveStatus::from),
        }
    }
}
