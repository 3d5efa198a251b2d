use std::collections::HashSet;

use tracing::{debug, info, warn};

use common::metrics::{DISTRIBUTION_LEVEL_FAILURES_TOTAL, POINTS_AWARDED_TOTAL};
use models::points_transaction::level_reason;

use super::domain::{AwardOutcome, AwardStatus, DistributionReport, Invite, LevelAward, PointsAward};
use super::repository::ReferralRepository;
use super::tree::corrupt_graph;

/// Award for chain `level` (1-based): `base` halved `level - 1` times, floored.
pub fn award_for_level(base: i64, level: u32) -> i64 {
    if level == 0 {
        return 0;
    }
    base.checked_shr(level - 1).unwrap_or(0)
}

/// Non-zero awards for `base`, level 1 first.
pub fn award_schedule(base: i64) -> Vec<i64> {
    (1..).map(|l| award_for_level(base, l)).take_while(|a| *a >= 1).collect()
}

/// Walks the accepted-invite chain above an invite, crediting decaying awards.
pub struct DistributionWorkflow<'a> {
    repo: &'a dyn ReferralRepository,
    base_award: i64,
}

impl<'a> DistributionWorkflow<'a> {
    pub fn new(repo: &'a dyn ReferralRepository, base_award: i64) -> Self { Self { repo, base_award } }

    /// Run the chain for an accepted invite.
    ///
    /// A failed level does not stop the walk; it is recorded in the report.
    /// Levels already in the ledger are reported as `AlreadyApplied`, so a
    /// second run only fills in what is missing.
    pub async fn run(&self, invite: &Invite) -> DistributionReport {
        let mut report = DistributionReport::new(invite.id);
        let schedule = award_schedule(self.base_award);
        let mut visited = HashSet::new();
        let mut recipient = Some(invite.recruiter_id);

        for (level, amount) in (1u32..).zip(schedule.iter().copied()) {
            let Some(user_id) = recipient else { break };
            if !visited.insert(user_id) {
                let err = corrupt_graph(user_id, level);
                report.levels.push(LevelAward { level, user_id: Some(user_id), amount, status: AwardStatus::Failed { error: err.to_string() } });
                break;
            }

            let award = PointsAward { user_id, amount, reason: level_reason(level), invite_id: invite.id, level };
            let status = match self.repo.award_points(&award).await {
                Ok(AwardOutcome::Applied) => {
                    POINTS_AWARDED_TOTAL.inc_by(amount as u64);
                    info!(event = "points_awarded", invite_id = %invite.id, user_id = %user_id, level, amount);
                    AwardStatus::Applied
                }
                Ok(AwardOutcome::AlreadyApplied) => {
                    debug!(invite_id = %invite.id, level, "award already recorded");
                    AwardStatus::AlreadyApplied
                }
                Err(e) => {
                    DISTRIBUTION_LEVEL_FAILURES_TOTAL.inc();
                    warn!(event = "distribution_level_failed", invite_id = %invite.id, user_id = %user_id, level, amount, error = %e);
                    AwardStatus::Failed { error: e.to_string() }
                }
            };
            report.levels.push(LevelAward { level, user_id: Some(user_id), amount, status });

            let Some(&next_amount) = schedule.get(level as usize) else { break };
            recipient = match self.repo.find_accepted_invite_for_recruit(user_id).await {
                Ok(next) => next.map(|i| i.recruiter_id),
                Err(e) => {
                    // next ancestor unknown: record the gap and stop
                    DISTRIBUTION_LEVEL_FAILURES_TOTAL.inc();
                    warn!(event = "distribution_level_failed", invite_id = %invite.id, level = level + 1, error = %e, "ancestor lookup failed");
                    report.levels.push(LevelAward {
                        level: level + 1,
                        user_id: None,
                        amount: next_amount,
                        status: AwardStatus::Failed { error: e.to_string() },
                    });
                    None
                }
            };
        }
        report
    }
}
