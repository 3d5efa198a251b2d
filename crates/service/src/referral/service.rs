use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use common::metrics::INVITES_ACCEPTED_TOTAL;
use configs::ReferralConfig;
use models::{invite as invite_model, user as user_model};

use super::distribution::DistributionWorkflow;
use super::domain::{
    AcceptOutcome, DistributionReport, DownlineEntry, DownlineNode, Invite, Layer, NewUser, PointsTransaction,
    RankedUser, RecruitCounts, RegisterUserInput, Role, User,
};
use super::errors::ReferralError;
use super::leaderboard::LeaderboardAggregator;
use super::repository::ReferralRepository;
use super::tree::TreeQueryEngine;
use crate::pagination::Pagination;

const CODE_ATTEMPTS: usize = 5;
const DEFAULT_LEADERBOARD_LIMIT: u64 = 50;

/// Referral business service independent of web framework
pub struct ReferralService {
    repo: Arc<dyn ReferralRepository>,
    cfg: ReferralConfig,
}

impl ReferralService {
    pub fn new(repo: Arc<dyn ReferralRepository>, cfg: ReferralConfig) -> Self { Self { repo, cfg } }

    pub fn config(&self) -> &ReferralConfig { &self.cfg }

    fn tree(&self) -> TreeQueryEngine<'_> {
        TreeQueryEngine::new(self.repo.as_ref(), self.cfg.max_depth)
    }

    async fn require_user(&self, user_id: Uuid) -> Result<User, ReferralError> {
        self.repo.get_user(user_id).await?.ok_or_else(|| {
            debug!(user_id = %user_id, "user lookup missed");
            ReferralError::not_found("user", user_id)
        })
    }

    async fn require_invite(&self, invite_id: Uuid) -> Result<Invite, ReferralError> {
        self.repo.get_invite(invite_id).await?.ok_or_else(|| ReferralError::not_found("invite", invite_id))
    }

    /// The caller must exist and hold the `admin` role.
    pub async fn require_admin(&self, caller_id: Uuid) -> Result<User, ReferralError> {
        match self.repo.get_user(caller_id).await? {
            Some(u) if u.role == Role::Admin => Ok(u),
            _ => Err(ReferralError::Forbidden("admin role required".into())),
        }
    }

    /// Sign up a user, optionally under the owner of `referral_code`.
    ///
    /// # Examples
    /// ```
    /// use service::referral::{ReferralService, repository::memory::MemoryReferralRepository};
    /// use service::referral::domain::{RegisterUserInput, Role};
    /// use std::sync::Arc;
    /// let svc = ReferralService::new(Arc::new(MemoryReferralRepository::new()), Default::default());
    /// let root = tokio_test::block_on(svc.register_user(RegisterUserInput { display_name: Some("Ada".into()), referral_code: None })).unwrap();
    /// assert_eq!(root.role, Role::Recruiter);
    /// let input = RegisterUserInput { display_name: None, referral_code: Some(root.referral_code.to_lowercase()) };
    /// let recruit = tokio_test::block_on(svc.register_user(input)).unwrap();
    /// assert_eq!(recruit.parent_id, Some(root.id));
    /// ```
    #[instrument(skip(self, input), fields(with_code = input.referral_code.is_some()))]
    pub async fn register_user(&self, input: RegisterUserInput) -> Result<User, ReferralError> {
        let display_name = input.display_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if let Some(name) = &display_name {
            user_model::validate_display_name(name)?;
        }

        let (parent_id, role) = match input.referral_code.as_deref() {
            Some(code) => (Some(self.resolve_referral_code(code).await?.id), Role::Recruited),
            None => (None, Role::Recruiter),
        };

        for attempt in 1..=CODE_ATTEMPTS {
            let new_user = NewUser {
                display_name: display_name.clone(),
                referral_code: user_model::generate_referral_code(self.cfg.referral_code_len),
                parent_id,
                role,
            };
            match self.repo.insert_user(new_user).await {
                Ok(user) => {
                    info!(event = "user_registered", user_id = %user.id, parent_id = ?user.parent_id, role = ?user.role);
                    return Ok(user);
                }
                Err(ReferralError::Conflict(_)) => debug!(attempt, "referral code collision, regenerating"),
                Err(e) => return Err(e),
            }
        }
        Err(ReferralError::Conflict("could not allocate a unique referral code".into()))
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<User, ReferralError> {
        self.require_user(user_id).await
    }

    /// Owner of a referral code; case and surrounding blanks are ignored.
    #[instrument(skip(self))]
    pub async fn resolve_referral_code(&self, code: &str) -> Result<User, ReferralError> {
        let code = user_model::normalize_referral_code(code);
        user_model::validate_referral_code(&code)?;
        self.repo
            .find_user_by_code(&code)
            .await?
            .ok_or_else(|| ReferralError::NotFound(format!("referral code {code} not found")))
    }

    /// Shareable signup link, `{base}/join/{code}`.
    pub async fn referral_link(&self, user_id: Uuid, base_url: &str) -> Result<String, ReferralError> {
        Ok(self.require_user(user_id).await?.referral_link(base_url))
    }

    #[instrument(skip(self, email), fields(recruiter_id = %recruiter_id))]
    pub async fn create_invite(&self, recruiter_id: Uuid, email: &str) -> Result<Invite, ReferralError> {
        invite_model::validate_email(email)?;
        self.require_user(recruiter_id).await?;
        let invite = self.repo.insert_invite(recruiter_id, &invite_model::normalize_email(email)).await?;
        info!(event = "invite_created", invite_id = %invite.id, recruiter_id = %recruiter_id);
        Ok(invite)
    }

    /// Accept a pending invite and distribute points up the chain.
    ///
    /// A parentless acceptor joins the recruiter's tree as a `recruited`
    /// child; one already attached under another user is rejected.
    ///
    /// Exactly one of several concurrent calls on the same invite wins;
    /// the others, and any later retry, fail with `InvalidState`.
    #[instrument(skip(self), fields(invite_id = %invite_id, user_id = %accepting_user_id))]
    pub async fn accept_invite(&self, invite_id: Uuid, accepting_user_id: Uuid) -> Result<AcceptOutcome, ReferralError> {
        let invite = self.require_invite(invite_id).await?;
        if !invite.is_pending() {
            return Err(ReferralError::InvalidState(format!("invite {invite_id} is already accepted")));
        }
        let acceptor = self.require_user(accepting_user_id).await?;
        if accepting_user_id == invite.recruiter_id {
            return Err(ReferralError::InvalidInput("a recruiter cannot accept their own invite".into()));
        }
        if self.repo.find_accepted_invite_for_recruit(accepting_user_id).await?.is_some() {
            return Err(ReferralError::InvalidState(format!("user {accepting_user_id} already accepted an invite")));
        }
        if self.tree().upline(invite.recruiter_id).await?.iter().any(|u| u.id == accepting_user_id)
            || self.invite_chain_contains(invite.recruiter_id, accepting_user_id).await?
        {
            return Err(ReferralError::InvalidInput("accepting would make the user their own ancestor".into()));
        }
        // the invite chain and the parent forest must agree
        let attach_to = match acceptor.parent_id {
            Some(parent) if parent == invite.recruiter_id => None,
            Some(parent) => {
                return Err(ReferralError::InvalidState(format!(
                    "user {accepting_user_id} already joined under {parent}"
                )))
            }
            None if acceptor.role == Role::Admin => {
                return Err(ReferralError::InvalidInput("an admin cannot join a referral network".into()))
            }
            None => Some(invite.recruiter_id),
        };

        let accepted = self
            .repo
            .accept_invite_if_pending(invite_id, accepting_user_id, attach_to)
            .await?
            .ok_or_else(|| ReferralError::InvalidState(format!("invite {invite_id} is already accepted")))?;
        INVITES_ACCEPTED_TOTAL.inc();
        info!(event = "invite_accepted", invite_id = %invite_id, recruiter_id = %accepted.recruiter_id, recruit_id = %accepting_user_id);

        let distribution = self.run_distribution(&accepted).await?;
        Ok(AcceptOutcome { invite: accepted, distribution })
    }

    /// Whether `target` is reachable from `start` by following accepted invites upward.
    async fn invite_chain_contains(&self, start: Uuid, target: Uuid) -> Result<bool, ReferralError> {
        let mut current = Some(start);
        let mut hops = 0u32;
        while let Some(id) = current {
            if id == target {
                return Ok(true);
            }
            hops += 1;
            if hops > self.cfg.max_depth {
                return Err(super::tree::corrupt_graph(start, hops));
            }
            current = self.repo.find_accepted_invite_for_recruit(id).await?.map(|i| i.recruiter_id);
        }
        Ok(false)
    }

    async fn run_distribution(&self, invite: &Invite) -> Result<DistributionReport, ReferralError> {
        let report = DistributionWorkflow::new(self.repo.as_ref(), self.cfg.base_award).run(invite).await;
        if report.is_complete() {
            info!(invite_id = %invite.id, levels = report.levels.len(), total = report.total_awarded(), "distribution complete");
            Ok(report)
        } else {
            warn!(invite_id = %invite.id, failed = ?report.failed_levels(), "distribution incomplete");
            Err(ReferralError::PartialDistributionFailure(report))
        }
    }

    /// (Re)run distribution for an accepted invite. Recorded levels are skipped.
    #[instrument(skip(self), fields(invite_id = %invite_id))]
    pub async fn distribute_points(&self, invite_id: Uuid) -> Result<DistributionReport, ReferralError> {
        let invite = self.require_invite(invite_id).await?;
        if invite.is_pending() {
            return Err(ReferralError::InvalidState(format!("invite {invite_id} is not accepted")));
        }
        self.run_distribution(&invite).await
    }

    /// Admin replay of the failed levels of an invite.
    #[instrument(skip(self), fields(caller_id = %caller_id, invite_id = %invite_id))]
    pub async fn reconcile_invite(&self, caller_id: Uuid, invite_id: Uuid) -> Result<DistributionReport, ReferralError> {
        self.require_admin(caller_id).await?;
        let report = self.distribute_points(invite_id).await?;
        info!(event = "invite_reconciled", invite_id = %invite_id, newly_awarded = report.total_awarded());
        Ok(report)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_upline(&self, user_id: Uuid) -> Result<Vec<User>, ReferralError> {
        self.tree().upline(user_id).await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_downline(&self, user_id: Uuid) -> Result<Vec<DownlineEntry>, ReferralError> {
        Ok(self.tree().downline(user_id).await?.entries())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_downline_tree(&self, user_id: Uuid) -> Result<Vec<DownlineNode>, ReferralError> {
        Ok(self.tree().downline(user_id).await?.tree())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_layers(&self, user_id: Uuid) -> Result<Vec<Layer>, ReferralError> {
        Ok(self.tree().downline(user_id).await?.layers())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_recruit_counts(&self, user_id: Uuid) -> Result<RecruitCounts, ReferralError> {
        let arena = self.tree().downline(user_id).await?;
        Ok(RecruitCounts { direct: arena.direct_count(), total: arena.len() })
    }

    /// `limit` defaults to 50 and is clamped to `1..=max_leaderboard_limit`.
    #[instrument(skip(self))]
    pub async fn get_leaderboard(&self, limit: Option<u64>) -> Result<Vec<RankedUser>, ReferralError> {
        let limit = limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT).clamp(1, self.cfg.max_leaderboard_limit);
        LeaderboardAggregator::new(self.repo.as_ref(), self.cfg.max_depth).top(limit).await
    }

    pub async fn list_recruiters(&self) -> Result<Vec<User>, ReferralError> {
        self.repo.list_users_by_role(Role::Recruiter).await
    }

    pub async fn list_direct_recruits(&self, user_id: Uuid) -> Result<Vec<User>, ReferralError> {
        self.require_user(user_id).await?;
        self.repo.list_children(&[user_id]).await
    }

    pub async fn list_points_transactions(&self, user_id: Uuid, page: Pagination) -> Result<Vec<PointsTransaction>, ReferralError> {
        self.require_user(user_id).await?;
        self.repo.list_points_transactions(user_id, page).await
    }

    pub async fn list_invites(&self, recruiter_id: Uuid) -> Result<Vec<Invite>, ReferralError> {
        self.require_user(recruiter_id).await?;
        self.repo.list_invites_by_recruiter(recruiter_id).await
    }

    /// Make `user_id` a root recruiter. Their own recruits stay attached.
    #[instrument(skip(self), fields(caller_id = %caller_id, user_id = %user_id))]
    pub async fn promote_to_recruiter(&self, caller_id: Uuid, user_id: Uuid) -> Result<User, ReferralError> {
        self.require_admin(caller_id).await?;
        let target = self.require_user(user_id).await?;
        match target.role {
            Role::Admin => return Err(ReferralError::InvalidState("admins cannot be promoted".into())),
            Role::Recruiter if target.is_root() => return Ok(target),
            _ => {}
        }
        let promoted = self.repo.detach_as_root(user_id).await?.ok_or_else(|| ReferralError::not_found("user", user_id))?;
        info!(event = "user_promoted", user_id = %user_id, previous_parent = ?target.parent_id, by = %caller_id);
        Ok(promoted)
    }
}
