use async_trait::async_trait;
use uuid::Uuid;

use super::domain::{AwardOutcome, Invite, NewUser, PointsAward, PointsTransaction, Role, User};
use super::errors::ReferralError;
use crate::pagination::Pagination;

/// Persistence primitives the referral engine relies on.
///
/// Implementations must make `accept_invite_if_pending` a compare-and-set on
/// the invite status and `award_points` an atomic ledger append plus
/// `points = points + amount` increment.
#[async_trait]
pub trait ReferralRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, ReferralError>;
    async fn find_user_by_code(&self, code: &str) -> Result<Option<User>, ReferralError>;
    /// Fails with `Conflict` when the referral code is taken.
    async fn insert_user(&self, new_user: NewUser) -> Result<User, ReferralError>;
    /// Direct children of any of `parent_ids`, oldest first.
    async fn list_children(&self, parent_ids: &[Uuid]) -> Result<Vec<User>, ReferralError>;
    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, ReferralError>;
    /// Highest balances first; ties by earliest `created_at`.
    async fn top_users_by_points(&self, limit: u64) -> Result<Vec<User>, ReferralError>;
    /// Clear `parent_id` and set role `recruiter`; `None` if the user is unknown.
    async fn detach_as_root(&self, user_id: Uuid) -> Result<Option<User>, ReferralError>;

    async fn insert_invite(&self, recruiter_id: Uuid, invite_email: &str) -> Result<Invite, ReferralError>;
    async fn get_invite(&self, id: Uuid) -> Result<Option<Invite>, ReferralError>;
    async fn list_invites_by_recruiter(&self, recruiter_id: Uuid) -> Result<Vec<Invite>, ReferralError>;
    /// `pending -> accepted` compare-and-set. `None` when the invite was not pending.
    ///
    /// With `attach_to`, the recruit (a parentless non-admin) becomes a
    /// `recruited` child of that user in the same unit; if the recruit no
    /// longer qualifies the invite stays pending and `InvalidState` is returned.
    async fn accept_invite_if_pending(
        &self,
        invite_id: Uuid,
        recruit_id: Uuid,
        attach_to: Option<Uuid>,
    ) -> Result<Option<Invite>, ReferralError>;
    async fn find_accepted_invite_for_recruit(&self, recruit_id: Uuid) -> Result<Option<Invite>, ReferralError>;

    /// Append the ledger row and increment the balance as one unit.
    async fn award_points(&self, award: &PointsAward) -> Result<AwardOutcome, ReferralError>;
    /// Newest first
    async fn list_points_transactions(&self, user_id: Uuid, page: Pagination) -> Result<Vec<PointsTransaction>, ReferralError>;
}

/// In-memory repository for tests, demos and the HTTP test suite
pub mod memory {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard};

    use crate::referral::domain::InviteStatus;

    #[derive(Default)]
    struct State {
        users: HashMap<Uuid, User>,
        invites: HashMap<Uuid, Invite>,
        ledger: Vec<PointsTransaction>,
    }

    #[derive(Default)]
    pub struct MemoryReferralRepository {
        state: Mutex<State>,
    }

    impl MemoryReferralRepository {
        pub fn new() -> Self { Self::default() }

        fn state(&self) -> Result<MutexGuard<'_, State>, ReferralError> {
            self.state.lock().map_err(|_| ReferralError::Repository("memory store poisoned".into()))
        }

        /// Rewrite a parent pointer without any checks (fixtures only).
        pub fn set_parent_unchecked(&self, user_id: Uuid, parent_id: Option<Uuid>) -> Result<(), ReferralError> {
            let mut st = self.state()?;
            let u = st.users.get_mut(&user_id).ok_or_else(|| ReferralError::not_found("user", user_id))?;
            u.parent_id = parent_id;
            Ok(())
        }

        pub fn set_points(&self, user_id: Uuid, points: i64) -> Result<(), ReferralError> {
            let mut st = self.state()?;
            let u = st.users.get_mut(&user_id).ok_or_else(|| ReferralError::not_found("user", user_id))?;
            u.points = points;
            Ok(())
        }

        pub fn set_created_at(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), ReferralError> {
            let mut st = self.state()?;
            let u = st.users.get_mut(&user_id).ok_or_else(|| ReferralError::not_found("user", user_id))?;
            u.created_at = at;
            Ok(())
        }

        /// Full ledger in insertion order
        pub fn ledger(&self) -> Result<Vec<PointsTransaction>, ReferralError> {
            Ok(self.state()?.ledger.clone())
        }
    }

    fn by_age(a: &User, b: &User) -> std::cmp::Ordering {
        a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
    }

    #[async_trait]
    impl ReferralRepository for MemoryReferralRepository {
        async fn get_user(&self, id: Uuid) -> Result<Option<User>, ReferralError> {
            Ok(self.state()?.users.get(&id).cloned())
        }

        async fn find_user_by_code(&self, code: &str) -> Result<Option<User>, ReferralError> {
            Ok(self.state()?.users.values().find(|u| u.referral_code == code).cloned())
        }

        async fn insert_user(&self, new_user: NewUser) -> Result<User, ReferralError> {
            let mut st = self.state()?;
            if st.users.values().any(|u| u.referral_code == new_user.referral_code) {
                return Err(ReferralError::Conflict(format!("referral code {} taken", new_user.referral_code)));
            }
            if let Some(p) = new_user.parent_id {
                if !st.users.contains_key(&p) {
                    return Err(ReferralError::not_found("user", p));
                }
            }
            let user = User {
                id: Uuid::new_v4(),
                display_name: new_user.display_name,
                referral_code: new_user.referral_code,
                parent_id: new_user.parent_id,
                role: new_user.role,
                points: 0,
                created_at: Utc::now(),
            };
            st.users.insert(user.id, user.clone());
            Ok(user)
        }

        async fn list_children(&self, parent_ids: &[Uuid]) -> Result<Vec<User>, ReferralError> {
            let st = self.state()?;
            let mut out: Vec<User> = st
                .users
                .values()
                .filter(|u| u.parent_id.map_or(false, |p| parent_ids.contains(&p)))
                .cloned()
                .collect();
            out.sort_by(by_age);
            Ok(out)
        }

        async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, ReferralError> {
            let st = self.state()?;
            let mut out: Vec<User> = st.users.values().filter(|u| u.role == role).cloned().collect();
            out.sort_by(by_age);
            Ok(out)
        }

        async fn top_users_by_points(&self, limit: u64) -> Result<Vec<User>, ReferralError> {
            let st = self.state()?;
            let mut out: Vec<User> = st.users.values().cloned().collect();
            out.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| by_age(a, b)));
            out.truncate(limit as usize);
            Ok(out)
        }

        async fn detach_as_root(&self, user_id: Uuid) -> Result<Option<User>, ReferralError> {
            let mut st = self.state()?;
            Ok(st.users.get_mut(&user_id).map(|u| {
                u.parent_id = None;
                u.role = Role::Recruiter;
                u.clone()
            }))
        }

        async fn insert_invite(&self, recruiter_id: Uuid, invite_email: &str) -> Result<Invite, ReferralError> {
            let mut st = self.state()?;
            if !st.users.contains_key(&recruiter_id) {
                return Err(ReferralError::not_found("user", recruiter_id));
            }
            let invite = Invite {
                id: Uuid::new_v4(),
                recruiter_id,
                invite_email: invite_email.to_string(),
                status: InviteStatus::Pending,
                recruit_id: None,
                created_at: Utc::now(),
                accepted_at: None,
            };
            st.invites.insert(invite.id, invite.clone());
            Ok(invite)
        }

        async fn get_invite(&self, id: Uuid) -> Result<Option<Invite>, ReferralError> {
            Ok(self.state()?.invites.get(&id).cloned())
        }

        async fn list_invites_by_recruiter(&self, recruiter_id: Uuid) -> Result<Vec<Invite>, ReferralError> {
            let st = self.state()?;
            let mut out: Vec<Invite> = st.invites.values().filter(|i| i.recruiter_id == recruiter_id).cloned().collect();
            out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(out)
        }

        async fn accept_invite_if_pending(
            &self,
            invite_id: Uuid,
            recruit_id: Uuid,
            attach_to: Option<Uuid>,
        ) -> Result<Option<Invite>, ReferralError> {
            let mut st = self.state()?;
            // unique index on invites.recruit_id
            if st.invites.values().any(|i| i.recruit_id == Some(recruit_id)) {
                return Err(ReferralError::InvalidState(format!("user {recruit_id} already accepted an invite")));
            }
            if !st.invites.get(&invite_id).is_some_and(|i| i.status == InviteStatus::Pending) {
                return Ok(None);
            }
            if let Some(parent_id) = attach_to {
                let recruit = st.users.get_mut(&recruit_id).ok_or_else(|| ReferralError::not_found("user", recruit_id))?;
                if recruit.parent_id.is_some() || recruit.role == Role::Admin {
                    return Err(ReferralError::InvalidState(format!("user {recruit_id} cannot join under {parent_id}")));
                }
                recruit.parent_id = Some(parent_id);
                recruit.role = Role::Recruited;
            }
            let Some(invite) = st.invites.get_mut(&invite_id) else { return Ok(None) };
            invite.status = InviteStatus::Accepted;
            invite.recruit_id = Some(recruit_id);
            invite.accepted_at = Some(Utc::now());
            Ok(Some(invite.clone()))
        }

        async fn find_accepted_invite_for_recruit(&self, recruit_id: Uuid) -> Result<Option<Invite>, ReferralError> {
            let st = self.state()?;
            Ok(st
                .invites
                .values()
                .find(|i| i.status == InviteStatus::Accepted && i.recruit_id == Some(recruit_id))
                .cloned())
        }

        async fn award_points(&self, award: &PointsAward) -> Result<AwardOutcome, ReferralError> {
            let mut st = self.state()?;
            let replay = st
                .ledger
                .iter()
                .any(|t| t.related_invite_id == Some(award.invite_id) && t.level == Some(award.level));
            if replay {
                return Ok(AwardOutcome::AlreadyApplied);
            }
            let user = st.users.get_mut(&award.user_id).ok_or_else(|| ReferralError::not_found("user", award.user_id))?;
            user.points += award.amount;
            st.ledger.push(PointsTransaction {
                id: Uuid::new_v4(),
                user_id: award.user_id,
                amount: award.amount,
                reason: award.reason.clone(),
                related_invite_id: Some(award.invite_id),
                level: Some(award.level),
                created_at: Utc::now(),
            });
            Ok(AwardOutcome::Applied)
        }

        async fn list_points_transactions(&self, user_id: Uuid, page: Pagination) -> Result<Vec<PointsTransaction>, ReferralError> {
            let (page_idx, per_page) = page.normalize();
            let st = self.state()?;
            // ledger is append-only, so reverse insertion order is newest first
            Ok(st
                .ledger
                .iter()
                .rev()
                .filter(|t| t.user_id == user_id)
                .skip((page_idx * per_page) as usize)
                .take(per_page as usize)
                .cloned()
                .collect())
        }
    }
}
