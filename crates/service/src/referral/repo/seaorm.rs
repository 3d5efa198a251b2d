use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use models::errors::ModelError;
use models::{invite, points_transaction, user};

use crate::pagination::Pagination;
use crate::referral::domain::{
    AwardOutcome, Invite, InviteStatus, NewUser, PointsAward, PointsTransaction, Role, User,
};
use crate::referral::errors::ReferralError;
use crate::referral::repository::ReferralRepository;

pub struct SeaOrmReferralRepository {
    pub db: DatabaseConnection,
}

impl SeaOrmReferralRepository {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }
}

fn repo_err(e: DbErr) -> ReferralError {
    ReferralError::Repository(e.to_string())
}

fn to_user(m: user::Model) -> User {
    User {
        id: m.id,
        display_name: m.display_name,
        referral_code: m.referral_code,
        parent_id: m.parent_id,
        role: m.role,
        points: m.points,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

fn to_invite(m: invite::Model) -> Invite {
    Invite {
        id: m.id,
        recruiter_id: m.recruiter_id,
        invite_email: m.invite_email,
        status: m.status,
        recruit_id: m.recruit_id,
        created_at: m.created_at.with_timezone(&Utc),
        accepted_at: m.accepted_at.map(|t| t.with_timezone(&Utc)),
    }
}

fn to_tx(m: points_transaction::Model) -> PointsTransaction {
    PointsTransaction {
        id: m.id,
        user_id: m.user_id,
        amount: m.amount,
        reason: m.reason,
        related_invite_id: m.related_invite_id,
        level: m.level.and_then(|l| u32::try_from(l).ok()),
        created_at: m.created_at.with_timezone(&Utc),
    }
}

#[async_trait::async_trait]
impl ReferralRepository for SeaOrmReferralRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, ReferralError> {
        let res = user::Entity::find_by_id(id).one(&self.db).await.map_err(repo_err)?;
        Ok(res.map(to_user))
    }

    async fn find_user_by_code(&self, code: &str) -> Result<Option<User>, ReferralError> {
        let res = user::Entity::find()
            .filter(user::Column::ReferralCode.eq(code.to_string()))
            .one(&self.db)
            .await
            .map_err(repo_err)?;
        Ok(res.map(to_user))
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User, ReferralError> {
        let created = user::create(
            &self.db,
            new_user.display_name.as_deref(),
            &new_user.referral_code,
            new_user.parent_id,
            new_user.role,
        )
        .await?;
        Ok(to_user(created))
    }

    async fn list_children(&self, parent_ids: &[Uuid]) -> Result<Vec<User>, ReferralError> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = user::Entity::find()
            .filter(user::Column::ParentId.is_in(parent_ids.iter().copied()))
            .order_by_asc(user::Column::CreatedAt)
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await
            .map_err(repo_err)?;
        Ok(rows.into_iter().map(to_user).collect())
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, ReferralError> {
        let rows = user::Entity::find()
            .filter(user::Column::Role.eq(role))
            .order_by_asc(user::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(repo_err)?;
        Ok(rows.into_iter().map(to_user).collect())
    }

    async fn top_users_by_points(&self, limit: u64) -> Result<Vec<User>, ReferralError> {
        let rows = user::Entity::find()
            .order_by_desc(user::Column::Points)
            .order_by_asc(user::Column::CreatedAt)
            .order_by_asc(user::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(repo_err)?;
        Ok(rows.into_iter().map(to_user).collect())
    }

    async fn detach_as_root(&self, user_id: Uuid) -> Result<Option<User>, ReferralError> {
        let Some(found) = user::Entity::find_by_id(user_id).one(&self.db).await.map_err(repo_err)? else {
            return Ok(None);
        };
        // only the two touched columns are written, so concurrent point increments survive
        let mut am: user::ActiveModel = found.into();
        am.parent_id = Set(None);
        am.role = Set(Role::Recruiter);
        let updated = am.update(&self.db).await.map_err(repo_err)?;
        Ok(Some(to_user(updated)))
    }

    async fn insert_invite(&self, recruiter_id: Uuid, invite_email: &str) -> Result<Invite, ReferralError> {
        let created = invite::create(&self.db, recruiter_id, invite_email).await?;
        Ok(to_invite(created))
    }

    async fn get_invite(&self, id: Uuid) -> Result<Option<Invite>, ReferralError> {
        let res = invite::Entity::find_by_id(id).one(&self.db).await.map_err(repo_err)?;
        Ok(res.map(to_invite))
    }

    async fn list_invites_by_recruiter(&self, recruiter_id: Uuid) -> Result<Vec<Invite>, ReferralError> {
        let rows = invite::Entity::find()
            .filter(invite::Column::RecruiterId.eq(recruiter_id))
            .order_by_desc(invite::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(repo_err)?;
        Ok(rows.into_iter().map(to_invite).collect())
    }

    async fn accept_invite_if_pending(
        &self,
        invite_id: Uuid,
        recruit_id: Uuid,
        attach_to: Option<Uuid>,
    ) -> Result<Option<Invite>, ReferralError> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let txn = self.db.begin().await.map_err(repo_err)?;

        let res = invite::Entity::update_many()
            .col_expr(invite::Column::Status, Expr::value(InviteStatus::Accepted))
            .col_expr(invite::Column::RecruitId, Expr::value(recruit_id))
            .col_expr(invite::Column::AcceptedAt, Expr::value(now))
            .filter(invite::Column::Id.eq(invite_id))
            .filter(invite::Column::Status.eq(InviteStatus::Pending))
            .exec(&txn)
            .await
            .map_err(|e| match ModelError::from_db(e) {
                ModelError::Conflict(_) => {
                    ReferralError::InvalidState(format!("user {recruit_id} already accepted an invite"))
                }
                other => other.into(),
            })?;
        if res.rows_affected == 0 {
            txn.rollback().await.map_err(repo_err)?;
            return Ok(None);
        }

        if let Some(parent_id) = attach_to {
            // only a parentless non-admin can be attached; re-checked under the transaction
            let attached = user::Entity::update_many()
                .col_expr(user::Column::ParentId, Expr::value(parent_id))
                .col_expr(user::Column::Role, Expr::value(Role::Recruited))
                .filter(user::Column::Id.eq(recruit_id))
                .filter(user::Column::ParentId.is_null())
                .filter(user::Column::Role.ne(Role::Admin))
                .exec(&txn)
                .await
                .map_err(repo_err)?;
            if attached.rows_affected == 0 {
                txn.rollback().await.map_err(repo_err)?;
                return Err(ReferralError::InvalidState(format!("user {recruit_id} cannot join under {parent_id}")));
            }
        }

        let accepted = invite::Entity::find_by_id(invite_id).one(&txn).await.map_err(repo_err)?;
        txn.commit().await.map_err(repo_err)?;
        Ok(accepted.map(to_invite))
    }

    async fn find_accepted_invite_for_recruit(&self, recruit_id: Uuid) -> Result<Option<Invite>, ReferralError> {
        let res = invite::Entity::find()
            .filter(invite::Column::RecruitId.eq(recruit_id))
            .filter(invite::Column::Status.eq(InviteStatus::Accepted))
            .one(&self.db)
            .await
            .map_err(repo_err)?;
        Ok(res.map(to_invite))
    }

    async fn award_points(&self, award: &PointsAward) -> Result<AwardOutcome, ReferralError> {
        let level = i32::try_from(award.level).map_err(|_| ReferralError::InvalidInput("level out of range".into()))?;
        let txn = self.db.begin().await.map_err(repo_err)?;

        let existing = points_transaction::Entity::find()
            .filter(points_transaction::Column::RelatedInviteId.eq(award.invite_id))
            .filter(points_transaction::Column::Level.eq(level))
            .one(&txn)
            .await
            .map_err(repo_err)?;
        if existing.is_some() {
            txn.rollback().await.map_err(repo_err)?;
            return Ok(AwardOutcome::AlreadyApplied);
        }

        // points = points + amount, evaluated by the database
        let res = user::Entity::update_many()
            .col_expr(user::Column::Points, Expr::col(user::Column::Points).add(award.amount))
            .filter(user::Column::Id.eq(award.user_id))
            .exec(&txn)
            .await
            .map_err(repo_err)?;
        if res.rows_affected == 0 {
            txn.rollback().await.map_err(repo_err)?;
            return Err(ReferralError::not_found("user", award.user_id));
        }

        match points_transaction::create(&txn, award.user_id, award.amount, &award.reason, Some(award.invite_id), Some(level)).await {
            Ok(_) => {}
            // lost a race on (related_invite_id, level)
            Err(ModelError::Conflict(_)) => {
                txn.rollback().await.map_err(repo_err)?;
                return Ok(AwardOutcome::AlreadyApplied);
            }
            Err(e) => return Err(e.into()),
        }

        txn.commit().await.map_err(repo_err)?;
        Ok(AwardOutcome::Applied)
    }

    async fn list_points_transactions(&self, user_id: Uuid, page: Pagination) -> Result<Vec<PointsTransaction>, ReferralError> {
        let (page_idx, per_page) = page.normalize();
        let rows = points_transaction::Entity::find()
            .filter(points_transaction::Column::UserId.eq(user_id))
            .order_by_desc(points_transaction::Column::CreatedAt)
            .order_by_desc(points_transaction::Column::Id)
            .paginate(&self.db, per_page)
            .fetch_page(page_idx)
            .await
            .map_err(repo_err)?;
        Ok(rows.into_iter().map(to_tx).collect())
    }
}
