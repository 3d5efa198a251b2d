use sea_orm::{entity::prelude::*, ConnectionTrait, Set};
use uuid::Uuid;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{errors, invite, user};

/// Append-only ledger row; never updated or deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "points_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Recipient
    pub user_id: Uuid,
    pub amount: i64,
    pub reason: String,
    pub related_invite_id: Option<Uuid>,
    /// 1-based chain level for distribution awards.
    pub level: Option<i32>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation { User, Invite }

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::User => Entity::belongs_to(user::Entity).from(Column::UserId).to(user::Column::Id).into(),
            Relation::Invite => Entity::belongs_to(invite::Entity).from(Column::RelatedInviteId).to(invite::Column::Id).into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Ledger reason for a distribution award at `level`.
pub fn level_reason(level: u32) -> String {
    format!("Recruit accepted - Level {level} reward")
}

/// Insert a ledger row. Fails on the `(related_invite_id, level)` unique
/// index when the award was already recorded.
pub async fn create<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    amount: i64,
    reason: &str,
    related_invite_id: Option<Uuid>,
    level: Option<i32>,
) -> Result<Model, errors::ModelError> {
    if amount <= 0 {
        return Err(errors::ModelError::Validation("amount must be > 0".into()));
    }
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        amount: Set(amount),
        reason: Set(reason.to_string()),
        related_invite_id: Set(related_invite_id),
        level: Set(level),
        created_at: Set(Utc::now().into()),
    };
    am.insert(db).await.map_err(errors::ModelError::from_db)
}
