use sea_orm::{entity::prelude::*, ConnectionTrait, Set};
use uuid::Uuid;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{errors, user};

/// Invite lifecycle: `Pending --accept--> Accepted` (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invites")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub recruiter_id: Uuid,
    pub invite_email: String,
    pub status: InviteStatus,
    /// User who accepted; set exactly once together with `Accepted`.
    pub recruit_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub accepted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation { Recruiter, Recruit }

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Recruiter => Entity::belongs_to(user::Entity).from(Column::RecruiterId).to(user::Column::Id).into(),
            Relation::Recruit => Entity::belongs_to(user::Entity).from(Column::RecruitId).to(user::Column::Id).into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_pending(&self) -> bool { self.status == InviteStatus::Pending }
}

/// Trim and lowercase an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), errors::ModelError> {
    let email = email.trim();
    if email.len() > 255 {
        return Err(errors::ModelError::Validation("email too long (<=255)".into()));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => Ok(()),
        _ => Err(errors::ModelError::Validation("valid email address is required".into())),
    }
}

pub async fn create<C: ConnectionTrait>(db: &C, recruiter_id: Uuid, invite_email: &str) -> Result<Model, errors::ModelError> {
    validate_email(invite_email)?;
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        recruiter_id: Set(recruiter_id),
        invite_email: Set(normalize_email(invite_email)),
        status: Set(InviteStatus::Pending),
        recruit_id: Set(None),
        created_at: Set(Utc::now().into()),
        accepted_at: Set(None),
    };
    am.insert(db).await.map_err(errors::ModelError::from_db)
}
