use sea_orm::{entity::prelude::*, ConnectionTrait, Set};
use uuid::Uuid;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors;

/// Position of a user in the referral network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Top-level or promoted recruiter
    #[sea_orm(string_value = "recruiter")]
    Recruiter,
    /// Joined through somebody's referral code
    #[sea_orm(string_value = "recruited")]
    Recruited,
    #[sea_orm(string_value = "admin")]
    Admin,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub display_name: Option<String>,
    #[sea_orm(unique)]
    pub referral_code: String,
    /// Referrer; `None` marks a root of the forest.
    pub parent_id: Option<Uuid>,
    pub role: Role,
    pub points: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Parent,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self { Relation::Parent => Entity::belongs_to(Entity).from(Column::ParentId).to(Column::Id).into() }
    }
}

impl ActiveModelBehavior for ActiveModel {}

// Uppercase alphanumerics without the look-alikes 0/O and 1/I.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a shareable referral code of `len` characters.
pub fn generate_referral_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Canonical form of a user-typed referral code.
pub fn normalize_referral_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn validate_referral_code(code: &str) -> Result<(), errors::ModelError> {
    if code.is_empty() || code.len() > 32 {
        return Err(errors::ModelError::Validation("referral code must be 1..=32 characters".into()));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(errors::ModelError::Validation("referral code must be alphanumeric".into()));
    }
    Ok(())
}

pub fn validate_display_name(name: &str) -> Result<(), errors::ModelError> {
    if name.trim().is_empty() { return Err(errors::ModelError::Validation("display name must not be blank".into())); }
    if name.chars().count() > 128 { return Err(errors::ModelError::Validation("display name too long (<=128)".into())); }
    Ok(())
}

pub async fn create<C: ConnectionTrait>(
    db: &C,
    display_name: Option<&str>,
    referral_code: &str,
    parent_id: Option<Uuid>,
    role: Role,
) -> Result<Model, errors::ModelError> {
    if let Some(name) = display_name { validate_display_name(name)?; }
    validate_referral_code(referral_code)?;
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        display_name: Set(display_name.map(|n| n.trim().to_string())),
        referral_code: Set(referral_code.to_string()),
        parent_id: Set(parent_id),
        role: Set(role),
        points: Set(0),
        created_at: Set(Utc::now().into()),
    };
    am.insert(db).await.map_err(errors::ModelError::from_db)
}
