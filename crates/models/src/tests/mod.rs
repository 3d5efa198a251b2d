//! Database-backed entity tests. They skip when `SKIP_DB_TESTS` is set or
//! no Postgres is reachable at `DATABASE_URL`.

use crate::db::connect;
use crate::{invite, points_transaction, user, InviteStatus, Role};
use anyhow::Result;
use migration::MigratorTrait;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

/// Setup test database with migrations; `None` means skip.
async fn setup_test_db() -> Option<DatabaseConnection> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return None;
    }
    let db = match connect().await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("skip: cannot connect to db: {}", e);
            return None;
        }
    };
    if let Err(e) = migration::Migrator::up(&db, None).await {
        eprintln!("skip: migrate up failed: {}", e);
        return None;
    }
    Some(db)
}

fn unique_code() -> String {
    user::generate_referral_code(12)
}

#[tokio::test]
async fn test_user_parent_relation_and_role_roundtrip() -> Result<()> {
    let Some(db) = setup_test_db().await else { return Ok(()) };

    let root = user::create(&db, Some("Root"), &unique_code(), None, Role::Recruiter).await?;
    let child = user::create(&db, None, &unique_code(), Some(root.id), Role::Recruited).await?;

    let found = user::Entity::find_by_id(child.id).one(&db).await?.expect("child exists");
    assert_eq!(found.parent_id, Some(root.id));
    assert_eq!(found.role, Role::Recruited);
    assert_eq!(found.points, 0);

    let children = user::Entity::find()
        .filter(user::Column::ParentId.eq(root.id))
        .all(&db)
        .await?;
    assert_eq!(children.len(), 1);

    user::Entity::delete_by_id(child.id).exec(&db).await?;
    user::Entity::delete_by_id(root.id).exec(&db).await?;
    Ok(())
}

#[tokio::test]
async fn test_duplicate_referral_code_rejected() -> Result<()> {
    let Some(db) = setup_test_db().await else { return Ok(()) };

    let code = unique_code();
    let first = user::create(&db, None, &code, None, Role::Recruiter).await?;
    let dup = user::create(&db, None, &code, None, Role::Recruiter).await;
    assert!(dup.is_err());

    user::Entity::delete_by_id(first.id).exec(&db).await?;
    Ok(())
}

#[tokio::test]
async fn test_invite_and_ledger_rows() -> Result<()> {
    let Some(db) = setup_test_db().await else { return Ok(()) };

    let recruiter = user::create(&db, None, &unique_code(), None, Role::Recruiter).await?;
    let inv = invite::create(&db, recruiter.id, &format!("New_{}@Example.com", Uuid::new_v4())).await?;
    assert_eq!(inv.status, InviteStatus::Pending);
    assert!(inv.invite_email.chars().all(|c| !c.is_ascii_uppercase()));

    let mut am: invite::ActiveModel = inv.clone().into();
    am.status = Set(InviteStatus::Accepted);
    let updated = am.update(&db).await?;
    assert_eq!(updated.status, InviteStatus::Accepted);

    let reason = points_transaction::level_reason(1);
    points_transaction::create(&db, recruiter.id, 1000, &reason, Some(inv.id), Some(1)).await?;
    // Same (invite, level) twice violates the unique index
    let again = points_transaction::create(&db, recruiter.id, 1000, &reason, Some(inv.id), Some(1)).await;
    assert!(again.is_err());

    user::Entity::delete_by_id(recruiter.id).exec(&db).await?;
    Ok(())
}
