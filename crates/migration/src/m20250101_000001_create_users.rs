//! Create `users` table: the referral forest.
//!
//! `parent_id` is a self-reference; NULL marks a root recruiter.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(uuid(Users::Id).primary_key())
                    .col(string_len_null(Users::DisplayName, 128))
                    .col(string_len(Users::ReferralCode, 32).unique_key().not_null())
                    .col(uuid_null(Users::ParentId))
                    .col(string_len(Users::Role, 16).not_null())
                    .col(
                        big_integer(Users::Points)
                            .not_null()
                            .default(0)
                            .check(Expr::col(Users::Points).gte(0)),
                    )
                    .col(timestamp_with_time_zone(Users::CreatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_parent")
                            .from(Users::Table, Users::ParentId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Users { Table, Id, DisplayName, ReferralCode, ParentId, Role, Points, CreatedAt }
