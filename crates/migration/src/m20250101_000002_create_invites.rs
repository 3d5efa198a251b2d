//! Create `invites` table with FKs to the inviting and the accepting user.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Invites::Table)
                    .if_not_exists()
                    .col(uuid(Invites::Id).primary_key())
                    .col(uuid(Invites::RecruiterId).not_null())
                    .col(string_len(Invites::InviteEmail, 255).not_null())
                    .col(string_len(Invites::Status, 16).not_null().default("pending"))
                    .col(uuid_null(Invites::RecruitId))
                    .col(timestamp_with_time_zone(Invites::CreatedAt).not_null())
                    .col(timestamp_with_time_zone_null(Invites::AcceptedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invites_recruiter")
                            .from(Invites::Table, Invites::RecruiterId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invites_recruit")
                            .from(Invites::Table, Invites::RecruitId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Invites::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Invites { Table, Id, RecruiterId, InviteEmail, Status, RecruitId, CreatedAt, AcceptedAt }

#[derive(DeriveIden)]
enum Users { Table, Id }
