//! Create `points_transactions`: append-only audit log of point awards.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PointsTransactions::Table)
                    .if_not_exists()
                    .col(uuid(PointsTransactions::Id).primary_key())
                    .col(uuid(PointsTransactions::UserId).not_null())
                    .col(
                        big_integer(PointsTransactions::Amount)
                            .not_null()
                            .check(Expr::col(PointsTransactions::Amount).gt(0)),
                    )
                    .col(text(PointsTransactions::Reason).not_null())
                    .col(uuid_null(PointsTransactions::RelatedInviteId))
                    .col(integer_null(PointsTransactions::Level))
                    .col(timestamp_with_time_zone(PointsTransactions::CreatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_points_tx_user")
                            .from(PointsTransactions::Table, PointsTransactions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_points_tx_invite")
                            .from(PointsTransactions::Table, PointsTransactions::RelatedInviteId)
                            .to(Invites::Table, Invites::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(PointsTransactions::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum PointsTransactions { Table, Id, UserId, Amount, Reason, RelatedInviteId, Level, CreatedAt }

#[derive(DeriveIden)]
enum Users { Table, Id }

#[derive(DeriveIden)]
enum Invites { Table, Id }
