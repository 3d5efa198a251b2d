use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Users: children lookup
        manager
            .create_index(
                Index::create()
                    .name("idx_users_parent")
                    .table(Users::Table)
                    .col(Users::ParentId)
                    .to_owned(),
            )
            .await?;

        // Users: leaderboard ordering
        manager
            .create_index(
                Index::create()
                    .name("idx_users_points_created")
                    .table(Users::Table)
                    .col((Users::Points, IndexOrder::Desc))
                    .col(Users::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Invites: per-recruiter listing and status filters
        manager
            .create_index(
                Index::create()
                    .name("idx_invites_recruiter")
                    .table(Invites::Table)
                    .col(Invites::RecruiterId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_invites_status")
                    .table(Invites::Table)
                    .col(Invites::Status)
                    .to_owned(),
            )
            .await?;

        // Invites: a user is the recruit of at most one invite
        manager
            .create_index(
                Index::create()
                    .name("uniq_invites_recruit")
                    .table(Invites::Table)
                    .col(Invites::RecruitId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // PointsTransactions: one award per (invite, level); makes replay idempotent
        manager
            .create_index(
                Index::create()
                    .name("uniq_points_tx_invite_level")
                    .table(PointsTransactions::Table)
                    .col(PointsTransactions::RelatedInviteId)
                    .col(PointsTransactions::Level)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_points_tx_user")
                    .table(PointsTransactions::Table)
                    .col(PointsTransactions::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_users_parent").table(Users::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_users_points_created").table(Users::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_invites_recruiter").table(Invites::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_invites_status").table(Invites::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("uniq_invites_recruit").table(Invites::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("uniq_points_tx_invite_level").table(PointsTransactions::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_points_tx_user").table(PointsTransactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users { Table, ParentId, Points, CreatedAt }

#[derive(DeriveIden)]
enum Invites { Table, RecruiterId, Status, RecruitId }

#[derive(DeriveIden)]
enum PointsTransactions { Table, RelatedInviteId, Level, UserId }
