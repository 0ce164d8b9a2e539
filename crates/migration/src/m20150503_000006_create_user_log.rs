//! Per-profile activity log written by background tasks.
use sea_orm_migration::{prelude::*, schema::*};

const IDX_LOG_PROFILE: &str = "idx_user_log_profile";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserLog::Table)
                    .if_not_exists()
                    .col(pk_auto(UserLog::Id))
                    .col(string_len(UserLog::ProfileId, 64).not_null())
                    .col(timestamp_with_time_zone(UserLog::Time).not_null())
                    .col(string_len(UserLog::Level, 16).not_null())
                    .col(text(UserLog::Message).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_log_profile")
                            .from(UserLog::Table, UserLog::ProfileId)
                            .to(UserProfile::Table, UserProfile::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name(IDX_LOG_PROFILE)
                    .table(UserLog::Table)
                    .col(UserLog::ProfileId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserLog::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserLog { Table, Id, ProfileId, Time, Level, Message }

#[derive(DeriveIden)]
enum UserProfile { Table, Id }
