//! Add the nullable one-to-one `user_profile.user_id -> user.id` link.
//!
//! SQLite cannot add a UNIQUE column or alter foreign keys, so uniqueness comes
//! from an index and the FK constraint is only added on other backends.
use sea_orm_migration::{prelude::*, sea_orm::DbBackend};

const UNIQ_PROFILE_USER: &str = "uniq_user_profile_user";
const FK_PROFILE_USER: &str = "fk_user_profile_user";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(UserProfile::Table)
                    .add_column(ColumnDef::new(UserProfile::UserId).integer().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(UNIQ_PROFILE_USER)
                    .table(UserProfile::Table)
                    .col(UserProfile::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        if manager.get_database_backend() != DbBackend::Sqlite {
            manager
                .create_foreign_key(
                    ForeignKey::create()
                        .name(FK_PROFILE_USER)
                        .from(UserProfile::Table, UserProfile::UserId)
                        .to(User::Table, User::Id)
                        .on_delete(ForeignKeyAction::SetNull)
                        .on_update(ForeignKeyAction::Cascade)
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.get_database_backend() != DbBackend::Sqlite {
            manager
                .drop_foreign_key(
                    ForeignKey::drop()
                        .name(FK_PROFILE_USER)
                        .table(UserProfile::Table)
                        .to_owned(),
                )
                .await?;
        }
        manager
            .drop_index(
                Index::drop()
                    .name(UNIQ_PROFILE_USER)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(UserProfile::Table)
                    .drop_column(UserProfile::UserId)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum UserProfile { Table, UserId }

#[derive(DeriveIden)]
enum User { Table, Id }
