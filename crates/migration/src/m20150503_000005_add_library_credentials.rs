//! Library system credentials used by the renew job.
//!
//! A library login belongs to at most one profile; SQLite needs the unique
//! index since it cannot add a UNIQUE column.
use sea_orm_migration::prelude::*;

const UNIQ_LIBRARY_LOGIN: &str = "uniq_user_profile_library_login";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let columns = [
            ColumnDef::new(UserProfile::LibraryLogin).string_len(64).null().to_owned(),
            ColumnDef::new(UserProfile::LibraryPassword).string_len(128).null().to_owned(),
        ];
        for col in columns {
            manager
                .alter_table(Table::alter().table(UserProfile::Table).add_column(col).to_owned())
                .await?;
        }
        manager
            .create_index(
                Index::create()
                    .name(UNIQ_LIBRARY_LOGIN)
                    .table(UserProfile::Table)
                    .col(UserProfile::LibraryLogin)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name(UNIQ_LIBRARY_LOGIN).to_owned())
            .await?;
        for col in [UserProfile::LibraryPassword, UserProfile::LibraryLogin] {
            manager
                .alter_table(Table::alter().table(UserProfile::Table).drop_column(col).to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum UserProfile { Table, LibraryLogin, LibraryPassword }
