//! Add the auto-renew preferences edited on the settings page.
//!
//! One column per ALTER statement; SQLite rejects multi-column alters.
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let columns = [
            ColumnDef::new(UserProfile::RenewEnabled).boolean().not_null().default(false).to_owned(),
            ColumnDef::new(UserProfile::RenewDate).integer().not_null().default(3).to_owned(),
            ColumnDef::new(UserProfile::CalendarName).string_len(128).not_null().default("slh autorenew").to_owned(),
        ];
        for col in columns {
            manager
                .alter_table(
                    Table::alter()
                        .table(UserProfile::Table)
                        .add_column(col)
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for col in [UserProfile::CalendarName, UserProfile::RenewDate, UserProfile::RenewEnabled] {
            manager
                .alter_table(
                    Table::alter()
                        .table(UserProfile::Table)
                        .drop_column(col)
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum UserProfile { Table, RenewEnabled, RenewDate, CalendarName }
