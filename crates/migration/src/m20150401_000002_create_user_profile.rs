//! Create `user_profile` table keyed by the external (Google) identity id.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserProfile::Table)
                    .if_not_exists()
                    .col(string_len(UserProfile::Id, 64).primary_key())
                    .col(string_len(UserProfile::Name, 255).not_null())
                    .col(text_null(UserProfile::Credential))
                    .col(string_len(UserProfile::Lang, 16).default("en").not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserProfile::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserProfile { Table, Id, Name, Credential, Lang }
