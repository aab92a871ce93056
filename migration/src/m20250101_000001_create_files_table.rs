use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Files::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Files::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Files::App).string_len(50).not_null())
                    .col(ColumnDef::new(Files::TenantId).string_len(80).null())
                    .col(ColumnDef::new(Files::OwnerId).string_len(80).null())
                    .col(ColumnDef::new(Files::Visibility).string_len(20).not_null())
                    .col(ColumnDef::new(Files::Bucket).string_len(120).not_null())
                    .col(ColumnDef::new(Files::ObjectKey).string_len(900).not_null())
                    .col(ColumnDef::new(Files::OriginalName).string_len(255).not_null())
                    .col(ColumnDef::new(Files::MimeType).string_len(120).not_null())
                    .col(ColumnDef::new(Files::Size).big_integer().not_null())
                    .col(ColumnDef::new(Files::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Single-column lookups
        for (name, column) in [
            ("idx_files_app", Files::App),
            ("idx_files_tenant_id", Files::TenantId),
            ("idx_files_owner_id", Files::OwnerId),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Files::Table)
                        .col(column)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
        }

        // Listing by partition, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_files_app_tenant_created")
                    .table(Files::Table)
                    .col(Files::App)
                    .col(Files::TenantId)
                    .col(Files::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_files_app_owner_created")
                    .table(Files::Table)
                    .col(Files::App)
                    .col(Files::OwnerId)
                    .col(Files::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Files::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Files {
    Table,
    Id,
    App,
    TenantId,
    OwnerId,
    Visibility,
    Bucket,
    ObjectKey,
    OriginalName,
    MimeType,
    Size,
    CreatedAt,
}
