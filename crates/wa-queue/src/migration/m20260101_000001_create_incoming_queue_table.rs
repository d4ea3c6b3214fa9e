use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IncomingQueue::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IncomingQueue::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IncomingQueue::Payload).text().not_null())
                    .col(
                        ColumnDef::new(IncomingQueue::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(IncomingQueue::CreatedAt).string().not_null())
                    .col(ColumnDef::new(IncomingQueue::UpdatedAt).string().not_null())
                    .col(ColumnDef::new(IncomingQueue::LastError).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_incoming_queue_payload")
                    .table(IncomingQueue::Table)
                    .col(IncomingQueue::Payload)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_incoming_queue_status")
                    .table(IncomingQueue::Table)
                    .col(IncomingQueue::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_incoming_queue_status").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_incoming_queue_payload").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IncomingQueue::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum IncomingQueue {
    Table,
    Id,
    Payload,
    Status,
    CreatedAt,
    UpdatedAt,
    LastError,
}
