use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    Name,
    Slug,
    Description,
    Price,
    Currency,
    FileUrl,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    UserId,
    UserEmail,
    ProductId,
    CouponId,
    Subtotal,
    DiscountAmount,
    Total,
    Currency,
    Status,
    StripeSessionId,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("order_status"))
                    .values(vec![
                        Alias::new("pending"),
                        Alias::new("completed"),
                        Alias::new("failed"),
                        Alias::new("refunded"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Products::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Products::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Products::Slug)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Products::Description).text().null())
                    .col(ColumnDef::new(Products::Price).big_integer().not_null())
                    .col(
                        ColumnDef::new(Products::Currency)
                            .string_len(3)
                            .not_null()
                            .default("usd"),
                    )
                    .col(ColumnDef::new(Products::FileUrl).text().null())
                    .col(
                        ColumnDef::new(Products::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Products::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Orders::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Orders::UserId).uuid().not_null())
                    .col(ColumnDef::new(Orders::UserEmail).string_len(320).not_null())
                    .col(ColumnDef::new(Orders::ProductId).big_integer().not_null())
                    .col(ColumnDef::new(Orders::CouponId).big_integer().null())
                    .col(ColumnDef::new(Orders::Subtotal).big_integer().not_null())
                    .col(
                        ColumnDef::new(Orders::DiscountAmount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Orders::Total).big_integer().not_null())
                    .col(
                        ColumnDef::new(Orders::Currency)
                            .string_len(3)
                            .not_null()
                            .default("usd"),
                    )
                    .col(
                        ColumnDef::new(Orders::Status)
                            .custom(Alias::new("order_status"))
                            .not_null()
                            .default(Expr::cust("'pending'::order_status")),
                    )
                    .col(
                        ColumnDef::new(Orders::StripeSessionId)
                            .string_len(255)
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Orders::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Orders::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Orders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_product")
                            .from(Orders::Table, Orders::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_user")
                    .table(Orders::Table)
                    .col(Orders::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Orders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Products::Table).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("order_status")).to_owned())
            .await?;
        Ok(())
    }
}
