use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Coupons {
    Table,
    Id,
    Code,
    Description,
    DiscountType,
    DiscountValue,
    MaxUses,
    MaxUsesPerUser,
    StartsAt,
    ExpiresAt,
    MinimumPurchase,
    AppliesTo,
    Status,
    CurrentUses,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CouponProducts {
    Table,
    CouponId,
    ProductId,
}

#[derive(DeriveIden)]
enum CouponUsages {
    Table,
    Id,
    CouponId,
    OrderId,
    UserId,
    DiscountAmount,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    CouponId,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // enums
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("coupon_discount_type"))
                    .values(vec![Alias::new("percentage"), Alias::new("fixed_amount")])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("coupon_applies_to"))
                    .values(vec![Alias::new("all"), Alias::new("specific_products")])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("coupon_status"))
                    .values(vec![
                        Alias::new("active"),
                        Alias::new("inactive"),
                        Alias::new("archived"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Coupons::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Coupons::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Coupons::Code).string_len(64).not_null())
                    .col(ColumnDef::new(Coupons::Description).text().null())
                    .col(
                        ColumnDef::new(Coupons::DiscountType)
                            .custom(Alias::new("coupon_discount_type"))
                            .not_null(),
                    )
                    .col(ColumnDef::new(Coupons::DiscountValue).big_integer().not_null())
                    .col(ColumnDef::new(Coupons::MaxUses).integer().null())
                    .col(ColumnDef::new(Coupons::MaxUsesPerUser).integer().null())
                    .col(
                        ColumnDef::new(Coupons::StartsAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Coupons::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Coupons::MinimumPurchase).big_integer().null())
                    .col(
                        ColumnDef::new(Coupons::AppliesTo)
                            .custom(Alias::new("coupon_applies_to"))
                            .not_null()
                            .default(Expr::cust("'all'::coupon_applies_to")),
                    )
                    .col(
                        ColumnDef::new(Coupons::Status)
                            .custom(Alias::new("coupon_status"))
                            .not_null()
                            .default(Expr::cust("'active'::coupon_status")),
                    )
                    .col(
                        ColumnDef::new(Coupons::CurrentUses)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Coupons::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Coupons::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .check(Expr::cust(
                        "max_uses IS NULL OR current_uses <= max_uses",
                    ))
                    .to_owned(),
            )
            .await?;

        // codes are matched case-insensitively, uniqueness must follow
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_coupons_code_lower ON coupons (LOWER(code))",
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CouponProducts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CouponProducts::CouponId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CouponProducts::ProductId)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(CouponProducts::CouponId)
                            .col(CouponProducts::ProductId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupon_products_coupon")
                            .from(CouponProducts::Table, CouponProducts::CouponId)
                            .to(Coupons::Table, Coupons::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupon_products_product")
                            .from(CouponProducts::Table, CouponProducts::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CouponUsages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CouponUsages::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CouponUsages::CouponId).big_integer().not_null())
                    .col(
                        ColumnDef::new(CouponUsages::OrderId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(CouponUsages::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(CouponUsages::DiscountAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CouponUsages::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupon_usages_coupon")
                            .from(CouponUsages::Table, CouponUsages::CouponId)
                            .to(Coupons::Table, Coupons::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupon_usages_order")
                            .from(CouponUsages::Table, CouponUsages::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_coupon_usages_coupon_user")
                    .table(CouponUsages::Table)
                    .col(CouponUsages::CouponId)
                    .col(CouponUsages::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_foreign_key(
                ForeignKey::create()
                    .name("fk_orders_coupon")
                    .from(Orders::Table, Orders::CouponId)
                    .to(Coupons::Table, Coupons::Id)
                    .on_delete(ForeignKeyAction::SetNull)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_foreign_key(
                ForeignKey::drop()
                    .name("fk_orders_coupon")
                    .table(Orders::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(CouponUsages::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(CouponProducts::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Coupons::Table).to_owned())
            .await?;
        for name in ["coupon_status", "coupon_applies_to", "coupon_discount_type"] {
            manager
                .drop_type(Type::drop().name(Alias::new(name)).to_owned())
                .await?;
        }
        Ok(())
    }
}
