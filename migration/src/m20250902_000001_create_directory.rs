use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Resources {
    Table,
    Id,
    Name,
    Url,
    Description,
    Category,
    ContactEmail,
    ListingType,
    MonthlyFee,
    StartDate,
    EndDate,
    Status,
    LastNotifiedOn,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Ads {
    Table,
    Id,
    Title,
    AdvertiserEmail,
    ImageUrl,
    LinkUrl,
    Placement,
    IsActive,
    StartDate,
    EndDate,
    Impressions,
    Clicks,
    LastNotifiedOn,
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
                    .as_enum(Alias::new("listing_type"))
                    .values(vec![
                        Alias::new("free"),
                        Alias::new("sponsored"),
                        Alias::new("featured"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("resource_status"))
                    .values(vec![
                        Alias::new("draft"),
                        Alias::new("active"),
                        Alias::new("grace_period"),
                        Alias::new("expired"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Resources::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Resources::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Resources::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Resources::Url).text().not_null())
                    .col(ColumnDef::new(Resources::Description).text().null())
                    .col(ColumnDef::new(Resources::Category).string_len(100).not_null())
                    .col(
                        ColumnDef::new(Resources::ContactEmail)
                            .string_len(320)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Resources::ListingType)
                            .custom(Alias::new("listing_type"))
                            .not_null()
                            .default(Expr::cust("'free'::listing_type")),
                    )
                    .col(
                        ColumnDef::new(Resources::MonthlyFee)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Resources::StartDate).date().null())
                    .col(ColumnDef::new(Resources::EndDate).date().null())
                    .col(
                        ColumnDef::new(Resources::Status)
                            .custom(Alias::new("resource_status"))
                            .not_null()
                            .default(Expr::cust("'draft'::resource_status")),
                    )
                    .col(ColumnDef::new(Resources::LastNotifiedOn).date().null())
                    .col(
                        ColumnDef::new(Resources::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Resources::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_resources_status_end_date")
                    .table(Resources::Table)
                    .col(Resources::Status)
                    .col(Resources::EndDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Ads::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Ads::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Ads::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Ads::AdvertiserEmail).string_len(320).null())
                    .col(ColumnDef::new(Ads::ImageUrl).text().null())
                    .col(ColumnDef::new(Ads::LinkUrl).text().not_null())
                    .col(
                        ColumnDef::new(Ads::Placement)
                            .string_len(50)
                            .not_null()
                            .default("sidebar"),
                    )
                    .col(
                        ColumnDef::new(Ads::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Ads::StartDate).date().null())
                    .col(ColumnDef::new(Ads::EndDate).date().null())
                    .col(
                        ColumnDef::new(Ads::Impressions)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Ads::Clicks)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Ads::LastNotifiedOn).date().null())
                    .col(
                        ColumnDef::new(Ads::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Ads::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ads_placement")
                    .table(Ads::Table)
                    .col(Ads::Placement)
                    .col(Ads::IsActive)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Ads::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Resources::Table).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("resource_status")).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("listing_type")).to_owned())
            .await?;
        Ok(())
    }
}
