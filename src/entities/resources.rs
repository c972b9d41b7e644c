use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Declaration order matters: Postgres sorts enum values by it, and the public
/// listing relies on `featured > sponsored > free`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "listing_type")]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    #[sea_orm(string_value = "free")]
    Free,
    #[sea_orm(string_value = "sponsored")]
    Sponsored,
    #[sea_orm(string_value = "featured")]
    Featured,
}

impl ListingType {
    pub fn is_paid(&self) -> bool {
        !matches!(self, ListingType::Free)
    }
}

impl std::fmt::Display for ListingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingType::Free => write!(f, "free"),
            ListingType::Sponsored => write!(f, "sponsored"),
            ListingType::Featured => write!(f, "featured"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "resource_status")]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "grace_period")]
    GracePeriod,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Draft => write!(f, "draft"),
            ResourceStatus::Active => write!(f, "active"),
            ResourceStatus::GracePeriod => write!(f, "grace_period"),
            ResourceStatus::Expired => write!(f, "expired"),
        }
    }
}

/// 目录资源 (赞助位)
/// 生命周期: active -> (end_date 到期) grace_period -> (7 天后) 降级为 free/active, monthly_fee = 0
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "resources")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub category: String,
    pub contact_email: Option<String>,
    pub listing_type: ListingType,
    /// 月费(美分)
    pub monthly_fee: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: ResourceStatus,
    pub last_notified_on: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
