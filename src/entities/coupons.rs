use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "coupon_discount_type"
)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "fixed_amount")]
    FixedAmount,
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountType::Percentage => write!(f, "percentage"),
            DiscountType::FixedAmount => write!(f, "fixed_amount"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "coupon_applies_to")]
#[serde(rename_all = "snake_case")]
pub enum AppliesTo {
    #[sea_orm(string_value = "all")]
    All,
    #[sea_orm(string_value = "specific_products")]
    SpecificProducts,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "coupon_status")]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
    #[sea_orm(string_value = "archived")]
    Archived,
}

impl std::fmt::Display for CouponStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CouponStatus::Active => write!(f, "active"),
            CouponStatus::Inactive => write!(f, "inactive"),
            CouponStatus::Archived => write!(f, "archived"),
        }
    }
}

/// 优惠券
/// - discount_value: percentage 为整数百分比 (1..=100)，fixed_amount 为美分
/// - max_uses / max_uses_per_user: NULL 表示不限
/// - starts_at / expires_at: NULL 表示该侧不设边界
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_uses: Option<i32>,
    pub max_uses_per_user: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub minimum_purchase: Option<i64>,
    pub applies_to: AppliesTo,
    pub status: CouponStatus,
    pub current_uses: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// 是否还有剩余次数 (不限量或未用完)
    pub fn has_remaining_uses(&self) -> bool {
        match self.max_uses {
            None => true,
            Some(max) => self.current_uses < max,
        }
    }

    pub fn is_product_restricted(&self) -> bool {
        self.applies_to == AppliesTo::SpecificProducts
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
