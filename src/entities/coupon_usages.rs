use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// One row per redemption, unique per order. Rows are never updated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "coupon_usages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub coupon_id: i64,
    #[sea_orm(unique)]
    pub order_id: i64,
    pub user_id: Uuid,
    pub discount_amount: i64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
