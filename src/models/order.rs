use crate::entities::{OrderStatus, order_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub product_id: i64,
    pub coupon_id: Option<i64>,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<order_entity::Model> for OrderResponse {
    fn from(m: order_entity::Model) -> Self {
        Self {
            id: m.id,
            product_id: m.product_id,
            coupon_id: m.coupon_id,
            subtotal: m.subtotal,
            discount_amount: m.discount_amount,
            total: m.total,
            currency: m.currency,
            status: m.status,
            completed_at: m.completed_at,
            created_at: m.created_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<OrderStatus>,
}
