use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    pub product_id: i64,
    #[validate(length(min = 1, max = 64))]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    pub order_id: i64,
    /// 免费订单 (total = 0) 不经过 Stripe
    pub free: bool,
    /// Stripe Checkout 会话 URL，或免费订单的成功页
    pub redirect_url: String,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total: i64,
}
