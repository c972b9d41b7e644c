use crate::entities::{AppliesTo, CouponStatus, DiscountType, coupon_entity, coupon_usage_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    pub product_id: i64,
    /// 订单小计(美分)，上限十亿美元
    #[validate(range(min = 0, max = 100000000000i64))]
    pub subtotal: i64,
}

/// Public view of a coupon, returned to shoppers.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CouponSummary {
    pub id: i64,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
}

impl From<&coupon_entity::Model> for CouponSummary {
    fn from(m: &coupon_entity::Model) -> Self {
        Self {
            id: m.id,
            code: m.code.clone(),
            description: m.description.clone(),
            discount_type: m.discount_type,
            discount_value: m.discount_value,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateCouponResponse {
    pub coupon: CouponSummary,
    pub discount_amount: i64,
    pub new_total: i64,
    /// 100% 折扣，调用方应跳过支付直接下单
    pub is_free: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CouponResponse {
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
    pub product_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

impl CouponResponse {
    pub fn new(m: coupon_entity::Model, product_ids: Vec<i64>) -> Self {
        Self {
            id: m.id,
            code: m.code,
            description: m.description,
            discount_type: m.discount_type,
            discount_value: m.discount_value,
            max_uses: m.max_uses,
            max_uses_per_user: m.max_uses_per_user,
            starts_at: m.starts_at,
            expires_at: m.expires_at,
            minimum_purchase: m.minimum_purchase,
            applies_to: m.applies_to,
            status: m.status,
            current_uses: m.current_uses,
            product_ids,
            created_at: m.created_at.unwrap_or_else(Utc::now),
        }
    }
}

/// 管理端创建/更新请求, 更新时替换全部可编辑字段
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_coupon_request"))]
pub struct CouponRequest {
    /// 为空时自动生成
    #[validate(length(min = 3, max = 64))]
    pub code: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub discount_type: DiscountType,
    #[validate(range(min = 1))]
    pub discount_value: i64,
    #[validate(range(min = 1))]
    pub max_uses: Option<i32>,
    #[validate(range(min = 1))]
    pub max_uses_per_user: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[validate(range(min = 0))]
    pub minimum_purchase: Option<i64>,
    pub applies_to: AppliesTo,
    #[serde(default)]
    pub product_ids: Vec<i64>,
    pub status: Option<CouponStatus>,
}

fn validate_coupon_request(req: &CouponRequest) -> Result<(), ValidationError> {
    if req.discount_type == DiscountType::Percentage && req.discount_value > 100 {
        let mut err = ValidationError::new("discount_value");
        err.message = Some(Cow::from("A percentage discount cannot exceed 100"));
        return Err(err);
    }
    if let (Some(start), Some(end)) = (req.starts_at, req.expires_at)
        && start >= end
    {
        let mut err = ValidationError::new("expires_at");
        err.message = Some(Cow::from("expires_at must be later than starts_at"));
        return Err(err);
    }
    if req.applies_to == AppliesTo::SpecificProducts && req.product_ids.is_empty() {
        let mut err = ValidationError::new("product_ids");
        err.message = Some(Cow::from(
            "At least one product is required when the coupon applies to specific products",
        ));
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SetCouponProductsRequest {
    #[validate(length(max = 500))]
    pub product_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CouponQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<CouponStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CouponUsageResponse {
    pub id: i64,
    pub order_id: i64,
    pub user_id: Uuid,
    pub discount_amount: i64,
    pub created_at: DateTime<Utc>,
}

impl From<coupon_usage_entity::Model> for CouponUsageResponse {
    fn from(m: coupon_usage_entity::Model) -> Self {
        Self {
            id: m.id,
            order_id: m.order_id,
            user_id: m.user_id,
            discount_amount: m.discount_amount,
            created_at: m.created_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CouponReportResponse {
    pub coupon: CouponResponse,
    pub total_uses: u64,
    pub unique_users: u64,
    pub total_discount: i64,
    pub recent_usages: Vec<CouponUsageResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CouponRequest {
        CouponRequest {
            code: Some("SAVE20".into()),
            description: None,
            discount_type: DiscountType::Percentage,
            discount_value: 20,
            max_uses: Some(10),
            max_uses_per_user: Some(1),
            starts_at: None,
            expires_at: None,
            minimum_purchase: None,
            applies_to: AppliesTo::All,
            product_ids: vec![],
            status: None,
        }
    }

    #[test]
    fn validate_request_bounds_subtotal() {
        let mut req = ValidateCouponRequest {
            code: "SAVE20".into(),
            product_id: 3,
            subtotal: 5000,
        };
        assert!(req.validate().is_ok());
        req.subtotal = 1_000_000_000_000_000_000;
        assert!(req.validate().is_err());
        req.subtotal = -1;
        assert!(req.validate().is_err());
    }

    #[test]
    fn accepts_a_plain_percentage_coupon() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn rejects_percentage_above_100() {
        let mut req = request();
        req.discount_value = 150;
        assert!(req.validate().is_err());
    }

    #[test]
    fn fixed_amount_may_exceed_100() {
        let mut req = request();
        req.discount_type = DiscountType::FixedAmount;
        req.discount_value = 7500;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_date_window() {
        let mut req = request();
        req.starts_at = Some(Utc::now());
        req.expires_at = Some(Utc::now() - chrono::Duration::days(1));
        assert!(req.validate().is_err());
    }

    #[test]
    fn specific_products_requires_a_product() {
        let mut req = request();
        req.applies_to = AppliesTo::SpecificProducts;
        assert!(req.validate().is_err());
        req.product_ids = vec![3];
        assert!(req.validate().is_ok());
    }

    #[test]
    fn rejects_zero_max_uses() {
        let mut req = request();
        req.max_uses = Some(0);
        assert!(req.validate().is_err());
    }
}
