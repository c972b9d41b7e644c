use crate::entities::product_entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: i64,
    pub currency: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<product_entity::Model> for ProductResponse {
    fn from(m: product_entity::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            slug: m.slug,
            description: m.description,
            price: m.price,
            currency: m.currency,
            is_active: m.is_active,
            created_at: m.created_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// 管理端创建/更新请求 (PUT 替换全部字段)
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub slug: String,
    pub description: Option<String>,
    /// 价格(美分)
    #[validate(range(min = 0))]
    pub price: i64,
    #[validate(url)]
    pub file_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}
