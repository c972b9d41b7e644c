use crate::entities::ad_entity;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdResponse {
    pub id: i64,
    pub title: String,
    pub image_url: Option<String>,
    pub link_url: String,
    pub placement: String,
}

impl From<ad_entity::Model> for AdResponse {
    fn from(m: ad_entity::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            image_url: m.image_url,
            link_url: m.link_url,
            placement: m.placement,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminAdResponse {
    pub id: i64,
    pub title: String,
    pub advertiser_email: Option<String>,
    pub image_url: Option<String>,
    pub link_url: String,
    pub placement: String,
    pub is_active: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub impressions: i64,
    pub clicks: i64,
    pub last_notified_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<ad_entity::Model> for AdminAdResponse {
    fn from(m: ad_entity::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            advertiser_email: m.advertiser_email,
            image_url: m.image_url,
            link_url: m.link_url,
            placement: m.placement,
            is_active: m.is_active,
            start_date: m.start_date,
            end_date: m.end_date,
            impressions: m.impressions,
            clicks: m.clicks,
            last_notified_on: m.last_notified_on,
            created_at: m.created_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdQuery {
    pub placement: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AdRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(email)]
    pub advertiser_email: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(url)]
    pub link_url: String,
    #[validate(length(min = 1, max = 50))]
    pub placement: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdReportItem {
    pub id: i64,
    pub title: String,
    pub placement: String,
    pub impressions: i64,
    pub clicks: i64,
    /// 点击率 clicks / impressions (0..=1)
    pub ctr: f64,
    pub end_date: Option<NaiveDate>,
}
