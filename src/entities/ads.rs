use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "ads")]
pub struct Model {
    #[sea_orm(primary_key)]
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
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// 是否在投放期内 (today 落在 [start_date, end_date] 区间，空边界视为不限)
    pub fn is_running_on(&self, today: NaiveDate) -> bool {
        self.is_active
            && self.start_date.is_none_or(|start| start <= today)
            && self.end_date.is_none_or(|end| end >= today)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
