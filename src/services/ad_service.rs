use crate::database::DbPool;
use crate::entities::ad_entity as ads;
use crate::error::{AppError, AppResult};
use crate::models::{AdQuery, AdReportItem, AdRequest, AdResponse, AdminAdResponse};
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};
use std::borrow::Cow;
use validator::ValidationError;

#[derive(Debug, Clone, Copy)]
enum Counter {
    Impressions,
    Clicks,
}

#[derive(Clone)]
pub struct AdService {
    pool: DbPool,
}

impl AdService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Ads that are switched on and whose date window contains today.
    pub async fn list_running(&self, query: &AdQuery) -> AppResult<Vec<AdResponse>> {
        let today = Utc::now().date_naive();
        let mut select = ads::Entity::find()
            .filter(ads::Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(ads::Column::StartDate.is_null())
                    .add(ads::Column::StartDate.lte(today)),
            )
            .filter(
                Condition::any()
                    .add(ads::Column::EndDate.is_null())
                    .add(ads::Column::EndDate.gte(today)),
            );
        if let Some(placement) = query.placement.as_deref().filter(|p| !p.is_empty()) {
            select = select.filter(ads::Column::Placement.eq(placement));
        }

        let items = select
            .order_by_asc(ads::Column::Id)
            .all(&*self.pool)
            .await?
            .into_iter()
            // 与 SQL 条件一致, 防止跨零点时的边界差异
            .filter(|ad| ad.is_running_on(today))
            .map(AdResponse::from)
            .collect();
        Ok(items)
    }

    pub async fn record_impression(&self, id: i64) -> AppResult<()> {
        self.bump(id, Counter::Impressions).await
    }

    pub async fn record_click(&self, id: i64) -> AppResult<()> {
        self.bump(id, Counter::Clicks).await
    }

    pub async fn list_admin(&self) -> AppResult<Vec<AdminAdResponse>> {
        let items = ads::Entity::find()
            .order_by_desc(ads::Column::Id)
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(AdminAdResponse::from)
            .collect();
        Ok(items)
    }

    pub async fn get(&self, id: i64) -> AppResult<AdminAdResponse> {
        Ok(self.find(id).await?.into())
    }

    pub async fn create(&self, req: AdRequest) -> AppResult<AdminAdResponse> {
        check_window(req.start_date, req.end_date)?;
        let now = Utc::now();
        let ad = ads::ActiveModel {
            title: Set(req.title),
            advertiser_email: Set(req.advertiser_email),
            image_url: Set(req.image_url),
            link_url: Set(req.link_url),
            placement: Set(req.placement),
            is_active: Set(req.is_active),
            start_date: Set(req.start_date),
            end_date: Set(req.end_date),
            impressions: Set(0),
            clicks: Set(0),
            last_notified_on: Set(None),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;
        log::info!("Ad {} created (id={})", ad.title, ad.id);
        Ok(ad.into())
    }

    pub async fn update(&self, id: i64, req: AdRequest) -> AppResult<AdminAdResponse> {
        check_window(req.start_date, req.end_date)?;
        let existing = self.find(id).await?;
        let end_date_changed = existing.end_date != req.end_date;

        let mut am = existing.into_active_model();
        am.title = Set(req.title);
        am.advertiser_email = Set(req.advertiser_email);
        am.image_url = Set(req.image_url);
        am.link_url = Set(req.link_url);
        am.placement = Set(req.placement);
        am.is_active = Set(req.is_active);
        am.start_date = Set(req.start_date);
        am.end_date = Set(req.end_date);
        if end_date_changed {
            am.last_notified_on = Set(None);
        }
        am.updated_at = Set(Some(Utc::now()));
        Ok(am.update(&*self.pool).await?.into())
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let result = ads::Entity::delete_by_id(id).exec(&*self.pool).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Ad {id} not found")));
        }
        Ok(())
    }

    /// Performance of every ad, best click-through rate first.
    pub async fn report(&self) -> AppResult<Vec<AdReportItem>> {
        let mut items: Vec<AdReportItem> = ads::Entity::find()
            .order_by_asc(ads::Column::Id)
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(|ad| AdReportItem {
                ctr: click_through_rate(ad.clicks, ad.impressions),
                id: ad.id,
                title: ad.title,
                placement: ad.placement,
                impressions: ad.impressions,
                clicks: ad.clicks,
                end_date: ad.end_date,
            })
            .collect();
        items.sort_by(|a, b| b.ctr.total_cmp(&a.ctr));
        Ok(items)
    }

    async fn find(&self, id: i64) -> AppResult<ads::Model> {
        ads::Entity::find_by_id(id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ad {id} not found")))
    }

    async fn bump(&self, id: i64, counter: Counter) -> AppResult<()> {
        let column = match counter {
            Counter::Impressions => ads::Column::Impressions,
            Counter::Clicks => ads::Column::Clicks,
        };
        let result = ads::Entity::update_many()
            .col_expr(column, Expr::col(column).add(1))
            .filter(ads::Column::Id.eq(id))
            .filter(ads::Column::IsActive.eq(true))
            .exec(&*self.pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Ad {id} not found")));
        }
        Ok(())
    }
}

/// clicks / impressions, 0 when the ad was never shown.
pub fn click_through_rate(clicks: i64, impressions: i64) -> f64 {
    if impressions <= 0 {
        return 0.0;
    }
    clicks.max(0) as f64 / impressions as f64
}

fn check_window(start: Option<NaiveDate>, end: Option<NaiveDate>) -> AppResult<()> {
    if let (Some(start), Some(end)) = (start, end)
        && end < start
    {
        let mut err = ValidationError::new("end_date");
        err.message = Some(Cow::from("end_date must not be before start_date"));
        let mut errors = validator::ValidationErrors::new();
        errors.add("end_date", err);
        return Err(errors.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn ad(id: i64, impressions: i64, clicks: i64) -> ads::Model {
        ads::Model {
            id,
            title: format!("Ad {id}"),
            advertiser_email: None,
            image_url: None,
            link_url: "https://example.com".into(),
            placement: "sidebar".into(),
            is_active: true,
            start_date: None,
            end_date: None,
            impressions,
            clicks,
            last_notified_on: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_click_through_rate() {
        assert_eq!(click_through_rate(0, 0), 0.0);
        assert_eq!(click_through_rate(5, 0), 0.0);
        assert!((click_through_rate(5, 200) - 0.025).abs() < f64::EPSILON);
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let start = NaiveDate::from_ymd_opt(2025, 5, 2);
        let end = NaiveDate::from_ymd_opt(2025, 5, 1);
        assert!(check_window(start, end).is_err());
        assert!(check_window(end, start).is_ok());
        assert!(check_window(None, end).is_ok());
    }

    #[tokio::test]
    async fn test_report_orders_by_ctr() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![ad(1, 100, 1), ad(2, 100, 10), ad(3, 0, 0)]])
            .into_connection();
        let report = AdService::new(Arc::new(db)).report().await.unwrap();
        let ids: Vec<i64> = report.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert!((report[0].ctr - 0.1).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_click_on_unknown_ad() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let err = AdService::new(Arc::new(db)).record_click(99).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
