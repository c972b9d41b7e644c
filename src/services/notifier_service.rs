//! Daily expiration notifiers for sponsored listings and ad campaigns.
//!
//! Each run walks the candidates one by one. A failure on one entity is logged and
//! recorded in the summary, and the run moves on to the next entity.

use crate::config::SiteConfig;
use crate::database::DbPool;
use crate::emails::{self, AdEmailData, EmailTemplate, ListingEmailData};
use crate::entities::{ListingType, ResourceStatus, ad_entity as ads, resource_entity as resources};
use crate::error::AppResult;
use crate::external::{DynMailClient, EmailMessage};
use crate::models::{NotificationSummary, NotificationType};
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder,
    UpdateMany,
};

/// 宽限期天数 (到期后保留付费展示位的天数)
pub const GRACE_PERIOD_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    SevenDayWarning,
    ThreeDayWarning,
    StartGracePeriod,
    Downgrade,
}

impl ResourceAction {
    pub fn notification_type(self) -> NotificationType {
        match self {
            ResourceAction::SevenDayWarning => NotificationType::SevenDayWarning,
            ResourceAction::ThreeDayWarning => NotificationType::ThreeDayWarning,
            ResourceAction::StartGracePeriod => NotificationType::GracePeriodStarted,
            ResourceAction::Downgrade => NotificationType::Downgraded,
        }
    }

    pub fn changes_status(self) -> bool {
        matches!(
            self,
            ResourceAction::StartGracePeriod | ResourceAction::Downgrade
        )
    }
}

/// Whole days from `today` until `end_date`; negative once the date has passed.
pub fn days_remaining(end_date: NaiveDate, today: NaiveDate) -> i64 {
    (end_date - today).num_days()
}

/// Only exact day boundaries trigger an action.
pub fn resource_action(days_remaining: i64, status: ResourceStatus) -> Option<ResourceAction> {
    match (days_remaining, status) {
        (7, ResourceStatus::Active) => Some(ResourceAction::SevenDayWarning),
        (3, ResourceStatus::Active) => Some(ResourceAction::ThreeDayWarning),
        (0, ResourceStatus::Active) => Some(ResourceAction::StartGracePeriod),
        (d, ResourceStatus::GracePeriod) if d == -GRACE_PERIOD_DAYS => {
            Some(ResourceAction::Downgrade)
        }
        _ => None,
    }
}

pub fn ad_action(days_remaining: i64) -> Option<NotificationType> {
    match days_remaining {
        14 => Some(NotificationType::AdFourteenDayWarning),
        7 => Some(NotificationType::AdSevenDayWarning),
        _ => None,
    }
}

#[derive(Clone)]
pub struct NotifierService {
    pool: DbPool,
    mail_client: DynMailClient,
    site: SiteConfig,
}

impl NotifierService {
    pub fn new(pool: DbPool, mail_client: DynMailClient, site: SiteConfig) -> Self {
        Self {
            pool,
            mail_client,
            site,
        }
    }

    pub async fn send_expiration_notifications(&self) -> AppResult<NotificationSummary> {
        self.run_resource_notifications(Utc::now().date_naive())
            .await
    }

    pub async fn send_ad_expiration_notifications(&self) -> AppResult<NotificationSummary> {
        self.run_ad_notifications(Utc::now().date_naive()).await
    }

    /// 按 `today` 执行资源生命周期通知
    ///
    /// 状态变更先于邮件执行, 邮件失败不回滚状态
    pub async fn run_resource_notifications(
        &self,
        today: NaiveDate,
    ) -> AppResult<NotificationSummary> {
        let candidates = resources::Entity::find()
            .filter(
                Condition::any()
                    .add(resources::Column::ListingType.eq(ListingType::Sponsored))
                    .add(resources::Column::ListingType.eq(ListingType::Featured)),
            )
            .filter(resources::Column::EndDate.is_not_null())
            .filter(
                Condition::any()
                    .add(resources::Column::Status.eq(ResourceStatus::Active))
                    .add(resources::Column::Status.eq(ResourceStatus::GracePeriod)),
            )
            .order_by_asc(resources::Column::Id)
            .all(&*self.pool)
            .await?;

        let mut summary = NotificationSummary::default();
        for resource in candidates {
            if resource.last_notified_on == Some(today) {
                continue;
            }
            let Some(end_date) = resource.end_date else {
                continue;
            };
            let Some(action) = resource_action(days_remaining(end_date, today), resource.status)
            else {
                continue;
            };
            self.process_resource(&resource, end_date, action, today, &mut summary)
                .await;
        }

        log::info!(
            "Resource expiration run for {today}: sent={}, errors={}",
            summary.sent,
            summary.errors
        );
        Ok(summary)
    }

    /// Ad campaign reminder run for `today`. Ads are never mutated besides the stamp.
    pub async fn run_ad_notifications(&self, today: NaiveDate) -> AppResult<NotificationSummary> {
        let candidates = ads::Entity::find()
            .filter(ads::Column::IsActive.eq(true))
            .filter(ads::Column::EndDate.is_not_null())
            .filter(ads::Column::EndDate.gte(today))
            .order_by_asc(ads::Column::Id)
            .all(&*self.pool)
            .await?;

        let mut summary = NotificationSummary::default();
        for ad in candidates {
            if ad.last_notified_on == Some(today) {
                continue;
            }
            let Some(end_date) = ad.end_date else {
                continue;
            };
            let Some(kind) = ad_action(days_remaining(end_date, today)) else {
                continue;
            };

            let Some(to) = ad.advertiser_email.as_deref().filter(|e| !e.is_empty()) else {
                log::error!("Ad {} has no advertiser email, {kind} not sent", ad.id);
                summary.record_failure(ad.id, &ad.title, kind, "No advertiser email".into());
                continue;
            };

            let renew_url = self.site.url(&format!("advertise/ads/{}", ad.id));
            let data = AdEmailData {
                title: &ad.title,
                end_date,
                renew_url: &renew_url,
            };
            let template = match kind {
                NotificationType::AdFourteenDayWarning => emails::ad_fourteen_day_warning(&data),
                _ => emails::ad_seven_day_warning(&data),
            };

            match self.mail_client.send(EmailMessage::new(to, template)).await {
                Ok(()) => {
                    summary.record_success(ad.id, &ad.title, kind);
                    let stamp = ads::Entity::update_many()
                        .col_expr(ads::Column::LastNotifiedOn, Expr::value(today))
                        .filter(ads::Column::Id.eq(ad.id));
                    if let Err(e) = stamp.exec(&*self.pool).await {
                        log::error!("Failed to stamp notification date on ad {}: {e}", ad.id);
                    }
                }
                Err(e) => {
                    log::error!("Failed to send {kind} for ad {}: {e}", ad.id);
                    summary.record_failure(ad.id, &ad.title, kind, e.to_string());
                }
            }
        }

        log::info!(
            "Ad expiration run for {today}: sent={}, errors={}",
            summary.sent,
            summary.errors
        );
        Ok(summary)
    }

    async fn process_resource(
        &self,
        resource: &resources::Model,
        end_date: NaiveDate,
        action: ResourceAction,
        today: NaiveDate,
        summary: &mut NotificationSummary,
    ) {
        let kind = action.notification_type();

        // 1. 状态变更 (带条件更新, 并发修改时跳过)
        if let Some(transition) = transition_for(resource.id, action, today) {
            match transition.exec(&*self.pool).await {
                Ok(result) if result.rows_affected == 0 => {
                    log::info!(
                        "Resource {} changed status concurrently, {kind} skipped",
                        resource.id
                    );
                    return;
                }
                Ok(_) => {
                    log::info!("Resource {} {kind} applied", resource.id);
                }
                Err(e) => {
                    log::error!("Failed to apply {kind} to resource {}: {e}", resource.id);
                    summary.record_failure(resource.id, &resource.name, kind, e.to_string());
                    return;
                }
            }
        }

        // 2. 邮件
        let Some(to) = resource.contact_email.as_deref().filter(|e| !e.is_empty()) else {
            log::error!("Resource {} has no contact email, {kind} not sent", resource.id);
            summary.record_failure(resource.id, &resource.name, kind, "No contact email".into());
            return;
        };

        let template = self.resource_template(resource, end_date, action);
        if let Err(e) = self.mail_client.send(EmailMessage::new(to, template)).await {
            log::error!("Failed to send {kind} for resource {}: {e}", resource.id);
            summary.record_failure(resource.id, &resource.name, kind, e.to_string());
            return;
        }
        summary.record_success(resource.id, &resource.name, kind);

        // 3. 提醒类邮件成功后才记录日期, 失败时当天可重跑
        if !action.changes_status() {
            let stamp = resources::Entity::update_many()
                .col_expr(resources::Column::LastNotifiedOn, Expr::value(today))
                .filter(resources::Column::Id.eq(resource.id));
            if let Err(e) = stamp.exec(&*self.pool).await {
                log::error!(
                    "Failed to stamp notification date on resource {}: {e}",
                    resource.id
                );
            }
        }
    }

    fn resource_template(
        &self,
        resource: &resources::Model,
        end_date: NaiveDate,
        action: ResourceAction,
    ) -> EmailTemplate {
        let listing_type = resource.listing_type.to_string();
        let renew_url = self.site.url(&format!("resources/{}/renew", resource.id));
        let data = ListingEmailData {
            name: &resource.name,
            listing_type: &listing_type,
            end_date,
            renew_url: &renew_url,
        };
        match action {
            ResourceAction::SevenDayWarning => emails::listing_seven_day_warning(&data),
            ResourceAction::ThreeDayWarning => emails::listing_three_day_warning(&data),
            ResourceAction::StartGracePeriod => emails::listing_grace_period_started(&data),
            ResourceAction::Downgrade => emails::listing_downgraded(&data),
        }
    }
}

/// Guarded status update for the lifecycle transitions; warnings have none.
fn transition_for(
    id: i64,
    action: ResourceAction,
    today: NaiveDate,
) -> Option<UpdateMany<resources::Entity>> {
    let update = resources::Entity::update_many()
        .col_expr(resources::Column::LastNotifiedOn, Expr::value(today))
        .col_expr(resources::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(resources::Column::Id.eq(id));
    match action {
        ResourceAction::StartGracePeriod => Some(
            update
                .col_expr(
                    resources::Column::Status,
                    ResourceStatus::GracePeriod.as_enum(),
                )
                .filter(resources::Column::Status.eq(ResourceStatus::Active)),
        ),
        ResourceAction::Downgrade => Some(
            update
                .col_expr(resources::Column::ListingType, ListingType::Free.as_enum())
                .col_expr(resources::Column::Status, ResourceStatus::Active.as_enum())
                .col_expr(resources::Column::MonthlyFee, Expr::value(0i64))
                .filter(resources::Column::Status.eq(ResourceStatus::GracePeriod)),
        ),
        ResourceAction::SevenDayWarning | ResourceAction::ThreeDayWarning => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::testing::RecordingMailClient;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn resource(id: i64, days: i64, status: ResourceStatus) -> resources::Model {
        resources::Model {
            id,
            name: format!("Listing {id}"),
            url: "https://listing.example.com".into(),
            description: None,
            category: "tools".into(),
            contact_email: Some(format!("owner{id}@example.com")),
            listing_type: ListingType::Featured,
            monthly_fee: 9900,
            start_date: None,
            end_date: Some(today() + Duration::days(days)),
            status,
            last_notified_on: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn ad(id: i64, days: i64) -> ads::Model {
        ads::Model {
            id,
            title: format!("Campaign {id}"),
            advertiser_email: Some(format!("ads{id}@example.com")),
            image_url: None,
            link_url: "https://example.com".into(),
            placement: "sidebar".into(),
            is_active: true,
            start_date: None,
            end_date: Some(today() + Duration::days(days)),
            impressions: 0,
            clicks: 0,
            last_notified_on: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn notifier(db: DatabaseConnection, mail: Arc<RecordingMailClient>) -> NotifierService {
        NotifierService::new(
            Arc::new(db),
            mail,
            SiteConfig {
                base_url: "https://hub.example.com".into(),
            },
        )
    }

    #[test]
    fn test_days_remaining() {
        assert_eq!(days_remaining(today(), today()), 0);
        assert_eq!(days_remaining(today() + Duration::days(7), today()), 7);
        assert_eq!(days_remaining(today() - Duration::days(7), today()), -7);
    }

    #[test]
    fn test_resource_action_table() {
        use ResourceStatus::*;
        assert_eq!(
            resource_action(7, Active),
            Some(ResourceAction::SevenDayWarning)
        );
        assert_eq!(
            resource_action(3, Active),
            Some(ResourceAction::ThreeDayWarning)
        );
        assert_eq!(
            resource_action(0, Active),
            Some(ResourceAction::StartGracePeriod)
        );
        assert_eq!(
            resource_action(-7, GracePeriod),
            Some(ResourceAction::Downgrade)
        );
        assert_eq!(resource_action(6, Active), None);
        assert_eq!(resource_action(-1, GracePeriod), None);
        assert_eq!(resource_action(-8, GracePeriod), None);
        assert_eq!(resource_action(7, GracePeriod), None);
        assert_eq!(resource_action(-7, Active), None);
    }

    #[test]
    fn test_ad_action_table() {
        assert_eq!(ad_action(14), Some(NotificationType::AdFourteenDayWarning));
        assert_eq!(ad_action(7), Some(NotificationType::AdSevenDayWarning));
        assert_eq!(ad_action(13), None);
        assert_eq!(ad_action(0), None);
    }

    #[tokio::test]
    async fn test_expiring_today_enters_grace_period() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![resource(1, 0, ResourceStatus::Active)]])
            .append_exec_results([exec(1)])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());

        let summary = notifier(db, mail.clone())
            .run_resource_notifications(today())
            .await
            .unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(summary.errors, 0);
        assert_eq!(
            summary.details[0].notification_type,
            NotificationType::GracePeriodStarted
        );
        let sent = mail.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "owner1@example.com");
        assert!(sent[0].subject.contains("grace period"));
    }

    #[tokio::test]
    async fn test_grace_period_over_downgrades() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![resource(2, -7, ResourceStatus::GracePeriod)]])
            .append_exec_results([exec(1)])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());

        let summary = notifier(db, mail.clone())
            .run_resource_notifications(today())
            .await
            .unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(
            summary.details[0].notification_type,
            NotificationType::Downgraded
        );
        assert!(mail.sent()[0].subject.contains("free listing"));
    }

    #[tokio::test]
    async fn test_warning_is_stamped_after_sending() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                resource(3, 7, ResourceStatus::Active),
                resource(4, 3, ResourceStatus::Active),
                resource(5, 5, ResourceStatus::Active),
            ]])
            .append_exec_results([exec(1), exec(1)])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());

        let summary = notifier(db, mail.clone())
            .run_resource_notifications(today())
            .await
            .unwrap();

        assert_eq!(summary.sent, 2);
        let kinds: Vec<NotificationType> = summary
            .details
            .iter()
            .map(|d| d.notification_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                NotificationType::SevenDayWarning,
                NotificationType::ThreeDayWarning
            ]
        );
    }

    #[tokio::test]
    async fn test_same_day_rerun_sends_nothing() {
        let mut already = resource(1, 0, ResourceStatus::GracePeriod);
        already.last_notified_on = Some(today());
        let mut warned = resource(2, 7, ResourceStatus::Active);
        warned.last_notified_on = Some(today());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![already, warned]])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());

        let summary = notifier(db, mail.clone())
            .run_resource_notifications(today())
            .await
            .unwrap();

        assert_eq!(summary.sent, 0);
        assert!(summary.details.is_empty());
        assert!(mail.sent().is_empty());
    }

    #[tokio::test]
    async fn test_mail_failure_does_not_stop_the_run() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                resource(1, 0, ResourceStatus::Active),
                resource(2, 0, ResourceStatus::Active),
            ]])
            .append_exec_results([exec(1), exec(1)])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::failing_for(&["owner1@example.com"]));

        let summary = notifier(db, mail.clone())
            .run_resource_notifications(today())
            .await
            .unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(summary.errors, 1);
        assert!(!summary.details[0].success);
        assert!(summary.details[0].error.is_some());
        assert!(summary.details[1].success);
        assert_eq!(mail.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_contact_still_transitions() {
        let mut no_contact = resource(1, 0, ResourceStatus::Active);
        no_contact.contact_email = None;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![no_contact]])
            .append_exec_results([exec(1)])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());

        let summary = notifier(db, mail.clone())
            .run_resource_notifications(today())
            .await
            .unwrap();

        assert_eq!(summary.errors, 1);
        assert_eq!(summary.details[0].error.as_deref(), Some("No contact email"));
        assert!(mail.sent().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_status_change_is_skipped() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![resource(1, 0, ResourceStatus::Active)]])
            .append_exec_results([exec(0)])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());

        let summary = notifier(db, mail.clone())
            .run_resource_notifications(today())
            .await
            .unwrap();

        assert!(summary.details.is_empty());
        assert!(mail.sent().is_empty());
    }

    #[tokio::test]
    async fn test_ad_reminders() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![ad(1, 14), ad(2, 10), ad(3, 7)]])
            .append_exec_results([exec(1), exec(1)])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());

        let summary = notifier(db, mail.clone())
            .run_ad_notifications(today())
            .await
            .unwrap();

        assert_eq!(summary.sent, 2);
        let sent = mail.sent();
        assert!(sent[0].subject.contains("14 days"));
        assert_eq!(sent[1].to, "ads3@example.com");
        assert!(sent[1].subject.contains("7 days"));
    }
}
