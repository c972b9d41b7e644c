use crate::database::DbPool;
use crate::emails::{self, RenewalEmailData};
use crate::entities::{ResourceStatus, resource_entity as resources};
use crate::error::{AppError, AppResult};
use crate::external::{DynMailClient, EmailMessage};
use crate::models::*;
use chrono::{Months, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

#[derive(Clone)]
pub struct ResourceService {
    pool: DbPool,
    mail_client: DynMailClient,
}

impl ResourceService {
    pub fn new(pool: DbPool, mail_client: DynMailClient) -> Self {
        Self { pool, mail_client }
    }

    /// Public directory: visible resources, featured first, then sponsored, then free.
    pub async fn list_public(
        &self,
        query: &ResourceQuery,
    ) -> AppResult<PaginatedResponse<ResourceResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut base_query = resources::Entity::find().filter(
            Condition::any()
                .add(resources::Column::Status.eq(ResourceStatus::Active))
                .add(resources::Column::Status.eq(ResourceStatus::GracePeriod)),
        );
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            base_query = base_query.filter(resources::Column::Category.eq(category));
        }

        let total = base_query.clone().count(&*self.pool).await?;
        let items = base_query
            .order_by_desc(resources::Column::ListingType)
            .order_by_asc(resources::Column::Name)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(ResourceResponse::from)
            .collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn list_admin(
        &self,
        query: &AdminResourceQuery,
    ) -> AppResult<PaginatedResponse<AdminResourceResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut base_query = resources::Entity::find();
        if let Some(status) = query.status {
            base_query = base_query.filter(resources::Column::Status.eq(status));
        }
        if let Some(listing_type) = query.listing_type {
            base_query = base_query.filter(resources::Column::ListingType.eq(listing_type));
        }

        let total = base_query.clone().count(&*self.pool).await?;
        let items = base_query
            .order_by_asc(resources::Column::EndDate)
            .order_by_asc(resources::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(AdminResourceResponse::from)
            .collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get(&self, id: i64) -> AppResult<AdminResourceResponse> {
        Ok(self.find(id).await?.into())
    }

    pub async fn create(&self, req: ResourceRequest) -> AppResult<AdminResourceResponse> {
        let now = Utc::now();
        let resource = resources::ActiveModel {
            name: Set(req.name),
            url: Set(req.url),
            description: Set(req.description),
            category: Set(req.category),
            contact_email: Set(req.contact_email),
            listing_type: Set(req.listing_type),
            monthly_fee: Set(req.monthly_fee),
            start_date: Set(req.start_date),
            end_date: Set(req.end_date),
            status: Set(req.status),
            last_notified_on: Set(None),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;

        log::info!("Resource {} created (id={})", resource.name, resource.id);
        Ok(resource.into())
    }

    pub async fn update(&self, id: i64, req: ResourceRequest) -> AppResult<AdminResourceResponse> {
        let existing = self.find(id).await?;
        let end_date_changed = existing.end_date != req.end_date;

        let mut am = existing.into_active_model();
        am.name = Set(req.name);
        am.url = Set(req.url);
        am.description = Set(req.description);
        am.category = Set(req.category);
        am.contact_email = Set(req.contact_email);
        am.listing_type = Set(req.listing_type);
        am.monthly_fee = Set(req.monthly_fee);
        am.start_date = Set(req.start_date);
        am.end_date = Set(req.end_date);
        am.status = Set(req.status);
        if end_date_changed {
            // 新的到期日重新开始提醒
            am.last_notified_on = Set(None);
        }
        am.updated_at = Set(Some(Utc::now()));
        let resource = am.update(&*self.pool).await?;
        Ok(resource.into())
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let result = resources::Entity::delete_by_id(id).exec(&*self.pool).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Resource {id} not found")));
        }
        log::info!("Resource {id} deleted");
        Ok(())
    }

    /// Extends a listing by whole months and reactivates it.
    ///
    /// The extension starts from the current end date, or from today when the listing
    /// has already lapsed. A renewal confirmation goes to the contact address.
    pub async fn renew(
        &self,
        id: i64,
        req: RenewResourceRequest,
    ) -> AppResult<AdminResourceResponse> {
        let existing = self.find(id).await?;
        let today = Utc::now().date_naive();

        let listing_type = req.listing_type.unwrap_or(existing.listing_type);
        if !listing_type.is_paid() {
            return Err(AppError::ValidationError(
                "Only sponsored or featured listings can be renewed".to_string(),
            ));
        }
        let monthly_fee = req.monthly_fee.unwrap_or(existing.monthly_fee);
        let end_date = renewal_end_date(existing.end_date, today, req.months)?;
        let start_date = existing.start_date.unwrap_or(today);

        let mut am = existing.into_active_model();
        am.listing_type = Set(listing_type);
        am.monthly_fee = Set(monthly_fee);
        am.start_date = Set(Some(start_date));
        am.end_date = Set(Some(end_date));
        am.status = Set(ResourceStatus::Active);
        am.last_notified_on = Set(None);
        am.updated_at = Set(Some(Utc::now()));
        let resource = am.update(&*self.pool).await?;

        log::info!(
            "Resource {} renewed for {} months until {}",
            resource.id,
            req.months,
            end_date
        );

        if let Some(to) = resource.contact_email.as_deref() {
            let listing_type = resource.listing_type.to_string();
            let template = emails::listing_renewed(&RenewalEmailData {
                name: &resource.name,
                listing_type: &listing_type,
                end_date,
                monthly_fee: resource.monthly_fee,
            });
            if let Err(e) = self.mail_client.send(EmailMessage::new(to, template)).await {
                log::error!(
                    "Failed to send renewal email for resource {}: {e}",
                    resource.id
                );
            }
        }

        Ok(resource.into())
    }

    async fn find(&self, id: i64) -> AppResult<resources::Model> {
        resources::Entity::find_by_id(id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {id} not found")))
    }
}

/// New end date after renewing for `months`.
pub fn renewal_end_date(
    current_end: Option<NaiveDate>,
    today: NaiveDate,
    months: u32,
) -> AppResult<NaiveDate> {
    let base = current_end.map_or(today, |end| end.max(today));
    base.checked_add_months(Months::new(months))
        .ok_or_else(|| AppError::ValidationError("Renewal period is out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ListingType;
    use crate::external::testing::RecordingMailClient;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn resource(status: ResourceStatus, end_date: NaiveDate) -> resources::Model {
        resources::Model {
            id: 4,
            name: "Acme Tools".into(),
            url: "https://acme.example.com".into(),
            description: None,
            category: "tools".into(),
            contact_email: Some("owner@acme.example.com".into()),
            listing_type: ListingType::Sponsored,
            monthly_fee: 4900,
            start_date: Some(date(2025, 1, 1)),
            end_date: Some(end_date),
            status,
            last_notified_on: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_renewal_extends_from_future_end_date() {
        let today = date(2025, 3, 1);
        assert_eq!(
            renewal_end_date(Some(date(2025, 3, 20)), today, 1).unwrap(),
            date(2025, 4, 20)
        );
    }

    #[test]
    fn test_renewal_of_lapsed_listing_starts_today() {
        let today = date(2025, 3, 1);
        assert_eq!(
            renewal_end_date(Some(date(2025, 2, 20)), today, 3).unwrap(),
            date(2025, 6, 1)
        );
        assert_eq!(renewal_end_date(None, today, 12).unwrap(), date(2026, 3, 1));
    }

    #[test]
    fn test_renewal_clamps_to_month_end() {
        assert_eq!(
            renewal_end_date(Some(date(2025, 1, 31)), date(2025, 1, 10), 1).unwrap(),
            date(2025, 2, 28)
        );
    }

    #[tokio::test]
    async fn test_renew_reactivates_and_emails() {
        let today = Utc::now().date_naive();
        let lapsed = resource(ResourceStatus::GracePeriod, today);
        let mut renewed = lapsed.clone();
        renewed.status = ResourceStatus::Active;
        renewed.end_date = today.checked_add_months(Months::new(2));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![lapsed], vec![renewed]])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());
        let service = ResourceService::new(Arc::new(db), mail.clone());

        let resp = service
            .renew(
                4,
                RenewResourceRequest {
                    months: 2,
                    listing_type: None,
                    monthly_fee: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.status, ResourceStatus::Active);

        let sent = mail.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "owner@acme.example.com");
        assert!(sent[0].subject.contains("renewed"));
    }

    #[tokio::test]
    async fn test_free_listing_cannot_be_renewed() {
        let mut free = resource(ResourceStatus::Active, date(2025, 3, 1));
        free.listing_type = ListingType::Free;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![free]])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());
        let service = ResourceService::new(Arc::new(db), mail);
        let err = service
            .renew(
                4,
                RenewResourceRequest {
                    months: 1,
                    listing_type: None,
                    monthly_fee: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
