use crate::entities::{ListingType, ResourceStatus, resource_entity};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourceResponse {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub category: String,
    pub listing_type: ListingType,
    pub status: ResourceStatus,
    pub end_date: Option<NaiveDate>,
}

impl From<resource_entity::Model> for ResourceResponse {
    fn from(m: resource_entity::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            url: m.url,
            description: m.description,
            category: m.category,
            listing_type: m.listing_type,
            status: m.status,
            end_date: m.end_date,
        }
    }
}

/// Admin view including billing and notification bookkeeping.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminResourceResponse {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub category: String,
    pub contact_email: Option<String>,
    pub listing_type: ListingType,
    pub monthly_fee: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: ResourceStatus,
    pub last_notified_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<resource_entity::Model> for AdminResourceResponse {
    fn from(m: resource_entity::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            url: m.url,
            description: m.description,
            category: m.category,
            contact_email: m.contact_email,
            listing_type: m.listing_type,
            monthly_fee: m.monthly_fee,
            start_date: m.start_date,
            end_date: m.end_date,
            status: m.status,
            last_notified_on: m.last_notified_on,
            created_at: m.created_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminResourceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<ResourceStatus>,
    pub listing_type: Option<ListingType>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_resource_request"))]
pub struct ResourceRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(url)]
    pub url: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(email)]
    pub contact_email: Option<String>,
    pub listing_type: ListingType,
    /// 月费(美分)
    #[validate(range(min = 0))]
    pub monthly_fee: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: ResourceStatus,
}

fn validate_resource_request(req: &ResourceRequest) -> Result<(), ValidationError> {
    if let (Some(start), Some(end)) = (req.start_date, req.end_date)
        && end < start
    {
        let mut err = ValidationError::new("end_date");
        err.message = Some(Cow::from("end_date must not be before start_date"));
        return Err(err);
    }
    if req.listing_type.is_paid() && req.end_date.is_none() {
        let mut err = ValidationError::new("end_date");
        err.message = Some(Cow::from("Paid listings require an end_date"));
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RenewResourceRequest {
    #[validate(range(min = 1, max = 24))]
    pub months: u32,
    /// 续费时可同时恢复/调整付费档位
    pub listing_type: Option<ListingType>,
    #[validate(range(min = 0))]
    pub monthly_fee: Option<i64>,
}
