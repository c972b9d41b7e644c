use crate::models::*;
use crate::services::AdService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/ads",
    tag = "ad",
    params(
        ("placement" = Option<String>, Query, description = "广告位")
    ),
    responses(
        (status = 200, description = "当前投放中的广告", body = [AdResponse])
    )
)]
pub async fn list_ads(
    ad_service: web::Data<AdService>,
    query: web::Query<AdQuery>,
) -> Result<HttpResponse> {
    match ad_service.list_running(&query).await {
        Ok(ads) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": ads
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/ads/{id}/impression",
    tag = "ad",
    params(
        ("id" = i64, Path, description = "广告ID")
    ),
    responses(
        (status = 204, description = "已记录曝光"),
        (status = 404, description = "广告不存在")
    )
)]
pub async fn record_impression(
    ad_service: web::Data<AdService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match ad_service.record_impression(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/ads/{id}/click",
    tag = "ad",
    params(
        ("id" = i64, Path, description = "广告ID")
    ),
    responses(
        (status = 204, description = "已记录点击"),
        (status = 404, description = "广告不存在")
    )
)]
pub async fn record_click(
    ad_service: web::Data<AdService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match ad_service.record_click(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn ad_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/ads")
            .route("", web::get().to(list_ads))
            .route("/{id}/impression", web::post().to(record_impression))
            .route("/{id}/click", web::post().to(record_click)),
    );
}
