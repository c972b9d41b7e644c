use crate::models::*;
use crate::services::ResourceService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

/// Public directory listing; featured entries come first.
#[utoipa::path(
    get,
    path = "/resources",
    tag = "resource",
    params(
        ("category" = Option<String>, Query, description = "分类"),
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量")
    ),
    responses(
        (status = 200, description = "获取资源列表成功")
    )
)]
pub async fn list_resources(
    resource_service: web::Data<ResourceService>,
    query: web::Query<ResourceQuery>,
) -> Result<HttpResponse> {
    match resource_service.list_public(&query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn resource_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/resources").route("", web::get().to(list_resources)));
}
