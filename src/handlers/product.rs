use crate::models::*;
use crate::services::ProductService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/products",
    tag = "product",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量")
    ),
    responses(
        (status = 200, description = "获取商品列表成功")
    )
)]
pub async fn list_products(
    product_service: web::Data<ProductService>,
    query: web::Query<ProductQuery>,
) -> Result<HttpResponse> {
    match product_service.list(&query, false).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "product",
    params(
        ("id" = i64, Path, description = "商品ID")
    ),
    responses(
        (status = 200, description = "获取商品成功", body = ProductResponse),
        (status = 404, description = "商品不存在")
    )
)]
pub async fn get_product(
    product_service: web::Data<ProductService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match product_service.get(path.into_inner(), false).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn product_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/products")
            .route("", web::get().to(list_products))
            .route("/{id}", web::get().to(get_product)),
    );
}
