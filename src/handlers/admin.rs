//! Back-office endpoints. Access is limited to admin tokens by `AuthMiddleware`.

use crate::error::AppError;
use crate::models::*;
use crate::services::{AdService, CouponService, NotifierService, ProductService, ResourceService};
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;
use validator::Validate;

// ---------------------------------------------------------------- coupons

#[utoipa::path(
    get,
    path = "/admin/coupons",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "状态 active/inactive/archived")
    ),
    responses(
        (status = 200, description = "获取优惠券列表成功"),
        (status = 403, description = "需要管理员权限")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_coupons(
    coupon_service: web::Data<CouponService>,
    query: web::Query<CouponQuery>,
) -> Result<HttpResponse> {
    match coupon_service.list(&query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/coupons",
    tag = "admin",
    request_body = CouponRequest,
    responses(
        (status = 201, description = "创建优惠券成功", body = CouponResponse),
        (status = 400, description = "参数错误")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_coupon(
    coupon_service: web::Data<CouponService>,
    body: web::Json<CouponRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = body.validate() {
        return Ok(AppError::from(e).error_response());
    }
    match coupon_service.create(body.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/coupons/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "优惠券ID")),
    responses(
        (status = 200, description = "获取优惠券成功", body = CouponResponse),
        (status = 404, description = "优惠券不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_coupon(
    coupon_service: web::Data<CouponService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match coupon_service.get(path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/coupons/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "优惠券ID")),
    request_body = CouponRequest,
    responses(
        (status = 200, description = "更新优惠券成功", body = CouponResponse),
        (status = 400, description = "参数错误"),
        (status = 404, description = "优惠券不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_coupon(
    coupon_service: web::Data<CouponService>,
    path: web::Path<i64>,
    body: web::Json<CouponRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = body.validate() {
        return Ok(AppError::from(e).error_response());
    }
    match coupon_service.update(path.into_inner(), body.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 归档优惠券 (保留使用记录, 不再可用)
#[utoipa::path(
    delete,
    path = "/admin/coupons/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "优惠券ID")),
    responses(
        (status = 200, description = "归档优惠券成功", body = CouponResponse),
        (status = 404, description = "优惠券不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn archive_coupon(
    coupon_service: web::Data<CouponService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match coupon_service.archive(path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/coupons/{id}/products",
    tag = "admin",
    params(("id" = i64, Path, description = "优惠券ID")),
    request_body = SetCouponProductsRequest,
    responses(
        (status = 200, description = "更新适用商品成功", body = CouponResponse),
        (status = 400, description = "商品不存在"),
        (status = 404, description = "优惠券不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_coupon_products(
    coupon_service: web::Data<CouponService>,
    path: web::Path<i64>,
    body: web::Json<SetCouponProductsRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = body.validate() {
        return Ok(AppError::from(e).error_response());
    }
    match coupon_service
        .set_products(path.into_inner(), &body.product_ids)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/coupons/{id}/report",
    tag = "admin",
    params(("id" = i64, Path, description = "优惠券ID")),
    responses(
        (status = 200, description = "获取优惠券报表成功", body = CouponReportResponse),
        (status = 404, description = "优惠券不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn coupon_report(
    coupon_service: web::Data<CouponService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match coupon_service.report(path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

// ---------------------------------------------------------------- products

#[utoipa::path(
    get,
    path = "/admin/products",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量")
    ),
    responses((status = 200, description = "获取商品列表成功(含下架商品)")),
    security(("bearer_auth" = []))
)]
pub async fn list_all_products(
    product_service: web::Data<ProductService>,
    query: web::Query<ProductQuery>,
) -> Result<HttpResponse> {
    match product_service.list(&query, true).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/products/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "商品ID")),
    responses(
        (status = 200, description = "获取商品成功", body = ProductResponse),
        (status = 404, description = "商品不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_any_product(
    product_service: web::Data<ProductService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match product_service.get(path.into_inner(), true).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/products",
    tag = "admin",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "创建商品成功", body = ProductResponse),
        (status = 400, description = "参数错误或 slug 已存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_product(
    product_service: web::Data<ProductService>,
    body: web::Json<ProductRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = body.validate() {
        return Ok(AppError::from(e).error_response());
    }
    match product_service.create(body.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/products/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "商品ID")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "更新商品成功", body = ProductResponse),
        (status = 404, description = "商品不存在"),
        (status = 400, description = "slug 已存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_product(
    product_service: web::Data<ProductService>,
    path: web::Path<i64>,
    body: web::Json<ProductRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = body.validate() {
        return Ok(AppError::from(e).error_response());
    }
    match product_service.update(path.into_inner(), body.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

// ---------------------------------------------------------------- resources

#[utoipa::path(
    get,
    path = "/admin/resources",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "状态 draft/active/grace_period/expired"),
        ("listing_type" = Option<String>, Query, description = "档位 free/sponsored/featured")
    ),
    responses((status = 200, description = "获取资源列表成功")),
    security(("bearer_auth" = []))
)]
pub async fn list_all_resources(
    resource_service: web::Data<ResourceService>,
    query: web::Query<AdminResourceQuery>,
) -> Result<HttpResponse> {
    match resource_service.list_admin(&query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/resources/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "资源ID")),
    responses(
        (status = 200, description = "获取资源成功", body = AdminResourceResponse),
        (status = 404, description = "资源不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_resource(
    resource_service: web::Data<ResourceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match resource_service.get(path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/resources",
    tag = "admin",
    request_body = ResourceRequest,
    responses(
        (status = 201, description = "创建资源成功", body = AdminResourceResponse),
        (status = 400, description = "参数错误")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_resource(
    resource_service: web::Data<ResourceService>,
    body: web::Json<ResourceRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = body.validate() {
        return Ok(AppError::from(e).error_response());
    }
    match resource_service.create(body.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/resources/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "资源ID")),
    request_body = ResourceRequest,
    responses(
        (status = 200, description = "更新资源成功", body = AdminResourceResponse),
        (status = 400, description = "参数错误"),
        (status = 404, description = "资源不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_resource(
    resource_service: web::Data<ResourceService>,
    path: web::Path<i64>,
    body: web::Json<ResourceRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = body.validate() {
        return Ok(AppError::from(e).error_response());
    }
    match resource_service.update(path.into_inner(), body.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/resources/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "资源ID")),
    responses(
        (status = 204, description = "删除资源成功"),
        (status = 404, description = "资源不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_resource(
    resource_service: web::Data<ResourceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match resource_service.delete(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/resources/{id}/renew",
    tag = "admin",
    params(("id" = i64, Path, description = "资源ID")),
    request_body = RenewResourceRequest,
    responses(
        (status = 200, description = "续费成功", body = AdminResourceResponse),
        (status = 400, description = "免费资源无法续费"),
        (status = 404, description = "资源不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn renew_resource(
    resource_service: web::Data<ResourceService>,
    path: web::Path<i64>,
    body: web::Json<RenewResourceRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = body.validate() {
        return Ok(AppError::from(e).error_response());
    }
    match resource_service.renew(path.into_inner(), body.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

// ---------------------------------------------------------------- ads

#[utoipa::path(
    get,
    path = "/admin/ads",
    tag = "admin",
    responses((status = 200, description = "获取广告列表成功")),
    security(("bearer_auth" = []))
)]
pub async fn list_all_ads(ad_service: web::Data<AdService>) -> Result<HttpResponse> {
    match ad_service.list_admin().await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/ads/report",
    tag = "admin",
    responses((status = 200, description = "广告效果报表(按点击率排序)")),
    security(("bearer_auth" = []))
)]
pub async fn ad_report(ad_service: web::Data<AdService>) -> Result<HttpResponse> {
    match ad_service.report().await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/ads/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "广告ID")),
    responses(
        (status = 200, description = "获取广告成功", body = AdminAdResponse),
        (status = 404, description = "广告不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_ad(ad_service: web::Data<AdService>, path: web::Path<i64>) -> Result<HttpResponse> {
    match ad_service.get(path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/ads",
    tag = "admin",
    request_body = AdRequest,
    responses(
        (status = 201, description = "创建广告成功", body = AdminAdResponse),
        (status = 400, description = "参数错误")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_ad(
    ad_service: web::Data<AdService>,
    body: web::Json<AdRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = body.validate() {
        return Ok(AppError::from(e).error_response());
    }
    match ad_service.create(body.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/ads/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "广告ID")),
    request_body = AdRequest,
    responses(
        (status = 200, description = "更新广告成功", body = AdminAdResponse),
        (status = 404, description = "广告不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_ad(
    ad_service: web::Data<AdService>,
    path: web::Path<i64>,
    body: web::Json<AdRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = body.validate() {
        return Ok(AppError::from(e).error_response());
    }
    match ad_service.update(path.into_inner(), body.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/ads/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "广告ID")),
    responses(
        (status = 204, description = "删除广告成功"),
        (status = 404, description = "广告不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_ad(
    ad_service: web::Data<AdService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match ad_service.delete(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

// ---------------------------------------------------------------- notifications

/// 手动触发到期提醒 (与定时任务相同, 同日重复执行不会重复发送)
#[utoipa::path(
    post,
    path = "/admin/notifications/run",
    tag = "admin",
    responses((status = 200, description = "执行完成")),
    security(("bearer_auth" = []))
)]
pub async fn run_notifications(
    notifier_service: web::Data<NotifierService>,
) -> Result<HttpResponse> {
    let resources = match notifier_service.send_expiration_notifications().await {
        Ok(summary) => summary,
        Err(e) => return Ok(e.error_response()),
    };
    match notifier_service.send_ad_expiration_notifications().await {
        Ok(ads) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": {
                "resources": resources,
                "ads": ads
            }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(
                web::scope("/coupons")
                    .route("", web::get().to(list_coupons))
                    .route("", web::post().to(create_coupon))
                    .route("/{id}", web::get().to(get_coupon))
                    .route("/{id}", web::put().to(update_coupon))
                    .route("/{id}", web::delete().to(archive_coupon))
                    .route("/{id}/products", web::put().to(set_coupon_products))
                    .route("/{id}/report", web::get().to(coupon_report)),
            )
            .service(
                web::scope("/products")
                    .route("", web::get().to(list_all_products))
                    .route("", web::post().to(create_product))
                    .route("/{id}", web::get().to(get_any_product))
                    .route("/{id}", web::put().to(update_product)),
            )
            .service(
                web::scope("/resources")
                    .route("", web::get().to(list_all_resources))
                    .route("", web::post().to(create_resource))
                    .route("/{id}", web::get().to(get_resource))
                    .route("/{id}", web::put().to(update_resource))
                    .route("/{id}", web::delete().to(delete_resource))
                    .route("/{id}/renew", web::post().to(renew_resource)),
            )
            .service(
                web::scope("/ads")
                    .route("", web::get().to(list_all_ads))
                    .route("", web::post().to(create_ad))
                    // 需在 /{id} 之前注册
                    .route("/report", web::get().to(ad_report))
                    .route("/{id}", web::get().to(get_ad))
                    .route("/{id}", web::put().to(update_ad))
                    .route("/{id}", web::delete().to(delete_ad)),
            )
            .route("/notifications/run", web::post().to(run_notifications)),
    );
}
