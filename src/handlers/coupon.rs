use crate::error::AppError;
use crate::handlers::current_user;
use crate::models::*;
use crate::services::CouponService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use validator::Validate;

#[utoipa::path(
    post,
    path = "/coupons/validate",
    tag = "coupon",
    request_body = ValidateCouponRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "优惠码可用，返回折扣", body = ValidateCouponResponse),
        (status = 400, description = "优惠码不可用 (message 为具体原因)"),
        (status = 401, description = "未授权")
    )
)]
pub async fn validate_coupon(
    coupon_service: web::Data<CouponService>,
    req: HttpRequest,
    body: web::Json<ValidateCouponRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };
    if let Err(e) = body.validate() {
        return Ok(AppError::from(e).error_response());
    }

    match coupon_service.validate(user.id, &body).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn coupon_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/coupons").route("/validate", web::post().to(validate_coupon)));
}
