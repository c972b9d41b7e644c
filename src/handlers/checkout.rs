use crate::error::AppError;
use crate::handlers::current_user;
use crate::models::*;
use crate::services::CheckoutService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use validator::Validate;

#[utoipa::path(
    post,
    path = "/checkout",
    tag = "checkout",
    request_body = CheckoutRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "订单已创建，跳转至 redirect_url", body = CheckoutResponse),
        (status = 400, description = "优惠码不可用或参数错误"),
        (status = 401, description = "未授权"),
        (status = 404, description = "商品不存在")
    )
)]
pub async fn create_checkout(
    checkout_service: web::Data<CheckoutService>,
    req: HttpRequest,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };
    if let Err(e) = body.validate() {
        return Ok(AppError::from(e).error_response());
    }

    match checkout_service.checkout(&user, body.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn checkout_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/checkout", web::post().to(create_checkout));
}
