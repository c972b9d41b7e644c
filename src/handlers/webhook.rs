use crate::external::StripeService;
use crate::services::CheckoutService;
use actix_web::{HttpRequest, HttpResponse, Result, web};
use log::{error, info, warn};

/// Stripe webhook处理器
///
/// 处理 Checkout 会话事件：完成时交付订单，过期或异步支付失败时标记订单失败
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    stripe_service: web::Data<StripeService>,
    checkout_service: web::Data<CheckoutService>,
) -> Result<HttpResponse> {
    let signature = match req.headers().get("stripe-signature") {
        Some(sig) => sig.to_str().unwrap_or(""),
        None => {
            warn!("Missing Stripe-Signature header");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Missing Stripe-Signature header"
            })));
        }
    };

    let payload = std::str::from_utf8(&body).map_err(|_| {
        error!("Invalid UTF-8 in webhook payload");
        actix_web::error::ErrorBadRequest("Invalid payload encoding")
    })?;

    // 验证webhook签名
    let event = match stripe_service.verify_webhook_signature(payload, signature) {
        Ok(event) => event,
        Err(e) => {
            error!("Webhook signature verification failed: {e}");
            return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "Invalid signature"
            })));
        }
    };

    let event_id = event.id.to_string();
    info!("Received Stripe webhook event: {} ({})", event.type_, event_id);

    match checkout_service.handle_stripe_event(event).await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "received": true
        }))),
        Err(e) => {
            error!("Failed to process webhook event {event_id}: {e}");
            // 返回200状态码避免Stripe重试，但记录错误
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "received": true,
                "error": "Processing failed"
            })))
        }
    }
}

pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhook").route("/stripe", web::post().to(stripe_webhook)));
}
