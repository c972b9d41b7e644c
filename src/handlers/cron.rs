use crate::config::NotifierConfig;
use crate::error::AppError;
use crate::services::NotifierService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

const CRON_SECRET_HEADER: &str = "X-Cron-Secret";

/// 外部调度器通过共享密钥触发; 未配置密钥时接口关闭
fn check_cron_secret(req: &HttpRequest, config: &NotifierConfig) -> Result<(), AppError> {
    if config.cron_secret.is_empty() {
        log::warn!("Cron endpoint called but no cron secret is configured");
        return Err(AppError::Forbidden);
    }
    let provided = req
        .headers()
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !constant_time_eq(provided.as_bytes(), config.cron_secret.as_bytes()) {
        return Err(AppError::AuthError("Invalid cron secret".to_string()));
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 资源到期提醒 (每日由外部调度器调用一次)
pub async fn run_resource_notifications(
    notifier_service: web::Data<NotifierService>,
    config: web::Data<NotifierConfig>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = check_cron_secret(&req, &config) {
        return Ok(e.error_response());
    }
    match notifier_service.send_expiration_notifications().await {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": summary
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn run_ad_notifications(
    notifier_service: web::Data<NotifierService>,
    config: web::Data<NotifierConfig>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = check_cron_secret(&req, &config) {
        return Ok(e.error_response());
    }
    match notifier_service.send_ad_expiration_notifications().await {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": summary
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn cron_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/cron")
            .route("/notifications", web::post().to(run_resource_notifications))
            .route("/ad-notifications", web::post().to(run_ad_notifications)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn config(secret: &str) -> NotifierConfig {
        NotifierConfig {
            cron_secret: secret.to_string(),
            ..NotifierConfig::default()
        }
    }

    #[test]
    fn test_cron_secret() {
        let req = TestRequest::default()
            .insert_header((CRON_SECRET_HEADER, "s3cret"))
            .to_http_request();
        assert!(check_cron_secret(&req, &config("s3cret")).is_ok());
        assert!(matches!(
            check_cron_secret(&req, &config("other")),
            Err(AppError::AuthError(_))
        ));
    }

    #[test]
    fn test_missing_secret_config_disables_endpoint() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            check_cron_secret(&req, &config("")),
            Err(AppError::Forbidden)
        ));
    }
}
