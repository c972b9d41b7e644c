pub mod ad;
pub mod admin;
pub mod checkout;
pub mod coupon;
pub mod cron;
pub mod order;
pub mod product;
pub mod resource;
pub mod webhook;

pub use ad::ad_config;
pub use admin::admin_config;
pub use checkout::checkout_config;
pub use coupon::coupon_config;
pub use cron::cron_config;
pub use order::order_config;
pub use product::product_config;
pub use resource::resource_config;
pub use webhook::webhook_config;

use crate::error::{AppError, AppResult};
use crate::utils::AuthUser;
use actix_web::{HttpMessage, HttpRequest};

/// 当前登录用户 (由 AuthMiddleware 写入请求扩展)
pub(crate) fn current_user(req: &HttpRequest) -> AppResult<AuthUser> {
    req.extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}
