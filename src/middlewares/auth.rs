use crate::error::AppError;
use crate::utils::JwtService;
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

const ADMIN_PREFIX: &str = "/api/v1/admin/";

// 公开路径配置
struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
    // 仅 GET 公开 (目录、商品、广告展示)
    read_only_prefixes: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            // 完全匹配的公开路径
            exact_paths: vec!["/swagger-ui", "/swagger-ui/", "/api-docs/openapi.json"],
            // 前缀匹配的公开路径; webhook 与 cron 各自校验签名/密钥
            prefix_paths: vec!["/swagger-ui/", "/api-docs/", "/webhook/", "/cron/"],
            read_only_prefixes: vec![
                "/api/v1/products",
                "/api/v1/resources",
                "/api/v1/ads",
            ],
        }
    }

    fn is_public_path(&self, method: &Method, path: &str) -> bool {
        // 检查完全匹配
        if self.exact_paths.contains(&path) {
            return true;
        }

        // 检查前缀匹配
        if self
            .prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
        {
            return true;
        }

        if method == Method::GET
            && self
                .read_only_prefixes
                .iter()
                .any(|&prefix| path.starts_with(prefix))
        {
            return true;
        }

        // 广告曝光/点击计数由匿名访客触发
        method == Method::POST
            && path.starts_with("/api/v1/ads/")
            && (path.ends_with("/impression") || path.ends_with("/click"))
    }
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    public_paths: PublicPaths,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行所有 CORS 预检请求
        if req.method() == Method::OPTIONS {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        // 检查是否为公开路径
        if self.public_paths.is_public_path(req.method(), req.path()) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        // 提取Authorization header
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned);

        let Some(token) = token else {
            let error = AppError::AuthError("Missing access token".to_string());
            return Box::pin(async move { Err(error.into()) });
        };

        match self.jwt_service.verify_access_token(&token) {
            Ok(user) => {
                if req.path().starts_with(ADMIN_PREFIX) && !user.is_admin {
                    log::warn!("User {} denied access to {}", user.id, req.path());
                    return Box::pin(async move { Err(AppError::Forbidden.into()) });
                }
                // 将当前用户添加到请求扩展中
                req.extensions_mut().insert(user);
                let fut = self.service.call(req);
                Box::pin(fut)
            }
            Err(e) => {
                log::debug!("Rejected access token: {e}");
                let error = AppError::AuthError("Invalid access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        let paths = PublicPaths::new();
        assert!(paths.is_public_path(&Method::GET, "/swagger-ui/"));
        assert!(paths.is_public_path(&Method::POST, "/webhook/stripe"));
        assert!(paths.is_public_path(&Method::POST, "/cron/notifications"));
        assert!(paths.is_public_path(&Method::GET, "/api/v1/resources"));
        assert!(paths.is_public_path(&Method::GET, "/api/v1/products/3"));
        assert!(paths.is_public_path(&Method::POST, "/api/v1/ads/4/click"));
    }

    #[test]
    fn test_protected_paths() {
        let paths = PublicPaths::new();
        assert!(!paths.is_public_path(&Method::POST, "/api/v1/checkout"));
        assert!(!paths.is_public_path(&Method::POST, "/api/v1/coupons/validate"));
        assert!(!paths.is_public_path(&Method::GET, "/api/v1/orders"));
        assert!(!paths.is_public_path(&Method::GET, "/api/v1/admin/coupons"));
        assert!(!paths.is_public_path(&Method::POST, "/api/v1/products"));
    }
}
