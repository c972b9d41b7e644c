use crate::config::SiteConfig;
use actix_cors::Cors;

/// Only the storefront origin (and local dev servers) may call the API from a browser.
pub fn create_cors(site: &SiteConfig) -> Cors {
    let site_origin = site.base_url.trim_end_matches('/').to_string();
    Cors::default()
        .allowed_origin_fn(move |origin, _req_head| {
            let origin = origin.to_str().unwrap_or_default();
            origin == site_origin || is_local_origin(origin)
        })
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        // 本地开发放宽，防止前端自定义 Header 导致预检失败
        .allow_any_header()
        .max_age(3600)
}

fn is_local_origin(origin: &str) -> bool {
    origin.starts_with("http://localhost:") || origin.starts_with("http://127.0.0.1:")
}
