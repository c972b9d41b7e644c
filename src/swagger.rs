use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{AppliesTo, CouponStatus, DiscountType, ListingType, OrderStatus, ResourceStatus};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::product::list_products,
        handlers::product::get_product,
        handlers::resource::list_resources,
        handlers::ad::list_ads,
        handlers::ad::record_impression,
        handlers::ad::record_click,
        handlers::coupon::validate_coupon,
        handlers::checkout::create_checkout,
        handlers::order::get_orders,
        handlers::order::get_order,
        handlers::admin::list_coupons,
        handlers::admin::create_coupon,
        handlers::admin::get_coupon,
        handlers::admin::update_coupon,
        handlers::admin::archive_coupon,
        handlers::admin::set_coupon_products,
        handlers::admin::coupon_report,
        handlers::admin::list_all_products,
        handlers::admin::get_any_product,
        handlers::admin::create_product,
        handlers::admin::update_product,
        handlers::admin::list_all_resources,
        handlers::admin::get_resource,
        handlers::admin::create_resource,
        handlers::admin::update_resource,
        handlers::admin::delete_resource,
        handlers::admin::renew_resource,
        handlers::admin::list_all_ads,
        handlers::admin::ad_report,
        handlers::admin::get_ad,
        handlers::admin::create_ad,
        handlers::admin::update_ad,
        handlers::admin::delete_ad,
        handlers::admin::run_notifications,
    ),
    components(
        schemas(
            ProductResponse,
            ProductQuery,
            ProductRequest,
            ResourceResponse,
            AdminResourceResponse,
            ResourceQuery,
            AdminResourceQuery,
            ResourceRequest,
            RenewResourceRequest,
            ListingType,
            ResourceStatus,
            AdResponse,
            AdminAdResponse,
            AdQuery,
            AdRequest,
            AdReportItem,
            ValidateCouponRequest,
            ValidateCouponResponse,
            CouponSummary,
            CouponResponse,
            CouponRequest,
            SetCouponProductsRequest,
            CouponQuery,
            CouponUsageResponse,
            CouponReportResponse,
            DiscountType,
            AppliesTo,
            CouponStatus,
            CheckoutRequest,
            CheckoutResponse,
            OrderResponse,
            OrderQuery,
            OrderStatus,
            NotificationType,
            NotificationDetail,
            NotificationSummary,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "product", description = "Digital product catalog API"),
        (name = "resource", description = "Resource directory API"),
        (name = "ad", description = "Advertisement API"),
        (name = "coupon", description = "Coupon API"),
        (name = "checkout", description = "Checkout API"),
        (name = "order", description = "Order API"),
        (name = "admin", description = "Back-office API"),
    ),
    info(
        title = "Resource Hub Backend API",
        version = "1.0.0",
        description = "Resource Hub Backend REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
