pub mod ads;
pub mod coupon_products;
pub mod coupon_usages;
pub mod coupons;
pub mod orders;
pub mod products;
pub mod resources;

pub use ads as ad_entity;
pub use coupon_products as coupon_product_entity;
pub use coupon_usages as coupon_usage_entity;
pub use coupons as coupon_entity;
pub use orders as order_entity;
pub use products as product_entity;
pub use resources as resource_entity;

pub use coupons::{AppliesTo, CouponStatus, DiscountType};
pub use orders::OrderStatus;
pub use resources::{ListingType, ResourceStatus};
