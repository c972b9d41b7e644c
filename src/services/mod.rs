pub mod ad_service;
pub mod checkout_service;
pub mod coupon_service;
pub mod notifier_service;
pub mod order_service;
pub mod product_service;
pub mod resource_service;

pub use ad_service::*;
pub use checkout_service::*;
pub use coupon_service::*;
pub use notifier_service::*;
pub use order_service::*;
pub use product_service::*;
pub use resource_service::*;
