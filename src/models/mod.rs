pub mod ad;
pub mod checkout;
pub mod common;
pub mod coupon;
pub mod notification;
pub mod order;
pub mod pagination;
pub mod product;
pub mod resource;

pub use ad::*;
pub use checkout::*;
pub use common::*;
pub use coupon::*;
pub use notification::*;
pub use order::*;
pub use pagination::*;
pub use product::*;
pub use resource::*;
