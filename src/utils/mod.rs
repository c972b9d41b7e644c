pub mod code_generator;
pub mod input;
pub mod jwt;
pub mod money;

pub use code_generator::generate_coupon_code;
pub use input::*;
pub use jwt::*;
pub use money::format_usd;
