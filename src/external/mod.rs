pub mod mail;
pub mod stripe;

pub use self::mail::*;
pub use self::stripe::*;
