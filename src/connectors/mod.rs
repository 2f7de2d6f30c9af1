pub mod kucoin;
pub mod messages;
pub mod traits;
