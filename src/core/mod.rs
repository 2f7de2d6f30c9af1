pub mod engine;
pub mod executor;
pub mod monitor;
pub mod sizer;
