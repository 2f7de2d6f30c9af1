pub mod scoring;
pub mod traits;
