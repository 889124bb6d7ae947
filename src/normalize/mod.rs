//! Pure unit conversions and geographic region classification.

pub mod region;
pub mod units;

pub use region::classify_region;
pub use units::*;
