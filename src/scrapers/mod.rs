//! Storefront navigation profiles

pub mod hibuddy;
