//! Storefront domain: aggregates, value objects, pricing and reporting.
pub mod aggregates;
pub mod events;
pub mod pricing;
pub mod reporting;
pub mod value_objects;
