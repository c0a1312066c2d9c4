//! Data access and business rules for a bubble tea shop: catalog, venue,
//! orders with their status workflow, activity log and statistics, over SQLite.

pub mod activity_log;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod guards;
pub mod messages;
pub mod orders;
pub mod pagination;
pub mod pricing;
pub mod repository;
pub mod response;
pub mod statistics;
pub mod store;
pub mod validation;
pub mod venue;

#[cfg(test)]
mod test_support;
