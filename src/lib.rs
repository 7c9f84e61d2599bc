//! Availability alerts for Airbnb listings.
//!
//! Users register watches on a property and date range. A background
//! [`Scheduler`](services::Scheduler) periodically hands due watches to the
//! [`ScanProcessor`](services::ScanProcessor), which checks availability
//! through a [`ListingProvider`](providers::ListingProvider), records a scan
//! log and alerts the owner through the
//! [`NotificationGateway`](notification::NotificationGateway).

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod notification;
pub mod providers;
pub mod services;
pub mod storage;
