//! Back-office core for the home-cleaning site: cached quote reads with their
//! audit trail, and the session gate in front of the admin pages.

pub mod admin;
pub mod backend;
pub mod config;
pub mod error;
pub mod quotes;
pub mod telemetry;
