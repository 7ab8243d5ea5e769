//! API Routes
//!
//! Route handlers organized by functionality.

pub mod alerts;
pub mod auth;
pub mod health;
pub mod osm;
pub mod reports;
pub mod stats;
