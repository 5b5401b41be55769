//! Client for the Andrews & Arnold CHAOS v2 API.
//!
//! Only the read-only broadband calls are covered: line information
//! (`/broadband/info`) and quota (`/broadband/quota`).

pub mod auth;
pub mod client;
pub mod error;
pub mod time;
pub mod types;

pub use auth::Auth;
pub use client::{Chaos, DEFAULT_ENDPOINT};
pub use error::ChaosError;
pub use time::parse_upstream_timestamp;
pub use types::{BroadbandInfo, BroadbandQuota};
