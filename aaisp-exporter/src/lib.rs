//! Prometheus exporter for Andrews & Arnold broadband lines.
//!
//! Each scrape of `/metrics` asks the CHAOS API for the current line
//! information and turns it into per-line quota and sync-rate series,
//! plus `aaisp_scrape_success` to show whether the API call worked.

pub mod collector;
pub mod config;
pub mod logging;
pub mod server;
