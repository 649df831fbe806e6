//! Feedsync Core Library
//!
//! Keeps a local media directory in sync with a remote video feed. A run is
//! up to three phases, each driven off the persisted catalog:
//!
//! 1. discovery: scroll the feed to its end and catalog items not seen before
//! 2. resolution: obtain direct media URLs through two independent strategies
//! 3. download: publish every cataloged item whose file is still missing
//!
//! # Architecture
//!
//! - [`catalog`] - persisted records (one per feed item) behind [`CatalogStore`]
//! - [`naming`] - save-name assignment with substitutions and occurrence numbers
//! - [`discovery`] - feed scrolling and ingest
//! - [`resolver`] - URL strategies and their orchestration
//! - [`planner`] - catalog vs. download directory reconciliation
//! - [`download`] - streaming downloader with live telemetry
//! - [`pipeline`] - phase runner
//! - [`browser`] - page-rendering seam and its WebDriver implementation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod browser;
pub mod catalog;
pub mod config;
pub mod db;
pub mod discovery;
pub mod download;
pub mod error;
pub mod html;
pub mod naming;
pub mod pipeline;
pub mod planner;
pub mod resolver;
pub mod site;
pub mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use browser::{PageBrowser, PageSession, SessionOptions, WebDriverBrowser};
pub use catalog::{Catalog, CatalogError, CatalogRecord, CatalogStore, NewCatalogRecord};
pub use config::{ConfigError, PipelineConfig};
pub use db::Database;
pub use download::{DownloadError, HttpClient, TelemetrySnapshot, TransferTelemetry};
pub use error::PipelineError;
pub use naming::{NameResolver, Substitutions, resolve_save_name};
pub use pipeline::{Pipeline, PipelineReport};
pub use planner::DownloadPlan;
pub use resolver::{ResolveError, StrategySet, UrlStrategy};
