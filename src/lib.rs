//! APK Depot - a small HTTP service for storing Android packages.
//!
//! Uploaded APKs live as files in one directory; a JSON metadata file
//! records their names and upload times. Every mutation keeps the two in
//! step, compensating the file system when the metadata write fails.

pub mod config;
pub mod datetime;
pub mod depot;
pub mod error;
pub mod logging;
pub mod web;

pub use config::Config;
pub use depot::{Depot, MetadataEntry, MetadataStore};
pub use error::{DepotError, Result};
