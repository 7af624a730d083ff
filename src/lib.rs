//! Asynchronous image labeling pipeline.
//!
//! Uploaded images are announced to the work queue via object-created
//! notifications; a worker derives machine-generated labels and thumbnails
//! for each and upserts an image record. A synchronous, authenticated API
//! lets callers list, fetch, and delete their own records.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
