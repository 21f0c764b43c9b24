//! Pixly: a photo catalogue that stores uploads in an object store and
//! applies in-place edits to them.

pub mod cache;
pub mod config;
pub mod db;
pub mod edit;
pub mod error;
pub mod http;
pub mod logging;
pub mod metadata;
pub mod storage;
pub mod upload;
