//! # Home Maintenance Tracker Common Library
//!
//! Shared code for the tracker service including:
//! - Task content model and the fixed field catalog
//! - Template reconciliation (diff and update planning)
//! - Database schema and migrations
//! - Configuration loading
//! - API token hashing
//! - Utility functions

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod models;
pub mod reconcile;
pub mod time;

pub use error::{Error, Result};
pub use fields::TaskField;
pub use models::{TaskContent, TaskTemplate, TemplateState, UserTask};
pub use reconcile::OverridePolicy;
