//! CoolLibrary Management System
//!
//! REST JSON API for managing a library's books, customers, authors and
//! loans. The loan workflow checks a request against the library's
//! eligibility rules and commits the loan and the copy decrement atomically.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
