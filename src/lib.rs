//! Personal publishing backend: posts, pages, a "now" snippet and users
//! stored in SQLite behind transactional repositories.

pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod service;
pub mod session;

pub use error::{error_code, error_message, Error, ErrorCode};
