pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod text;
pub mod types;

pub use error::GmaoError;
