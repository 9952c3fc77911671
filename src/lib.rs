pub mod access;
pub mod auth;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod limits;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod ratelimit;
pub mod sweeper;

pub use error::{ApiError, ErrorKind};
pub use pipeline::{Operation, Pipeline};
