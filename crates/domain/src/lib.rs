pub mod access;
pub mod auth;
pub mod blob;
pub mod complaint;
pub mod error;
pub mod idempotency;
pub mod identity;
pub mod lifecycle;
pub mod ports;
pub mod query;
pub mod service;
pub mod upvotes;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;
