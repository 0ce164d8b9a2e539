//! Account module: three-layer architecture (domain, repository, service).
//!
//! Owns the OAuth login flow and the user/profile reconciliation behind it.

pub mod domain;
pub mod errors;
pub mod repository;
pub mod service;
pub mod repo;

pub use service::AccountService;
