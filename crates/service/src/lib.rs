//! Service layer: login flow, settings handling and scheduled tasks on top of `models`.
//! - Separates business logic from data access and from the web framework.
//! - Repositories and the identity provider sit behind traits with in-memory mocks.

pub mod errors;
pub mod account;
pub mod oauth;
pub mod settings;
pub mod tasks;
pub mod i18n;
pub mod services;

pub use services::Services;
#[cfg(test)]
pub mod test_support;
