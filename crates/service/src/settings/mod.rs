//! Preferences form: validation and persistence for the settings page.

pub mod form;
pub mod service;

pub use form::{FormErrors, SettingsAction, SettingsForm};
pub use service::{SettingsError, SettingsOutcome, SettingsService};
