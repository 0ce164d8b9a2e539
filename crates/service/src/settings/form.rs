use std::fmt;

use models::user_profile::{Preferences, RENEW_DATE_RANGE};
use serde::Deserialize;

pub const REQUIRED: &str = "This field is required.";
pub const REQUIRED_FOR_RENEW: &str = "This field is required as renew is enabled.";
pub const NOT_A_NUMBER: &str = "Enter a whole number.";
pub const DUPLICATE_LIBRARY_LOGIN: &str = "Duplicate library login found. Did you register in the past?";

/// Raw settings submission, as posted by the browser.
///
/// Unchecked checkboxes are absent from the body, hence `Option` everywhere.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SettingsForm {
    pub action: Option<String>,
    pub lang: Option<String>,
    pub renew_enabled: Option<String>,
    pub renew_date: Option<String>,
    pub calendar_name: Option<String>,
    pub library_login: Option<String>,
    pub library_password: Option<String>,
}

/// Validated intent of a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsAction {
    Update(Preferences),
    Delete,
}

/// Field errors in submission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormErrors {
    fields: Vec<(String, Vec<String>)>,
}

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        match self.fields.iter_mut().find(|(f, _)| f == field) {
            Some((_, msgs)) => msgs.push(message.into()),
            None => self.fields.push((field.to_string(), vec![message.into()])),
        }
    }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields.iter().find(|(f, _)| f == field).map(|(_, m)| m.as_slice()).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(f, m)| (f.as_str(), m.as_slice()))
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.fields.iter().map(|(k, v)| format!("{}: {}", k, v.join(" "))).collect();
        write!(f, "{}", parts.join("; "))
    }
}

fn checkbox(value: Option<&str>) -> bool {
    matches!(value.map(|v| v.trim().to_ascii_lowercase()).as_deref(), Some("on" | "true" | "1" | "yes"))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl SettingsForm {
    /// Form pre-filled with stored preferences.
    pub fn from_preferences(p: &Preferences) -> Self {
        Self {
            action: Some("update".into()),
            lang: Some(p.lang.clone()),
            renew_enabled: p.renew_enabled.then(|| "on".to_string()),
            renew_date: Some(p.renew_date.to_string()),
            calendar_name: Some(p.calendar_name.clone()),
            library_login: p.library_login.clone(),
            // never echoed back; an empty field keeps the stored password
            library_password: None,
        }
    }

    /// Validate against the current preferences and the configured languages.
    /// Omitted optional fields keep their current value. A blank library
    /// login clears it; a blank library password keeps the stored one.
    ///
    /// Uniqueness of the library login needs the store and is checked by
    /// [`SettingsService::submit`](super::SettingsService::submit).
    pub fn validate(&self, current: &Preferences, languages: &[String]) -> Result<SettingsAction, FormErrors> {
        let mut errors = FormErrors::default();

        let action = match non_blank(&self.action) {
            Some("delete") => return Ok(SettingsAction::Delete),
            Some("update") => Some(()),
            Some(other) => {
                errors.add("action", format!("Select a valid choice. {} is not one of the available choices.", other));
                None
            }
            None => {
                errors.add("action", REQUIRED);
                None
            }
        };

        let lang = match non_blank(&self.lang) {
            Some(l) if languages.iter().any(|x| x == l) => Some(l.to_string()),
            Some(l) => {
                errors.add("lang", format!("Select a valid choice. {} is not one of the available choices.", l));
                None
            }
            None => {
                errors.add("lang", REQUIRED);
                None
            }
        };

        let renew_date = match non_blank(&self.renew_date) {
            None => Some(current.renew_date),
            Some(raw) => match raw.parse::<i32>() {
                Err(_) => {
                    errors.add("renew_date", NOT_A_NUMBER);
                    None
                }
                Ok(n) if n < *RENEW_DATE_RANGE.start() => {
                    errors.add("renew_date", format!("Ensure this value is greater than or equal to {}.", RENEW_DATE_RANGE.start()));
                    None
                }
                Ok(n) if n > *RENEW_DATE_RANGE.end() => {
                    errors.add("renew_date", format!("Ensure this value is less than or equal to {}.", RENEW_DATE_RANGE.end()));
                    None
                }
                Ok(n) => Some(n),
            },
        };

        let calendar_name = match &self.calendar_name {
            None => Some(current.calendar_name.clone()),
            Some(raw) if raw.trim().is_empty() => {
                errors.add("calendar_name", REQUIRED);
                None
            }
            Some(raw) => Some(raw.trim().to_string()),
        };

        let renew_enabled = checkbox(self.renew_enabled.as_deref());
        let library_login = match &self.library_login {
            None => current.library_login.clone(),
            Some(_) => non_blank(&self.library_login).map(str::to_string),
        };
        let library_password = non_blank(&self.library_password)
            .map(str::to_string)
            .or_else(|| current.library_password.clone());
        if renew_enabled {
            if library_login.is_none() {
                errors.add("library_login", REQUIRED_FOR_RENEW);
            }
            if library_password.is_none() {
                errors.add("library_password", REQUIRED_FOR_RENEW);
            }
        }

        match (action, lang, renew_date, calendar_name) {
            (Some(()), Some(lang), Some(renew_date), Some(calendar_name)) if errors.is_empty() => {
                Ok(SettingsAction::Update(Preferences {
                    lang,
                    renew_enabled,
                    renew_date,
                    calendar_name,
                    library_login,
                    library_password,
                }))
            }
            _ => Err(errors),
        }
    }
}
