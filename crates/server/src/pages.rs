//! Server-rendered HTML from embedded Handlebars templates.

use axum::response::Html;
use handlebars::{handlebars_helper, Handlebars};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

use service::account::domain::LogEntry;
use service::i18n::{language_name, translate};
use service::settings::{FormErrors, SettingsForm};

const INDEX: &str = "index";
const SETTINGS: &str = "settings";
const FORM_ERRORS: &str = "form_errors";

#[derive(Debug, Error)]
pub enum PageError {
    #[error("template error: {0}")]
    Template(String),
    #[error("render error: {0}")]
    Render(String),
}

handlebars_helper!(t: |lang: str, msgid: str| translate(lang, msgid).to_string());

/// What the settings template needs besides the form itself.
pub struct SettingsView<'a> {
    pub lang: &'a str,
    pub form: &'a SettingsForm,
    pub errors: Option<&'a FormErrors>,
    pub languages: &'a [String],
    pub activity: &'a [LogEntry],
}

pub struct Pages {
    hb: Handlebars<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, PageError> {
        let mut hb = Handlebars::new();
        hb.register_helper("t", Box::new(t));
        let partials = [
            ("head", include_str!("../templates/head.html.hbs")),
            ("foot", include_str!("../templates/foot.html.hbs")),
            ("errorlist", include_str!("../templates/errorlist.html.hbs")),
        ];
        for (name, src) in partials {
            hb.register_partial(name, src).map_err(|e| PageError::Template(e.to_string()))?;
        }
        let templates = [
            (INDEX, include_str!("../templates/index.html.hbs")),
            (SETTINGS, include_str!("../templates/settings.html.hbs")),
            (FORM_ERRORS, include_str!("../templates/form_errors.html.hbs")),
        ];
        for (name, src) in templates {
            hb.register_template_string(name, src).map_err(|e| PageError::Template(e.to_string()))?;
        }
        debug!(templates = hb.get_templates().len(), "page templates registered");
        Ok(Self { hb })
    }

    fn render(&self, name: &str, data: &Value) -> Result<String, PageError> {
        self.hb.render(name, data).map_err(|e| PageError::Render(format!("{name}: {e}")))
    }

    pub fn index(&self, lang: &str, user_name: Option<&str>) -> Result<Html<String>, PageError> {
        let data = json!({ "lang": lang, "title": "slhweb", "user_name": user_name });
        Ok(Html(self.render(INDEX, &data)?))
    }

    pub fn settings(&self, view: &SettingsView<'_>) -> Result<Html<String>, PageError> {
        let form = view.form;
        let languages: Vec<Value> = view
            .languages
            .iter()
            .map(|code| {
                json!({
                    "code": code,
                    "name": language_name(code),
                    "selected": form.lang.as_deref() == Some(code.as_str()),
                })
            })
            .collect();
        let activity: Vec<Value> = view
            .activity
            .iter()
            .map(|e| json!({ "time": e.time.format("%Y-%m-%d %H:%M").to_string(), "level": e.level.as_str(), "message": e.message }))
            .collect();
        let data = json!({
            "lang": view.lang,
            "title": translate(view.lang, "Settings"),
            "languages": languages,
            "renew_enabled": form.renew_enabled.is_some(),
            "renew_date": form.renew_date,
            "calendar_name": form.calendar_name,
            "library_login": form.library_login,
            "errors": view.errors.map(errors_by_field).unwrap_or_default(),
            "activity": activity,
        });
        Ok(Html(self.render(SETTINGS, &data)?))
    }

    /// Every field's errors as `<p>field:<ul class="errorlist">...</ul></p>`.
    pub fn form_errors(&self, errors: &FormErrors) -> Result<String, PageError> {
        let fields: Vec<Value> = errors.iter().map(|(name, msgs)| json!({ "name": name, "messages": msgs })).collect();
        self.render(FORM_ERRORS, &json!({ "fields": fields }))
    }
}

fn errors_by_field(errors: &FormErrors) -> Map<String, Value> {
    errors.iter().map(|(field, msgs)| (field.to_string(), json!(msgs))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use models::user_log::LogLevel;

    fn pages() -> Pages {
        Pages::new().unwrap()
    }

    #[test]
    fn index_escapes_user_name() {
        let Html(page) = pages().index("en", Some("<Bob>")).unwrap();
        assert!(page.contains("&lt;Bob&gt;"));
        assert!(page.contains("/account/logout"));
        let Html(anon) = pages().index("zh-hant", None).unwrap();
        assert!(anon.contains("使用 Google 登入"));
        assert!(anon.starts_with("<!DOCTYPE html>\n<html lang=\"zh-hant\">"));
    }

    #[test]
    fn settings_marks_selection_and_errors() {
        let form = SettingsForm {
            action: Some("update".into()),
            lang: Some("zh-hant".into()),
            renew_enabled: Some("on".into()),
            renew_date: Some("30".into()),
            calendar_name: Some("<cal>".into()),
            library_login: Some("s1".into()),
            library_password: Some("secret".into()),
        };
        let mut errors = FormErrors::default();
        errors.add("renew_date", "Ensure this value is less than or equal to 13.");
        let activity = vec![LogEntry { time: Utc::now(), level: LogLevel::Success, message: "renewed <2>".into() }];
        let view = SettingsView {
            lang: "en",
            form: &form,
            errors: Some(&errors),
            languages: &["zh-hant".to_string(), "en".to_string()],
            activity: &activity,
        };
        let Html(page) = pages().settings(&view).unwrap();
        assert!(page.contains("<option value=\"zh-hant\" selected>"));
        assert!(page.contains("<option value=\"en\">"));
        assert!(page.contains(" checked>"));
        assert!(page.contains("<ul class=\"errorlist\"><li>Ensure this value is less than or equal to 13.</li></ul>"));
        assert_eq!(page.matches("errorlist").count(), 1);
        assert!(page.contains("value=\"30\""));
        assert!(page.contains("value=\"&lt;cal&gt;\""));
        assert!(page.contains("value=\"s1\""));
        assert!(!page.contains("secret"));
        assert!(page.contains("<li class=\"SUCCESS\">"));
        assert!(page.contains("renewed &lt;2&gt;"));
    }

    #[test]
    fn form_errors_message_shape() {
        let mut errors = FormErrors::default();
        errors.add("lang", "This field is required.");
        errors.add("renew_date", "Enter a whole number.");
        let msg = pages().form_errors(&errors).unwrap();
        assert_eq!(
            msg,
            "<p>lang:<ul class=\"errorlist\"><li>This field is required.</li></ul></p>\
             <p>renew_date:<ul class=\"errorlist\"><li>Enter a whole number.</li></ul></p>"
        );
    }
}
