use axum::extract::{Query, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Form, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{debug, info, warn};

use common::types::Message;
use service::account::domain::{AccountUser, CallbackParams};
use service::i18n::translate;
use service::settings::{SettingsError, SettingsForm, SettingsOutcome};

use crate::errors::ApiError;
use crate::pages::SettingsView;
use crate::session::SessionData;
use crate::state::ServerState;

pub const INDEX_PATH: &str = "/account/";
pub const LOGIN_PATH: &str = "/account/login";
pub const SETTINGS_PATH: &str = "/account/settings";

/// Authenticated user, inserted by [`require_login`].
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user: AccountUser,
    pub session: SessionData,
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Requests sent by `XMLHttpRequest` get JSON instead of pages and redirects.
pub fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
        .unwrap_or(false)
}

fn login_url(next: &str) -> String {
    format!("{}?next={}", LOGIN_PATH, urlencoding::encode(next))
}

fn content_language(lang: &str) -> [(header::HeaderName, HeaderValue); 1] {
    let value = HeaderValue::from_str(lang).unwrap_or_else(|_| HeaderValue::from_static("en"));
    [(header::CONTENT_LANGUAGE, value)]
}

/// Redirect anonymous requests to the login entry point, remembering where they were going.
pub async fn require_login(State(state): State<ServerState>, jar: CookieJar, mut req: Request, next: Next) -> Response {
    let session = SessionData::from_jar(&jar, &state.session);
    let user = match session.uid {
        Some(uid) => match state.accounts.find_user(uid).await {
            Ok(Some(u)) if u.is_active => Some(u),
            Ok(_) => None,
            Err(e) => return ApiError::from(e).into_response(),
        },
        None => None,
    };
    match user {
        Some(user) => {
            req.extensions_mut().insert(CurrentUser { user, session });
            next.run(req).await
        }
        None => {
            let target = req.uri().path_and_query().map(|p| p.as_str()).unwrap_or(SETTINGS_PATH).to_string();
            debug!(%target, "anonymous request, redirecting to login");
            Redirect::to(&login_url(&target)).into_response()
        }
    }
}

pub async fn index(State(state): State<ServerState>, jar: CookieJar) -> Result<Response, ApiError> {
    let session = SessionData::from_jar(&jar, &state.session);
    let lang = state.language(session.lang.as_deref()).to_string();
    let name = if session.is_authenticated() { session.name.as_deref() } else { None };
    let page = state.pages.index(&lang, name)?;
    Ok((content_language(&lang), page).into_response())
}

/// Start the OAuth flow: remember `next` and `state`, send the browser to the provider.
pub async fn login(
    State(state): State<ServerState>,
    jar: CookieJar,
    Query(q): Query<LoginQuery>,
) -> Result<(CookieJar, Redirect), ApiError> {
    let redirect = state.accounts.start_login(q.next.filter(|n| !n.is_empty()));
    let mut session = SessionData::from_jar(&jar, &state.session);
    session.next = redirect.next;
    session.state = Some(redirect.state);
    let jar = session.store(jar, &state.session)?;
    Ok((jar, Redirect::to(&redirect.authorize_url)))
}

pub async fn oauth2callback(
    State(state): State<ServerState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let mut session = SessionData::from_jar(&jar, &state.session);
    let outcome = state.accounts.complete_login(&params, session.state.as_deref()).await?;

    let lang = state.language(Some(outcome.profile.preferences.lang.as_str())).to_string();
    session.uid = Some(outcome.user.id);
    session.name = Some(outcome.user.username.clone());
    session.lang = Some(lang.clone());
    session.state = None;
    let target = session.next.take().unwrap_or_else(|| INDEX_PATH.to_string());
    let jar = session.store(jar, &state.session)?;

    info!(user_id = outcome.user.id, %target, "login complete");
    Ok((jar, content_language(&lang), Redirect::to(&target)).into_response())
}

pub async fn logout(State(state): State<ServerState>, jar: CookieJar) -> (CookieJar, Redirect) {
    (SessionData::clear(jar, &state.session), Redirect::to(INDEX_PATH))
}

pub async fn settings_page(
    State(state): State<ServerState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    let profile = state.settings.load(current.user.id).await?;
    let activity = state.settings.activity(&profile.id).await?;
    let lang = state.language(current.session.lang.as_deref()).to_string();
    let form = SettingsForm::from_preferences(&profile.preferences);
    let page = state.pages.settings(&SettingsView {
        lang: &lang,
        form: &form,
        errors: None,
        languages: state.settings.languages(),
        activity: &activity,
    })?;
    Ok((content_language(&lang), page).into_response())
}

pub async fn settings_submit(
    State(state): State<ServerState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    headers: HeaderMap,
    Form(form): Form<SettingsForm>,
) -> Result<Response, ApiError> {
    let ajax = is_ajax(&headers);
    let lang = state.language(current.session.lang.as_deref()).to_string();

    match state.settings.submit(current.user.id, &form).await {
        Ok(SettingsOutcome::Updated(profile)) => {
            let new_lang = state.language(Some(profile.preferences.lang.as_str())).to_string();
            let mut session = current.session;
            session.lang = Some(new_lang.clone());
            let jar = session.store(jar, &state.session)?;
            if ajax {
                let body = Json(Message::new(translate(&new_lang, "successfully updated profile")));
                Ok((StatusCode::ACCEPTED, jar, content_language(&new_lang), body).into_response())
            } else {
                Ok((jar, Redirect::to(SETTINGS_PATH)).into_response())
            }
        }
        Ok(SettingsOutcome::DeleteRequested) => Ok(Redirect::to("/").into_response()),
        Err(SettingsError::Invalid(errors)) => {
            warn!(user_id = current.user.id, errors = %errors, "settings form rejected");
            if ajax {
                let body = Json(Message::new(state.pages.form_errors(&errors)?));
                Ok((StatusCode::BAD_REQUEST, body).into_response())
            } else {
                let profile = state.settings.load(current.user.id).await?;
                let activity = state.settings.activity(&profile.id).await?;
                let page = state.pages.settings(&SettingsView {
                    lang: &lang,
                    form: &form,
                    errors: Some(&errors),
                    languages: state.settings.languages(),
                    activity: &activity,
                })?;
                Ok((content_language(&lang), page).into_response())
            }
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ajax_header_detection() {
        let mut h = HeaderMap::new();
        assert!(!is_ajax(&h));
        h.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        assert!(is_ajax(&h));
    }

    #[test]
    fn login_url_encodes_next() {
        assert_eq!(login_url("/account/settings?a=1"), "/account/login?next=%2Faccount%2Fsettings%3Fa%3D1");
    }
}
