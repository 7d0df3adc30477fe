// src/handlers/forms.rs

use axum::{
    Json,
    extract::{Query, State},
    response::Html,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::int_attr;
use crate::{
    config::Config,
    error::AppError,
    models::form::{FormFields, Identity, SaveFormRequest},
    services::forms::{field_display, is_valid_guest_token, new_guest_token},
    state::AppState,
    utils::{
        html::{debug_block, escape},
        jwt::{MaybeViewer, Viewer},
    },
};

/// Identity of a reader: the viewer, else a well-formed guest cookie.
fn reader_identity(viewer: Option<&Viewer>, jar: &CookieJar, config: &Config) -> Option<Identity> {
    if let Some(viewer) = viewer {
        return Some(Identity::User(viewer.user_id));
    }
    jar.get(&config.guest_cookie)
        .map(|c| c.value())
        .filter(|token| is_valid_guest_token(token))
        .map(|token| Identity::Guest(token.to_string()))
}

async fn read_latest(
    state: &AppState,
    identity: Option<&Identity>,
) -> Result<FormFields, AppError> {
    match identity {
        Some(identity) => state.forms.read_latest(identity).await,
        None => Ok(FormFields::new()),
    }
}

async fn read_page(
    state: &AppState,
    identity: Option<&Identity>,
    page_id: i64,
) -> Result<FormFields, AppError> {
    match identity {
        Some(identity) => state.forms.read_page(identity, page_id).await,
        None => Ok(FormFields::new()),
    }
}

/// Capture event from a form page. Guests without a usable session cookie get
/// a fresh token, returned as a cookie.
pub async fn save_form(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    jar: CookieJar,
    Json(payload): Json<SaveFormRequest>,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let (identity, jar) = match reader_identity(viewer.as_ref(), &jar, &state.config) {
        Some(identity) => (identity, jar),
        None => {
            let token = new_guest_token();
            let cookie = Cookie::build((state.config.guest_cookie.clone(), token.clone()))
                .path("/")
                .http_only(true)
                .max_age(time::Duration::seconds(
                    state.config.guest_cookie_max_age.as_secs() as i64,
                ));
            tracing::debug!("issued a new guest session");
            (Identity::Guest(token), jar.add(cookie))
        }
    };

    let summary = state
        .forms
        .save(&identity, payload.page_id, &payload.fields)
        .await?;

    Ok((jar, Json(json!({ "success": true, "data": summary }))))
}

#[derive(Debug, Default, Deserialize)]
pub struct FieldParams {
    pub field: Option<String>,
    pub fallback: Option<String>,
}

/// One field of the latest view as text, or the fallback.
pub async fn form_field(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    jar: CookieJar,
    Query(params): Query<FieldParams>,
) -> Result<Html<String>, AppError> {
    let fallback = params.fallback.unwrap_or_default();
    let field = params.field.unwrap_or_default();

    let identity = reader_identity(viewer.as_ref(), &jar, &state.config);
    let latest = read_latest(&state, identity.as_ref()).await?;
    let value = field_display(&latest, &field).unwrap_or(fallback);

    Ok(Html(escape(&value)))
}

/// Every field of the latest view as a definition list.
pub async fn form_all_latest(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    jar: CookieJar,
) -> Result<Html<String>, AppError> {
    let identity = reader_identity(viewer.as_ref(), &jar, &state.config);
    let latest = read_latest(&state, identity.as_ref()).await?;
    if latest.is_empty() {
        return Ok(Html(String::new()));
    }

    let items: String = latest
        .iter()
        .map(|(field, value)| {
            format!(
                "<dt><strong>{}</strong></dt><dd>{}</dd>",
                escape(field),
                escape(&value.display())
            )
        })
        .collect();
    Ok(Html(format!("<dl class=\"aotter-list\">{items}</dl>")))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageFieldParams {
    pub field: Option<String>,
    pub page_id: Option<String>,
    pub fallback: Option<String>,
}

/// One field as captured on a specific page.
pub async fn form_field_on_page(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    jar: CookieJar,
    Query(params): Query<PageFieldParams>,
) -> Result<Html<String>, AppError> {
    let fallback = params.fallback.unwrap_or_default();
    let field = params.field.unwrap_or_default();
    let page_id = int_attr(params.page_id.as_deref());

    let identity = reader_identity(viewer.as_ref(), &jar, &state.config);
    let page = read_page(&state, identity.as_ref(), page_id).await?;
    let value = field_display(&page, &field).unwrap_or(fallback);

    Ok(Html(escape(&value)))
}

#[derive(Debug, Default, Deserialize)]
pub struct DumpParams {
    pub page_id: Option<String>,
}

/// JSON dump of the reader's stored fields.
pub async fn form_dump(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    jar: CookieJar,
    Query(params): Query<DumpParams>,
) -> Result<Html<String>, AppError> {
    let page_id = int_attr(params.page_id.as_deref());
    let identity = reader_identity(viewer.as_ref(), &jar, &state.config);

    let latest = read_latest(&state, identity.as_ref()).await?;
    let this_page = read_page(&state, identity.as_ref(), page_id).await?;

    Ok(Html(debug_block(&json!({
        "latest": latest,
        "this_page": this_page,
        "page_id": page_id,
        "logged_in": viewer.is_some(),
        "user_id": viewer.as_ref().map_or(0, |v| v.user_id),
    }))))
}
