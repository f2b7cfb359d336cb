use axum::{debug_handler, extract::{Path, Query, State}, response::{IntoResponse, Redirect}};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier, TokenResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_sessions::Session;
use tracing::info;

use crate::{model::User, notify::NoticeKind, session::{self, CSRF_STATE, PKCE_VERIFIER, RETURN_URL, USER}, AppResult, AppState, GetField};

use super::{clients::ClientProvider, spooky_alias, Clients};

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FirebaseRequest {
    post_body: String,
    request_uri: String,
    return_idp_credential: bool,
    return_secure_token: bool,
}

/// Builds the session user from a `signInWithIdp` response.
pub(crate) fn user_from_identity(body: &Value) -> AppResult<User> {
    let uid = body.get_str_field("localId")?;
    let display_name = body
        .get("displayName")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(spooky_alias);
    let photo_url = body.get("photoUrl").and_then(Value::as_str).map(str::to_owned);

    Ok(User { uid, display_name, photo_url })
}

#[debug_handler(state = AppState)]
pub async fn lockin(
    Path(provider): Path<ClientProvider>,
    Query(LockinQuery { state, code }): Query<LockinQuery>,
    State(clients): State<Clients>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let state = CsrfToken::new(state.ok_or("OAuth: without state")?);
    let code = AuthorizationCode::new(code.ok_or("OAuth: without code")?);

    let Some(stored_state) = session.remove::<String>(CSRF_STATE).await? else {
        return Err("no csrf_state".into());
    };

    if state.secret().as_str() != stored_state.as_str() {
        return Err("csrf tokens don't match".into());
    }

    let Some(pkce_verifier) = session.remove::<String>(PKCE_VERIFIER).await? else {
        return Err("no pkce_verifier".into());
    };

    let client = clients.get_client(provider)?;
    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let token_result = client
        .exchange_code(code)
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&http_client)
        .await?;

    let access_token = token_result.access_token().secret();
    let body: Value = http_client.post(&clients.firebase_idpurl)
        .json(&FirebaseRequest {
            post_body: format!("access_token={access_token}&providerId={}", provider.id()),
            request_uri: clients.public_url.clone(),
            return_idp_credential: true,
            return_secure_token: true,
        })
        .send()
        .await?
        .json()
        .await?;

    let user = user_from_identity(&body)?;
    session.cycle_id().await?;
    session.insert(USER, &user).await?;

    session::set_flash(&session, NoticeKind::Success, "Welcome, Spooky Voter!").await?;
    info!(uid = %user.uid, provider = %provider, "signed in");

    let return_url: String = session.remove(RETURN_URL).await?.unwrap_or("/".to_string());
    Ok(Redirect::to(return_url.as_str()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn identity_response_becomes_user() {
        let user = user_from_identity(&json!({
            "localId": "u1",
            "displayName": "Ada Lovelace",
            "photoUrl": "https://example.com/ada.png",
        }))
        .unwrap();
        assert_eq!(user.uid, "u1");
        assert_eq!(user.display_name, "Ada Lovelace");
        assert_eq!(user.photo_url.as_deref(), Some("https://example.com/ada.png"));
    }

    #[test]
    fn nameless_accounts_get_an_alias() {
        let user = user_from_identity(&json!({"localId": "u2", "displayName": "  "})).unwrap();
        assert!(!user.display_name.trim().is_empty());
        assert_eq!(user.photo_url, None);

        assert!(user_from_identity(&json!({"displayName": "x"})).is_err());
    }
}
