use axum::{debug_handler, extract::{Path, Query, State}, response::{Html, IntoResponse, Redirect, Response}};
use oauth2::{CsrfToken, PkceCodeChallenge, Scope};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{include_res, res::escape_html, session::{self, Flash, CSRF_STATE, PKCE_VERIFIER, RETURN_URL}, AppResult};

use super::{clients::ClientProvider, Clients};

#[derive(Deserialize)]
pub(crate) struct LoginQuery {
    pub(crate) return_url: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub async fn login_page(State(clients): State<Clients>, session: Session) -> AppResult<impl IntoResponse> {
    let flash = session::take_flash(&session).await?;
    Ok(Html(render_login(&clients, flash.as_ref())))
}

fn render_login(clients: &Clients, flash: Option<&Flash>) -> String {
    let button = |provider: ClientProvider| {
        if clients.has(provider) { "" } else { "hidden" }
    };
    let flash = flash.map_or_else(String::new, |f| {
        format!(r#"<p class="flash {}">{}</p>"#, f.kind.as_str(), escape_html(&f.message))
    });

    include_res!(str, "/pages/login.html")
        .replace("{google_hidden}", button(ClientProvider::Google))
        .replace("{github_hidden}", button(ClientProvider::Github))
        .replace("{flash}", &flash)
}

#[debug_handler(state = crate::AppState)]
pub async fn login(
    Path(provider): Path<ClientProvider>,
    Query(LoginQuery { return_url }): Query<LoginQuery>,
    State(clients): State<Clients>,
    session: Session,
) -> AppResult<Response> {
    let client = clients.get_client(provider)?;

    let (pkce_code_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (authorize_url, csrf_state) = client.authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("openid".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .set_pkce_challenge(pkce_code_challenge)
        .url();

    session.insert(CSRF_STATE, csrf_state.secret()).await?;
    session.insert(PKCE_VERIFIER, pkce_verifier.secret()).await?;
    // only same-site paths, never an absolute URL
    if let Some(return_url) = return_url.filter(|u| u.starts_with('/') && !u.starts_with("//")) {
        session.insert(RETURN_URL, return_url).await?;
    }

    Ok(Redirect::to(authorize_url.as_str()).into_response())
}
