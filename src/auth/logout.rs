use axum::{debug_handler, extract::Query, response::Redirect};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use crate::{notify::NoticeKind, session, AppResult};

#[derive(Deserialize)]
pub(crate) struct LogoutQuery {
    pub(crate) return_url: Option<String>,
}

#[debug_handler]
pub async fn logout(
    Query(LogoutQuery { return_url }): Query<LogoutQuery>,
    session: Session
) -> AppResult<Redirect> {
    if let Some(user) = session::current_user(&session).await? {
        info!(uid = %user.uid, "signed out");
    }
    session.clear().await;
    session::set_flash(&session, NoticeKind::Info, "You've been logged out!").await?;
    let return_url = return_url
        .filter(|u| u.starts_with('/') && !u.starts_with("//"))
        .unwrap_or("/".to_string());
    Ok(Redirect::to(return_url.as_str()))
}
