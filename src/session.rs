//! Session keys and the signed-in user's view of themselves.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    AppResult,
    model::{Entry, User},
    notify::NoticeKind,
    repo::EntryRepository,
};

pub const USER: &str = "user";
pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const RETURN_URL: &str = "return_url";
pub const FLASH: &str = "flash";

/// `{user, entry}` as the rest of the app sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: User,
    pub entry: Option<Entry>,
}

pub async fn current_user(session: &Session) -> AppResult<Option<User>> {
    Ok(session.get::<User>(USER).await?)
}

/// A notice carried across a redirect, shown on the next page that asks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: NoticeKind,
    pub message: String,
}

pub async fn set_flash(session: &Session, kind: NoticeKind, message: impl Into<String>) -> AppResult<()> {
    let flash = Flash { kind, message: message.into() };
    Ok(session.insert(FLASH, flash).await?)
}

pub async fn take_flash(session: &Session) -> AppResult<Option<Flash>> {
    Ok(session.remove::<Flash>(FLASH).await?)
}

/// Resolves the session into the user and their own entry, if signed in.
pub async fn watch(session: &Session, repo: &EntryRepository) -> AppResult<Option<SessionState>> {
    let Some(user) = current_user(session).await? else {
        return Ok(None);
    };
    let entry = repo.get_entry(&user.uid).await?;

    Ok(Some(SessionState { user, entry }))
}
