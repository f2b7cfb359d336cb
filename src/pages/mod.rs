mod gallery;
mod media;
mod results;
mod upload;

use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_sessions::Session;

use crate::{
    include_res,
    notify::NoticeKind,
    repo::{EntryOrder, EntryRepository},
    res::escape_html,
    session,
    view::View,
    AppResult, AppState,
};

pub use gallery::{render_gallery, GalleryState};
pub use results::render_results;
pub use upload::render_upload;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(shell))
        .route("/views/{fragment}", get(view))
        .route("/entry", post(upload::submit))
        .route("/entry/check", post(upload::check_file))
        .route("/entry/delete", post(upload::delete))
        .route("/media/{*path}", get(media::serve))
}

/// Reply to a form post; the shell shows `message` and follows `navigate`.
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub ok: bool,
    pub kind: NoticeKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigate: Option<String>,
}

impl Outcome {
    pub fn success(message: impl Into<String>, navigate: Option<View>) -> Self {
        Self {
            ok: true,
            kind: NoticeKind::Success,
            message: message.into(),
            navigate: navigate.map(View::fragment),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            kind: NoticeKind::Error,
            message: message.into(),
            navigate: None,
        }
    }

    pub fn respond(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

pub(crate) fn signed_out() -> Response {
    Outcome::error("Please sign in first.").respond(StatusCode::UNAUTHORIZED)
}

#[debug_handler]
async fn shell(State(repo): State<EntryRepository>, session: Session) -> AppResult<Response> {
    let Some(state) = session::watch(&session, &repo).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let photo = state.user.photo_url.as_deref().map_or_else(String::new, |url| {
        format!(r#"<img class="avatar" src="{}" alt="">"#, escape_html(url))
    });
    let upload_label = if state.entry.is_some() { "Edit My Costume" } else { "Upload Costume" };

    Ok(Html(
        include_res!(str, "/pages/index.html")
            .replace("{display_name}", &escape_html(&state.user.display_name))
            .replace("{photo}", &photo)
            .replace("{upload_label}", upload_label)
    ).into_response())
}

#[debug_handler(state = AppState)]
async fn view(
    Path(fragment): Path<String>,
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Response> {
    let Some(session_state) = session::watch(&session, &state.repo).await? else {
        return Ok((StatusCode::UNAUTHORIZED, Html(r#"<a href="/login">Sign in</a>"#)).into_response());
    };

    let now = state.clock.now();
    let body = match View::from_fragment(&fragment) {
        View::Gallery => {
            let entries = state.repo.list_entries(EntryOrder::NewestFirst).await?;
            let vote = state.repo.get_vote(&session_state.user.uid).await?;
            render_gallery(&GalleryState {
                entries: &entries,
                viewer: &session_state.user.uid,
                voted_for: vote.as_ref().map(|v| v.target_owner_id.as_str()),
                pending: false,
                voting: state.schedule.voting.phase(now),
            })
        }
        View::Upload => render_upload(&session_state, &state.uploads, state.schedule.upload, now),
        View::Results => {
            let entries = if state.schedule.is_revealed(now) {
                Some(state.repo.list_entries(EntryOrder::MostVotes).await?)
            } else {
                None
            };
            render_results(now, state.schedule.reveal, entries)
        }
    };

    Ok(Html(body).into_response())
}
