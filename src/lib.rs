pub mod auth;
pub mod blob;
pub mod clock;
pub mod config;
pub mod live;
pub mod media;
pub mod model;
pub mod notify;
pub mod optimistic;
pub mod pages;
pub mod repo;
pub mod res;
pub mod results;
pub mod schedule;
pub mod session;
pub mod store;
pub mod upload;
pub mod view;
pub mod voting;

use std::sync::Arc;

use axum::{extract::{DefaultBodyLimit, FromRef}, http::StatusCode, response::{IntoResponse, Response}, Router};
use oauth2::reqwest;
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

use blob::{BlobStore, LocalBlobStore};
use clock::Clock;
use media::{ImageCodec, MediaLimits};
use notify::NotificationBus;
use repo::EntryRepository;
use schedule::Schedule;
use store::DocumentStore;
use upload::UploadWorkflow;
use voting::VotingWorkflow;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub repo: EntryRepository,
    pub voting: VotingWorkflow,
    pub uploads: UploadWorkflow,
    pub notifications: NotificationBus,
    pub schedule: Schedule,
    pub clock: Arc<dyn Clock>,
    pub clients: auth::Clients,
    /// Set when media lives on local disk and is served by `/media`.
    pub media: Option<LocalBlobStore>,
}

/// The collaborators an [`AppState`] is assembled from.
pub struct Collaborators {
    pub store: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub codec: Arc<dyn ImageCodec>,
    pub clock: Arc<dyn Clock>,
    pub media: Option<LocalBlobStore>,
}

impl AppState {
    pub fn new(collaborators: Collaborators, schedule: Schedule, limits: MediaLimits, clients: auth::Clients) -> Self {
        let Collaborators { store, blobs, codec, clock, media } = collaborators;
        let repo = EntryRepository::new(store);

        Self {
            voting: VotingWorkflow::new(repo.clone(), clock.clone(), schedule.voting),
            uploads: UploadWorkflow::new(repo.clone(), blobs, codec, clock.clone(), schedule.upload, limits),
            repo,
            notifications: NotificationBus::default(),
            schedule,
            clock,
            clients,
            media,
        }
    }
}

/// Every route, with sessions and request tracing.
pub fn app(state: AppState, session_idle: time::Duration) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(session_idle));

    // multipart framing on top of the largest allowed file
    let body_limit = state.uploads.limits().max_upload_bytes.saturating_add(1024 * 1024);

    Router::new()
        .merge(auth::router())
        .merge(pages::router())
        .merge(live::router())
        .layer(DefaultBodyLimit::max(usize::try_from(body_limit).unwrap_or(usize::MAX)))
        .with_state(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
    fn get_obj_field(&self, field: &str) -> AppResult<&Value>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get(field)
            .ok_or(format!("expected {field} in {self}"))?
            .as_str()
            .ok_or(format!("expected {field} in {self} to be string"))?
            .to_owned()
        )
    }

    fn get_obj_field(&self, field: &str) -> AppResult<&Value> {
        self.get(field)
        .ok_or(format!("expected {field} in {self}").into())
    }
}


pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("{:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}", self.0),
        )
            .into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);
apperr_impl!(reqwest::Error);
apperr_impl!(store::StoreError);
apperr_impl!(blob::BlobError);
apperr_impl!(std::io::Error);

impl<E: core::error::Error + Send + Sync + 'static, R: oauth2::ErrorResponse + Send + Sync + 'static> From<oauth2::RequestTokenError<E, R>> for AppError {
    fn from(err: oauth2::RequestTokenError<E, R>) -> Self {
        Self(anyhow::Error::from(err))
    }
}

/// Markdown to HTML, with any raw HTML in the source shown as text.
pub fn render_markdown(source: &str) -> String {
    use pulldown_cmark::{Event, Parser, Options};

    let parser = Parser::new_ext(source, Options::ENABLE_STRIKETHROUGH)
        .map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            _ => event,
        });

    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, parser);
    html_output
}
