use axum::{
    debug_handler,
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::Response,
    Form,
};
use serde::Deserialize;
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::{error, warn};

use crate::{
    include_res,
    media::MediaFile,
    model::Entry,
    notify::{NoticeKind, NotificationBus},
    res::escape_html,
    schedule::{human_time, Phase, Window},
    session::{self, SessionState},
    upload::{EntryForm, UploadError, UploadWorkflow},
    view::View,
    AppResult, AppState,
};

use super::{gallery::media_html, signed_out, Outcome};

pub fn render_upload(state: &SessionState, uploads: &UploadWorkflow, window: Window, now: OffsetDateTime) -> String {
    let entry = state.entry.as_ref();
    let field = |pick: fn(&Entry) -> &String| entry.map_or_else(String::new, |e| escape_html(pick(e)));

    let (notice, disabled) = match window.phase(now) {
        Phase::Upcoming => (format!("Uploads open on {}.", human_time(window.opens)), " disabled"),
        Phase::Closed => (format!("Uploads closed on {}.", human_time(window.closes)), " disabled"),
        Phase::Open => (format!("Uploads close on {}.", human_time(window.closes)), ""),
    };

    let uploader_name = match entry {
        Some(e) => escape_html(&e.uploader_name),
        None => escape_html(&state.user.display_name),
    };

    include_res!(str, "/pages/upload.html")
        .replace("{heading}", if entry.is_some() { "Edit Your Masterpiece" } else { "Unveil Your Costume" })
        .replace("{submit_label}", if entry.is_some() { "Update Costume" } else { "Upload Costume" })
        .replace("{media_required}", if entry.is_some() { "" } else { " required" })
        .replace("{delete_hidden}", if entry.is_some() { "" } else { " hidden" })
        .replace("{disabled}", disabled)
        .replace("{max_upload_bytes}", &uploads.limits().max_upload_bytes.to_string())
        .replace("{preview}", &entry.map_or_else(String::new, |e| media_html(e, "preview")))
        .replace("{window_notice}", &escape_html(&notice))
        .replace("{uploader_name}", &uploader_name)
        .replace("{costume_name}", &field(|e| &e.costume_name))
        .replace("{position}", &field(|e| &e.position))
        .replace("{description}", &field(|e| &e.description))
}

/// Tells the user, logs collaborator failures, and builds the reply.
fn report(bus: &NotificationBus, uid: &str, err: UploadError) -> Response {
    let message = err.user_message();
    let status = if err.is_rejection() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        error!("upload workflow failed for {uid}: {err}");
        StatusCode::BAD_GATEWAY
    };

    bus.notify_user(uid, NoticeKind::Error, message.clone());
    Outcome::error(message).respond(status)
}

/// A body that could not be read, usually one over the size limit.
fn unreadable(bus: &NotificationBus, uid: &str, status: StatusCode, max_upload_bytes: u64) -> Response {
    let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
        format!("That file is too large; the limit is {max_upload_bytes} bytes.")
    } else {
        "Failed to upload costume.".to_owned()
    };

    bus.notify_user(uid, NoticeKind::Error, message.clone());
    Outcome::error(message).respond(status)
}

async fn read_form(mut multipart: Multipart) -> Result<(EntryForm, Option<MediaFile>), MultipartError> {
    let mut form = EntryForm::default();
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "media" => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let content_type = field.content_type().unwrap_or("application/octet-stream").to_owned();
                let bytes = field.bytes().await?;
                // an untouched file input still sends an empty part
                if !bytes.is_empty() {
                    file = Some(MediaFile { file_name, content_type, bytes: bytes.to_vec() });
                }
            }
            "uploader_name" | "costume_name" | "position" | "description" => {
                let value = field.text().await?;
                match name.as_str() {
                    "uploader_name" => form.uploader_name = value,
                    "costume_name" => form.costume_name = value,
                    "position" => form.position = value,
                    _ => form.description = value,
                }
            }
            _ => {}
        }
    }

    Ok((form, file))
}

#[debug_handler(state = AppState)]
pub(super) async fn submit(
    State(uploads): State<UploadWorkflow>,
    State(bus): State<NotificationBus>,
    session: Session,
    multipart: Multipart,
) -> AppResult<Response> {
    let Some(user) = session::current_user(&session).await? else {
        return Ok(signed_out());
    };

    // refuse before reading a single byte of the body
    if let Err(reason) = uploads.check_window() {
        return Ok(report(&bus, &user.uid, reason.into()));
    }

    let (form, file) = match read_form(multipart).await {
        Ok(parts) => parts,
        Err(e) => {
            warn!("unreadable upload from {}: {}", user.uid, e.body_text());
            return Ok(unreadable(&bus, &user.uid, e.status(), uploads.limits().max_upload_bytes));
        }
    };
    match uploads.submit_entry(&user, form, file).await {
        Ok(_) => {
            let message = "Costume updated successfully!";
            bus.notify_user(&user.uid, NoticeKind::Success, message);
            Ok(Outcome::success(message, Some(View::Gallery)).respond(StatusCode::OK))
        }
        Err(e) => Ok(report(&bus, &user.uid, e)),
    }
}

#[derive(Deserialize)]
pub(super) struct CheckForm {
    size: u64,
}

#[debug_handler(state = AppState)]
pub(super) async fn check_file(
    State(uploads): State<UploadWorkflow>,
    State(bus): State<NotificationBus>,
    session: Session,
    Form(CheckForm { size }): Form<CheckForm>,
) -> AppResult<Response> {
    let Some(user) = session::current_user(&session).await? else {
        return Ok(signed_out());
    };

    match uploads.check_selection(size) {
        Ok(()) => Ok(Outcome::success("", None).respond(StatusCode::OK)),
        Err(reason) => Ok(report(&bus, &user.uid, reason.into())),
    }
}

#[derive(Deserialize)]
pub(super) struct DeleteForm {
    #[serde(default)]
    confirm: bool,
}

#[debug_handler(state = AppState)]
pub(super) async fn delete(
    State(uploads): State<UploadWorkflow>,
    State(bus): State<NotificationBus>,
    session: Session,
    Form(DeleteForm { confirm }): Form<DeleteForm>,
) -> AppResult<Response> {
    let Some(user) = session::current_user(&session).await? else {
        return Ok(signed_out());
    };

    match uploads.delete_entry(&user, confirm).await {
        Ok(()) => {
            let message = "Costume deleted successfully!";
            bus.notify_user(&user.uid, NoticeKind::Success, message);
            Ok(Outcome::success(message, Some(View::Gallery)).respond(StatusCode::OK))
        }
        Err(e) => Ok(report(&bus, &user.uid, e)),
    }
}
