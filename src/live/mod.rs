//! `/live`: one websocket per open page, pushing the gallery, the viewer's
//! own vote and their notices as they change. Once results are revealed the
//! standings are pushed too.

use std::time::{Duration, Instant};

use axum::{
    debug_handler,
    extract::{ws::{Message, WebSocket}, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tower_sessions::Session;
use tracing::{debug, error, info, warn};

use crate::{
    model::{Entry, User},
    notify::{Notice, NoticeKind, Tray},
    optimistic::Optimistic,
    pages::{render_gallery, render_results, signed_out, GalleryState},
    repo::EntryOrder,
    schedule::Phase,
    session::{self, Flash},
    voting::{VoteError, VoteReceipt},
    AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/live", get(live))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    Vote { target: String },
    Dismiss { id: u64 },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    Gallery { html: String },
    Results { html: String },
    MyVote { target: Option<String>, state: &'static str },
    Toast { notice: Notice },
    Dismiss { id: u64 },
}

/// Per-connection state, kept free of the socket so it can be driven directly.
pub struct LiveView {
    viewer: String,
    entries: Vec<Entry>,
    my_vote: Optimistic<Option<String>>,
    tray: Tray,
    voting: Phase,
    reveal: Option<OffsetDateTime>,
    revealed: bool,
}

impl LiveView {
    pub fn new(viewer: &str, voting: Phase) -> Self {
        Self {
            viewer: viewer.to_owned(),
            entries: Vec::new(),
            my_vote: Optimistic::new(None),
            tray: Tray::default(),
            voting,
            reveal: None,
            revealed: false,
        }
    }

    /// Also push standings once `reveal` has passed.
    pub fn with_reveal(mut self, reveal: OffsetDateTime, revealed: bool) -> Self {
        self.reveal = Some(reveal);
        self.revealed = revealed;
        self
    }

    /// Current standings, or `None` before the reveal.
    pub fn results(&self) -> Option<ServerMsg> {
        let reveal = self.reveal.filter(|_| self.revealed)?;
        Some(ServerMsg::Results {
            html: render_results(reveal, reveal, Some(self.entries.clone())),
        })
    }

    pub fn gallery(&self) -> ServerMsg {
        ServerMsg::Gallery {
            html: render_gallery(&GalleryState {
                entries: &self.entries,
                viewer: &self.viewer,
                voted_for: self.my_vote.current().as_deref(),
                pending: self.my_vote.is_pending(),
                voting: self.voting,
            }),
        }
    }

    pub fn my_vote(&self) -> ServerMsg {
        ServerMsg::MyVote {
            target: self.my_vote.current().clone(),
            state: self.my_vote.label(),
        }
    }

    pub fn entries_changed(&mut self, entries: Vec<Entry>) -> Vec<ServerMsg> {
        self.entries = entries;
        let mut out = vec![self.gallery()];
        out.extend(self.results());
        out
    }

    pub fn vote_changed(&mut self, target: Option<String>) -> Vec<ServerMsg> {
        self.my_vote.sync(target);
        vec![self.my_vote(), self.gallery()]
    }

    /// Shows the vote straight away. Empty if a vote is already in flight.
    pub fn begin_vote(&mut self, target: &str) -> Vec<ServerMsg> {
        if !self.my_vote.begin(Some(target.to_owned())) {
            return Vec::new();
        }
        vec![self.my_vote(), self.gallery()]
    }

    pub fn finish_vote(&mut self, ok: bool) -> Vec<ServerMsg> {
        if ok {
            self.my_vote.commit();
        } else {
            self.my_vote.roll_back();
        }
        vec![self.my_vote(), self.gallery()]
    }

    pub fn notice(&mut self, notice: Notice, now: Instant) -> Vec<ServerMsg> {
        self.tray.push(notice.clone(), now);
        vec![ServerMsg::Toast { notice }]
    }

    pub fn dismiss(&mut self, id: u64) -> Vec<ServerMsg> {
        if self.tray.dismiss(id) {
            vec![ServerMsg::Dismiss { id }]
        } else {
            Vec::new()
        }
    }

    /// Expired notices, plus a fresh gallery if the voting window moved on
    /// and the standings at the moment of reveal.
    pub fn tick(&mut self, now: Instant, voting: Phase, revealed: bool) -> Vec<ServerMsg> {
        let mut out: Vec<ServerMsg> = self.tray.expire(now).into_iter().map(|id| ServerMsg::Dismiss { id }).collect();
        if voting != self.voting {
            self.voting = voting;
            out.push(self.gallery());
        }
        if revealed && !self.revealed {
            self.revealed = true;
            out.extend(self.results());
        }
        out
    }
}

#[debug_handler(state = AppState)]
async fn live(
    State(state): State<AppState>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let Some(user) = session::current_user(&session).await? else {
        return Ok(signed_out());
    };
    let flash = session::take_flash(&session).await?;

    Ok(ws.on_upgrade(async move |socket| run(state, user, flash, socket).await).into_response())
}

async fn run(state: AppState, user: User, flash: Option<Flash>, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMsg>();

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let Ok(json) = serde_json::to_string(&msg) else {
                continue;
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });
    let send_all = |msgs: Vec<ServerMsg>| {
        for msg in msgs {
            let _ = out_tx.send(msg);
        }
    };

    info!("{} joined the live view", user.uid);
    let mut listener = state.notifications.subscribe(Some(&user.uid));
    if let Some(flash) = flash {
        state.notifications.notify_user(&user.uid, flash.kind, flash.message);
    }
    let mut entries = state.repo.watch_entries(EntryOrder::NewestFirst);
    let mut vote = state.repo.watch_vote(&user.uid);
    let (cast_tx, mut cast_rx) = mpsc::unbounded_channel::<Result<VoteReceipt, VoteError>>();

    let now = state.clock.now();
    let mut view = LiveView::new(&user.uid, state.schedule.voting.phase(now))
        .with_reveal(state.schedule.reveal, state.schedule.is_revealed(now));
    let mut tick = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let msg = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                let Ok(msg) = serde_json::from_str::<ClientMsg>(msg.as_str()) else {
                    debug!("ignoring malformed message from {}", user.uid);
                    continue;
                };

                match msg {
                    ClientMsg::Vote { target } => {
                        let shown = view.begin_vote(&target);
                        if shown.is_empty() {
                            continue;
                        }
                        send_all(shown);

                        let voting = state.voting.clone();
                        let voter = user.uid.clone();
                        let cast_tx = cast_tx.clone();
                        tokio::spawn(async move {
                            let _ = cast_tx.send(voting.cast_vote(&voter, &target).await);
                        });
                    }
                    ClientMsg::Dismiss { id } => send_all(view.dismiss(id)),
                }
            }
            Some(outcome) = cast_rx.recv() => {
                match &outcome {
                    Ok(_) => {
                        state.notifications.notify_user(&user.uid, NoticeKind::Success, "Your vote has been cast! 🔥");
                    }
                    Err(e) => {
                        if let VoteError::Store(cause) = e {
                            error!("vote by {} failed: {cause}", user.uid);
                        }
                        state.notifications.notify_user(&user.uid, NoticeKind::Error, e.user_message());
                    }
                }
                send_all(view.finish_vote(outcome.is_ok()));
            }
            Some(result) = entries.next() => match result {
                Ok(list) => send_all(view.entries_changed(list)),
                Err(e) => {
                    warn!("gallery refresh failed: {e}");
                    state.notifications.notify_user(&user.uid, NoticeKind::Error, "Failed to load costumes.");
                }
            },
            Some(result) = vote.next() => match result {
                Ok(record) => send_all(view.vote_changed(record.map(|v| v.target_owner_id))),
                Err(e) => warn!("vote refresh failed for {}: {e}", user.uid),
            },
            Some(notice) = listener.recv() => send_all(view.notice(notice, Instant::now())),
            _ = tick.tick() => {
                let now = state.clock.now();
                send_all(view.tick(Instant::now(), state.schedule.voting.phase(now), state.schedule.is_revealed(now)));
            }
            _ = &mut send_task => break,
        }
    }

    entries.close();
    vote.close();
    drop(listener);
    send_task.abort();
    info!("{} left the live view", user.uid);
}
