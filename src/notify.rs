//! Transient status messages ("toasts").
//!
//! A [`NotificationBus`] is an explicit object held in the app state. Views
//! subscribe when they mount and drop their [`Listener`] when they unmount;
//! each mounted view keeps the notices it is showing in a [`Tray`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};

/// How long a notice stays up unless dismissed.
pub const DISMISS_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
    Info,
    Warning,
}

impl NoticeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NoticeKind::Success => "success",
            NoticeKind::Error => "error",
            NoticeKind::Info => "info",
            NoticeKind::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
    /// `None` reaches every listener.
    #[serde(skip)]
    pub audience: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<Notice>,
    next_id: Arc<AtomicU64>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity).0,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Fan a notice out to every listener.
    pub fn notify(&self, kind: NoticeKind, message: impl Into<String>) -> Notice {
        self.publish(None, kind, message.into())
    }

    /// Deliver only to listeners mounted for `user_id`.
    pub fn notify_user(&self, user_id: &str, kind: NoticeKind, message: impl Into<String>) -> Notice {
        self.publish(Some(user_id.to_owned()), kind, message.into())
    }

    pub fn subscribe(&self, user_id: Option<&str>) -> Listener {
        Listener {
            rx: self.tx.subscribe(),
            user_id: user_id.map(str::to_owned),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn publish(&self, audience: Option<String>, kind: NoticeKind, message: String) -> Notice {
        let notice = Notice {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            message,
            audience,
        };
        let _ = self.tx.send(notice.clone());
        notice
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(64)
    }
}

pub struct Listener {
    rx: broadcast::Receiver<Notice>,
    user_id: Option<String>,
}

impl Listener {
    /// Next notice addressed to this listener, in arrival order. `None` once
    /// the bus is gone.
    pub async fn recv(&mut self) -> Option<Notice> {
        loop {
            match self.rx.recv().await {
                Ok(notice) if self.accepts(&notice) => return Some(notice),
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn accepts(&self, notice: &Notice) -> bool {
        match &notice.audience {
            None => true,
            Some(audience) => self.user_id.as_deref() == Some(audience.as_str()),
        }
    }
}

/// Notices currently on screen, newest first.
#[derive(Debug)]
pub struct Tray {
    shown: Vec<(Notice, Instant)>,
    ttl: Duration,
}

impl Tray {
    pub fn new(ttl: Duration) -> Self {
        Self { shown: Vec::new(), ttl }
    }

    pub fn push(&mut self, notice: Notice, now: Instant) {
        self.shown.insert(0, (notice, now));
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.shown.len();
        self.shown.retain(|(n, _)| n.id != id);
        self.shown.len() != before
    }

    /// Drops every notice older than the tray's ttl and returns their ids.
    pub fn expire(&mut self, now: Instant) -> Vec<u64> {
        let ttl = self.ttl;
        let mut expired = Vec::new();
        self.shown.retain(|(n, shown_at)| {
            let keep = now.saturating_duration_since(*shown_at) < ttl;
            if !keep {
                expired.push(n.id);
            }
            keep
        });
        expired
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.shown.iter().map(|(n, _)| n)
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}

impl Default for Tray {
    fn default() -> Self {
        Self::new(DISMISS_AFTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notices_fan_out_in_arrival_order() {
        let bus = NotificationBus::default();
        let mut a = bus.subscribe(Some("a"));
        let mut b = bus.subscribe(Some("b"));

        bus.notify(NoticeKind::Info, "voting opens soon");
        bus.notify_user("a", NoticeKind::Success, "Your vote has been cast!");
        bus.notify(NoticeKind::Warning, "results at midnight");

        assert_eq!(a.recv().await.unwrap().message, "voting opens soon");
        assert_eq!(a.recv().await.unwrap().message, "Your vote has been cast!");
        assert_eq!(a.recv().await.unwrap().message, "results at midnight");

        assert_eq!(b.recv().await.unwrap().message, "voting opens soon");
        assert_eq!(b.recv().await.unwrap().message, "results at midnight");
    }

    #[test]
    fn dropping_a_listener_unsubscribes() {
        let bus = NotificationBus::default();
        let listener = bus.subscribe(None);
        assert_eq!(bus.listener_count(), 1);
        drop(listener);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn tray_expires_and_dismisses() {
        let bus = NotificationBus::default();
        let start = Instant::now();
        let mut tray = Tray::default();

        let first = bus.notify(NoticeKind::Error, "first");
        let second = bus.notify(NoticeKind::Success, "second");
        let third = bus.notify(NoticeKind::Info, "third");
        tray.push(first.clone(), start);
        tray.push(second.clone(), start + Duration::from_secs(3));
        tray.push(third.clone(), start + Duration::from_secs(4));

        let shown: Vec<_> = tray.notices().map(|n| n.id).collect();
        assert_eq!(shown, [third.id, second.id, first.id]);

        assert!(tray.dismiss(third.id));
        assert!(!tray.dismiss(third.id));

        assert_eq!(tray.expire(start + Duration::from_secs(5)), vec![first.id]);
        assert!(tray.expire(start + Duration::from_secs(7)).is_empty());
        assert_eq!(tray.expire(start + Duration::from_secs(8)), vec![second.id]);
        assert!(tray.is_empty());
    }
}
