//! Ranking derived from the loaded entry list, hidden until the reveal.

use std::cmp::Reverse;

use time::OffsetDateTime;

use crate::{model::Entry, schedule::Countdown};

/// Number of places shown on the podium.
pub const PODIUM_PLACES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub rank: usize,
    pub entry: Entry,
    /// Share of all votes, 0–100.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Standings {
    pub total_votes: i64,
    pub podium: Vec<Ranked>,
    pub rest: Vec<Ranked>,
}

impl Standings {
    /// Sorts by vote count, most first; equal counts keep the earlier upload ahead.
    pub fn rank(mut entries: Vec<Entry>) -> Self {
        entries.sort_by_key(|e| (Reverse(e.vote_count), e.uploaded_at, e.id.clone()));
        let total_votes = entries.iter().map(|e| e.vote_count).sum();

        let mut ranked: Vec<Ranked> = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| Ranked {
                rank: i + 1,
                percent: share_percent(entry.vote_count, total_votes),
                entry,
            })
            .collect();

        let rest = ranked.split_off(ranked.len().min(PODIUM_PLACES));
        Self {
            total_votes,
            podium: ranked,
            rest,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.podium.is_empty()
    }
}

/// `count / total` as a percentage; zero when nobody has voted.
pub fn share_percent(count: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultsView {
    /// Before the reveal nothing but the countdown is shown.
    Countdown(Countdown),
    /// Revealed, but the entry list has not arrived yet.
    Loading,
    Standings(Standings),
}

impl ResultsView {
    pub fn at(now: OffsetDateTime, reveal: OffsetDateTime, entries: Option<Vec<Entry>>) -> Self {
        if let Some(countdown) = Countdown::until(now, reveal) {
            return ResultsView::Countdown(countdown);
        }
        match entries {
            Some(entries) => ResultsView::Standings(Standings::rank(entries)),
            None => ResultsView::Loading,
        }
    }
}
