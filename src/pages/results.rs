use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{
    include_res,
    model::Entry,
    res::escape_html,
    results::{Ranked, ResultsView, Standings},
    schedule::{human_time, Countdown},
};

use super::gallery::media_html;

/// Podium slots left to right: runner-up, winner, third.
const PODIUM_ORDER: [usize; 3] = [1, 0, 2];

pub fn render_results(now: OffsetDateTime, reveal: OffsetDateTime, entries: Option<Vec<Entry>>) -> String {
    match ResultsView::at(now, reveal, entries) {
        ResultsView::Countdown(countdown) => countdown_html(countdown, reveal),
        ResultsView::Loading => include_res!(str, "/pages/results/loading.html").to_owned(),
        ResultsView::Standings(standings) if standings.is_empty() => {
            include_res!(str, "/pages/results/empty.html").to_owned()
        }
        ResultsView::Standings(standings) => standings_html(&standings),
    }
}

fn countdown_html(countdown: Countdown, reveal: OffsetDateTime) -> String {
    include_res!(str, "/pages/results/countdown.html")
        .replace("{reveal_at}", &reveal.format(&Rfc3339).unwrap_or_default())
        .replace("{reveal_human}", &human_time(reveal))
        .replace("{days}", &countdown.days.to_string())
        .replace("{hours}", &format!("{:02}", countdown.hours))
        .replace("{minutes}", &format!("{:02}", countdown.minutes))
        .replace("{seconds}", &format!("{:02}", countdown.seconds))
}

fn votes_label(count: i64) -> String {
    if count == 1 { "1 vote".to_owned() } else { format!("{count} votes") }
}

fn podium_place(ranked: &Ranked) -> String {
    let entry = &ranked.entry;
    include_res!(str, "/pages/results/podium.html")
        .replace("{rank}", &ranked.rank.to_string())
        .replace("{media}", &media_html(entry, "podium-media"))
        .replace("{votes}", &votes_label(entry.vote_count))
        .replace("{percent}", &format!("{:.1}", ranked.percent))
        .replace("{costume_name}", &escape_html(&entry.costume_name))
        .replace("{uploader_name}", &escape_html(&entry.uploader_name))
}

fn leaderboard_row(ranked: &Ranked) -> String {
    let entry = &ranked.entry;
    include_res!(str, "/pages/results/row.html")
        .replace("{rank}", &ranked.rank.to_string())
        .replace("{votes}", &votes_label(entry.vote_count))
        .replace("{percent}", &format!("{:.1}", ranked.percent))
        .replace("{costume_name}", &escape_html(&entry.costume_name))
        .replace("{uploader_name}", &escape_html(&entry.uploader_name))
}

fn standings_html(standings: &Standings) -> String {
    let podium: String = PODIUM_ORDER
        .iter()
        .filter_map(|&i| standings.podium.get(i))
        .map(podium_place)
        .collect();
    let rows: String = standings.rest.iter().map(leaderboard_row).collect();

    include_res!(str, "/pages/results/results.html")
        .replace("{total_votes}", &votes_label(standings.total_votes))
        .replace("{leaderboard_hidden}", if standings.rest.is_empty() { " hidden" } else { "" })
        .replace("{podium}", &podium)
        .replace("{rows}", &rows)
}

#[cfg(test)]
mod tests {
    use time::{macros::datetime, Duration};

    use super::*;
    use crate::model::MediaKind;

    const REVEAL: OffsetDateTime = datetime!(2025-11-01 00:00 -04:00);

    fn entry(id: &str, votes: i64) -> Entry {
        let at = datetime!(2025-10-30 12:00 UTC);
        Entry {
            id: id.into(),
            owner_id: id.into(),
            owner_display_name: id.into(),
            owner_photo_url: None,
            uploader_name: format!("{id} uploader"),
            costume_name: format!("{id}-costume"),
            position: "Back".into(),
            description: String::new(),
            media_url: format!("/media/{id}.jpg"),
            media_kind: MediaKind::Image,
            uploaded_at: at,
            updated_at: at,
            vote_count: votes,
        }
    }

    #[test]
    fn before_reveal_only_the_countdown_shows() {
        let now = REVEAL - Duration::seconds(90_061);
        let html = render_results(now, REVEAL, Some(vec![entry("a", 5)]));

        assert!(html.contains(r#"data-reveal="2025-11-01T00:00:00-04:00""#));
        assert!(html.contains(r#"data-unit="days">1<"#));
        assert!(html.contains(r#"data-unit="hours">01<"#));
        assert!(!html.contains("a-costume"));
    }

    #[test]
    fn loading_and_empty_states() {
        assert!(render_results(REVEAL, REVEAL, None).contains("Calculating Winners..."));
        assert!(render_results(REVEAL, REVEAL, Some(vec![])).contains("The Results are Ghostly Quiet"));
    }

    #[test]
    fn podium_is_second_first_third() {
        let entries = vec![entry("a", 1), entry("b", 5), entry("c", 3), entry("d", 1)];
        let html = render_results(REVEAL, REVEAL, Some(entries));

        let second = html.find("c-costume").unwrap();
        let first = html.find("b-costume").unwrap();
        let third = html.find("a-costume").unwrap();
        let fourth = html.find("d-costume").unwrap();
        assert!(second < first && first < third && third < fourth);

        assert!(html.contains("50.0%"));
        assert!(html.contains("10 votes"));
        assert!(html.contains("1 vote<"));
    }

    #[test]
    fn leaderboard_hidden_with_three_or_fewer() {
        let html = render_results(REVEAL, REVEAL, Some(vec![entry("a", 0)]));
        assert!(html.contains("0.0%"));
        assert!(html.contains(r#"class="leaderboard" hidden"#));
    }
}
