use crate::{
    include_res,
    model::{Entry, MediaKind},
    render_markdown,
    res::escape_html,
    schedule::Phase,
};

/// Everything a gallery render depends on.
pub struct GalleryState<'a> {
    pub entries: &'a [Entry],
    pub viewer: &'a str,
    pub voted_for: Option<&'a str>,
    /// The viewer's vote is still being written.
    pub pending: bool,
    pub voting: Phase,
}

pub fn render_gallery(state: &GalleryState) -> String {
    if state.entries.is_empty() {
        return include_res!(str, "/pages/gallery/empty.html").to_owned();
    }

    let cards: String = state.entries.iter().map(|entry| card(state, entry)).collect();
    include_res!(str, "/pages/gallery/gallery.html").replace("{cards}", &cards)
}

pub(crate) fn media_html(entry: &Entry, class: &str) -> String {
    let url = escape_html(&entry.media_url);
    let alt = escape_html(&entry.costume_name);
    match entry.media_kind {
        MediaKind::Image => format!(r#"<img class="{class}" src="{url}" alt="{alt}" loading="lazy">"#),
        MediaKind::Video => format!(r#"<video class="{class}" src="{url}" controls muted playsinline preload="metadata"></video>"#),
    }
}

fn vote_button(state: &GalleryState, entry: &Entry) -> String {
    let owner = escape_html(&entry.owner_id);
    let voted = state.voted_for == Some(entry.owner_id.as_str());

    let (label, class, disabled) = if entry.owner_id == state.viewer {
        ("Your costume", "vote own", true)
    } else if state.voting == Phase::Upcoming {
        ("Voting not open", "vote", true)
    } else if state.voting == Phase::Closed {
        (if voted { "Your pick" } else { "Voting closed" }, if voted { "vote voted" } else { "vote" }, true)
    } else if voted && state.pending {
        ("Casting…", "vote voted pending", true)
    } else if voted {
        ("Voted!", "vote voted", false)
    } else {
        ("Vote", "vote", state.pending)
    };

    format!(
        r#"<button class="{class}" data-vote="{owner}"{}>{label}</button>"#,
        if disabled { " disabled" } else { "" }
    )
}

fn card(state: &GalleryState, entry: &Entry) -> String {
    let avatar = entry.owner_photo_url.as_deref().map_or_else(String::new, |url| {
        format!(r#"<img class="avatar" src="{}" alt="">"#, escape_html(url))
    });

    include_res!(str, "/pages/gallery/card.html")
        .replace("{vote_count}", &entry.vote_count.to_string())
        .replace("{vote_button}", &vote_button(state, entry))
        .replace("{media}", &media_html(entry, "card-media"))
        .replace("{avatar}", &avatar)
        .replace("{owner_name}", &escape_html(&entry.owner_display_name))
        .replace("{costume_name}", &escape_html(&entry.costume_name))
        .replace("{position}", &escape_html(&entry.position))
        .replace("{uploader_name}", &escape_html(&entry.uploader_name))
        // markdown output is not brace-escaped, so it goes in last
        .replace("{description}", &render_markdown(&entry.description))
}
