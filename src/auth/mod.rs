use axum::{routing::get, Router};
use rand::seq::IndexedRandom;

use crate::AppState;

mod clients;
mod login;
mod lockin;
mod logout;

pub use clients::{ClientProvider, Clients};
pub use login::{login, login_page};
pub use lockin::lockin;
pub use logout::logout;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page))
        .route("/login/{provider}", get(login))
        .route("/lockin/{provider}", get(lockin))
        .route("/logout", get(logout))
}

/// Display name for accounts that came back without one.
pub(crate) fn spooky_alias() -> String {
    let adjectives = [
        "Haunted", "Creepy", "Mysterious", "Howling", "Wicked", "Silent", "Cackling", "Shadowy",
        "Eerie", "Ghastly", "Wild", "Moonlit", "Bold", "Shy", "Cursed", "Spooky", "Grim",
        "Eager", "Fancy", "Rusty", "Golden", "Silver", "Bright", "Dark", "Lucky",
    ];

    let nouns = [
        "Ghost", "Bat", "Witch", "Wolf", "Vampire", "Pumpkin", "Skeleton", "Owl", "Cat",
        "Goblin", "Zombie", "Mummy", "Spider", "Raven", "Phantom", "Ghoul", "Banshee",
        "Warlock", "Scarecrow", "Specter", "Wraith", "Imp", "Gargoyle", "Werewolf",
    ];

    let mut rng = rand::rng();
    format!(
        "{} {}",
        adjectives.choose(&mut rng).copied().unwrap_or("Nameless"),
        nouns.choose(&mut rng).copied().unwrap_or("Ghost"),
    )
}
