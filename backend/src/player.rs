// Player naming and rank rules.

use lazy_static::lazy_static;
use regex::Regex;

/// Characters allowed in a player name, as the body of a regex class.
pub const NAME_CHARSET: &str = r"A-Za-z0-9_=\-\[\]\.\(\)\$\^@";

/// Country assigned to imported bots.
pub const BOT_COUNTRY: &str = "US";
/// Email assigned to imported bots.
pub const BOT_EMAIL: &str = "bot@botNames.ai";

pub const RANK_NAMES: [&str; 22] = [
    "Private",
    "Private First Class",
    "Lance Corporal",
    "Corporal",
    "Sergeant",
    "Staff Sergeant",
    "Gunnery Sergeant",
    "Master Sergeant",
    "First Sergeant",
    "Master Gunnery Sergeant",
    "Sergeant Major",
    "Sergeant Major of the Corps",
    "2nd Lieutenant",
    "1st Lieutenant",
    "Captain",
    "Major",
    "Lieutenant Colonel",
    "Colonel",
    "Brigadier General",
    "Major General",
    "Lieutenant General",
    "General",
];

lazy_static! {
    static ref DISALLOWED_NAME_CHARS: Regex =
        Regex::new(&format!("[^{NAME_CHARSET}]")).unwrap();
}

pub fn rank_name(rank: i64) -> &'static str {
    usize::try_from(rank)
        .ok()
        .and_then(|r| RANK_NAMES.get(r))
        .copied()
        .unwrap_or("Unknown")
}

pub fn is_valid_rank(rank: i64) -> bool {
    (0..RANK_NAMES.len() as i64).contains(&rank)
}

/// Strip every character outside [`NAME_CHARSET`].
pub fn sanitize_name(raw: &str) -> String {
    DISALLOWED_NAME_CHARS.replace_all(raw.trim(), "").into_owned()
}
