//! Config entry unique ID computation
//!
//! Unique ID = slug("{user_id}-{site_code}")
//! Example: "User.One" + "ABC 12" -> "user-one-abc-12"

use std::sync::OnceLock;

use regex::Regex;

fn separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").expect("static slug pattern"))
}

/// Lowercase, collapse every run of non-alphanumerics into a single '-', trim '-'.
/// Letters and digits outside ASCII are kept, so non-Latin IDs stay distinct.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    separator_pattern()
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Unique ID of a config entry; two entries for the same user and site collide
pub fn entry_unique_id(user_id: &str, site_code: &str) -> String {
    slugify(&format!("{}-{}", user_id, site_code))
}
