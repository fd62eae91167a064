//! Name normalization for fuzzy address matching.
//!
//! - Lowercase conversion
//! - Administrative-level words ("Tỉnh", "Thành phố", "Phường", "Xã",
//!   "Thị trấn") removed wherever they appear as whole words
//! - Unicode canonical decomposition with combining marks removed
//! - Whitespace collapsed and trimmed

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Lowercased level words, matched before diacritics are stripped so that
/// "Phường" (ward) is not confused with the name "Phương".
const LEVEL_WORDS: &[&[&str]] = &[
    &["thành", "phố"],
    &["thị", "trấn"],
    &["tỉnh"],
    &["phường"],
    &["xã"],
];

/// Normalize a unit or address fragment for comparison.
///
/// ```
/// use dvhc::domain::normalize::normalize_name;
///
/// assert_eq!(normalize_name("Tỉnh Hà Nội"), normalize_name("hà nội"));
/// assert_eq!(normalize_name("Thành phố Hồ Chí Minh"), "ho chi minh");
/// ```
pub fn normalize_name(name: &str) -> String {
    let composed: String = name.nfc().collect::<String>().to_lowercase();
    let tokens: Vec<&str> = composed.split_whitespace().collect();

    let mut kept = Vec::with_capacity(tokens.len());
    let mut position = 0;
    while position < tokens.len() {
        match level_word_at(&tokens[position..]) {
            Some(len) => position += len,
            None => {
                kept.push(tokens[position]);
                position += 1;
            }
        }
    }

    strip_diacritics(&kept.join(" "))
}

/// Remove combining diacritical marks after canonical decomposition.
///
/// `đ`/`Đ` carry no combining mark and are kept as-is.
pub fn strip_diacritics(value: &str) -> String {
    value.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Whether the stored unit name contains the free-text fragment, ignoring case,
/// diacritics and level words.
pub fn name_matches(stored: &str, query: &str) -> bool {
    let stored = normalize_name(stored);
    let query = normalize_name(query);
    if stored.is_empty() || query.is_empty() {
        return false;
    }
    stored.contains(&query)
}

fn level_word_at(tokens: &[&str]) -> Option<usize> {
    LEVEL_WORDS.iter().find_map(|word| {
        let matches = tokens.len() >= word.len()
            && word
                .iter()
                .zip(tokens.iter())
                .all(|(expected, actual)| expected == actual);
        matches.then_some(word.len())
    })
}
