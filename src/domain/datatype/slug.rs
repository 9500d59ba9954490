use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

pub const SLUG_MAX_LENGTH: usize = 250;
const SUFFIX_LENGTH: usize = 8;

lazy_static! {
    static ref DISALLOWED: Regex = Regex::new(r"[^\w\s-]").expect("Expect a valid slug regex");
    static ref SEPARATORS: Regex = Regex::new(r"[-\s]+").expect("Expect a valid slug regex");
}

/// URL slug of a display name.
///
/// Letters are decomposed (NFKD) and anything left outside ASCII is dropped,
/// so `"Café"` becomes `"cafe"`. Punctuation other than `_` and `-` is removed,
/// whitespace and dash runs become a single `-`, and leading or trailing
/// `-`/`_` are trimmed.
pub fn slugify(value: &str) -> String {
    let ascii: String = value.nfkd().filter(char::is_ascii).collect();
    let lowered = ascii.to_ascii_lowercase();
    let kept = DISALLOWED.replace_all(&lowered, "");
    let slug = SEPARATORS.replace_all(&kept, "-");
    let slug = slug.trim_matches(|c| c == '-' || c == '_');

    truncate(slug.to_string(), SLUG_MAX_LENGTH)
}

/// Appends `-` and 8 random hex characters, keeping the slug within bounds.
pub fn with_random_suffix(slug: &str) -> String {
    let suffix = &Uuid::new_v4().simple().to_string()[..SUFFIX_LENGTH];
    if slug.is_empty() {
        return suffix.into();
    }
    let base = truncate(slug.into(), SLUG_MAX_LENGTH - SUFFIX_LENGTH - 1);
    format!("{base}-{suffix}")
}

fn truncate(mut slug: String, max: usize) -> String {
    if slug.len() > max {
        slug.truncate(max);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}
