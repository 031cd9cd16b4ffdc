//! Identifier matching for loose location queries.
//!
//! A query matches a candidate when, after lower-case folding, it equals
//! the candidate's name or one of its ISO codes, or is a substring of the
//! name. Codes are compared exactly: two or three letters are too short for
//! substring matching to mean anything.

/// Returns true if `query` identifies the entity `{name, iso2, iso3}`.
///
/// An empty query never matches.
///
/// # Examples
///
/// ```
/// use covid19_api::matcher::matches;
///
/// assert!(matches("KoRe", "South Korea", "KR", "KOR"));
/// assert!(matches("kor", "South Korea", "KR", "KOR"));
/// assert!(!matches("K", "Japan", "JP", "JPN"));
/// assert!(!matches("", "South Korea", "KR", "KOR"));
/// ```
#[must_use]
pub fn matches(query: &str, name: &str, iso2: &str, iso3: &str) -> bool {
    if query.is_empty() {
        return false;
    }

    let query = query.to_lowercase();
    let name = name.to_lowercase();

    query == name
        || query == iso2.to_lowercase()
        || query == iso3.to_lowercase()
        || name.contains(&query)
}

/// Case-insensitive exact comparison, used for region names.
#[must_use]
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}
