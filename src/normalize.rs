use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Map typographic punctuation to its ASCII counterpart.
///
/// Zero-width characters map to `None` and are dropped.
fn ascii_punctuation(c: char) -> Option<char> {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => Some('\''),
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => Some('"'),
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' => Some('-'),
        '\u{00A0}' | '\u{2007}' | '\u{202F}' => Some(' '),
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' => None,
        other => Some(other),
    }
}

/// Canonical comparison key for a header or field name.
///
/// Two names that differ only in surrounding or repeated whitespace, letter
/// case, Unicode width/compatibility forms, or smart quotes and dashes map to
/// the same key. The function is total and idempotent:
/// `normalize(&normalize(x)) == normalize(x)`.
///
/// # Examples
/// ```
/// use ims_forms::normalize::normalize;
///
/// assert_eq!(normalize(" Signed  By "), normalize("signed by"));
/// assert_eq!(normalize("Officer\u{2019}s Remarks"), "officer's remarks");
/// ```
pub fn normalize(name: &str) -> String {
    let folded: String = name
        .nfkc()
        .filter_map(ascii_punctuation)
        .collect::<String>()
        .to_lowercase();
    // Lower-casing can leave a string that is no longer in NFKC form.
    let recomposed: String = folded.nfkc().collect();
    WHITESPACE_RUN
        .replace_all(recomposed.trim(), " ")
        .into_owned()
}

/// Like [`normalize`], with absent cells mapping to the empty key.
pub fn normalize_opt(name: Option<&str>) -> String {
    name.map(normalize).unwrap_or_default()
}
