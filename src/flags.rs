// src/flags.rs
//! Language/region code to flag glyph mapping used when rendering rows.

/// White flag shown for empty or unusable codes.
pub const NO_FLAG: &str = "\u{1F3F3}\u{FE0F}";

// Directory language codes that don't name their own country.
const KNOWN_CODES: &[(&str, &str)] = &[
    ("en", "GB"),
    ("us", "US"),
    ("de", "DE"),
    ("ru", "RU"),
    ("pl", "PL"),
    ("pt", "PT"),
    ("br", "BR"),
    ("es", "ES"),
    ("it", "IT"),
    ("fr", "FR"),
    ("nl", "NL"),
    ("id", "ID"),
    ("ro", "RO"),
    ("hu", "HU"),
    ("lt", "LT"),
    ("cz", "CZ"),
    ("ar", "SA"),
    ("ua", "UA"),
    ("th", "TH"),
    ("bg", "BG"),
    ("tr", "TR"),
    ("vi", "VN"),
    ("hr", "HR"),
    ("jp", "JP"),
    ("cn", "CN"),
    ("ca", "CA"),
    ("sv", "SE"),
    ("el", "GR"),
    ("he", "IL"),
    ("ko", "KR"),
    ("sr", "RS"),
];

pub fn region_flag(code: &str) -> String {
    if code.is_empty() {
        return NO_FLAG.to_string();
    }

    let prefix: String = code.chars().take(2).collect::<String>().to_ascii_lowercase();
    if let Some((_, country)) = KNOWN_CODES.iter().find(|(lang, _)| *lang == prefix) {
        return regional_indicators(country);
    }

    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        return regional_indicators(&code.to_ascii_uppercase());
    }

    NO_FLAG.to_string()
}

fn regional_indicators(country: &str) -> String {
    country
        .bytes()
        .filter_map(|b| char::from_u32(0x1F1E6 + u32::from(b - b'A')))
        .collect()
}
