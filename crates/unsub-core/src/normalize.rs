//! Merchant name normalization
//!
//! Raw beneficiary strings from bank statements are noisy: the same service
//! shows up as "NETFLIX.COM", "Netflix International B.V." and
//! "PLATA NETFLIX AMSTERDAM". Normalization maps all of these to one
//! canonical display name so the pattern detector can cluster them.
//!
//! Resolution order:
//! 1. known-service vocabulary (substring match, canonical name + category)
//! 2. exclusion vocabulary (telecom, utilities, bank fees, transfers)
//! 3. generic cleanup: strip corporate and location suffixes, title-case

use std::borrow::Cow;

/// A recognized subscription service: match tokens, canonical name, category
struct KnownService {
    tokens: &'static [&'static str],
    canonical: &'static str,
    category: &'static str,
}

/// Services matched by substring against the uppercased raw merchant.
///
/// First match wins; more specific tokens go before generic ones.
const KNOWN_SERVICES: &[KnownService] = &[
    KnownService {
        tokens: &["NETFLIX"],
        canonical: "Netflix",
        category: "streaming",
    },
    KnownService {
        tokens: &["SPOTIFY"],
        canonical: "Spotify",
        category: "music",
    },
    KnownService {
        tokens: &["YOUTUBE", "YT PREMIUM"],
        canonical: "YouTube Premium",
        category: "streaming",
    },
    KnownService {
        tokens: &["HBO", "MAX.COM"],
        canonical: "HBO Max",
        category: "streaming",
    },
    KnownService {
        tokens: &["DISNEY"],
        canonical: "Disney+",
        category: "streaming",
    },
    KnownService {
        tokens: &["AMAZON PRIME", "PRIME VIDEO"],
        canonical: "Amazon Prime",
        category: "streaming",
    },
    KnownService {
        tokens: &["APPLE.COM/BILL", "APPLE SERVICES", "ITUNES"],
        canonical: "Apple Services",
        category: "software",
    },
    KnownService {
        tokens: &["ICLOUD"],
        canonical: "iCloud",
        category: "software",
    },
    KnownService {
        tokens: &["GOOGLE ONE"],
        canonical: "Google One",
        category: "software",
    },
    KnownService {
        tokens: &["GOOGLE STORAGE", "GOOGLE GSUITE", "GOOGLE WORKSPACE"],
        canonical: "Google Workspace",
        category: "software",
    },
    KnownService {
        tokens: &["DROPBOX"],
        canonical: "Dropbox",
        category: "software",
    },
    KnownService {
        tokens: &["MICROSOFT", "MSFT", "ONEDRIVE", "OFFICE 365"],
        canonical: "Microsoft 365",
        category: "software",
    },
    KnownService {
        tokens: &["ADOBE"],
        canonical: "Adobe",
        category: "software",
    },
    KnownService {
        tokens: &["GITHUB"],
        canonical: "GitHub",
        category: "software",
    },
    KnownService {
        tokens: &["JETBRAINS"],
        canonical: "JetBrains",
        category: "software",
    },
    KnownService {
        tokens: &["NOTION"],
        canonical: "Notion",
        category: "software",
    },
    KnownService {
        tokens: &["FIGMA"],
        canonical: "Figma",
        category: "software",
    },
    KnownService {
        tokens: &["CANVA"],
        canonical: "Canva",
        category: "software",
    },
    KnownService {
        tokens: &["OPENAI", "CHATGPT"],
        canonical: "OpenAI",
        category: "ai",
    },
    KnownService {
        tokens: &["ANTHROPIC", "CLAUDE.AI"],
        canonical: "Anthropic",
        category: "ai",
    },
    KnownService {
        tokens: &["MIDJOURNEY"],
        canonical: "Midjourney",
        category: "ai",
    },
    KnownService {
        tokens: &["AUDIBLE"],
        canonical: "Audible",
        category: "media",
    },
    KnownService {
        tokens: &["KINDLE"],
        canonical: "Kindle Unlimited",
        category: "media",
    },
    KnownService {
        tokens: &["DUOLINGO"],
        canonical: "Duolingo",
        category: "education",
    },
    KnownService {
        tokens: &["COURSERA"],
        canonical: "Coursera",
        category: "education",
    },
    KnownService {
        tokens: &["PATREON"],
        canonical: "Patreon",
        category: "media",
    },
    KnownService {
        tokens: &["TWITCH"],
        canonical: "Twitch",
        category: "streaming",
    },
    KnownService {
        tokens: &["PLAYSTATION", "PS PLUS"],
        canonical: "PlayStation Plus",
        category: "gaming",
    },
    KnownService {
        tokens: &["XBOX", "GAME PASS"],
        canonical: "Xbox Game Pass",
        category: "gaming",
    },
    KnownService {
        tokens: &["STEAM"],
        canonical: "Steam",
        category: "gaming",
    },
    KnownService {
        tokens: &["NORDVPN"],
        canonical: "NordVPN",
        category: "software",
    },
    KnownService {
        tokens: &["EXPRESSVPN"],
        canonical: "ExpressVPN",
        category: "software",
    },
];

/// Merchants that are recurring but are not subscriptions a user could
/// cancel through this tool: utilities, telecom, bank fees, transfers.
const EXCLUDED_MERCHANTS: &[&str] = &[
    "ORANGE",
    "VODAFONE",
    "TELEKOM",
    "DIGI",
    "RCS-RDS",
    "RCS & RDS",
    "ENEL",
    "ENGIE",
    "E.ON",
    "ELECTRICA",
    "HIDROELECTRICA",
    "APA NOVA",
    "COMISION",
    "DOBANDA",
    "TAXA",
    "RATA CREDIT",
    "TRANSFER",
    "RETRAGERE",
    "DEPUNERE",
    "SCHIMB VALUTAR",
    "ATM",
];

/// Corporate and location suffix tokens stripped during generic cleanup
const SUFFIX_TOKENS: &[&str] = &[
    "SRL", "S.R.L", "S.R.L.", "SA", "S.A", "S.A.", "PFA", "LLC", "LTD", "LTD.", "INC", "INC.",
    "GMBH", "BV", "B.V", "B.V.", "AB", "AG", "CORP", "CO", "PLC", "SE", "SL", "OY", "ROMANIA",
    "RO", "BUCURESTI", "BUCHAREST", "CLUJ", "TIMISOARA", "IASI", "LONDON", "DUBLIN", "AMSTERDAM",
    "LUXEMBOURG", "STOCKHOLM", "IRELAND", "NETHERLANDS", "IRL", "NL", "GB", "US", "EU",
];

/// The normalizer's answer for one raw merchant string
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMerchant {
    /// Canonical display name
    pub name: String,
    /// Category when the merchant is in the known-service vocabulary
    pub category: Option<String>,
    /// True when the merchant is recurring-but-not-cancellable (utilities,
    /// bank fees, transfers) and must not become a subscription candidate
    pub excluded: bool,
}

/// Look up a raw merchant in the known-service vocabulary.
pub fn known_service(raw: &str) -> Option<(&'static str, &'static str)> {
    let upper = raw.to_uppercase();
    KNOWN_SERVICES
        .iter()
        .find(|s| s.tokens.iter().any(|t| upper.contains(t)))
        .map(|s| (s.canonical, s.category))
}

/// Whether the raw merchant matches the exclusion vocabulary.
pub fn is_excluded(raw: &str) -> bool {
    let upper = raw.to_uppercase();
    EXCLUDED_MERCHANTS.iter().any(|t| contains_word(&upper, t))
}

/// Substring match restricted to whole words: "DIGI" hits "DIGI ROMANIA"
/// but not "DIGITALOCEAN", "ATM" hits "RETRAGERE ATM" but not
/// "ATMOSPHERE FITNESS".
fn contains_word(haystack: &str, needle: &str) -> bool {
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let begin = from + pos;
        let end = begin + needle.len();
        let bounded_left = haystack[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let bounded_right = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if bounded_left && bounded_right {
            return true;
        }
        from = end;
    }
    false
}

/// Normalize a raw beneficiary string into a canonical merchant.
///
/// Never returns an empty name: when cleanup strips everything, the
/// title-cased raw string is used as-is.
pub fn normalize_merchant(raw: &str) -> NormalizedMerchant {
    if let Some((canonical, category)) = known_service(raw) {
        return NormalizedMerchant {
            name: canonical.to_string(),
            category: Some(category.to_string()),
            excluded: false,
        };
    }

    let excluded = is_excluded(raw);

    let upper = raw.to_uppercase();
    let kept: Vec<&str> = upper
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| matches!(c, '*' | ',' | ';' | '-')))
        .filter(|w| !w.is_empty())
        .filter(|w| !SUFFIX_TOKENS.contains(w))
        .collect();

    let cleaned = if kept.is_empty() {
        Cow::Borrowed(raw.trim())
    } else {
        Cow::Owned(kept.join(" "))
    };

    NormalizedMerchant {
        name: title_case(&cleaned),
        category: None,
        excluded,
    }
}

/// Title-case each word, preserving words that already mix case or contain
/// dots (domains like NETFLIX.COM stay as Netflix.com rather than splitting).
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decide whether two already-normalized merchant names refer to the same
/// real-world merchant.
///
/// Identical, substring containment (both at least 4 chars) or Levenshtein
/// similarity at or above 0.85 all count as a match.
pub fn same_merchant(a: &str, b: &str) -> bool {
    let a_up = a.to_uppercase();
    let b_up = b.to_uppercase();

    if a_up == b_up {
        return true;
    }
    if a_up.len() >= 4 && b_up.len() >= 4 && (a_up.contains(&b_up) || b_up.contains(&a_up)) {
        return true;
    }
    similarity(&a_up, &b_up) >= 0.85
}

/// Levenshtein similarity in 0.0..=1.0.
fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(a, b) as f64 / max_len as f64)
}

/// Classic two-row DP edit distance over chars.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
