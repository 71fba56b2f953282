//! Statement text parsing
//!
//! Bank statement layouts vary wildly: single-line records, multi-line
//! blocks, tab-separated tables, mixed languages and punctuation. Instead of
//! one configurable parser, several independent strategies each scan the
//! same input and their results are unioned, then deduplicated by the
//! (date, amount, beneficiary) triple. Supporting a new layout means adding
//! one more strategy function, never touching the existing ones.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::models::{Transaction, TransactionKind};

/// Reporting currency all amounts are normalized into
pub const REPORTING_CURRENCY: &str = "RON";

/// Static approximations, not live rates (deployment-time constants)
const EUR_TO_RON: f64 = 5.0;
const USD_TO_RON: f64 = 4.65;

/// Character radius around a date occurrence in the window strategy
const WINDOW_RADIUS: usize = 120;

/// Month names mapped to month numbers, Romanian and English,
/// full names and common abbreviations.
const MONTHS: &[(&str, u32)] = &[
    ("ianuarie", 1),
    ("ian", 1),
    ("january", 1),
    ("jan", 1),
    ("februarie", 2),
    ("february", 2),
    ("feb", 2),
    ("martie", 3),
    ("march", 3),
    ("mar", 3),
    ("aprilie", 4),
    ("april", 4),
    ("apr", 4),
    ("mai", 5),
    ("may", 5),
    ("iunie", 6),
    ("iun", 6),
    ("june", 6),
    ("jun", 6),
    ("iulie", 7),
    ("iul", 7),
    ("july", 7),
    ("jul", 7),
    ("august", 8),
    ("aug", 8),
    ("septembrie", 9),
    ("september", 9),
    ("sept", 9),
    ("sep", 9),
    ("octombrie", 10),
    ("october", 10),
    ("oct", 10),
    ("noiembrie", 11),
    ("november", 11),
    ("noi", 11),
    ("nov", 11),
    ("decembrie", 12),
    ("december", 12),
    ("dec", 12),
];

/// Generic banking vocabulary that must never be mistaken for a merchant
const BENEFICIARY_STOPLIST: &[&str] = &[
    "PLATA", "PLATI", "TRANZACTIE", "TRANSFER", "COMISION", "CARD", "POS", "DATA", "VALOARE",
    "SUMA", "CONT", "IBAN", "BANCA", "REF", "REFERINTA", "DETALII", "EXTRAS", "SOLD", "TOTAL",
    "PAYMENT", "PURCHASE", "TRANSACTION", "DEBIT", "CREDIT", "AMOUNT", "DATE", "BALANCE",
    "DESCRIPTION", "MERCHANT", "RON", "LEI", "EUR", "USD", "TERMINAL", "AUTORIZARE",
];

/// Parse raw statement text (typically from PDF extraction) into
/// transactions.
///
/// Runs every strategy over the full input and unions the results. Each
/// strategy is a pure function of the text; precision comes from the final
/// dedup step, not from any single strategy being strict.
pub fn parse_statement_text(text: &str) -> Result<Vec<Transaction>> {
    let mut found = Vec::new();
    found.extend(parse_table_lines(text)?);
    found.extend(parse_blocks(text)?);
    found.extend(parse_line_layouts(text)?);
    found.extend(parse_date_windows(text)?);

    let mut seen = HashSet::new();
    let mut out: Vec<Transaction> = Vec::new();
    for tx in found {
        if seen.insert(tx.dedup_key()) {
            out.push(tx);
        }
    }
    out.sort_by_key(|t| t.date);

    debug!(transactions = out.len(), "statement text parsed");
    Ok(out)
}

// ---------------------------------------------------------------------------
// Strategy 1: table columns
// ---------------------------------------------------------------------------

/// Lines shaped like `date <sep> description <sep> amount[ <sep> amount]`
/// where the separator is a tab or a run of 3+ spaces. A signed amount
/// carries direction (negative = debit).
fn parse_table_lines(text: &str) -> Result<Vec<Transaction>> {
    let splitter = Regex::new(r"\t|\s{3,}")?;
    let mut out = Vec::new();

    for line in text.lines() {
        let cols: Vec<&str> = splitter
            .split(line.trim())
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if cols.len() < 3 {
            continue;
        }

        let Some(date) = parse_flexible_date(cols[0]) else {
            continue;
        };

        // The amount is the first parseable column after the description;
        // trailing columns (running balance, second currency) are tolerated.
        let mut amount_idx = None;
        for (i, col) in cols.iter().enumerate().skip(2) {
            if parse_flexible_amount(col).is_some() {
                amount_idx = Some(i);
                break;
            }
        }
        let Some(amount_idx) = amount_idx else {
            continue;
        };

        let (magnitude, sign) = match parse_flexible_amount(cols[amount_idx]) {
            Some(parsed) => parsed,
            None => continue,
        };
        let (amount, currency) = convert_currency(magnitude, currency_token(cols[amount_idx]));

        let description = cols[1..amount_idx].join(" ");
        let Some(beneficiary) = extract_beneficiary(&description) else {
            continue;
        };

        out.push(Transaction {
            date,
            amount,
            currency,
            beneficiary,
            description,
            kind: sign.unwrap_or(TransactionKind::Debit),
        });
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Strategy 2: multi-line blocks
// ---------------------------------------------------------------------------

/// Bank layouts where a date line opens a record and everything until the
/// next date line belongs to it. The block body is searched for the merchant
/// and the amount.
fn parse_blocks(text: &str) -> Result<Vec<Transaction>> {
    let opener = Regex::new(r"^\s*(\d{1,2}[./-]\d{1,2}[./-]\d{2,4}|\d{4}-\d{2}-\d{2})\b")?;
    let mut out = Vec::new();

    let mut current: Option<(NaiveDate, Vec<String>)> = None;
    let mut flush = |block: Option<(NaiveDate, Vec<String>)>, out: &mut Vec<Transaction>| {
        let Some((date, lines)) = block else { return };
        let body = lines.join(" ");
        let Some((amount, currency)) = first_amount_in(&body) else {
            return;
        };
        let Some(beneficiary) = extract_beneficiary(&body) else {
            return;
        };
        out.push(Transaction {
            date,
            amount,
            currency,
            beneficiary,
            description: body.trim().to_string(),
            kind: TransactionKind::Debit,
        });
    };

    for line in text.lines() {
        if let Some(caps) = opener.captures(line) {
            if let Some(date) = parse_flexible_date(&caps[1]) {
                flush(current.take(), &mut out);
                let rest = line[caps.get(0).map(|m| m.end()).unwrap_or(0)..].to_string();
                current = Some((date, vec![rest]));
                continue;
            }
        }
        if let Some((_, ref mut lines)) = current {
            lines.push(line.to_string());
        }
    }
    flush(current.take(), &mut out);

    Ok(out)
}

// ---------------------------------------------------------------------------
// Strategy 3: single-line layouts
// ---------------------------------------------------------------------------

/// Each line independently tested against a handful of common single-line
/// record shapes (date/description/amount in varying orders).
fn parse_line_layouts(text: &str) -> Result<Vec<Transaction>> {
    const DATE: &str = r"\d{1,2}[./-]\d{1,2}[./-]\d{2,4}|\d{4}-\d{2}-\d{2}";
    const AMOUNT: &str = r"[-+]?\d[\d.,]*[.,]\d{2}";
    const CURRENCY: &str = r"RON|LEI|EUR|USD";

    let layouts = [
        // date description amount [currency]
        Regex::new(&format!(
            r"(?m)^\s*(?P<date>{DATE})\s+(?P<desc>.+?)\s+(?P<amount>{AMOUNT})\s*(?P<cur>{CURRENCY})?\s*$"
        ))?,
        // date amount [currency] description
        Regex::new(&format!(
            r"(?m)^\s*(?P<date>{DATE})\s+(?P<amount>{AMOUNT})\s*(?P<cur>{CURRENCY})?\s+(?P<desc>.+?)\s*$"
        ))?,
        // description date amount [currency]
        Regex::new(&format!(
            r"(?m)^\s*(?P<desc>.+?)\s+(?P<date>{DATE})\s+(?P<amount>{AMOUNT})\s*(?P<cur>{CURRENCY})?\s*$"
        ))?,
    ];

    let mut out = Vec::new();
    for layout in &layouts {
        for caps in layout.captures_iter(text) {
            let Some(date) = parse_flexible_date(&caps["date"]) else {
                continue;
            };
            let Some((magnitude, sign)) = parse_flexible_amount(&caps["amount"]) else {
                continue;
            };
            let (amount, currency) =
                convert_currency(magnitude, caps.name("cur").map(|m| m.as_str()));
            let description = caps["desc"].trim().to_string();
            let Some(beneficiary) = extract_beneficiary(&description) else {
                continue;
            };
            out.push(Transaction {
                date,
                amount,
                currency,
                beneficiary,
                description,
                kind: sign.unwrap_or(TransactionKind::Debit),
            });
        }
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Strategy 4: date-anchored windows
// ---------------------------------------------------------------------------

/// Last-resort pass for layouts none of the structured strategies match.
/// Every date occurrence defines a local window of surrounding text; every
/// amount inside the window is a candidate transaction, attributed to the
/// nearest merchant-looking token run.
fn parse_date_windows(text: &str) -> Result<Vec<Transaction>> {
    let date_re =
        Regex::new(r"\d{1,2}[./-]\d{1,2}[./-]\d{2,4}|\d{4}-\d{2}-\d{2}|(?i)\d{1,2}\s+\p{L}{3,}\.?\s+\d{4}")?;
    let amount_re = Regex::new(r"(?P<amount>[-+]?\d[\d.,]*[.,]\d{2})\s*(?P<cur>RON|LEI|EUR|USD)?")?;

    let mut out = Vec::new();
    for m in date_re.find_iter(text) {
        let Some(date) = parse_flexible_date(m.as_str()) else {
            continue;
        };

        let start = floor_char_boundary(text, m.start().saturating_sub(WINDOW_RADIUS));
        let end = ceil_char_boundary(text, (m.end() + WINDOW_RADIUS).min(text.len()));
        let window = &text[start..end];

        let Some(beneficiary) = nearest_beneficiary(window, m.start() - start, m.end() - start)
        else {
            continue;
        };

        for caps in amount_re.captures_iter(window) {
            let Some((magnitude, sign)) = parse_flexible_amount(&caps["amount"]) else {
                continue;
            };
            let (amount, currency) =
                convert_currency(magnitude, caps.name("cur").map(|m| m.as_str()));
            out.push(Transaction {
                date,
                amount,
                currency,
                beneficiary: beneficiary.clone(),
                description: window.split_whitespace().collect::<Vec<_>>().join(" "),
                kind: sign.unwrap_or(TransactionKind::Debit),
            });
        }
    }

    Ok(out)
}

/// Beneficiary for a date-anchored window.
///
/// The search region grows outward from the date occurrence in fixed steps,
/// taking the first high-precision merchant run it reaches. Without the
/// outward search an amount can be bound to the merchant of the preceding
/// record when two records share one window. Only when no strong run exists
/// anywhere does the full loose cascade get the whole window.
fn nearest_beneficiary(window: &str, date_lo: usize, date_hi: usize) -> Option<String> {
    const STEP: usize = 40;

    let mut radius = STEP;
    loop {
        let lo = floor_char_boundary(window, date_lo.saturating_sub(radius));
        let hi = ceil_char_boundary(window, (date_hi + radius).min(window.len()));
        if let Some(name) = strong_beneficiary(&window[lo..hi]) {
            return Some(name);
        }
        if lo == 0 && hi == window.len() {
            return extract_beneficiary(window);
        }
        radius += STEP;
    }
}

fn floor_char_boundary(text: &str, mut i: usize) -> usize {
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

// ---------------------------------------------------------------------------
// Field parsing helpers
// ---------------------------------------------------------------------------

/// Parse a date in any of the supported formats.
///
/// Accepts numeric `DD.MM.YYYY` / `DD/MM/YYYY` / `DD-MM-YYYY`, ISO
/// `YYYY-MM-DD`, two-digit-year variants, and `DD <month-name> YYYY` via the
/// month table. Years outside 1900..=(current year + 1) are rejected.
pub fn parse_flexible_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%d.%m.%y", "%d/%m/%y",
    ];
    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return sane_year(date);
        }
    }

    // DD <month-word> YYYY
    let mut parts = s.split_whitespace();
    if let (Some(day), Some(word), Some(year), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    {
        let day: u32 = day.parse().ok()?;
        let year: i32 = year.parse().ok()?;
        let month = month_number(word)?;
        return NaiveDate::from_ymd_opt(year, month, day).and_then(sane_year);
    }

    None
}

fn sane_year(date: NaiveDate) -> Option<NaiveDate> {
    let max_year = Utc::now().year() + 1;
    if date.year() >= 1900 && date.year() <= max_year {
        Some(date)
    } else {
        None
    }
}

fn month_number(word: &str) -> Option<u32> {
    let w = word.trim_end_matches('.').to_lowercase();
    MONTHS.iter().find(|(name, _)| *name == w).map(|(_, n)| *n)
}

/// Parse an amount, disambiguating thousands vs decimal separators.
///
/// Whichever of the last comma and last dot sits rightmost is the decimal
/// separator; the other is a grouping character. A leading sign carries
/// direction: `-` means debit, `+` means credit, nothing means unknown.
pub fn parse_flexible_amount(raw: &str) -> Option<(f64, Option<TransactionKind>)> {
    let s = raw.trim();
    let sign = match s.chars().next() {
        Some('-') => Some(TransactionKind::Debit),
        Some('+') => Some(TransactionKind::Credit),
        _ => None,
    };

    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');
    let normalized = match (last_dot, last_comma) {
        (Some(d), Some(c)) if d > c => cleaned.replace(',', ""),
        (Some(_), Some(_)) => cleaned.replace('.', "").replace(',', "."),
        (None, Some(c)) => {
            // Lone comma: decimal when 1-2 digits follow, grouping otherwise
            if cleaned.len() - c - 1 <= 2 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (Some(d), None) => {
            if cleaned.len() - d - 1 <= 2 {
                cleaned
            } else {
                cleaned.replace('.', "")
            }
        }
        (None, None) => cleaned,
    };

    let value: f64 = normalized.parse().ok()?;
    if value <= 0.0 {
        return None;
    }
    Some((value, sign))
}

fn currency_token(s: &str) -> Option<&str> {
    let upper_end = s.trim_end();
    for token in ["RON", "LEI", "EUR", "USD"] {
        if upper_end.to_uppercase().ends_with(token) {
            return Some(token);
        }
    }
    None
}

/// Convert a detected foreign-currency amount into the reporting currency.
///
/// The multipliers are fixed approximations, refreshed at deployment time.
fn convert_currency(amount: f64, token: Option<&str>) -> (f64, String) {
    let converted = match token.map(|t| t.to_uppercase()) {
        Some(t) if t == "EUR" => amount * EUR_TO_RON,
        Some(t) if t == "USD" => amount * USD_TO_RON,
        _ => amount,
    };
    (
        (converted * 100.0).round() / 100.0,
        REPORTING_CURRENCY.to_string(),
    )
}

fn first_amount_in(text: &str) -> Option<(f64, String)> {
    let amount_re =
        Regex::new(r"(?P<amount>\d[\d.,]*[.,]\d{2})\s*(?P<cur>RON|LEI|EUR|USD)?").ok()?;
    let caps = amount_re.captures(text)?;
    let (magnitude, _) = parse_flexible_amount(&caps["amount"])?;
    Some(convert_currency(
        magnitude,
        caps.name("cur").map(|m| m.as_str()),
    ))
}

// ---------------------------------------------------------------------------
// Beneficiary extraction
// ---------------------------------------------------------------------------

/// Extract the most merchant-looking token run from a piece of text.
///
/// A cascade of progressively looser rules; when none yields anything the
/// text does not describe a usable transaction and the caller must drop it.
pub fn extract_beneficiary(text: &str) -> Option<String> {
    if let Some(name) = strong_beneficiary(text) {
        return Some(name);
    }

    // 4. Any meaningful non-numeric word sequence
    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|w| {
            w.len() >= 3
                && w.chars().any(|c| c.is_alphabetic())
                && !w.chars().all(|c| c.is_ascii_digit())
                && !is_stopword(w)
        })
        .collect();
    if words.len() >= 2 {
        return Some(words[..words.len().min(3)].join(" "));
    }

    // 5. Last resort: a single alphabetic token
    words.first().map(|w| w.to_string())
}

/// The high-precision rules of the cascade: explicit label, ALL-CAPS run,
/// capitalized mixed-case run. The loose fallbacks stay in
/// [`extract_beneficiary`].
fn strong_beneficiary(text: &str) -> Option<String> {
    // 1. Explicit label wins outright
    if let Ok(label_re) = Regex::new(
        r"(?i)(?:payment to|paid to|plata catre|plată către|beneficiar|comerciant|merchant)\s*:?\s*(?P<name>[^\n;,]{3,60})",
    ) {
        if let Some(caps) = label_re.captures(text) {
            let name = caps["name"].trim();
            if !is_stopword_only(name) {
                return Some(name.to_string());
            }
        }
    }

    // 2. ALL-CAPS word runs (typical card-processor merchant fields)
    if let Some(run) = first_token_run(text, is_caps_token) {
        return Some(run);
    }

    // 3. Mixed-case capitalized runs
    first_token_run(text, is_capitalized_token)
}

/// Longest leading run (max 4 tokens) of consecutive tokens accepted by
/// `pred`, with stopwords acting as run breaks.
fn first_token_run(text: &str, pred: fn(&str) -> bool) -> Option<String> {
    let mut run: Vec<&str> = Vec::new();
    for token in text.split_whitespace() {
        if pred(token) && !is_stopword(token) {
            run.push(token);
            if run.len() == 4 {
                break;
            }
        } else if !run.is_empty() {
            break;
        }
    }
    if run.is_empty() {
        None
    } else {
        Some(
            run.join(" ")
                .trim_matches(['*', '-', '.', ','])
                .to_string(),
        )
    }
}

/// ALL-CAPS-ish merchant token: has letters, no lowercase, mostly not digits
fn is_caps_token(token: &str) -> bool {
    let letters = token.chars().filter(|c| c.is_ascii_alphabetic()).count();
    letters >= 2
        && !token.chars().any(|c| c.is_ascii_lowercase())
        && token.len() >= 2
}

/// Capitalized mixed-case token (Netflix, Spotify)
fn is_capitalized_token(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.clone().filter(|c| c.is_ascii_lowercase()).count() >= 2
        && token.len() >= 3
}

fn is_stopword(word: &str) -> bool {
    let w: String = word
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_uppercase();
    BENEFICIARY_STOPLIST.contains(&w.as_str())
}

fn is_stopword_only(candidate: &str) -> bool {
    candidate.split_whitespace().all(is_stopword)
}
