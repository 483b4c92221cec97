use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{Language, NormalizedQuery, Qualifier};
use crate::error::{codes, AppError};
use crate::lexicon::{fold_phrase, Lexicon};

mod script;

pub use script::{detect_language, ScriptCensus};

/// Share of Devanagari letters above which a query is treated as Hindi.
const HINDI_SCRIPT_SHARE: f32 = 0.3;

const DURATION_PATTERNS: [&str; 2] = [
    r"\b(\d+|an?|one|two|three|four|five|six|seven|eight|nine|ten)\s*(hours?|hrs?|days?|weeks?|months?)\b",
    r"(\d+|एक|दो|तीन|चार|पांच|पाँच|छह|सात|आठ|नौ|दस)\s*(घंटे|घंटा|दिनों|दिन|हफ्ते|सप्ताह|महीने|महीना)",
];

fn duration_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        DURATION_PATTERNS
            .iter()
            .filter_map(|p| match Regex::new(&fold_phrase(p)) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::error!(pattern = p, err = %e, "duration pattern failed to compile");
                    None
                }
            })
            .collect()
    })
}

/// Map raw text onto canonical symptom tokens.
///
/// Unrecognized words never cause a failure: they are kept in `free_text` and excluded from
/// matching. Only an unsupported hint or script yields `TRIAGE_UNSUPPORTED_INPUT`.
pub fn normalize(
    raw: &str,
    language_hint: Option<&str>,
    lexicon: &Lexicon,
) -> Result<NormalizedQuery, AppError> {
    let hinted = parse_hint(language_hint)?;

    let folded = fold_phrase(&fold_devanagari_digits(raw));
    let detected = detect_language(&folded)?;
    let language = hinted.unwrap_or(detected);

    let words = split_words(&folded);
    let mut tokens: Vec<String> = Vec::new();
    let mut free_text: Vec<String> = Vec::new();
    let mut qualifiers: Vec<Qualifier> = Vec::new();

    let max_words = lexicon.max_term_words().max(1);
    let mut i = 0usize;
    while i < words.len() {
        let longest = max_words.min(words.len() - i);
        let mut consumed = 0usize;
        for n in (1..=longest).rev() {
            let phrase = words[i..i + n].join(" ");
            if let Some(canonical) = lexicon.canonical_for(&phrase) {
                if lexicon.candidates_for(&phrase).len() > 1 {
                    tracing::debug!(chosen = canonical, "ambiguous term resolved to higher tier");
                }
                if !tokens.iter().any(|t| t == canonical) {
                    tokens.push(canonical.to_string());
                }
                consumed = n;
                break;
            }
            if let Some(population) = lexicon.population_for(&phrase) {
                let q = Qualifier::Population { population };
                if !qualifiers.contains(&q) {
                    qualifiers.push(q);
                }
                consumed = n;
                break;
            }
        }
        if consumed == 0 {
            free_text.push(words[i].clone());
            consumed = 1;
        }
        i += consumed;
    }

    for q in extract_durations(&folded) {
        if !qualifiers.contains(&q) {
            qualifiers.push(q);
        }
    }

    let malaria_associated = tokens.iter().any(|t| lexicon.is_malaria_associated(t));

    tracing::debug!(
        language = language.code(),
        tokens = tokens.len(),
        free_words = free_text.len(),
        qualifiers = qualifiers.len(),
        "query normalized"
    );

    Ok(NormalizedQuery::new(
        raw.to_string(),
        language,
        tokens,
        free_text,
        qualifiers,
        malaria_associated,
        lexicon.version().to_string(),
    ))
}

fn parse_hint(hint: Option<&str>) -> Result<Option<Language>, AppError> {
    let Some(h) = hint.map(str::trim) else {
        return Ok(None);
    };
    if h.is_empty() || h.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    Language::from_code(h).map(Some).ok_or_else(|| {
        AppError::new(codes::UNSUPPORTED_INPUT, "Language hint is not supported")
            .with_details(format!("hint={h}; supported=en,hi"))
    })
}

fn fold_devanagari_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{0966}'..='\u{096F}' => char::from(b'0' + (c as u32 - 0x0966) as u8),
            _ => c,
        })
        .collect()
}

fn split_words(folded: &str) -> Vec<String> {
    folded
        .split(|c: char| !script::is_word_char(c))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

fn extract_durations(folded: &str) -> Vec<Qualifier> {
    let mut out = Vec::new();
    for re in duration_patterns() {
        for caps in re.captures_iter(folded) {
            let (Some(whole), Some(count), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            let Some(n) = parse_count(count.as_str()) else {
                continue;
            };
            out.push(Qualifier::Duration {
                text: whole.as_str().to_string(),
                days: days_for(n, unit.as_str()),
            });
        }
    }
    for (cue, days) in [("since yesterday", 1u32), ("कल से", 1u32)] {
        if folded.contains(cue) {
            out.push(Qualifier::Duration {
                text: cue.to_string(),
                days,
            });
        }
    }
    out
}

fn parse_count(s: &str) -> Option<u32> {
    if let Ok(n) = s.parse::<u32>() {
        return Some(n);
    }
    let n = match s {
        "a" | "an" | "one" | "एक" => 1,
        "two" | "दो" => 2,
        "three" | "तीन" => 3,
        "four" | "चार" => 4,
        "five" | "पांच" | "पाँच" => 5,
        "six" | "छह" => 6,
        "seven" | "सात" => 7,
        "eight" | "आठ" => 8,
        "nine" | "नौ" => 9,
        "ten" | "दस" => 10,
        _ => return None,
    };
    Some(n)
}

fn days_for(n: u32, unit: &str) -> u32 {
    if unit.starts_with('h') || unit.starts_with("घंट") {
        n / 24
    } else if unit.starts_with('w') || unit.starts_with("हफ्त") || unit.starts_with("सप्ताह") {
        n.saturating_mul(7)
    } else if unit.starts_with('m') || unit.starts_with("मही") {
        n.saturating_mul(30)
    } else {
        n
    }
}

pub(crate) fn is_hindi_share(devanagari: usize, total: usize) -> bool {
    total > 0 && devanagari as f32 / total as f32 > HINDI_SCRIPT_SHARE
}
