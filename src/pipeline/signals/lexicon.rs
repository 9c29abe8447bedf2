//! Dictionary profanity detection.
//!
//! Words are compared after folding: lowercase, common leetspeak
//! substitutions undone, surrounding punctuation dropped. A small set of
//! inflection suffixes is stripped so "idiots" and "damned" match their stems.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use super::types::{LexicalFinding, SignalDetector, SignalError, SignalKind, SignalReport};

/// Maximum characters of censored text kept in the preview.
pub const PREVIEW_CHARS: usize = 100;

const MASK: char = '*';

static PROFANITY_LEXICON: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "fuck", "fucking", "fucker", "fucked", "motherfucker", "shit", "shitty", "bullshit",
        "bitch", "bitchy", "bastard", "asshole", "ass", "jackass", "dumbass", "damn",
        "goddamn", "dick", "dickhead", "prick", "crap", "crappy", "piss", "pissed", "cunt",
        "twat", "wanker", "bollocks", "douche", "douchebag", "slut", "whore", "idiot",
        "moron", "imbecile", "retard", "scumbag", "wtf", "stfu", "fck", "fcking", "sht",
        "dmn", "btch", "azz", "biatch",
    ]
    .into_iter()
    .collect()
});

const SUFFIXES: &[&str] = &["ing", "ers", "er", "ed", "es", "s"];

/// Fold a raw token for lexicon comparison. Returns an empty string when
/// nothing word-like remains.
pub fn fold_token(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| match c {
            '@' | '4' => Some('a'),
            '$' | '5' => Some('s'),
            '0' => Some('o'),
            '1' | '!' => Some('i'),
            '3' => Some('e'),
            '7' => Some('t'),
            c if c.is_alphanumeric() => Some(c.to_ascii_lowercase()),
            _ => None,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split a whitespace token into (leading punctuation, core, trailing punctuation).
/// Leetspeak glyphs inside the core are kept so "sh1t" stays one word.
fn split_punctuation(token: &str) -> (&str, &str, &str) {
    let is_edge = |c: char| !c.is_alphanumeric() && !matches!(c, '@' | '$');
    let start = token
        .char_indices()
        .find(|(_, c)| !is_edge(*c))
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    let end = token
        .char_indices()
        .rev()
        .find(|(_, c)| !is_edge(*c))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(start);
    (&token[..start], &token[start..end], &token[end..])
}

/// Drop surrounding punctuation from a whitespace token, then fold it.
pub fn normalize_word(token: &str) -> String {
    let (_, core, _) = split_punctuation(token);
    fold_token(core)
}

/// Look a folded word up in the lexicon, trying inflection stems.
pub fn lexicon_match(folded: &str) -> Option<String> {
    if folded.is_empty() {
        return None;
    }
    if PROFANITY_LEXICON.contains(folded) {
        return Some(folded.to_string());
    }
    SUFFIXES.iter().find_map(|suffix| {
        let stem = folded.strip_suffix(suffix)?;
        (stem.len() >= 3 && PROFANITY_LEXICON.contains(stem)).then(|| stem.to_string())
    })
}

/// Run the dictionary check over `text`.
pub fn scan_profanity(text: &str) -> LexicalFinding {
    let mut matched = BTreeSet::new();
    let mut censored = String::with_capacity(text.len());

    for piece in text.split_inclusive(char::is_whitespace) {
        let word_end = piece.trim_end_matches(char::is_whitespace).len();
        let (word, trailing_space) = piece.split_at(word_end);
        let (lead, core, trail) = split_punctuation(word);

        match lexicon_match(&fold_token(core)) {
            Some(term) => {
                matched.insert(term);
                censored.push_str(lead);
                censored.extend(std::iter::repeat(MASK).take(core.chars().count()));
                censored.push_str(trail);
            }
            None => censored.push_str(word),
        }
        censored.push_str(trailing_space);
    }

    let flagged_words: Vec<String> = matched.into_iter().collect();
    LexicalFinding {
        has_profanity: !flagged_words.is_empty(),
        word_count: flagged_words.len(),
        flagged_words,
        censored_preview: truncate_preview(&censored, PREVIEW_CHARS),
    }
}

/// Cap `text` at `max_chars` characters, marking the cut with "...".
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Dictionary-based profanity detector.
pub struct LexicalProfanityDetector;

impl SignalDetector for LexicalProfanityDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::Lexical
    }

    fn detect(&self, text: &str) -> Result<SignalReport, SignalError> {
        Ok(SignalReport::Lexical(scan_profanity(text)))
    }
}

/// Force the lexicon to load.
pub(crate) fn warm_up() -> usize {
    PROFANITY_LEXICON.len()
}
