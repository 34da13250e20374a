//! Language heuristics for Arabic, Moroccan Darija, French and English.
//!
//! Pure scoring over word membership and script ratios; no model calls.

use crate::text::normalize;
use crate::types::domain::Language;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

const DARIJA_ARABIC: &[&str] = &[
    "واش", "كيفاش", "شنو", "اشنو", "علاش", "فين", "ديال", "بغيت", "كاين", "ماكاينش", "دابا",
    "مزيان", "خدام", "ماخدامش", "راه", "هادي", "هاد", "بزاف", "شي", "ملي", "عافاك", "غادي",
    "خاص", "نبدل", "تبدل", "شحال", "فوقاش", "امتى", "شكون", "خاسر", "خاسرة",
];

const MSA_ARABIC: &[&str] = &[
    "ماذا", "كيف", "لماذا", "هل", "أين", "الذي", "التي", "هذا", "هذه", "يجب", "متى", "ليس",
    "إلى", "عن", "لقد", "سوف", "يمكن", "كم", "ذلك", "تلك", "أريد",
];

const ARABIZI: &[&str] = &[
    "kifach", "kifash", "wach", "wash", "chno", "chnou", "achno", "3lach", "3lash", "fin",
    "bghit", "kayn", "kayna", "makaynch", "dyal", "dial", "daba", "mzyan", "mzyana", "khdam",
    "khdama", "makhdamch", "makhdamach", "bzaf", "rah", "raha", "3afak", "labas", "machi",
    "ghadi", "khass", "khassni", "tbdel", "nbdel", "chhal", "ch7al", "imta", "fo9ach", "chkoun",
    "hadi", "hada", "wlla", "walakin",
];

const FRENCH: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "du", "de", "et", "est", "pour", "dans", "avec",
    "sur", "par", "que", "qui", "quoi", "comment", "pourquoi", "quand", "je", "il", "elle",
    "nous", "vous", "faut", "pas", "mon", "ma", "mes", "ce", "cette", "au", "aux", "ne",
    "quel", "quelle", "sont", "doit", "peut",
];

const ENGLISH: &[&str] = &[
    "the", "an", "is", "are", "was", "for", "with", "on", "in", "how", "what", "why", "when",
    "where", "which", "do", "does", "i", "my", "it", "to", "of", "and", "should", "can",
    "this", "that", "be", "has", "have", "not", "there",
];

fn word_set(words: &[&str]) -> HashSet<String> {
    words.iter().map(|w| normalize(w)).collect()
}

static DARIJA_ARABIC_SET: LazyLock<HashSet<String>> = LazyLock::new(|| word_set(DARIJA_ARABIC));
static MSA_ARABIC_SET: LazyLock<HashSet<String>> = LazyLock::new(|| word_set(MSA_ARABIC));
static ARABIZI_SET: LazyLock<HashSet<String>> = LazyLock::new(|| word_set(ARABIZI));
static FRENCH_SET: LazyLock<HashSet<String>> = LazyLock::new(|| word_set(FRENCH));
static ENGLISH_SET: LazyLock<HashSet<String>> = LazyLock::new(|| word_set(ENGLISH));

/// Arabizi words use 2/3/5/7/9 for Arabic letters, followed by a letter
/// (`3lach`, `t7el`). Model numbers like `ga37` end in digits and do not match.
static ARABIZI_DIGIT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]*[23579][a-z][a-z23579]*$").expect("static regex")
});

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LanguageSignals {
    /// Share of letters in Arabic script.
    pub arabic_ratio: f32,
    /// Share of letters in Latin script.
    pub latin_ratio: f32,
    pub darija_arabic: u32,
    pub msa: u32,
    pub arabizi: u32,
    pub french: u32,
    pub english: u32,
    pub words: u32,
    pub unique_words: u32,
}

pub fn signals(text: &str) -> LanguageSignals {
    let mut arabic = 0u32;
    let mut latin = 0u32;
    let mut letters = 0u32;
    for ch in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if ('\u{0600}'..='\u{06FF}').contains(&ch) || ('\u{0750}'..='\u{077F}').contains(&ch) {
            arabic += 1;
        } else if ch.is_ascii_alphabetic() || ('\u{00C0}'..='\u{024F}').contains(&ch) {
            latin += 1;
        }
    }

    let normalized = normalize(text);
    let mut s = LanguageSignals {
        arabic_ratio: ratio(arabic, letters),
        latin_ratio: ratio(latin, letters),
        ..Default::default()
    };
    let mut seen = HashSet::new();
    for word in normalized.split(' ').filter(|w| !w.is_empty()) {
        s.words += 1;
        if seen.insert(word) {
            s.unique_words += 1;
        }
        if DARIJA_ARABIC_SET.contains(word) {
            s.darija_arabic += 1;
        }
        if MSA_ARABIC_SET.contains(word) {
            s.msa += 1;
        }
        if ARABIZI_SET.contains(word) || ARABIZI_DIGIT_WORD.is_match(word) {
            s.arabizi += 1;
        }
        if FRENCH_SET.contains(word) {
            s.french += 1;
        }
        if ENGLISH_SET.contains(word) {
            s.english += 1;
        }
    }
    s
}

fn ratio(part: u32, total: u32) -> f32 {
    if total == 0 {
        0.0
    } else {
        part as f32 / total as f32
    }
}

/// Detect the language of a short query.
///
/// Arabic script wins at 30% of letters; inside it Darija wins when its
/// markers outnumber MSA markers. Latin text with Arabizi markers at least
/// as frequent as French and English indicators is Darija. Otherwise French
/// unless English indicators strictly dominate.
pub fn detect_language(text: &str) -> Language {
    let s = signals(text);
    if s.arabic_ratio >= 0.3 {
        return if s.darija_arabic > s.msa {
            Language::Darija
        } else {
            Language::Arabic
        };
    }
    if s.arabizi > 0 && s.arabizi >= s.french.max(s.english) {
        return Language::Darija;
    }
    if s.english > s.french {
        Language::English
    } else {
        Language::French
    }
}

const PLACEHOLDERS: &[&str] = &[
    "[inaudible]",
    "(inaudible)",
    "[music]",
    "[musique]",
    "[silence]",
    "[unintelligible]",
];

/// How plausible `text` is as a transcript in `language`, in `[0, 1]`.
///
/// Script agreement times lexical agreement, damped for very short output,
/// placeholder tokens and repetition loops.
pub fn language_score(text: &str, language: Language) -> f32 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let s = signals(trimmed);

    let script = match language {
        Language::Arabic | Language::Darija => s.arabic_ratio,
        Language::French | Language::English => s.latin_ratio,
    };
    let lexical = match language {
        Language::French => (s.french as f32 + 1.0) / ((s.french + s.english) as f32 + 2.0),
        Language::English => (s.english as f32 + 1.0) / ((s.french + s.english) as f32 + 2.0),
        Language::Arabic | Language::Darija => {
            if s.msa + s.darija_arabic > 0 {
                1.0
            } else {
                0.7
            }
        }
    };
    let length = (s.words as f32 / 4.0).min(1.0);

    let mut score = script * lexical * (0.5 + 0.5 * length);
    let lower = trimmed.to_lowercase();
    if PLACEHOLDERS.iter().any(|p| lower.contains(p)) {
        score *= 0.5;
    }
    if s.words > 8 && (s.unique_words as f32 / s.words as f32) < 0.3 {
        score *= 0.5;
    }
    score.clamp(0.0, 1.0)
}
