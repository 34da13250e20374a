//! Text normalization shared by alias matching, intent scoring and retrieval.

/// Lowercase, fold Latin diacritics, strip Arabic diacritics, unify Arabic
/// letter variants, turn punctuation into spaces and collapse whitespace.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars().flat_map(char::to_lowercase) {
        let folded = match ch {
            'à' | 'á' | 'â' | 'ä' | 'ã' => 'a',
            'ç' => 'c',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ò' | 'ó' | 'ô' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ÿ' => 'y',
            'œ' => {
                out.push_str("oe");
                continue;
            }
            'أ' | 'إ' | 'آ' | 'ٱ' => 'ا',
            'ى' => 'ي',
            'ة' => 'ه',
            // tashkeel and tatweel
            '\u{064B}'..='\u{0652}' | '\u{0640}' => continue,
            c if c.is_alphanumeric() => c,
            _ => ' ',
        };
        out.push(folded);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key used to compare equipment names and aliases: normalized with the
/// spaces removed, so `"GA-37 VSD"` and `"ga37vsd"` collide.
pub fn name_key(input: &str) -> String {
    normalize(input).replace(' ', "")
}

const STOPWORDS: &[&str] = &[
    // English
    "the", "and", "for", "are", "with", "this", "that", "what", "how", "can", "you", "from",
    "have", "has", "was", "which", "when", "does", "into", "its", "our", "your",
    // French
    "les", "des", "une", "pour", "dans", "avec", "sur", "par", "est", "que", "qui", "quoi",
    "comment", "quel", "quelle", "quels", "quelles", "mon", "mes", "son", "ses", "aux", "du",
    "de", "la", "le", "un", "et", "en", "au", "il", "je", "ce", "cette",
    // Arabic
    "في", "من", "على", "الى", "عن", "ما", "هل", "كيف", "هذا", "هذه", "التي", "الذي", "مع",
    // Darija
    "dial", "dyal", "f", "l", "wach", "kifach", "chno", "ana", "had", "ديال", "واش", "كيفاش",
];

/// Content-bearing terms of a query: normalized, stopwords dropped,
/// single characters dropped, order kept, duplicates removed.
pub fn terms(input: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for word in normalize(input).split(' ') {
        if word.chars().count() < 2 || STOPWORDS.contains(&word) {
            continue;
        }
        if !seen.iter().any(|w: &String| w == word) {
            seen.push(word.to_string());
        }
    }
    seen
}

/// Trimmed value or `None` when blank.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
