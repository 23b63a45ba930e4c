//! String functions behind the resolver: normalization, sequence numbers,
//! phonetic keys and similarity.

use std::collections::BTreeSet;

use strsim::sorensen_dice;

// Latin letters with diacritics found in transliterated names.
const FOLDS: [(char, char); 40] = [
    ('À', 'A'),
    ('Á', 'A'),
    ('Â', 'A'),
    ('Ã', 'A'),
    ('Ä', 'A'),
    ('Å', 'A'),
    ('Ā', 'A'),
    ('Ç', 'C'),
    ('Ḍ', 'D'),
    ('È', 'E'),
    ('É', 'E'),
    ('Ê', 'E'),
    ('Ë', 'E'),
    ('Ē', 'E'),
    ('Ḥ', 'H'),
    ('Ì', 'I'),
    ('Í', 'I'),
    ('Î', 'I'),
    ('Ï', 'I'),
    ('Ī', 'I'),
    ('Ḷ', 'L'),
    ('Ṃ', 'M'),
    ('Ñ', 'N'),
    ('Ṇ', 'N'),
    ('Ṅ', 'N'),
    ('Ò', 'O'),
    ('Ó', 'O'),
    ('Ô', 'O'),
    ('Õ', 'O'),
    ('Ö', 'O'),
    ('Ō', 'O'),
    ('Ṛ', 'R'),
    ('Ś', 'S'),
    ('Ṣ', 'S'),
    ('Š', 'S'),
    ('Ṭ', 'T'),
    ('Ù', 'U'),
    ('Ú', 'U'),
    ('Û', 'U'),
    ('Ü', 'U'),
];

const RESERVATION_SUFFIXES: [&str; 2] = ["SC", "ST"];

// Whole words with the same meaning across transliterations.
const WORD_EQUIVALENTS: [(&str, &str); 13] = [
    ("RURAL", "GRAMIN"),
    ("GRAMEEN", "GRAMIN"),
    ("GRAMEENA", "GRAMIN"),
    ("PURBA", "EAST"),
    ("PURBO", "EAST"),
    ("PURVA", "EAST"),
    ("PASCHIM", "WEST"),
    ("PASHCHIM", "WEST"),
    ("PACHIM", "WEST"),
    ("UTTAR", "NORTH"),
    ("UTTARA", "NORTH"),
    ("DAKSHIN", "SOUTH"),
    ("DAKSHINA", "SOUTH"),
];

const DIGRAPHS: [(&str, &str); 9] = [
    ("SH", "S"),
    ("PH", "F"),
    ("TH", "T"),
    ("KH", "K"),
    ("GH", "G"),
    ("BH", "B"),
    ("DH", "D"),
    ("JH", "J"),
    ("CH", "C"),
];

// Combining diacritical marks, as left by decomposed (NFD) text.
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

fn fold_char(c: char) -> char {
    FOLDS
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
        .unwrap_or(c)
}

/// The normalized form of a name, used by all the exact lookups.
///
/// Upper case, diacritics folded, punctuation replaced by spaces, spaces
/// collapsed, and a trailing reservation marker (`(SC)`, `- ST`) removed.
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .to_uppercase()
        .chars()
        .filter(|c| !is_combining_mark(*c))
        .map(fold_char)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let mut words: Vec<&str> = folded.split_whitespace().collect();
    if words.len() > 1 {
        if let Some(last) = words.last() {
            if RESERVATION_SUFFIXES.contains(last) {
                words.pop();
            }
        }
    }
    words.join(" ")
}

/// Splits a sequence number from a name: `37 - Achampet` and `Achampet-37`
/// both give `(37, "Achampet")`.
pub fn split_sequence_number(name: &str) -> Option<(u32, String)> {
    let trimmed = name.trim();
    let is_sep = |c: char| c == ' ' || c == '-' || c == '.' || c == ':' || c == ')' || c == '(';

    let leading: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !leading.is_empty() && leading.len() <= 3 {
        let rest = trimmed[leading.len()..].trim_start_matches(is_sep);
        if !rest.is_empty() && rest.len() < trimmed.len() - leading.len() {
            return Some((leading.parse().ok()?, rest.trim().to_string()));
        }
    }

    let trailing_len = trimmed
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if trailing_len > 0 && trailing_len <= 3 {
        let (head, digits) = trimmed.split_at(trimmed.len() - trailing_len);
        let head_clean = head.trim_end_matches(is_sep);
        if !head_clean.is_empty() && head_clean.len() < head.len() {
            return Some((digits.parse().ok()?, head_clean.trim().to_string()));
        }
    }
    None
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'A' | 'E' | 'I' | 'O' | 'U')
}

fn reduce_word(word: &str) -> String {
    let word = WORD_EQUIVALENTS
        .iter()
        .find(|(from, _)| *from == word)
        .map(|(_, to)| *to)
        .unwrap_or(word);
    let mut w = word.to_string();
    for (from, to) in DIGRAPHS.iter() {
        w = w.replace(from, to);
    }
    let mut res = String::new();
    for (i, c) in w.chars().enumerate() {
        let c = match c {
            'W' => 'V',
            'Z' => 'J',
            'Q' => 'K',
            c => c,
        };
        if i > 0 && is_vowel(c) {
            continue;
        }
        if res.ends_with(c) {
            continue;
        }
        res.push(c);
    }
    res
}

/// The phonetic key of a normalized name.
pub fn phonetic_key(normalized: &str) -> String {
    normalized
        .split_whitespace()
        .map(reduce_word)
        .collect::<Vec<String>>()
        .join(" ")
}

/// The number of letters and digits of a name.
pub fn significant_len(name: &str) -> usize {
    name.chars().filter(|c| c.is_alphanumeric()).count()
}

fn char_set(s: &str) -> BTreeSet<char> {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Jaccard similarity of the sets of characters of two keys.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let sa = char_set(a);
    let sb = char_set(b);
    let union = sa.union(&sb).count();
    if union == 0 {
        return 0.0;
    }
    sa.intersection(&sb).count() as f64 / union as f64
}

/// Dice coefficient over the character bigrams. Breaks the ties of the
/// Jaccard similarity, which ignores the order of the letters.
pub fn bigram_similarity(a: &str, b: &str) -> f64 {
    sorensen_dice(a, b)
}
