use std::collections::BTreeSet;

/// Uppercase words that show up constantly in posts and are not tickers
const STOP_WORDS: &[&str] = &[
    "THE", "AND", "FOR", "ARE", "BUT", "NOT", "YOU", "ALL", "CAN", "HER", "WAS", "ONE", "OUR",
    "OUT", "DAY", "GET", "HAS", "HIM", "HOW", "ITS", "MAY", "NEW", "NOW", "OLD", "SEE", "TWO",
    "WAY", "WHO", "BOY", "DID", "HIS", "SHE", "USE", "WIN", "YET", "YOLO",
];

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Candidate ticker symbols in free text, de-duplicated and sorted.
///
/// Matches `$TICKER` (1 to 5 capitals) and bare uppercase words of 2 to 5 letters.
/// A word only counts when it stands alone, so `GMEX1` or `AAPLE_` yield nothing.
pub fn extract_tickers(text: &str) -> Vec<String> {
    let mut found = BTreeSet::new();
    let mut word = String::new();
    let mut dollar = false;
    let mut prev: Option<char> = None;

    for c in text.chars().chain(std::iter::once(' ')) {
        if is_word_char(c) {
            if word.is_empty() {
                dollar = prev == Some('$');
            }
            word.push(c);
        } else if !word.is_empty() {
            if let Some(symbol) = classify(&word, dollar) {
                found.insert(symbol);
            }
            word.clear();
        }
        prev = Some(c);
    }

    found.into_iter().collect()
}

fn classify(word: &str, dollar: bool) -> Option<String> {
    if !word.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    let min_len = if dollar { 1 } else { 2 };
    if word.len() < min_len || word.len() > 5 || STOP_WORDS.contains(&word) {
        return None;
    }
    Some(word.to_string())
}
