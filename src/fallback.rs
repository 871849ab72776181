use crate::parse::{has_vowel, normalize_token};

/// Common English syllable onsets, most productive first
const ONSETS: &[&str] = &[
    "b", "d", "f", "g", "h", "j", "k", "l", "m", "n", "p", "r", "s", "t", "v", "w", "bl", "br",
    "ch", "cl", "cr", "dr", "fl", "fr", "gl", "gr", "pl", "pr", "sh", "sl", "sm", "sn", "sp",
    "st", "sw", "th", "tr", "wh", "str",
];

fn is_vowel_byte(b: u8) -> bool {
    matches!(b, b'a' | b'e' | b'i' | b'o' | b'u' | b'y')
}

/// Cheap shape check: non-empty, letters only, at least one vowel
pub fn is_valid_word(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.chars().all(|c| c.is_ascii_alphabetic())
        && has_vowel(candidate)
}

/// Start of the last vowel run in `word`
fn last_vowel_run(word: &[u8]) -> Option<usize> {
    let end = word.iter().rposition(|&b| is_vowel_byte(b))?;
    let mut start = end;
    while start > 0 && is_vowel_byte(word[start - 1]) {
        start -= 1;
    }
    Some(start)
}

/// Part of the word that has to match for a rhyme ("mate" -> "ate", "rob" -> "ob")
pub fn rhyme_tail(word: &str) -> Option<&str> {
    let bytes = word.as_bytes();
    if !word.is_ascii() {
        return None;
    }
    let mut start = last_vowel_run(bytes)?;

    // silent final e: "mate" rhymes on "ate", not "e"
    let silent_e = start == bytes.len() - 1 && bytes[start] == b'e';
    if silent_e && start >= 2 && !is_vowel_byte(bytes[start - 1]) {
        if let Some(earlier) = last_vowel_run(&bytes[..start - 1]) {
            start = earlier;
        }
    }
    Some(&word[start..])
}

/// Plausible rhymes for `target` built without a dictionary.
/// May include the target itself; the query engine filters it out.
pub fn generate_candidates(target: &str) -> Vec<String> {
    let token = normalize_token(target);
    let Some(tail) = rhyme_tail(&token) else {
        return Vec::new();
    };

    ONSETS
        .iter()
        .map(|onset| format!("{onset}{tail}"))
        .filter(|candidate| is_valid_word(candidate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_word() {
        for word in ["mate", "fate", "late", "gate", "date"] {
            assert!(is_valid_word(word), "{word}");
        }
        assert!(!is_valid_word(""));
        assert!(!is_valid_word("don't"));
        assert!(!is_valid_word("co-op"));
        assert!(!is_valid_word("abc1"));
        assert!(!is_valid_word("brrr"));
        assert!(!is_valid_word("tsk"));
    }

    #[test]
    fn test_rhyme_tail() {
        assert_eq!(rhyme_tail("mate"), Some("ate"));
        assert_eq!(rhyme_tail("rob"), Some("ob"));
        assert_eq!(rhyme_tail("night"), Some("ight"));
        assert_eq!(rhyme_tail("fly"), Some("y"));
        assert_eq!(rhyme_tail("tree"), Some("ee"));
        assert_eq!(rhyme_tail("be"), Some("e"));
        assert_eq!(rhyme_tail("brrr"), None);
        assert_eq!(rhyme_tail(""), None);
    }

    #[test]
    fn test_generate_candidates() {
        let candidates = generate_candidates("Mate!");
        for expected in ["bate", "date", "fate", "gate", "late", "mate", "crate", "state"] {
            assert!(candidates.contains(&expected.to_string()), "{expected}");
        }
        assert!(candidates.iter().all(|c| is_valid_word(c)));
    }

    #[test]
    fn test_generate_candidates_never_panics() {
        for raw in ["", "b", "brrr", "co-op", "don't", "ÉCOLE", "   ", "123"] {
            let candidates = generate_candidates(raw);
            assert!(candidates.iter().all(|c| is_valid_word(c)), "{raw}");
        }
        assert!(generate_candidates("brrr").is_empty());
        // apostrophes survive the loose cleanup and fail the shape gate
        assert!(generate_candidates("don't").is_empty());
    }
}
