//! Text cleanup applied before anything reaches speech output.
//!
//! Two passes: whole-word profanity filtering, then stripping of every
//! character speech markup could choke on. Only ASCII letters, digits,
//! whitespace and `. ' " , ? ! : ; +` survive.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Built-in profanity list, used when the config doesn't supply one.
pub const DEFAULT_BLOCKED_WORDS: &[&str] = &[
    "arse",
    "ass",
    "asshole",
    "bastard",
    "bitch",
    "bollocks",
    "bullshit",
    "crap",
    "cunt",
    "damn",
    "dick",
    "dickhead",
    "fuck",
    "fucked",
    "fucker",
    "fucking",
    "goddamn",
    "motherfucker",
    "piss",
    "pissed",
    "prick",
    "shit",
    "shitty",
    "slut",
    "twat",
    "wanker",
    "whore",
];

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^A-Za-z0-9\s.'",?!:;+]+"#).unwrap());

/// Compile a whole-word, case-insensitive alternation over `words`.
///
/// On failure returns the offending pattern alongside the regex error.
pub fn compile_word_filter(words: &[String]) -> Result<Regex, (String, regex::Error)> {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"(?i)\b(?:{alternation})\b");
    Regex::new(&pattern).map_err(|e| (pattern, e))
}

/// The built-in list as owned strings.
pub fn default_blocked_words() -> Vec<String> {
    DEFAULT_BLOCKED_WORDS
        .iter()
        .map(|w| w.to_string())
        .collect()
}

/// Check a character against the speech-safe set.
pub fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || c.is_whitespace() || ".'\",?!:;+".contains(c)
}

#[derive(Debug, Clone)]
pub struct Sanitizer {
    word_filter: Regex,
    placeholder: char,
}

impl Sanitizer {
    pub fn new(word_filter: Regex, placeholder: char) -> Self {
        Self {
            word_filter,
            placeholder,
        }
    }

    /// Replace each blocked word with a same-length run of the placeholder.
    pub fn filter<'a>(&self, text: &'a str) -> Cow<'a, str> {
        self.word_filter.replace_all(text, |caps: &Captures| {
            let len = caps[0].chars().count();
            std::iter::repeat_n(self.placeholder, len).collect::<String>()
        })
    }

    /// Filter, then strip everything outside the allowed set.
    ///
    /// Stripping can glue fragments back into a blocked word (`sh#it`),
    /// so the filter runs once more on the stripped text. That makes the
    /// whole operation idempotent.
    pub fn sanitize(&self, raw: &str) -> String {
        let filtered = self.filter(raw);
        let stripped = DISALLOWED.replace_all(&filtered, "");
        let clean = if stripped.len() == filtered.len() {
            stripped.into_owned()
        } else {
            self.filter(&stripped).into_owned()
        };
        debug_assert!(clean.chars().all(is_allowed));
        clean
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        let word_filter = compile_word_filter(&default_blocked_words()).unwrap();
        Self::new(word_filter, 'o')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRICKY: &[&str] = &[
        "",
        "plain words",
        "<speak>injected</speak>",
        "a & b && c",
        "sh#it happens",
        "What the FUCK?! said the dragon.",
        "caf\u{e9} \u{212a}elvin \u{17f}tar \u{2026} end",
        "tabs\tand\nnewlines",
        "math: 1+1 = 2; (yes) [no] {maybe}",
        "quotes \"double\" and 'single'",
        "emoji \u{1f409} dragon",
        "\u{0}\u{7}control",
    ];

    #[test]
    fn test_strips_disallowed_characters() {
        let s = Sanitizer::default();
        assert_eq!(s.sanitize("<b>bold</b> & co."), "bboldb  co.");
        assert_eq!(s.sanitize("a (small) test"), "a small test");
    }

    #[test]
    fn test_keeps_allowed_punctuation() {
        let s = Sanitizer::default();
        let text = r#"Hello, world! Is it "fine"? Yes: it's fine; 1+1."#;
        assert_eq!(s.sanitize(text), text);
    }

    #[test]
    fn test_filters_blocked_words_same_length() {
        let s = Sanitizer::default();
        assert_eq!(
            s.sanitize("well shit, the Bastard ran"),
            "well oooo, the ooooooo ran"
        );
    }

    #[test]
    fn test_filter_respects_word_boundaries() {
        let s = Sanitizer::default();
        // "class" and "assess" contain a blocked word but aren't one
        assert_eq!(s.sanitize("the class will assess"), "the class will assess");
    }

    #[test]
    fn test_stripping_cannot_reassemble_blocked_word() {
        let s = Sanitizer::default();
        assert_eq!(s.sanitize("sh#it happens"), "oooo happens");
    }

    #[test]
    fn test_custom_placeholder() {
        let filter = compile_word_filter(&["dragon".to_string()]).unwrap();
        let s = Sanitizer::new(filter, 'x');
        assert_eq!(s.sanitize("A Dragon appeared"), "A xxxxxx appeared");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Sanitizer::default().sanitize(""), "");
    }

    #[test]
    fn test_output_only_allowed_characters() {
        let s = Sanitizer::default();
        for input in TRICKY {
            let out = s.sanitize(input);
            assert!(
                out.chars().all(is_allowed),
                "disallowed char in {out:?} from {input:?}"
            );
        }
    }

    #[test]
    fn test_idempotent() {
        let s = Sanitizer::default();
        for input in TRICKY {
            let once = s.sanitize(input);
            assert_eq!(s.sanitize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_non_ascii_letters_removed() {
        let s = Sanitizer::default();
        // Kelvin sign and long s fold to ASCII letters case-insensitively; they must still go
        assert_eq!(s.sanitize("\u{212a}\u{17f}ok"), "ok");
    }
}
