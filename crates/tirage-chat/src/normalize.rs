//! Text normalization ahead of classification.
//!
//! Produces two views of a message: `plain` (lowercased, accents folded,
//! whitespace collapsed) for phrase and number matching, and `deleet` (the
//! plain view with common character substitutions undone) for word lists.

/// Normalized views of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub plain: String,
    pub deleet: String,
}

impl NormalizedText {
    pub fn new(raw: &str) -> Self {
        let plain = fold(raw);
        let deleet = undo_leet(&plain);
        Self { plain, deleet }
    }

    /// Words of the de-obfuscated view, split on anything non-alphanumeric.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        split_words(&self.deleet)
    }

    /// Plain view without trailing punctuation, for short exact-phrase checks.
    pub fn bare(&self) -> &str {
        self.plain
            .trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
            .trim_start()
    }
}

fn split_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
}

/// Lowercase, fold accents and typographic quotes, collapse whitespace.
pub fn fold(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_space = true;
    for c in raw.chars().flat_map(char::to_lowercase) {
        let mapped = match c {
            'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' => 'a',
            'ç' => 'c',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ñ' => 'n',
            'ò' | 'ó' | 'ô' | 'ö' | 'õ' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ÿ' | 'ý' => 'y',
            '\u{2018}' | '\u{2019}' | '`' | '\u{b4}' => '\'',
            '\u{201c}' | '\u{201d}' | '\u{ab}' | '\u{bb}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            '\u{a0}' | '\u{202f}' => ' ',
            other => other,
        };
        if mapped == 'œ' {
            out.push_str("oe");
            last_space = false;
            continue;
        }
        if mapped.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(mapped);
            last_space = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Undo digit and symbol substitutions inside words (`1d10t` -> `idiot`).
///
/// Standalone numbers are left alone so `top 10` stays readable.
fn undo_leet(plain: &str) -> String {
    plain
        .split(' ')
        .map(|token| {
            let has_letter = token.chars().any(|c| c.is_alphabetic());
            if !has_letter {
                return token.to_string();
            }
            token
                .chars()
                .map(|c| match c {
                    '0' => 'o',
                    '1' => 'i',
                    '3' => 'e',
                    '4' | '@' => 'a',
                    '5' | '$' => 's',
                    '7' => 't',
                    '8' => 'b',
                    other => other,
                })
                .collect()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_lowercases_and_strips_accents() {
        assert_eq!(fold("Quel est le PROCHAIN Tirage ?"), "quel est le prochain tirage ?");
        assert_eq!(fold("Numéro chance"), "numero chance");
        assert_eq!(fold("t’es nul"), "t'es nul");
        assert_eq!(fold("cœur"), "coeur");
    }

    #[test]
    fn test_fold_collapses_whitespace() {
        assert_eq!(fold("  hello \t\n  world  "), "hello world");
        assert_eq!(fold(""), "");
    }

    #[test]
    fn test_deleet_words() {
        let text = NormalizedText::new("You are a 1d10t");
        assert!(text.words().any(|w| w == "idiot"));
        let text = NormalizedText::new("stup1d b0t");
        assert_eq!(text.words().collect::<Vec<_>>(), vec!["stupid", "bot"]);
    }

    #[test]
    fn test_deleet_keeps_plain_numbers() {
        let text = NormalizedText::new("top 10 numbers");
        assert_eq!(text.deleet, "top 10 numbers");
        assert_eq!(text.plain, "top 10 numbers");
    }

    #[test]
    fn test_bare_strips_trailing_punctuation() {
        let text = NormalizedText::new("Yes please!!! ");
        assert_eq!(text.bare(), "yes please");
    }

    #[test]
    fn test_words_keep_apostrophes_inside() {
        let text = NormalizedText::new("Qu'est-ce que c'est");
        let words: Vec<&str> = text.words().collect();
        assert_eq!(words, vec!["qu'est", "ce", "que", "c'est"]);
    }
}
