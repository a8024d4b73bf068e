//! Reversible tokenization of symbolic character runs.
//!
//! Generic serializers may re-escape or otherwise mangle multi-byte
//! symbolic characters (emoji and friends) embedded in free-form
//! strings. The [`SymbolMap`] sidesteps the problem for any text-based
//! format: every maximal run of symbolic characters is swapped for a
//! plain-ASCII placeholder token before serialization, and the tokens
//! are substituted back literally afterwards. The resulting byte stream
//! carries each symbol exactly as it appeared in the source.

use std::collections::HashMap;

use uuid::Uuid;

/// Returns true for characters that belong to a symbolic run.
///
/// Covers the emoji planes plus the joiners and modifiers that glue
/// multi-codepoint sequences together (ZWJ families, variation
/// selectors, keycaps, regional indicator pairs).
fn is_symbolic(c: char) -> bool {
    matches!(c as u32,
        0x200D                  // zero-width joiner
        | 0x20E3                // combining enclosing keycap
        | 0x203C | 0x2049       // double/interrobang punctuation emoji
        | 0xFE0E | 0xFE0F       // variation selectors
        | 0x2100..=0x214F       // letterlike symbols
        | 0x2190..=0x21FF       // arrows
        | 0x2300..=0x23FF       // miscellaneous technical
        | 0x25A0..=0x25FF       // geometric shapes
        | 0x2600..=0x27BF       // miscellaneous symbols, dingbats
        | 0x2934..=0x2935       // arrow emoji
        | 0x2B00..=0x2BFF       // arrows and stars
        | 0x3030 | 0x303D       // wavy dash, part alternation mark
        | 0x3297 | 0x3299       // circled ideographs
        | 0x1F000..=0x1FAFF     // emoji planes
    )
}

/// Bidirectional map between symbolic runs and their placeholder
/// tokens, stable per distinct run across one document.
#[derive(Debug, Default)]
pub struct SymbolMap {
    tokens: HashMap<String, String>,
}

impl SymbolMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every symbolic run in `text` with its token, minting a
    /// fresh token for runs not seen before.
    pub fn tokenize(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut run = String::new();

        for c in text.chars() {
            if is_symbolic(c) {
                run.push(c);
                continue;
            }
            if !run.is_empty() {
                out.push_str(self.token_for(&run));
                run.clear();
            }
            out.push(c);
        }
        if !run.is_empty() {
            out.push_str(self.token_for(&run));
        }

        out
    }

    /// Substitutes every known token in `text` back to its original run.
    pub fn restore(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (run, token) in &self.tokens {
            out = out.replace(token, run);
        }
        out
    }

    /// Returns true if no run has been tokenized yet.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn token_for(&mut self, run: &str) -> &str {
        self.tokens
            .entry(run.to_string())
            .or_insert_with(|| format!("sym-{}", Uuid::new_v4()))
    }
}
