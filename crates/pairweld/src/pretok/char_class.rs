//! # Codepoint Classification
//!
//! Boundary rules operate on a small categorical alphabet rather than raw
//! Unicode general categories. The mapping from codepoint to [`CharClass`]
//! delegates to the Unicode property tables behind the
//! [`CodepointClassifier`] seam; results are cached per codepoint.

use std::collections::HashMap;

use unicode_general_category::{GeneralCategory, get_general_category};

/// The categorical alphabet of the boundary rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharClass {
    /// Unicode letter categories plus combining marks.
    ///
    /// Marks classify as letters so they stay attached to their base letter.
    Letter,

    /// Unicode number categories.
    Digit,

    /// Whitespace other than the newline set.
    Whitespace,

    /// Unicode punctuation categories.
    Punctuation,

    /// Unicode symbol categories.
    Symbol,

    /// The fixed set `{U+000A, U+000D, U+0085, U+2028, U+2029}`.
    Newline,

    /// Everything else (controls, format chars, unassigned, ...).
    Other,
}

/// The set of codepoints classified as [`CharClass::Newline`].
pub const NEWLINE_SET: [char; 5] = ['\u{000A}', '\u{000D}', '\u{0085}', '\u{2028}', '\u{2029}'];

/// Oracle mapping a codepoint to its [`CharClass`].
pub trait CodepointClassifier {
    /// Classify a single codepoint.
    fn classify(
        &mut self,
        cp: char,
    ) -> CharClass;
}

/// [`CodepointClassifier`] backed by the Unicode general-category tables.
///
/// ASCII is resolved through a fixed table; everything else goes through a
/// per-codepoint cache in front of the property lookup.
pub struct UnicodeClassifier {
    ascii: [CharClass; 128],
    cache: HashMap<char, CharClass>,
}

impl Default for UnicodeClassifier {
    fn default() -> Self {
        let mut ascii = [CharClass::Other; 128];
        for (i, slot) in ascii.iter_mut().enumerate() {
            *slot = classify_uncached(i as u8 as char);
        }
        Self {
            ascii,
            cache: HashMap::new(),
        }
    }
}

impl CodepointClassifier for UnicodeClassifier {
    fn classify(
        &mut self,
        cp: char,
    ) -> CharClass {
        if (cp as u32) < 128 {
            return self.ascii[cp as usize];
        }
        *self
            .cache
            .entry(cp)
            .or_insert_with(|| classify_uncached(cp))
    }
}

fn classify_uncached(cp: char) -> CharClass {
    if NEWLINE_SET.contains(&cp) {
        return CharClass::Newline;
    }
    if cp.is_whitespace() {
        return CharClass::Whitespace;
    }
    use GeneralCategory::*;
    match get_general_category(cp) {
        UppercaseLetter | LowercaseLetter | TitlecaseLetter | ModifierLetter | OtherLetter
        | NonspacingMark | SpacingMark | EnclosingMark => CharClass::Letter,
        DecimalNumber | LetterNumber | OtherNumber => CharClass::Digit,
        SpaceSeparator => CharClass::Whitespace,
        DashPunctuation | OpenPunctuation | ClosePunctuation | ConnectorPunctuation
        | InitialPunctuation | FinalPunctuation | OtherPunctuation => CharClass::Punctuation,
        MathSymbol | CurrencySymbol | ModifierSymbol | OtherSymbol => CharClass::Symbol,
        _ => CharClass::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_classes() {
        let mut c = UnicodeClassifier::default();

        assert_eq!(c.classify('a'), CharClass::Letter);
        assert_eq!(c.classify('Z'), CharClass::Letter);
        assert_eq!(c.classify('7'), CharClass::Digit);
        assert_eq!(c.classify(' '), CharClass::Whitespace);
        assert_eq!(c.classify('\t'), CharClass::Whitespace);
        assert_eq!(c.classify('\n'), CharClass::Newline);
        assert_eq!(c.classify('\r'), CharClass::Newline);
        assert_eq!(c.classify('.'), CharClass::Punctuation);
        assert_eq!(c.classify('\''), CharClass::Punctuation);
        assert_eq!(c.classify('+'), CharClass::Symbol);
        assert_eq!(c.classify('$'), CharClass::Symbol);
        assert_eq!(c.classify('\u{0}'), CharClass::Other);
    }

    #[test]
    fn test_non_ascii_classes() {
        let mut c = UnicodeClassifier::default();

        assert_eq!(c.classify('é'), CharClass::Letter);
        assert_eq!(c.classify('日'), CharClass::Letter);
        // Combining acute accent stays with its base letter.
        assert_eq!(c.classify('\u{0301}'), CharClass::Letter);
        assert_eq!(c.classify('\u{2019}'), CharClass::Punctuation);
        assert_eq!(c.classify('\u{00A0}'), CharClass::Whitespace);
        assert_eq!(c.classify('\u{2028}'), CharClass::Newline);
        assert_eq!(c.classify('\u{0085}'), CharClass::Newline);
        assert_eq!(c.classify('€'), CharClass::Symbol);
    }

    #[test]
    fn test_cache_stability() {
        let mut c = UnicodeClassifier::default();
        let first = c.classify('語');
        assert_eq!(c.classify('語'), first);
    }
}
