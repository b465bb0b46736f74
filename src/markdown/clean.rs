//! Input text cleaning
//!
//! Removes characters that confuse the parser or the display surface
//! before Markdown is parsed: stray control characters, zero-width
//! marks, exotic separators, pilcrows and replacement characters left
//! over from lossy decoding. Line endings are normalised to `\n` and the
//! text is NFC-composed. [`clean_html`] does the same for rendered HTML
//! and also drops pilcrow entities.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

/// Control characters other than tab, newline and carriage return
fn control_chars() -> &'static Regex {
    static CONTROL: OnceLock<Regex> = OnceLock::new();
    CONTROL.get_or_init(|| {
        Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F-\x{9F}]").expect("control character pattern is valid")
    })
}

/// Pilcrow entities in named, decimal or hex form
fn pilcrow_entities() -> &'static Regex {
    static PILCROW: OnceLock<Regex> = OnceLock::new();
    PILCROW.get_or_init(|| {
        Regex::new(r"(?i)&(?:para|#0*182|#x0*b6);").expect("pilcrow entity pattern is valid")
    })
}

/// Clean text before parsing. Returns the input unchanged (borrowed)
/// when nothing needs replacing.
pub fn clean_text(text: &str) -> Cow<'_, str> {
    if text.is_empty() || !needs_cleaning(text) {
        return Cow::Borrowed(text);
    }

    let mut cleaned = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                cleaned.push('\n');
            }
            '\u{2028}' | '\u{2029}' => cleaned.push('\n'),
            '\u{00a0}' | '\u{202f}' | '\u{2007}' => cleaned.push(' '),
            // zero-width joiner stays for emoji sequences
            '\u{00b6}' | '\u{fffd}' | '\u{2060}' | '\u{200b}' | '\u{200c}' | '\u{feff}' => {}
            _ => cleaned.push(c),
        }
    }

    let cleaned = control_chars().replace_all(&cleaned, "");
    Cow::Owned(cleaned.nfc().collect())
}

fn needs_cleaning(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(
            c,
            '\r' | '\u{2028}'
                | '\u{2029}'
                | '\u{00a0}'
                | '\u{202f}'
                | '\u{2007}'
                | '\u{00b6}'
                | '\u{fffd}'
                | '\u{2060}'
                | '\u{200b}'
                | '\u{200c}'
                | '\u{feff}'
        ) || (c.is_control() && c != '\n' && c != '\t')
            || !c.is_ascii()
    })
}

/// Clean rendered HTML: [`clean_text`] plus removal of pilcrow entities
pub fn clean_html(html: &str) -> Cow<'_, str> {
    let cleaned = clean_text(html);
    if !pilcrow_entities().is_match(&cleaned) {
        return cleaned;
    }
    Cow::Owned(pilcrow_entities().replace_all(&cleaned, "").into_owned())
}

/// Check if a character would be removed or replaced by [`clean_text`]
pub fn is_problematic_char(c: char) -> bool {
    let mut buf = [0u8; 4];
    let s: &str = c.encode_utf8(&mut buf);
    clean_text(s) != s
}
