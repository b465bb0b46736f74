//! Code block syntax highlighting
//!
//! Turns fenced code into HTML with class-based styling using syntect.
//! Colours come from a stylesheet supplied by the shell (or generated by
//! [`stylesheet`]), so the produced markup only carries `hl-` classes.
//! Unknown languages fall back to escaped plain `<pre><code>`; highlighting
//! never fails.

use std::sync::OnceLock;
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use super::html::escape_html;

/// Prefix for every class emitted by the highlighter
pub const CLASS_PREFIX: &str = "hl-";

/// Class on the `<pre>` of highlighted blocks
pub const BLOCK_CLASS: &str = "codehilite";

/// Fence tags that ask for unhighlighted code
const PLAIN_TEXT_TAGS: &[&str] = &["text", "txt", "plain", "plaintext", "none", "nohighlight"];

fn class_style() -> ClassStyle {
    ClassStyle::SpacedPrefixed { prefix: CLASS_PREFIX }
}

/// Output of highlighting a single block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightedBlock {
    /// HTML fragment (`<pre>...</pre>`)
    pub html: String,
    /// True when syntax classes were applied, false for the plain fallback
    pub highlighted: bool,
}

/// Syntax highlighter owning the syntect syntax definitions
pub struct SyntaxHighlighter {
    syntax_set: SyntaxSet,
}

impl SyntaxHighlighter {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
        }
    }

    /// Shared instance; loading syntax definitions is expensive
    pub fn shared() -> &'static SyntaxHighlighter {
        static SHARED: OnceLock<SyntaxHighlighter> = OnceLock::new();
        SHARED.get_or_init(SyntaxHighlighter::new)
    }

    fn lookup(&self, language: &str) -> Option<&SyntaxReference> {
        self.syntax_set
            .find_syntax_by_token(language)
            .or_else(|| self.syntax_set.find_syntax_by_extension(language))
    }

    fn is_plain_syntax(&self, syntax: &SyntaxReference) -> bool {
        syntax.name == self.syntax_set.find_syntax_plain_text().name
    }

    /// Look up a syntax for a fence info string. Plain text counts as
    /// "not found".
    fn syntax_for(&self, language: &str) -> Option<&SyntaxReference> {
        self.lookup(language)
            .filter(|syntax| !self.is_plain_syntax(syntax))
    }

    /// Whether a language tag explicitly asks for plain text
    pub fn is_plain_text(&self, language: &str) -> bool {
        let Some(language) = normalize_language(language) else {
            return false;
        };
        PLAIN_TEXT_TAGS.contains(&language.as_str())
            || self
                .lookup(&language)
                .is_some_and(|syntax| self.is_plain_syntax(syntax))
    }

    /// Check whether a language tag would be highlighted
    pub fn supports(&self, language: &str) -> bool {
        normalize_language(language)
            .map(|lang| self.syntax_for(&lang).is_some())
            .unwrap_or(false)
    }

    /// Highlight a code block, reporting whether highlighting applied
    pub fn highlight_block(&self, code: &str, language: Option<&str>) -> HighlightedBlock {
        let Some(language) = language.and_then(normalize_language) else {
            return plain_block(code);
        };
        let Some(syntax) = self.syntax_for(&language) else {
            log::debug!("No syntax for code block language '{}'", language);
            return plain_block(code);
        };

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntax_set, class_style());
        for line in LinesWithEndings::from(code) {
            if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
                log::warn!("Highlighting '{}' failed, using plain text: {}", language, e);
                return plain_block(code);
            }
        }

        HighlightedBlock {
            html: format!(
                "<pre class=\"{}\"><code class=\"language-{}\">{}</code></pre>\n",
                BLOCK_CLASS,
                escape_html(&language),
                generator.finalize()
            ),
            highlighted: true,
        }
    }

    /// Highlight a code block into an HTML fragment
    pub fn highlight(&self, code: &str, language: Option<&str>) -> String {
        self.highlight_block(code, language).html
    }
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

/// Highlight with the shared highlighter. Never fails.
pub fn highlight(code: &str, language: Option<&str>) -> String {
    SyntaxHighlighter::shared().highlight(code, language)
}

/// Escaped, class-free fallback
fn plain_block(code: &str) -> HighlightedBlock {
    HighlightedBlock {
        html: format!("<pre><code>{}</code></pre>\n", escape_html(code)),
        highlighted: false,
    }
}

/// Reduce a fence info string to a lookup token: first word, lower case,
/// without `{.lang}` / `.lang` decoration or trailing attributes.
pub fn normalize_language(info: &str) -> Option<String> {
    let word = info
        .split(|c: char| c.is_whitespace() || c == ',')
        .next()?
        .trim_start_matches('{')
        .trim_start_matches('.')
        .trim_end_matches('}');
    if word.is_empty() {
        None
    } else {
        Some(word.to_lowercase())
    }
}

/// Generate the highlighter stylesheet for a syntect theme name
pub fn stylesheet(theme_name: &str) -> Option<String> {
    let themes = ThemeSet::load_defaults();
    let theme = themes.themes.get(theme_name)?;
    match css_for_theme_with_class_style(theme, class_style()) {
        Ok(css) => Some(css),
        Err(e) => {
            log::warn!("Could not generate CSS for theme '{}': {}", theme_name, e);
            None
        }
    }
}

/// Names of the bundled themes usable with [`stylesheet`]
pub fn theme_names() -> Vec<String> {
    let mut names: Vec<String> = ThemeSet::load_defaults().themes.into_keys().collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_language_falls_back() {
        let html = highlight("x=1", Some("unknownlang"));
        assert_eq!(html, "<pre><code>x=1</code></pre>\n");
        assert!(!html.contains("class="));
    }

    #[test]
    fn test_fallback_escapes_markup() {
        let html = highlight("<b>&</b>", None);
        assert_eq!(html, "<pre><code>&lt;b&gt;&amp;&lt;/b&gt;</code></pre>\n");
    }

    #[test]
    fn test_python_is_highlighted() {
        let block = SyntaxHighlighter::shared().highlight_block("print(1)\n", Some("python"));
        assert!(block.highlighted);
        assert!(block.html.starts_with("<pre class=\"codehilite\"><code class=\"language-python\">"));
        assert!(block.html.contains("hl-"));
        assert!(block.html.contains("print"));
    }

    #[test]
    fn test_extension_alias() {
        let block = SyntaxHighlighter::shared().highlight_block("fn main() {}\n", Some("rs"));
        assert!(block.highlighted);
    }

    #[test]
    fn test_plain_text_language_is_fallback() {
        let block = SyntaxHighlighter::shared().highlight_block("just words\n", Some("txt"));
        assert!(!block.highlighted);
    }

    #[test]
    fn test_is_plain_text() {
        let highlighter = SyntaxHighlighter::shared();
        assert!(highlighter.is_plain_text("text"));
        assert!(highlighter.is_plain_text("TXT"));
        assert!(highlighter.is_plain_text("plaintext"));
        assert!(!highlighter.is_plain_text("python"));
        assert!(!highlighter.is_plain_text("unknownlang"));
        assert!(!highlighter.is_plain_text(""));
    }

    #[test]
    fn test_highlighting_is_deterministic() {
        let code = "def f(x):\n    return x * 2\n";
        assert_eq!(highlight(code, Some("python")), highlight(code, Some("python")));
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("Python"), Some("python".to_string()));
        assert_eq!(normalize_language("rust,ignore"), Some("rust".to_string()));
        assert_eq!(normalize_language("{.js}"), Some("js".to_string()));
        assert_eq!(normalize_language("python title=\"x\""), Some("python".to_string()));
        assert_eq!(normalize_language("   "), None);
        assert_eq!(normalize_language(""), None);
    }

    #[test]
    fn test_supports() {
        let highlighter = SyntaxHighlighter::shared();
        assert!(highlighter.supports("python"));
        assert!(!highlighter.supports("unknownlang"));
    }

    #[test]
    fn test_stylesheet_for_default_theme() {
        let css = stylesheet("base16-ocean.dark").unwrap();
        assert!(css.contains(".hl-"));
        assert!(stylesheet("no-such-theme").is_none());
    }

    #[test]
    fn test_theme_names_sorted_and_usable() {
        let names = theme_names();
        assert!(names.contains(&"base16-ocean.dark".to_string()));
        assert!(names.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(names.iter().all(|name| stylesheet(name).is_some()));
    }
}
