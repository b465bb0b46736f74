//! HTML serialization of the document tree
//!
//! Walks a [`Document`] and writes HTML. Code blocks go through the
//! syntax highlighter; raw HTML from the source is passed through
//! verbatim (the sanitizer runs afterwards when enabled).

use std::collections::HashMap;

use super::document::{Block, Document, Inline, ListItem, OutlineEntry, TableAlignment};
use super::highlight::{normalize_language, SyntaxHighlighter};

/// Escape text for use in HTML content or a quoted attribute
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Result of serializing a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlOutput {
    pub html: String,
    /// Code blocks that received syntax classes
    pub highlighted_blocks: usize,
    /// Language tags the highlighter did not recognise, in document order
    pub unknown_languages: Vec<String>,
}

/// Serializer state for one document
pub struct HtmlWriter<'a> {
    highlighter: &'a SyntaxHighlighter,
    hard_breaks: bool,
    out: String,
    highlighted_blocks: usize,
    unknown_languages: Vec<String>,
    footnote_numbers: HashMap<String, usize>,
}

impl<'a> HtmlWriter<'a> {
    pub fn new(highlighter: &'a SyntaxHighlighter, hard_breaks: bool) -> Self {
        Self {
            highlighter,
            hard_breaks,
            out: String::new(),
            highlighted_blocks: 0,
            unknown_languages: Vec::new(),
            footnote_numbers: HashMap::new(),
        }
    }

    /// Serialize a whole document
    pub fn write(mut self, document: &Document) -> HtmlOutput {
        self.write_blocks(&document.blocks);
        HtmlOutput {
            html: self.out,
            highlighted_blocks: self.highlighted_blocks,
            unknown_languages: self.unknown_languages,
        }
    }

    /// Start block output on a fresh line
    fn fresh_line(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn footnote_number(&mut self, label: &str) -> usize {
        let next = self.footnote_numbers.len() + 1;
        *self
            .footnote_numbers
            .entry(label.to_string())
            .or_insert(next)
    }

    fn write_blocks(&mut self, blocks: &[Block]) {
        for block in blocks {
            self.write_block(block);
        }
    }

    fn write_block(&mut self, block: &Block) {
        match block {
            Block::Heading {
                level,
                id,
                classes,
                content,
            } => {
                self.fresh_line();
                self.out
                    .push_str(&format!("<h{} id=\"{}\"", level, escape_html(id)));
                if !classes.is_empty() {
                    self.out
                        .push_str(&format!(" class=\"{}\"", escape_html(&classes.join(" "))));
                }
                self.out.push('>');
                self.write_inlines(content);
                self.out.push_str(&format!("</h{}>\n", level));
            }
            Block::Paragraph(content) => {
                self.fresh_line();
                self.out.push_str("<p>");
                self.write_inlines(content);
                self.out.push_str("</p>\n");
            }
            Block::Plain(content) => self.write_inlines(content),
            Block::BlockQuote(children) => {
                self.fresh_line();
                self.out.push_str("<blockquote>\n");
                self.write_blocks(children);
                self.fresh_line();
                self.out.push_str("</blockquote>\n");
            }
            Block::CodeBlock { language, code } => {
                self.fresh_line();
                let block = self.highlighter.highlight_block(code, language.as_deref());
                if block.highlighted {
                    self.highlighted_blocks += 1;
                } else if let Some(language) = language
                    .as_deref()
                    .and_then(normalize_language)
                    .filter(|language| !self.highlighter.is_plain_text(language))
                {
                    self.unknown_languages.push(language);
                }
                self.out.push_str(&block.html);
            }
            Block::List { start, items } => self.write_list(*start, items),
            Block::Table {
                alignments,
                head,
                rows,
            } => {
                self.fresh_line();
                self.out.push_str("<table>\n<thead>\n<tr>");
                for (column, cell) in head.iter().enumerate() {
                    self.write_cell("th", alignments.get(column).copied(), cell);
                }
                self.out.push_str("</tr>\n</thead>\n");
                if !rows.is_empty() {
                    self.out.push_str("<tbody>\n");
                    for row in rows {
                        self.out.push_str("<tr>");
                        for (column, cell) in row.iter().enumerate() {
                            self.write_cell("td", alignments.get(column).copied(), cell);
                        }
                        self.out.push_str("</tr>\n");
                    }
                    self.out.push_str("</tbody>\n");
                }
                self.out.push_str("</table>\n");
            }
            Block::ThematicBreak => {
                self.fresh_line();
                self.out.push_str("<hr>\n");
            }
            Block::Html(html) => {
                self.fresh_line();
                self.out.push_str(html);
            }
            Block::FootnoteDefinition { label, blocks } => {
                self.fresh_line();
                let number = self.footnote_number(label);
                self.out.push_str(&format!(
                    "<div class=\"footnote-definition\" id=\"fn-{}\"><sup class=\"footnote-definition-label\">{}</sup>\n",
                    escape_html(label),
                    number
                ));
                self.write_blocks(blocks);
                self.fresh_line();
                self.out.push_str("</div>\n");
            }
        }
    }

    fn write_list(&mut self, start: Option<u64>, items: &[ListItem]) {
        self.fresh_line();
        match start {
            Some(1) => self.out.push_str("<ol>\n"),
            Some(n) => self.out.push_str(&format!("<ol start=\"{}\">\n", n)),
            None => self.out.push_str("<ul>\n"),
        }
        for item in items {
            match item.task {
                Some(checked) => {
                    self.out.push_str("<li class=\"task-list-item\">");
                    self.out.push_str(if checked {
                        "<input type=\"checkbox\" disabled=\"\" checked=\"\"> "
                    } else {
                        "<input type=\"checkbox\" disabled=\"\"> "
                    });
                }
                None => self.out.push_str("<li>"),
            }
            self.write_blocks(&item.blocks);
            self.out.push_str("</li>\n");
        }
        self.out
            .push_str(if start.is_some() { "</ol>\n" } else { "</ul>\n" });
    }

    fn write_cell(&mut self, tag: &str, alignment: Option<TableAlignment>, content: &[Inline]) {
        match alignment.unwrap_or_default() {
            TableAlignment::None => self.out.push_str(&format!("<{}>", tag)),
            TableAlignment::Left => {
                self.out
                    .push_str(&format!("<{} style=\"text-align: left\">", tag))
            }
            TableAlignment::Center => {
                self.out
                    .push_str(&format!("<{} style=\"text-align: center\">", tag))
            }
            TableAlignment::Right => {
                self.out
                    .push_str(&format!("<{} style=\"text-align: right\">", tag))
            }
        }
        self.write_inlines(content);
        self.out.push_str(&format!("</{}>", tag));
    }

    fn write_inlines(&mut self, inlines: &[Inline]) {
        for inline in inlines {
            self.write_inline(inline);
        }
    }

    fn write_inline(&mut self, inline: &Inline) {
        match inline {
            Inline::Text(text) => self.out.push_str(&escape_html(text)),
            Inline::Code(code) => {
                self.out.push_str("<code>");
                self.out.push_str(&escape_html(code));
                self.out.push_str("</code>");
            }
            Inline::Emphasis(children) => self.write_wrapped("em", children),
            Inline::Strong(children) => self.write_wrapped("strong", children),
            Inline::Strikethrough(children) => self.write_wrapped("del", children),
            Inline::Link {
                url,
                title,
                children,
            } => {
                self.out.push_str(&format!("<a href=\"{}\"", escape_html(url)));
                if !title.is_empty() {
                    self.out
                        .push_str(&format!(" title=\"{}\"", escape_html(title)));
                }
                self.out.push('>');
                self.write_inlines(children);
                self.out.push_str("</a>");
            }
            Inline::Image { url, title, alt } => {
                self.out.push_str(&format!(
                    "<img src=\"{}\" alt=\"{}\"",
                    escape_html(url),
                    escape_html(alt)
                ));
                if !title.is_empty() {
                    self.out
                        .push_str(&format!(" title=\"{}\"", escape_html(title)));
                }
                self.out.push('>');
            }
            Inline::Html(html) => self.out.push_str(html),
            Inline::FootnoteReference(label) => {
                let number = self.footnote_number(label);
                self.out.push_str(&format!(
                    "<sup class=\"footnote-reference\"><a href=\"#fn-{}\">{}</a></sup>",
                    escape_html(label),
                    number
                ));
            }
            Inline::SoftBreak if self.hard_breaks => self.out.push_str("<br>\n"),
            Inline::SoftBreak => self.out.push('\n'),
            Inline::HardBreak => self.out.push_str("<br>\n"),
        }
    }

    fn write_wrapped(&mut self, tag: &str, children: &[Inline]) {
        self.out.push_str(&format!("<{}>", tag));
        self.write_inlines(children);
        self.out.push_str(&format!("</{}>", tag));
    }
}

/// Render the document outline as a nested list of anchor links
pub fn toc_html(outline: &[OutlineEntry]) -> String {
    if outline.is_empty() {
        return String::new();
    }

    let mut toc = String::from("<nav class=\"toc\">\n");
    let base = outline.iter().map(|e| e.level).min().unwrap_or(1);
    let mut depth = 0;

    for entry in outline {
        let level = usize::from(entry.level - base) + 1;
        while depth < level {
            toc.push_str("<ul>\n");
            depth += 1;
        }
        while depth > level {
            toc.push_str("</ul>\n");
            depth -= 1;
        }
        toc.push_str(&format!(
            "<li><a href=\"#{}\">{}</a></li>\n",
            escape_html(&entry.id),
            escape_html(&entry.title)
        ));
    }

    while depth > 0 {
        toc.push_str("</ul>\n");
        depth -= 1;
    }

    toc.push_str("</nav>\n");
    toc
}
