//! Markdown document tree
//!
//! Parses Markdown with pulldown-cmark into an owned tree of block and
//! inline nodes. The tree is what the HTML writer serializes and what the
//! outline (table of contents) is collected from. Parsing never fails:
//! malformed constructs come out as text and are recorded as
//! [`Degradation`]s.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;

use crate::error::Degradation;

/// Deepest frame stack the builder keeps. Nested containers and inline
/// spans opened past this depth are flattened into their parent so the
/// tree (and everything that walks it recursively) stays shallow.
pub const MAX_NESTING: usize = 128;

/// Parser extensions enabled for every render
pub fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

/// A parsed document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub blocks: Vec<Block>,
    /// Headings in document order
    pub outline: Vec<OutlineEntry>,
    /// Constructs the parser had to recover from
    pub degradations: Vec<Degradation>,
}

/// One heading in the document outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineEntry {
    pub level: u8,
    /// Anchor id, unique within the document
    pub id: String,
    /// Heading text without markup
    pub title: String,
}

/// Block-level node
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading {
        level: u8,
        id: String,
        classes: Vec<String>,
        content: Vec<Inline>,
    },
    Paragraph(Vec<Inline>),
    /// Inline content directly inside a container (tight list items)
    Plain(Vec<Inline>),
    BlockQuote(Vec<Block>),
    CodeBlock {
        language: Option<String>,
        code: String,
    },
    List {
        /// Start number for ordered lists, None for bullet lists
        start: Option<u64>,
        items: Vec<ListItem>,
    },
    Table {
        alignments: Vec<TableAlignment>,
        head: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    ThematicBreak,
    /// Raw HTML block, emitted verbatim
    Html(String),
    FootnoteDefinition {
        label: String,
        blocks: Vec<Block>,
    },
}

/// A list item; `task` is Some for GFM task list items
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub task: Option<bool>,
    pub blocks: Vec<Block>,
}

/// Table column alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableAlignment {
    #[default]
    None,
    Left,
    Center,
    Right,
}

/// Inline node
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Code(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Link {
        url: String,
        title: String,
        children: Vec<Inline>,
    },
    Image {
        url: String,
        title: String,
        alt: String,
    },
    /// Raw inline HTML, emitted verbatim
    Html(String),
    FootnoteReference(String),
    SoftBreak,
    HardBreak,
}

impl Inline {
    /// Append the text content of this node, without markup
    fn push_plain_text(&self, out: &mut String) {
        match self {
            Inline::Text(text) | Inline::Code(text) => out.push_str(text),
            Inline::Emphasis(children)
            | Inline::Strong(children)
            | Inline::Strikethrough(children)
            | Inline::Link { children, .. } => {
                for child in children {
                    child.push_plain_text(out);
                }
            }
            Inline::Image { alt, .. } => out.push_str(alt),
            Inline::SoftBreak | Inline::HardBreak => out.push(' '),
            Inline::Html(_) | Inline::FootnoteReference(_) => {}
        }
    }
}

/// Text content of a run of inlines
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        inline.push_plain_text(&mut out);
    }
    out
}

/// Generate a URL-safe anchor from heading text
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' {
            slug.push(c);
        } else if (c.is_whitespace() || c == '-') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug.to_string()
    }
}

impl Document {
    /// Parse Markdown into a document tree
    pub fn parse(markdown: &str) -> Self {
        let parser = Parser::new_ext(markdown, parser_options());
        let mut builder = TreeBuilder::new(markdown);

        for (event, range) in parser.into_offset_iter() {
            match event {
                Event::Start(tag) => builder.start(tag, range),
                Event::End(_) => builder.end(),
                Event::Text(text) => builder.push_inline(Inline::Text(text.into_string())),
                Event::Code(code) => builder.push_inline(Inline::Code(code.into_string())),
                Event::Html(html) => builder.push_html(html.into_string()),
                Event::FootnoteReference(label) => {
                    builder.push_inline(Inline::FootnoteReference(label.into_string()))
                }
                Event::SoftBreak => builder.push_inline(Inline::SoftBreak),
                Event::HardBreak => builder.push_inline(Inline::HardBreak),
                Event::Rule => builder.push_block(Block::ThematicBreak),
                Event::TaskListMarker(checked) => builder.set_task_checked(checked),
            }
        }

        builder.finish()
    }

    /// Number of fenced or indented code blocks, at any depth
    pub fn code_block_count(&self) -> usize {
        fn count(blocks: &[Block]) -> usize {
            blocks
                .iter()
                .map(|block| match block {
                    Block::CodeBlock { .. } => 1,
                    Block::BlockQuote(children) | Block::FootnoteDefinition { blocks: children, .. } => {
                        count(children)
                    }
                    Block::List { items, .. } => items.iter().map(|item| count(&item.blocks)).sum(),
                    _ => 0,
                })
                .sum()
        }
        count(&self.blocks)
    }
}

/// Node under construction while walking the event stream
#[derive(Debug)]
enum FrameKind {
    Root,
    Paragraph,
    Heading { level: u8, id: Option<String>, classes: Vec<String> },
    BlockQuote,
    CodeBlock { language: Option<String> },
    List { start: Option<u64>, items: Vec<ListItem> },
    Item { task: Option<bool> },
    FootnoteDefinition { label: String },
    Table {
        alignments: Vec<TableAlignment>,
        head: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    TableHead { cells: Vec<Vec<Inline>> },
    TableRow { cells: Vec<Vec<Inline>> },
    TableCell,
    Emphasis,
    Strong,
    Strikethrough,
    Link { url: String, title: String },
    Image { url: String, title: String },
}

impl FrameKind {
    /// Containers hold blocks; everything else collects inlines
    fn is_container(&self) -> bool {
        matches!(
            self,
            FrameKind::Root
                | FrameKind::BlockQuote
                | FrameKind::Item { .. }
                | FrameKind::FootnoteDefinition { .. }
        )
    }
}

/// Tags that may be flattened into their parent past [`MAX_NESTING`]
fn is_flattenable(tag: &Tag<'_>) -> bool {
    matches!(
        tag,
        Tag::BlockQuote
            | Tag::List(_)
            | Tag::FootnoteDefinition(_)
            | Tag::Emphasis
            | Tag::Strong
            | Tag::Strikethrough
            | Tag::Link(..)
            | Tag::Image(..)
    )
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    blocks: Vec<Block>,
    inlines: Vec<Inline>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            blocks: Vec::new(),
            inlines: Vec::new(),
        }
    }
}

/// Fold pending inline content into a trailing `Plain` block
fn finish_blocks(mut blocks: Vec<Block>, inlines: Vec<Inline>) -> Vec<Block> {
    if !inlines.is_empty() {
        blocks.push(Block::Plain(inlines));
    }
    blocks
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn table_alignment(alignment: &pulldown_cmark::Alignment) -> TableAlignment {
    match alignment {
        pulldown_cmark::Alignment::None => TableAlignment::None,
        pulldown_cmark::Alignment::Left => TableAlignment::Left,
        pulldown_cmark::Alignment::Center => TableAlignment::Center,
        pulldown_cmark::Alignment::Right => TableAlignment::Right,
    }
}

/// Strip leading blockquote markers (`>` plus one optional space)
fn strip_quote_markers(line: &str) -> &str {
    let mut rest = line;
    loop {
        let unindented = rest.trim_start_matches(' ');
        match unindented.strip_prefix('>') {
            Some(after) if rest.len() - unindented.len() <= 3 => {
                rest = after.strip_prefix(' ').unwrap_or(after);
            }
            _ => return rest,
        }
    }
}

/// Display columns taken by a run of prefix characters
fn columns(prefix: &str) -> usize {
    prefix.chars().map(|c| if c == '\t' { 4 } else { 1 }).sum()
}

/// Check whether a fenced code block has a closing fence.
///
/// A closing fence may be indented at most three columns past the
/// container content; deeper lines are code. The content column is
/// bounded by the opening fence's column, so a closing fence counts when
/// it is indented no further than `max(opening column, 3)`.
fn fence_is_closed(source: &str, range: Range<usize>) -> bool {
    let line_start = source[..range.start].rfind('\n').map_or(0, |i| i + 1);
    let Some(opening) = source[line_start..].lines().next().map(strip_quote_markers) else {
        return false;
    };
    let Some(fence_at) = opening.find(|c: char| c == '`' || c == '~') else {
        return true;
    };
    let marker = opening[fence_at..].chars().next().unwrap_or('`');
    let width = opening[fence_at..].chars().take_while(|c| *c == marker).count();
    let max_indent = columns(&opening[..fence_at]).max(3);

    let Some(block_source) = source.get(range) else {
        return false;
    };
    block_source
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .last()
        .map(strip_quote_markers)
        .map(|closing| {
            let fence = closing.trim_start_matches(|c: char| c == ' ' || c == '\t');
            let indent = columns(&closing[..closing.len() - fence.len()]);
            let fence = fence.trim_end();
            indent <= max_indent
                && fence.chars().count() >= width
                && fence.chars().all(|c| c == marker)
        })
        .unwrap_or(false)
}

struct TreeBuilder<'s> {
    source: &'s str,
    stack: Vec<Frame>,
    outline: Vec<OutlineEntry>,
    degradations: Vec<Degradation>,
    used_ids: HashMap<String, usize>,
    /// Stack height at each flattened start tag, innermost last
    flattened: Vec<usize>,
}

impl<'s> TreeBuilder<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            stack: vec![Frame::new(FrameKind::Root)],
            outline: Vec::new(),
            degradations: Vec::new(),
            used_ids: HashMap::new(),
            flattened: Vec::new(),
        }
    }

    /// Decide whether a start tag opens a frame or is flattened
    fn flatten(&mut self, tag: &Tag<'_>, range: &Range<usize>) -> bool {
        let flatten = match tag {
            // items follow their list
            Tag::Item => !matches!(
                self.stack.last().map(|frame| &frame.kind),
                Some(FrameKind::List { .. })
            ),
            tag => is_flattenable(tag) && self.stack.len() >= MAX_NESTING,
        };
        if flatten && self.flattened.is_empty() {
            let already_recorded = self
                .degradations
                .iter()
                .any(|d| matches!(d, Degradation::NestingFlattened { .. }));
            if !already_recorded {
                let line = self.line_of(range.start);
                log::debug!("Nesting deeper than {} flattened at line {}", MAX_NESTING, line);
                self.degradations
                    .push(Degradation::NestingFlattened { line, depth: MAX_NESTING });
            }
        }
        flatten
    }

    /// 1-based line number of a byte offset
    fn line_of(&self, offset: usize) -> usize {
        self.source
            .get(..offset)
            .map(|before| before.matches('\n').count() + 1)
            .unwrap_or(1)
    }

    /// Handle an end tag: flattened starts close nothing
    fn end(&mut self) {
        if self.flattened.last() == Some(&self.stack.len()) {
            self.flattened.pop();
            return;
        }
        self.close_frame();
    }

    fn top(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn push_frame(&mut self, kind: FrameKind) {
        self.stack.push(Frame::new(kind));
    }

    fn push_inline(&mut self, inline: Inline) {
        self.top().inlines.push(inline);
    }

    fn push_block(&mut self, block: Block) {
        let top = self.top();
        if !top.inlines.is_empty() {
            let inlines = std::mem::take(&mut top.inlines);
            top.blocks.push(Block::Plain(inlines));
        }
        top.blocks.push(block);
    }

    /// Block HTML arrives line by line; consecutive lines form one block
    fn push_html(&mut self, html: String) {
        let top = self.top();
        if !top.kind.is_container() {
            top.inlines.push(Inline::Html(html));
            return;
        }
        if top.inlines.is_empty() {
            if let Some(Block::Html(existing)) = top.blocks.last_mut() {
                existing.push_str(&html);
                return;
            }
        }
        self.push_block(Block::Html(html));
    }

    fn set_task_checked(&mut self, checked: bool) {
        let Some(index) = self
            .stack
            .iter()
            .rposition(|frame| matches!(frame.kind, FrameKind::Item { .. }))
        else {
            return;
        };
        // the marker belongs to a flattened item, not this one
        if self.flattened.last().is_some_and(|&height| height > index) {
            return;
        }
        self.stack[index].kind = FrameKind::Item {
            task: Some(checked),
        };
    }

    fn unique_id(&mut self, base: String) -> String {
        let count = self.used_ids.entry(base.clone()).or_insert(0);
        let id = if *count == 0 {
            base.clone()
        } else {
            format!("{}-{}", base, count)
        };
        *count += 1;
        if id != base {
            self.used_ids.entry(id.clone()).or_insert(1);
        }
        id
    }

    fn start(&mut self, tag: Tag<'_>, range: Range<usize>) {
        if self.flatten(&tag, &range) {
            self.flattened.push(self.stack.len());
            return;
        }
        let kind = match tag {
            Tag::Paragraph => FrameKind::Paragraph,
            Tag::Heading(level, id, classes) => FrameKind::Heading {
                level: heading_level(level),
                id: id.map(str::to_string),
                classes: classes.into_iter().map(str::to_string).collect(),
            },
            Tag::BlockQuote => FrameKind::BlockQuote,
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => {
                        if !fence_is_closed(self.source, range.clone()) {
                            let line = self.line_of(range.start);
                            log::debug!("Unterminated code fence at line {}", line);
                            self.degradations.push(Degradation::UnterminatedFence { line });
                        }
                        let info = info.trim();
                        (!info.is_empty()).then(|| info.to_string())
                    }
                    CodeBlockKind::Indented => None,
                };
                FrameKind::CodeBlock { language }
            }
            Tag::List(start) => FrameKind::List {
                start,
                items: Vec::new(),
            },
            Tag::Item => FrameKind::Item { task: None },
            Tag::FootnoteDefinition(label) => FrameKind::FootnoteDefinition {
                label: label.into_string(),
            },
            Tag::Table(alignments) => FrameKind::Table {
                alignments: alignments.iter().map(table_alignment).collect(),
                head: Vec::new(),
                rows: Vec::new(),
            },
            Tag::TableHead => FrameKind::TableHead { cells: Vec::new() },
            Tag::TableRow => FrameKind::TableRow { cells: Vec::new() },
            Tag::TableCell => FrameKind::TableCell,
            Tag::Emphasis => FrameKind::Emphasis,
            Tag::Strong => FrameKind::Strong,
            Tag::Strikethrough => FrameKind::Strikethrough,
            Tag::Link(_link_type, url, title) => FrameKind::Link {
                url: url.into_string(),
                title: title.into_string(),
            },
            Tag::Image(_link_type, url, title) => FrameKind::Image {
                url: url.into_string(),
                title: title.into_string(),
            },
        };
        self.push_frame(kind);
    }

    /// Close the innermost open node and attach it to its parent
    fn close_frame(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(Frame {
            kind,
            blocks,
            inlines,
        }) = self.stack.pop()
        else {
            return;
        };

        match kind {
            FrameKind::Root => {}
            FrameKind::Paragraph => self.push_block(Block::Paragraph(inlines)),
            FrameKind::Heading { level, id, classes } => {
                let title = plain_text(&inlines).trim().to_string();
                let id = self.unique_id(id.unwrap_or_else(|| slugify(&title)));
                self.outline.push(OutlineEntry {
                    level,
                    id: id.clone(),
                    title,
                });
                self.push_block(Block::Heading {
                    level,
                    id,
                    classes,
                    content: inlines,
                });
            }
            FrameKind::BlockQuote => {
                self.push_block(Block::BlockQuote(finish_blocks(blocks, inlines)));
            }
            FrameKind::CodeBlock { language } => {
                let code = plain_text(&inlines);
                self.push_block(Block::CodeBlock { language, code });
            }
            FrameKind::List { start, items } => self.push_block(Block::List { start, items }),
            FrameKind::Item { task } => {
                let item = ListItem {
                    task,
                    blocks: finish_blocks(blocks, inlines),
                };
                if let FrameKind::List { items, .. } = &mut self.top().kind {
                    items.push(item);
                }
            }
            FrameKind::FootnoteDefinition { label } => {
                self.push_block(Block::FootnoteDefinition {
                    label,
                    blocks: finish_blocks(blocks, inlines),
                });
            }
            FrameKind::Table {
                alignments,
                head,
                rows,
            } => self.push_block(Block::Table {
                alignments,
                head,
                rows,
            }),
            FrameKind::TableHead { cells } => {
                if let FrameKind::Table { head, .. } = &mut self.top().kind {
                    *head = cells;
                }
            }
            FrameKind::TableRow { cells } => {
                if let FrameKind::Table { rows, .. } = &mut self.top().kind {
                    rows.push(cells);
                }
            }
            FrameKind::TableCell => match &mut self.top().kind {
                FrameKind::TableHead { cells } | FrameKind::TableRow { cells } => {
                    cells.push(inlines)
                }
                _ => {}
            },
            FrameKind::Emphasis => self.push_inline(Inline::Emphasis(inlines)),
            FrameKind::Strong => self.push_inline(Inline::Strong(inlines)),
            FrameKind::Strikethrough => self.push_inline(Inline::Strikethrough(inlines)),
            FrameKind::Link { url, title } => self.push_inline(Inline::Link {
                url,
                title,
                children: inlines,
            }),
            FrameKind::Image { url, title } => self.push_inline(Inline::Image {
                url,
                title,
                alt: plain_text(&inlines),
            }),
        }
    }

    fn finish(mut self) -> Document {
        while self.stack.len() > 1 {
            self.close_frame();
        }
        let blocks = match self.stack.pop() {
            Some(root) => finish_blocks(root.blocks, root.inlines),
            None => Vec::new(),
        };
        Document {
            blocks,
            outline: self.outline,
            degradations: self.degradations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_and_paragraph() {
        let doc = Document::parse("# Hello\n\nThis is **bold** text.");
        assert_eq!(doc.blocks.len(), 2);
        assert!(matches!(&doc.blocks[0], Block::Heading { level: 1, id, .. } if id == "hello"));
        match &doc.blocks[1] {
            Block::Paragraph(inlines) => {
                assert!(inlines.iter().any(|i| matches!(i, Inline::Strong(_))));
                assert_eq!(plain_text(inlines), "This is bold text.");
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn test_fenced_code_language() {
        let doc = Document::parse("```python\nprint(1)\n```\n");
        assert_eq!(
            doc.blocks,
            vec![Block::CodeBlock {
                language: Some("python".to_string()),
                code: "print(1)\n".to_string(),
            }]
        );
        assert!(doc.degradations.is_empty());
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let doc = Document::parse("intro\n\n```rust\nfn main() {\n# not a heading");
        match doc.blocks.last() {
            Some(Block::CodeBlock { code, .. }) => assert!(code.contains("# not a heading")),
            other => panic!("expected code block, got {other:?}"),
        }
        assert_eq!(doc.degradations, vec![Degradation::UnterminatedFence { line: 3 }]);
        assert!(doc.outline.is_empty());
    }

    #[test]
    fn test_fence_inside_blockquote_is_closed() {
        let doc = Document::parse("> ```\n> code\n> ```\n");
        assert!(doc.degradations.is_empty());
    }

    #[test]
    fn test_overindented_closing_fence_is_code() {
        let doc = Document::parse("```\ncode\n    ```\n");
        assert_eq!(doc.degradations, vec![Degradation::UnterminatedFence { line: 1 }]);
        match &doc.blocks[0] {
            Block::CodeBlock { code, .. } => assert!(code.contains("    ```")),
            other => panic!("expected code block, got {other:?}"),
        }
    }

    #[test]
    fn test_indented_closing_fence_within_limit() {
        let doc = Document::parse("```\ncode\n   ```\n");
        assert!(doc.degradations.is_empty());
    }

    #[test]
    fn test_fence_inside_list_item_is_closed() {
        let doc = Document::parse("- item\n\n  ```rust\n  let x = 1;\n  ```\n\n- next\n");
        assert!(doc.degradations.is_empty());
        let nested = Document::parse("1. a\n   - b\n\n     ```\n     x\n     ```\n");
        assert!(nested.degradations.is_empty());
    }

    #[test]
    fn test_tight_list_items_are_plain() {
        let doc = Document::parse("- one\n- two\n");
        match &doc.blocks[0] {
            Block::List { start: None, items } => {
                assert_eq!(items.len(), 2);
                assert!(matches!(&items[0].blocks[0], Block::Plain(_)));
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_ordered_list_start() {
        let doc = Document::parse("3. three\n4. four\n");
        assert!(matches!(&doc.blocks[0], Block::List { start: Some(3), .. }));
    }

    #[test]
    fn test_task_list() {
        let doc = Document::parse("- [x] done\n- [ ] todo\n");
        match &doc.blocks[0] {
            Block::List { items, .. } => {
                assert_eq!(items[0].task, Some(true));
                assert_eq!(items[1].task, Some(false));
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_table() {
        let doc = Document::parse("| a | b |\n|:--|--:|\n| 1 | 2 |\n");
        match &doc.blocks[0] {
            Block::Table {
                alignments,
                head,
                rows,
            } => {
                assert_eq!(alignments, &vec![TableAlignment::Left, TableAlignment::Right]);
                assert_eq!(head.len(), 2);
                assert_eq!(rows.len(), 1);
                assert_eq!(plain_text(&rows[0][1]), "2");
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn test_inline_nodes() {
        let doc = Document::parse("*em* `code` [link](https://x.dev \"t\") ![alt *text*](a.png) ~~del~~");
        let Block::Paragraph(inlines) = &doc.blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(inlines.iter().any(|i| matches!(i, Inline::Emphasis(_))));
        assert!(inlines.iter().any(|i| matches!(i, Inline::Code(c) if c == "code")));
        assert!(inlines
            .iter()
            .any(|i| matches!(i, Inline::Link { url, title, .. } if url == "https://x.dev" && title == "t")));
        assert!(inlines
            .iter()
            .any(|i| matches!(i, Inline::Image { alt, .. } if alt == "alt text")));
        assert!(inlines.iter().any(|i| matches!(i, Inline::Strikethrough(_))));
    }

    #[test]
    fn test_block_html_is_kept_raw() {
        let doc = Document::parse("<script>alert(1)</script>\n\ntext");
        assert!(matches!(&doc.blocks[0], Block::Html(html) if html.contains("<script>")));
    }

    #[test]
    fn test_inline_html() {
        let doc = Document::parse("a <kbd>b</kbd> c");
        let Block::Paragraph(inlines) = &doc.blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(inlines.contains(&Inline::Html("<kbd>".to_string())));
    }

    #[test]
    fn test_duplicate_heading_ids() {
        let doc = Document::parse("# Intro\n\n# Intro\n\n## Intro");
        let ids: Vec<_> = doc.outline.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["intro", "intro-1", "intro-2"]);
    }

    #[test]
    fn test_explicit_heading_id() {
        let doc = Document::parse("# Title {#custom}");
        assert_eq!(doc.outline[0].id, "custom");
        assert_eq!(doc.outline[0].title, "Title");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Test 123!"), "test-123");
        assert_eq!(slugify("  a -- b  "), "a-b");
        assert_eq!(slugify("!!!"), "section");
    }

    #[test]
    fn test_code_block_count_nested() {
        let doc = Document::parse("> ```\n> a\n> ```\n\n- item\n\n      indented\n");
        assert_eq!(doc.code_block_count(), 2);
    }

    fn depth(blocks: &[Block]) -> usize {
        blocks
            .iter()
            .map(|block| match block {
                Block::BlockQuote(children) => 1 + depth(children),
                Block::List { items, .. } => {
                    1 + items.iter().map(|item| depth(&item.blocks)).max().unwrap_or(0)
                }
                _ => 0,
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_deep_blockquotes_are_flattened() {
        let text = format!("{}deep", "> ".repeat(20_000));
        let doc = Document::parse(&text);
        assert!(depth(&doc.blocks) < MAX_NESTING);
        assert!(matches!(
            doc.degradations.as_slice(),
            [Degradation::NestingFlattened { line: 1, depth: MAX_NESTING }]
        ));
        let mut innermost = &doc.blocks;
        while let [Block::BlockQuote(children)] = innermost.as_slice() {
            innermost = children;
        }
        assert!(matches!(innermost.as_slice(), [Block::Paragraph(inlines)] if plain_text(inlines) == "deep"));
    }

    #[test]
    fn test_deep_lists_are_flattened() {
        let text = format!("{}item", "- ".repeat(20_000));
        let doc = Document::parse(&text);
        assert!(depth(&doc.blocks) < MAX_NESTING);
        assert_eq!(doc.degradations.len(), 1);
        assert!(plain_text_of(&doc.blocks).contains("item"));
    }

    #[test]
    fn test_deep_emphasis_is_flattened() {
        let text = format!("{}x{}", "*a ".repeat(5_000), " b*".repeat(5_000));
        let doc = Document::parse(&text);
        assert!(plain_text_of(&doc.blocks).contains('x'));
    }

    #[test]
    fn test_shallow_nesting_untouched() {
        let doc = Document::parse("> > quote\n\n- a\n  - b\n");
        assert!(doc.degradations.is_empty());
        assert_eq!(depth(&doc.blocks), 2);
    }

    fn plain_text_of(blocks: &[Block]) -> String {
        let mut out = String::new();
        for block in blocks {
            match block {
                Block::Paragraph(inlines) | Block::Plain(inlines) => out.push_str(&plain_text(inlines)),
                Block::BlockQuote(children) => out.push_str(&plain_text_of(children)),
                Block::List { items, .. } => {
                    for item in items {
                        out.push_str(&plain_text_of(&item.blocks));
                    }
                }
                _ => {}
            }
        }
        out
    }

    #[test]
    fn test_footnotes() {
        let doc = Document::parse("Text[^1].\n\n[^1]: Note.");
        assert!(doc
            .blocks
            .iter()
            .any(|b| matches!(b, Block::FootnoteDefinition { label, .. } if label == "1")));
    }
}
