//! Block-level markdown document model.
//!
//! Changelogs are only ever inspected at the block level: headings are the
//! structure, everything else is opaque content that must survive a
//! parse/serialize cycle untouched. A [`Document`] is therefore a flat,
//! immutable list of [`Block`]s that keep their original source text.
//! Serialization joins blocks with a single blank line.
//!
//! Supported block constructs: ATX and setext headings, paragraphs, lists
//! (including blank-separated items and indented continuations), fenced and
//! indented code, block quotes, thematic breaks and raw HTML. Lines inside a
//! fenced code block or an HTML comment are never treated as headings, and
//! neither are indented lines that continue a list item.

use std::fmt;

/// The kind of a top-level block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// `#`-style or underlined heading with its depth (1-6).
    Heading {
        /// Heading depth, `1` for `#`.
        depth: u8,
    },
    /// Plain paragraph.
    Paragraph,
    /// Bullet or ordered list.
    List,
    /// Fenced or indented code.
    Code,
    /// Block quote.
    Quote,
    /// Thematic break (`---`, `***`, `___`).
    Rule,
    /// Raw HTML block.
    Html,
}

/// A single top-level block and its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    kind: BlockKind,
    source: String,
}

impl Block {
    /// What kind of block this is.
    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    /// The block's markdown source, without surrounding blank lines.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Heading depth, or `None` for non-heading blocks.
    pub const fn heading_depth(&self) -> Option<u8> {
        match self.kind {
            BlockKind::Heading { depth } => Some(depth),
            _ => None,
        }
    }

    /// Inline content flattened to plain text.
    ///
    /// For headings this strips the `#` markers (or setext underline) and all
    /// inline markup, so `## **1.2.0**` yields `1.2.0`.
    pub fn plain_text(&self) -> String {
        match self.kind {
            BlockKind::Heading { .. } => flatten_inline(&heading_inline(&self.source)),
            _ => flatten_inline(&self.source),
        }
    }
}

/// An immutable, ordered sequence of top-level blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    blocks: Vec<Block>,
}

impl Document {
    /// Parse markdown text into its top-level blocks.
    pub fn parse(text: &str) -> Self {
        let mut parser = Parser::default();
        for line in text.lines() {
            parser.feed(line);
        }
        Self {
            blocks: parser.finish(),
        }
    }

    /// All blocks in document order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of top-level blocks.
    pub const fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the document has no blocks.
    pub const fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// A new document holding the blocks in `start..end`.
    ///
    /// Bounds are clamped to the document, so an `end` past the last block
    /// means "to the end".
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.blocks.len());
        let start = start.min(end);
        Self {
            blocks: self.blocks[start..end].to_vec(),
        }
    }

    /// Serialize back to markdown.
    pub fn to_markdown(&self) -> String {
        self.blocks
            .iter()
            .map(Block::source)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_markdown())
    }
}

// ──────────────────────────────────────────────
// Block parser
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: char,
    len: usize,
    /// Indent of a fence opened inside a list item; `None` at top level.
    item_indent: Option<usize>,
}

#[derive(Debug)]
struct Pending {
    kind: BlockKind,
    lines: Vec<String>,
}

#[derive(Debug, Default)]
struct Parser {
    blocks: Vec<Block>,
    current: Option<Pending>,
    fence: Option<Fence>,
    blank_pending: bool,
}

impl Parser {
    fn feed(&mut self, line: &str) {
        if let Some(fence) = self.fence {
            let leaves_item = fence
                .item_indent
                .is_some_and(|indent| !line.trim().is_empty() && indent_width(line) < indent);
            if !leaves_item {
                self.push_line(line);
                if closes_fence(line, fence) {
                    self.fence = None;
                    if fence.item_indent.is_none() {
                        self.flush();
                    }
                }
                return;
            }
            // An outdented line ends the list item and any fence left open in it.
            self.fence = None;
            self.flush();
        }

        if self.in_open_comment() {
            self.push_line(line);
            return;
        }

        if line.trim().is_empty() {
            match self.current_kind() {
                Some(BlockKind::List | BlockKind::Code) => self.blank_pending = true,
                _ => self.flush(),
            }
            return;
        }

        if std::mem::take(&mut self.blank_pending) {
            let continues = match self.current_kind() {
                Some(BlockKind::List) => indent_width(line) >= 2 || is_list_item(line),
                Some(BlockKind::Code) => indent_width(line) >= 4,
                _ => false,
            };
            if continues {
                self.push_line("");
                self.continue_block(line);
                return;
            }
            self.flush();
        }

        if self.current_kind() == Some(BlockKind::List) && indent_width(line) >= 2 {
            self.continue_block(line);
            return;
        }

        if atx_heading(line).is_some() {
            self.flush();
            self.emit(heading_kind(line), line);
            return;
        }

        if self.current_kind() == Some(BlockKind::Paragraph)
            && let Some(depth) = setext_depth(line)
        {
            self.push_line(line);
            if let Some(pending) = self.current.as_mut() {
                pending.kind = BlockKind::Heading { depth };
            }
            self.flush();
            return;
        }

        if let Some(fence) = opening_fence(line) {
            self.flush();
            self.start(BlockKind::Code, line);
            self.fence = Some(fence);
            return;
        }

        if is_thematic_break(line) && self.current_kind() != Some(BlockKind::Code) {
            self.flush();
            self.emit(BlockKind::Rule, line);
            return;
        }

        match self.current_kind() {
            None => self.start(classify_first_line(line), line),
            Some(BlockKind::Paragraph) if is_list_item(line) => {
                self.flush();
                self.start(BlockKind::List, line);
            }
            Some(BlockKind::Paragraph) if opens_comment(line) => {
                self.flush();
                self.start(BlockKind::Html, line);
            }
            Some(BlockKind::Paragraph) if is_quote(line) => {
                self.flush();
                self.start(BlockKind::Quote, line);
            }
            Some(BlockKind::Code) if indent_width(line) < 4 => {
                // Indented code ends at the first non-indented line.
                self.flush();
                self.start(classify_first_line(line), line);
            }
            Some(_) => self.push_line(line),
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }

    /// Append a continuation line, tracking a fence it opens inside a list.
    fn continue_block(&mut self, line: &str) {
        self.push_line(line);
        if self.current_kind() == Some(BlockKind::List)
            && let Some(fence) = opening_fence(line.trim_start())
        {
            self.fence = Some(Fence {
                item_indent: Some(indent_width(line)),
                ..fence
            });
        }
    }

    /// Whether the pending block is an HTML comment still waiting for `-->`.
    fn in_open_comment(&self) -> bool {
        self.current.as_ref().is_some_and(|pending| {
            pending.kind == BlockKind::Html
                && pending.lines.first().is_some_and(|first| opens_comment(first))
                && !pending.lines.join("\n").trim_start()["<!--".len()..].contains("-->")
        })
    }

    fn current_kind(&self) -> Option<BlockKind> {
        self.current.as_ref().map(|pending| pending.kind)
    }

    fn start(&mut self, kind: BlockKind, line: &str) {
        self.current = Some(Pending {
            kind,
            lines: vec![line.to_string()],
        });
    }

    fn push_line(&mut self, line: &str) {
        match self.current.as_mut() {
            Some(pending) => pending.lines.push(line.to_string()),
            None => self.start(classify_first_line(line), line),
        }
    }

    fn emit(&mut self, kind: BlockKind, line: &str) {
        self.blocks.push(Block {
            kind,
            source: line.to_string(),
        });
    }

    fn flush(&mut self) {
        self.blank_pending = false;
        if let Some(mut pending) = self.current.take() {
            while pending.lines.last().is_some_and(|l| l.trim().is_empty()) {
                pending.lines.pop();
            }
            self.blocks.push(Block {
                kind: pending.kind,
                source: pending.lines.join("\n"),
            });
        }
    }
}

fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4 - (width % 4),
            _ => break,
        }
    }
    width
}

fn classify_first_line(line: &str) -> BlockKind {
    if indent_width(line) >= 4 {
        BlockKind::Code
    } else if is_list_item(line) {
        BlockKind::List
    } else if is_quote(line) {
        BlockKind::Quote
    } else if line.trim_start().starts_with('<') {
        BlockKind::Html
    } else {
        BlockKind::Paragraph
    }
}

fn heading_kind(line: &str) -> BlockKind {
    let depth = atx_heading(line).map_or(1, |(depth, _)| depth);
    BlockKind::Heading { depth }
}

/// Parse an ATX heading line into its depth and raw inline content.
fn atx_heading(line: &str) -> Option<(u8, &str)> {
    if indent_width(line) > 3 {
        return None;
    }
    let rest = line.trim_start();
    let hashes = rest.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let after = &rest[hashes..];
    if !after.is_empty() && !after.starts_with([' ', '\t']) {
        return None;
    }

    let content = after.trim();
    let without_closing = content.trim_end_matches('#');
    let content = if without_closing.is_empty() {
        ""
    } else if without_closing.ends_with([' ', '\t']) {
        without_closing.trim_end()
    } else {
        content
    };

    u8::try_from(hashes).ok().map(|depth| (depth, content))
}

fn setext_depth(line: &str) -> Option<u8> {
    if indent_width(line) > 3 {
        return None;
    }
    let trimmed = line.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c == '=') {
        Some(1)
    } else if !trimmed.is_empty() && trimmed.chars().all(|c| c == '-') {
        Some(2)
    } else {
        None
    }
}

fn heading_inline(source: &str) -> String {
    let mut lines: Vec<&str> = source.lines().collect();
    if let Some(first) = lines.first()
        && let Some((_, content)) = atx_heading(first)
    {
        return content.to_string();
    }
    // Setext: drop the underline, keep the paragraph lines.
    lines.pop();
    lines
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

fn opening_fence(line: &str) -> Option<Fence> {
    if indent_width(line) > 3 {
        return None;
    }
    let rest = line.trim_start();
    let marker = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = rest.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    // Backtick fences may not carry backticks in their info string.
    if marker == '`' && rest[len..].contains('`') {
        return None;
    }
    Some(Fence {
        marker,
        len,
        item_indent: None,
    })
}

fn closes_fence(line: &str, fence: Fence) -> bool {
    if indent_width(line) > fence.item_indent.unwrap_or(0) + 3 {
        return false;
    }
    let trimmed = line.trim();
    trimmed.len() >= fence.len && trimmed.chars().all(|c| c == fence.marker)
}

fn is_thematic_break(line: &str) -> bool {
    if indent_width(line) > 3 {
        return false;
    }
    let compact: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && matches!(compact[0], '-' | '*' | '_')
        && compact.iter().all(|c| *c == compact[0])
}

fn is_list_item(line: &str) -> bool {
    let rest = line.trim_start();
    let mut chars = rest.chars();
    match chars.next() {
        Some('-' | '*' | '+') => matches!(chars.next(), None | Some(' ' | '\t')),
        Some(c) if c.is_ascii_digit() => {
            let digits = rest.chars().take_while(char::is_ascii_digit).count();
            let after = &rest[digits..];
            digits <= 9
                && (after.starts_with(". ")
                    || after.starts_with(") ")
                    || after == "."
                    || after == ")")
        }
        _ => false,
    }
}

fn opens_comment(line: &str) -> bool {
    indent_width(line) <= 3 && line.trim_start().starts_with("<!--")
}

fn is_quote(line: &str) -> bool {
    indent_width(line) <= 3 && line.trim_start().starts_with('>')
}

// ──────────────────────────────────────────────
// Inline flattening
// ──────────────────────────────────────────────

/// A run of inline text, or a run of emphasis characters that may pair up.
#[derive(Debug)]
enum Inline {
    Text(String),
    Delimiter {
        marker: char,
        run: usize,
        can_open: bool,
        can_close: bool,
    },
}

/// Strip inline markup, keeping only the text a reader would see.
///
/// Emphasis and strikethrough markers are dropped only when they pair with a
/// partner; a lone `*` or `_` stays literal.
fn flatten_inline(text: &str) -> String {
    let pieces = inline_pieces(text);
    let paired = pair_delimiters(&pieces);

    let mut out = String::with_capacity(text.len());
    for (piece, paired) in pieces.iter().zip(paired) {
        match piece {
            Inline::Text(text) => out.push_str(text),
            Inline::Delimiter { .. } if paired => {}
            Inline::Delimiter { marker, run, .. } => out.extend(std::iter::repeat_n(*marker, *run)),
        }
    }
    out
}

fn push_text(pieces: &mut Vec<Inline>, text: &str) {
    if let Some(Inline::Text(last)) = pieces.last_mut() {
        last.push_str(text);
    } else {
        pieces.push(Inline::Text(text.to_string()));
    }
}

fn inline_pieces(text: &str) -> Vec<Inline> {
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' if chars.get(i + 1).is_some_and(char::is_ascii_punctuation) => {
                push_text(&mut pieces, &chars[i + 1].to_string());
                i += 2;
            }
            '`' => {
                let run = run_length(&chars, i, '`');
                if let Some(close) = find_code_close(&chars, i + run, run) {
                    let inner: String = chars[i + run..close].iter().collect();
                    push_text(&mut pieces, strip_code_padding(&inner));
                    i = close + run;
                } else {
                    push_text(&mut pieces, &"`".repeat(run));
                    i += run;
                }
            }
            '!' if chars.get(i + 1) == Some(&'[') => {
                i += 1;
            }
            '[' => {
                if let Some((label, next)) = link_text(&chars, i) {
                    push_text(&mut pieces, &flatten_inline(&label));
                    i = next;
                } else {
                    push_text(&mut pieces, "[");
                    i += 1;
                }
            }
            '<' => {
                if let Some(end) = chars[i + 1..].iter().position(|c| *c == '>') {
                    let inner: String = chars[i + 1..i + 1 + end].iter().collect();
                    if !inner.contains(char::is_whitespace)
                        && (inner.contains(':') || inner.contains('@'))
                    {
                        push_text(&mut pieces, &inner);
                        i += end + 2;
                        continue;
                    }
                }
                push_text(&mut pieces, "<");
                i += 1;
            }
            '*' | '_' | '~' => {
                let run = run_length(&chars, i, c);
                let prev = i.checked_sub(1).map(|p| chars[p]);
                let next = chars.get(i + run).copied();
                let (can_open, can_close) = flanking(c, run, prev, next);
                pieces.push(Inline::Delimiter {
                    marker: c,
                    run,
                    can_open,
                    can_close,
                });
                i += run;
            }
            _ => {
                push_text(&mut pieces, &c.to_string());
                i += 1;
            }
        }
    }

    pieces
}

/// Mark delimiter runs that close an earlier opener of the same marker.
fn pair_delimiters(pieces: &[Inline]) -> Vec<bool> {
    let mut paired = vec![false; pieces.len()];
    let mut openers: Vec<(usize, char)> = Vec::new();

    for (index, piece) in pieces.iter().enumerate() {
        let Inline::Delimiter {
            marker,
            can_open,
            can_close,
            ..
        } = *piece
        else {
            continue;
        };
        let opener = can_close
            .then(|| openers.iter().rposition(|(_, m)| *m == marker))
            .flatten();
        if let Some(pos) = opener {
            paired[openers[pos].0] = true;
            paired[index] = true;
            openers.truncate(pos);
        } else if can_open {
            openers.push((index, marker));
        }
    }

    paired
}

fn run_length(chars: &[char], start: usize, c: char) -> usize {
    chars[start..].iter().take_while(|x| **x == c).count()
}

fn find_code_close(chars: &[char], from: usize, run: usize) -> Option<usize> {
    let mut i = from;
    while i < chars.len() {
        if chars[i] == '`' {
            let len = run_length(chars, i, '`');
            if len == run {
                return Some(i);
            }
            i += len;
        } else {
            i += 1;
        }
    }
    None
}

fn strip_code_padding(inner: &str) -> &str {
    if inner.len() >= 2
        && inner.starts_with(' ')
        && inner.ends_with(' ')
        && !inner.trim().is_empty()
    {
        &inner[1..inner.len() - 1]
    } else {
        inner
    }
}

/// Whether a delimiter run can open and whether it can close emphasis.
fn flanking(c: char, run: usize, prev: Option<char>, next: Option<char>) -> (bool, bool) {
    let left = next.is_some_and(|n| !n.is_whitespace());
    let right = prev.is_some_and(|p| !p.is_whitespace());
    match c {
        '_' if prev.is_some_and(char::is_alphanumeric) && next.is_some_and(char::is_alphanumeric) => {
            (false, false)
        }
        '~' if run < 2 => (false, false),
        _ => (left, right),
    }
}

/// Parse `[label](dest)` or `[label][ref]` starting at `open`.
///
/// Returns the label and the index just past the construct. Shortcut
/// references (`[label]` alone) are left as literal text.
fn link_text(chars: &[char], open: usize) -> Option<(String, usize)> {
    let close = matching(chars, open, '[', ']')?;
    let label: String = chars[open + 1..close].iter().collect();
    match chars.get(close + 1) {
        Some('(') => {
            let end = matching(chars, close + 1, '(', ')')?;
            Some((label, end + 1))
        }
        Some('[') => {
            let end = matching(chars, close + 1, '[', ']')?;
            Some((label, end + 1))
        }
        _ => None,
    }
}

fn matching(chars: &[char], open: usize, open_char: char, close_char: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            c if c == open_char => depth += 1,
            c if c == close_char => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(doc: &Document) -> Vec<BlockKind> {
        doc.blocks().iter().map(Block::kind).collect()
    }

    #[test]
    fn parses_headings_and_paragraphs() {
        let doc = Document::parse("# Title\n\nSome text\nmore text\n\n## Sub\n");
        assert_eq!(
            kinds(&doc),
            vec![
                BlockKind::Heading { depth: 1 },
                BlockKind::Paragraph,
                BlockKind::Heading { depth: 2 },
            ]
        );
        assert_eq!(doc.blocks()[1].source(), "Some text\nmore text");
    }

    #[test]
    fn heading_interrupts_paragraph_without_blank_line() {
        let doc = Document::parse("intro\n## 1.0.0\nbody");
        assert_eq!(
            kinds(&doc),
            vec![
                BlockKind::Paragraph,
                BlockKind::Heading { depth: 2 },
                BlockKind::Paragraph,
            ]
        );
    }

    #[test]
    fn setext_headings_are_recognized() {
        let doc = Document::parse("Release\n=======\n\nNotes\n---\n\ntext");
        assert_eq!(doc.blocks()[0].heading_depth(), Some(1));
        assert_eq!(doc.blocks()[0].plain_text(), "Release");
        assert_eq!(doc.blocks()[1].heading_depth(), Some(2));
        assert_eq!(doc.blocks()[1].plain_text(), "Notes");
    }

    #[test]
    fn hashes_inside_fenced_code_are_not_headings() {
        let doc = Document::parse("```sh\n# not a heading\n\n# still code\n```\n\n# Real");
        assert_eq!(
            kinds(&doc),
            vec![BlockKind::Code, BlockKind::Heading { depth: 1 }]
        );
        assert!(doc.blocks()[0].source().contains("# still code"));
    }

    #[test]
    fn indented_hash_is_code_not_heading() {
        let doc = Document::parse("    # code");
        assert_eq!(kinds(&doc), vec![BlockKind::Code]);
    }

    #[test]
    fn loose_list_stays_one_block() {
        let doc = Document::parse("- a\n\n- b\n\n  continued\n\nafter");
        assert_eq!(kinds(&doc), vec![BlockKind::List, BlockKind::Paragraph]);
        assert_eq!(doc.blocks()[0].source(), "- a\n\n- b\n\n  continued");
    }

    #[test]
    fn list_interrupts_paragraph() {
        let doc = Document::parse("Changes:\n- one\n- two");
        assert_eq!(kinds(&doc), vec![BlockKind::Paragraph, BlockKind::List]);
    }

    #[test]
    fn thematic_break_and_quote() {
        let doc = Document::parse("> quoted\n> more\n\n***\n\n<div>x</div>");
        assert_eq!(
            kinds(&doc),
            vec![BlockKind::Quote, BlockKind::Rule, BlockKind::Html]
        );
    }

    #[test]
    fn atx_closing_sequence_is_stripped() {
        let doc = Document::parse("## 1.0.0 ##");
        assert_eq!(doc.blocks()[0].plain_text(), "1.0.0");
        let doc = Document::parse("## C#");
        assert_eq!(doc.blocks()[0].plain_text(), "C#");
    }

    #[test]
    fn hash_without_space_is_paragraph() {
        let doc = Document::parse("#hashtag");
        assert_eq!(kinds(&doc), vec![BlockKind::Paragraph]);
    }

    #[test]
    fn plain_text_strips_inline_markup() {
        assert_eq!(flatten_inline("**1.2.0**"), "1.2.0");
        assert_eq!(flatten_inline("_Minor_ Changes"), "Minor Changes");
        assert_eq!(flatten_inline("`code` span"), "code span");
        assert_eq!(flatten_inline("[1.0.0](https://x.y/z)"), "1.0.0");
        assert_eq!(flatten_inline("![alt](img.png) text"), "alt text");
        assert_eq!(flatten_inline("~~old~~ new"), "old new");
        assert_eq!(flatten_inline(r"\*literal\*"), "*literal*");
        assert_eq!(flatten_inline("<https://example.com>"), "https://example.com");
    }

    #[test]
    fn plain_text_keeps_intraword_underscores_and_lone_stars() {
        assert_eq!(flatten_inline("snake_case_name"), "snake_case_name");
        assert_eq!(flatten_inline("2 * 3"), "2 * 3");
        assert_eq!(flatten_inline("[1.0.0] - 2024-01-01"), "[1.0.0] - 2024-01-01");
    }

    #[test]
    fn fence_inside_list_item_stays_in_the_list() {
        let doc = Document::parse(
            "- abc: Add flag\n\n  ```sh\n  # apply the migration\n\n  npm i foo\n  ```\n\n- next\n\n## 1.0.0",
        );
        assert_eq!(
            kinds(&doc),
            vec![BlockKind::List, BlockKind::Heading { depth: 2 }]
        );
        assert!(doc.blocks()[0].source().ends_with("- next"));
    }

    #[test]
    fn fence_directly_under_list_item_stays_in_the_list() {
        let doc = Document::parse("- item\n  ```\n  # code\n  ```\n\n# After");
        assert_eq!(
            kinds(&doc),
            vec![BlockKind::List, BlockKind::Heading { depth: 1 }]
        );
    }

    #[test]
    fn unclosed_fence_in_list_ends_with_the_item() {
        let doc = Document::parse("- item\n\n  ```\n  code\n\n## 1.0.0\n\ntext");
        assert_eq!(doc.blocks()[0].source(), "- item\n\n  ```\n  code");
        assert_eq!(
            kinds(&doc),
            vec![
                BlockKind::List,
                BlockKind::Heading { depth: 2 },
                BlockKind::Paragraph,
            ]
        );
    }

    #[test]
    fn indented_hash_in_list_item_is_not_a_heading() {
        let doc = Document::parse("- item\n  # not top level\n\n# Top");
        assert_eq!(
            kinds(&doc),
            vec![BlockKind::List, BlockKind::Heading { depth: 1 }]
        );
    }

    #[test]
    fn html_comment_spans_blank_lines() {
        let doc = Document::parse("<!--\nTemplate:\n\n## x.y.z\n-->\n\n## 1.0.1");
        assert_eq!(
            kinds(&doc),
            vec![BlockKind::Html, BlockKind::Heading { depth: 2 }]
        );
        assert!(doc.blocks()[0].source().ends_with("-->"));
    }

    #[test]
    fn single_line_comment_closes_immediately() {
        let doc = Document::parse("<!-- note -->\n\n# Title");
        assert_eq!(
            kinds(&doc),
            vec![BlockKind::Html, BlockKind::Heading { depth: 1 }]
        );
    }

    #[test]
    fn comment_interrupts_paragraph() {
        let doc = Document::parse("intro\n<!--\n\n# hidden\n-->");
        assert_eq!(kinds(&doc), vec![BlockKind::Paragraph, BlockKind::Html]);
    }

    #[test]
    fn unpaired_emphasis_markers_stay_literal() {
        assert_eq!(flatten_inline("*1.0.0"), "*1.0.0");
        assert_eq!(flatten_inline("1.0.0_"), "1.0.0_");
        assert_eq!(flatten_inline("**bold** and *"), "bold and *");
        assert_eq!(flatten_inline("`*` *x*"), "* x");
    }

    #[test]
    fn slice_returns_new_document_and_clamps() {
        let doc = Document::parse("# a\n\nb\n\nc");
        let middle = doc.slice(1, 2);
        assert_eq!(middle.to_markdown(), "b");
        assert_eq!(doc.len(), 3);

        let tail = doc.slice(1, usize::MAX);
        assert_eq!(tail.to_markdown(), "b\n\nc");

        assert!(doc.slice(5, 2).is_empty());
    }

    #[test]
    fn serialization_normalizes_block_separation() {
        let doc = Document::parse("# a\n\n\n\nb\n");
        assert_eq!(doc.to_markdown(), "# a\n\nb");
        assert_eq!(doc.to_string(), "# a\n\nb");
    }

    #[test]
    fn reparse_of_serialized_document_is_stable() {
        let text = "# T\nintro\n- a\n\n- b\n\n```\n# x\n```\n\nSub\n---\n\n> q";
        let doc = Document::parse(text);
        let again = Document::parse(&doc.to_markdown());
        assert_eq!(doc, again);
    }

    #[test]
    fn empty_input_is_empty_document() {
        let doc = Document::parse("");
        assert!(doc.is_empty());
        assert_eq!(doc.to_markdown(), "");
    }
}
