//! Arena-backed YAML tree that keeps every byte of its source.
//!
//! The tree covers the block-style subset workflow files are written in:
//! mappings, sequences (including the compact `- key: value` form), plain,
//! quoted and block scalars, and flow collections kept verbatim. Indentation,
//! blank lines and comments are stored next to the nodes they precede, so a
//! parsed tree renders back to its exact source until a scalar is changed.

use crate::document::scalar::{self, ScalarStyle};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Text after a node on its header line: whitespace `gap` and the `# ...`
/// comment. A gap with an empty `text` is trailing whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EolComment {
    pub gap: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for TreeError {}

/// Header-line text of a node: separator after `:`/`-`, the node's own
/// inline text, and the line terminator.
#[derive(Debug, Clone, Default)]
struct Inline {
    lead: String,
    text: String,
    newline: String,
}

#[derive(Debug, Clone)]
struct Entry {
    leading: String,
    prefix: String,
    key_raw: String,
    key: String,
    colon: String,
    value: NodeId,
}

#[derive(Debug, Clone)]
struct SeqItem {
    leading: String,
    prefix: String,
    value: NodeId,
}

#[derive(Debug, Clone)]
struct ScalarNode {
    style: ScalarStyle,
    value: String,
    /// Anchor or tag written before the scalar, with its separator.
    props: String,
    /// Continuation lines after the header line, terminators included.
    body: String,
    parent_indent: usize,
    content_indent: usize,
}

#[derive(Debug, Clone)]
enum Kind {
    Mapping(Vec<Entry>),
    Sequence(Vec<SeqItem>),
    Scalar(ScalarNode),
}

#[derive(Debug, Clone)]
struct Node {
    inline: Inline,
    kind: Kind,
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    leading: String,
    trailing: String,
    comments: BTreeMap<NodeId, EolComment>,
    newline: String,
}

impl Tree {
    pub fn parse(source: &str) -> Result<Self, TreeError> {
        Parser::new(source).parse()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Value of the first entry named `key` in a mapping node.
    pub fn get(&self, map: NodeId, key: &str) -> Option<NodeId> {
        match &self.nodes.get(map.0)?.kind {
            Kind::Mapping(entries) => entries.iter().find(|e| e.key == key).map(|e| e.value),
            _ => None,
        }
    }

    pub fn entries(&self, map: NodeId) -> Vec<(&str, NodeId)> {
        match self.nodes.get(map.0).map(|n| &n.kind) {
            Some(Kind::Mapping(entries)) => {
                entries.iter().map(|e| (e.key.as_str(), e.value)).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn items(&self, seq: NodeId) -> Vec<NodeId> {
        match self.nodes.get(seq.0).map(|n| &n.kind) {
            Some(Kind::Sequence(items)) => items.iter().map(|i| i.value).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_mapping(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id.0).map(|n| &n.kind),
            Some(Kind::Mapping(_))
        )
    }

    /// Decoded value of a scalar node. Flow collections are not scalars.
    pub fn scalar(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id.0).map(|n| &n.kind) {
            Some(Kind::Scalar(s)) if s.style != ScalarStyle::Flow => Some(&s.value),
            _ => None,
        }
    }

    /// Replaces a scalar's value, re-encoding it in the closest style that
    /// represents it. Returns false when nothing changed.
    pub fn set_scalar(&mut self, id: NodeId, value: &str) -> bool {
        let newline = self.newline.clone();
        let Some(node) = self.nodes.get_mut(id.0) else {
            return false;
        };
        let Kind::Scalar(scalar) = &mut node.kind else {
            return false;
        };
        if scalar.value == value {
            return false;
        }

        let is_block = matches!(scalar.style, ScalarStyle::Literal | ScalarStyle::Folded);
        let repr = if is_block || value.contains('\n') {
            let (header, body) = scalar::encode_literal(
                value,
                scalar.content_indent,
                scalar.parent_indent,
                &newline,
            );
            if node.inline.newline.is_empty() {
                node.inline.newline = newline;
            }
            scalar.style = ScalarStyle::Literal;
            scalar.body = body;
            header
        } else {
            let (style, repr) = encode_inline(scalar.style, value);
            scalar.style = style;
            scalar.body.clear();
            repr
        };

        scalar.value = value.to_string();
        node.inline.text = format!("{}{}", scalar.props, repr);
        if node.inline.lead.is_empty() {
            node.inline.lead = " ".to_string();
        }
        true
    }

    /// End-of-line comment on the node's header line, `#` included.
    pub fn comment(&self, id: NodeId) -> Option<&str> {
        self.comments
            .get(&id)
            .map(|c| c.text.as_str())
            .filter(|text| !text.is_empty())
    }

    /// Writes `text` into the node's comment slot, keeping the existing gap.
    pub fn set_comment(&mut self, id: NodeId, text: &str) -> bool {
        let text = if text.starts_with('#') {
            text.to_string()
        } else {
            format!("# {text}")
        };

        match self.comments.get_mut(&id) {
            Some(existing) if existing.text == text => false,
            Some(existing) => {
                if existing.gap.is_empty() {
                    existing.gap = " ".to_string();
                }
                existing.text = text;
                true
            }
            None => {
                self.comments.insert(
                    id,
                    EolComment {
                        gap: " ".to_string(),
                        text,
                    },
                );
                true
            }
        }
    }

    /// Drops the node's end-of-line comment together with its gap.
    pub fn clear_comment(&mut self, id: NodeId) -> bool {
        self.comments
            .remove(&id)
            .is_some_and(|comment| !comment.text.is_empty())
    }

    /// Renders the tree. With a `width`, long single-line scalars are folded
    /// over several lines without changing their value.
    pub fn render(&self, width: Option<usize>) -> String {
        let mut out = String::with_capacity(self.leading.len() + self.trailing.len() + 1024);
        out.push_str(&self.leading);
        if let Some(root) = self.root {
            self.render_node(root, &mut out, width);
        }
        out.push_str(&self.trailing);
        out
    }

    fn render_node(&self, id: NodeId, out: &mut String, width: Option<usize>) {
        let node = &self.nodes[id.0];
        out.push_str(&node.inline.lead);
        self.render_text(node, out, width);
        if let Some(comment) = self.comments.get(&id) {
            out.push_str(&comment.gap);
            out.push_str(&comment.text);
        }
        out.push_str(&node.inline.newline);

        match &node.kind {
            Kind::Scalar(scalar) => out.push_str(&scalar.body),
            Kind::Mapping(entries) => {
                for entry in entries {
                    out.push_str(&entry.leading);
                    out.push_str(&entry.prefix);
                    out.push_str(&entry.key_raw);
                    out.push_str(&entry.colon);
                    self.render_node(entry.value, out, width);
                }
            }
            Kind::Sequence(items) => {
                for item in items {
                    out.push_str(&item.leading);
                    out.push_str(&item.prefix);
                    out.push('-');
                    self.render_node(item.value, out, width);
                }
            }
        }
    }

    fn render_text(&self, node: &Node, out: &mut String, width: Option<usize>) {
        if let (Some(width), Kind::Scalar(scalar)) = (width, &node.kind) {
            let foldable = matches!(
                scalar.style,
                ScalarStyle::Plain | ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted
            );
            if foldable && scalar.body.is_empty() && scalar.props.is_empty() {
                let column = out.rsplit('\n').next().map_or(0, |l| l.chars().count());
                if let Some(folded) = fold_scalar(
                    &node.inline.text,
                    scalar.style,
                    column,
                    width,
                    scalar.parent_indent + 2,
                    &self.newline,
                ) {
                    out.push_str(&folded);
                    return;
                }
            }
        }
        out.push_str(&node.inline.text);
    }
}

fn encode_inline(style: ScalarStyle, value: &str) -> (ScalarStyle, String) {
    match style {
        ScalarStyle::DoubleQuoted => (ScalarStyle::DoubleQuoted, scalar::encode_double(value)),
        ScalarStyle::SingleQuoted => match scalar::encode_single(value) {
            Some(repr) => (ScalarStyle::SingleQuoted, repr),
            None => (ScalarStyle::DoubleQuoted, scalar::encode_double(value)),
        },
        _ if scalar::is_plain_safe(value) => (ScalarStyle::Plain, value.to_string()),
        _ => (ScalarStyle::DoubleQuoted, scalar::encode_double(value)),
    }
}

/// Greedy fold of a single-line scalar at single spaces. `None` when it fits
/// or has no place to break.
fn fold_scalar(
    text: &str,
    style: ScalarStyle,
    column: usize,
    width: usize,
    indent: usize,
    newline: &str,
) -> Option<String> {
    if column + text.chars().count() <= width {
        return None;
    }

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let quoted = style != ScalarStyle::Plain;
    let (first, last) = if quoted {
        (2, chars.len().saturating_sub(2))
    } else {
        (1, chars.len().saturating_sub(1))
    };

    let mut segments = Vec::new();
    let mut start = 0;
    for k in first..last {
        let (offset, c) = chars[k];
        if c != ' ' {
            continue;
        }
        let prev = chars[k - 1].1;
        let next = chars[k + 1].1;
        if prev == ' ' || next == ' ' || prev == '\\' {
            continue;
        }
        if !quoted && starts_indicator(next) {
            continue;
        }
        segments.push(&text[start..offset]);
        start = offset + 1;
    }
    segments.push(&text[start..]);
    if segments.len() < 2 {
        return None;
    }

    let mut out = String::with_capacity(text.len() + 16);
    let mut col = column;
    let mut broke = false;
    for (i, segment) in segments.iter().enumerate() {
        let len = segment.chars().count();
        if i > 0 {
            if col + 1 + len > width {
                out.push_str(newline);
                out.push_str(&" ".repeat(indent));
                col = indent;
                broke = true;
            } else {
                out.push(' ');
                col += 1;
            }
        }
        out.push_str(segment);
        col += len;
    }
    broke.then_some(out)
}

fn starts_indicator(c: char) -> bool {
    matches!(
        c,
        '#' | '-' | '?' | ':' | ',' | '[' | ']' | '{' | '}' | '&' | '*' | '!' | '|' | '>' | '\''
            | '"' | '%' | '@' | '`'
    )
}

#[derive(Debug, Clone, Copy)]
struct Line<'s> {
    text: &'s str,
    nl: &'s str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    MappingValue,
    SequenceItem,
}

struct KeyLine {
    key_len: usize,
    colon_end: usize,
}

struct Parser<'s> {
    lines: Vec<Line<'s>>,
    pos: usize,
    nodes: Vec<Node>,
    comments: BTreeMap<NodeId, EolComment>,
    newline: String,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        let lines = source
            .split_inclusive('\n')
            .map(|raw| {
                if let Some(text) = raw.strip_suffix("\r\n") {
                    Line { text, nl: "\r\n" }
                } else if let Some(text) = raw.strip_suffix('\n') {
                    Line { text, nl: "\n" }
                } else {
                    Line { text: raw, nl: "" }
                }
            })
            .collect::<Vec<_>>();
        let newline = lines
            .iter()
            .map(|l| l.nl)
            .find(|nl| !nl.is_empty())
            .unwrap_or("\n")
            .to_string();

        Self {
            lines,
            pos: 0,
            nodes: Vec::new(),
            comments: BTreeMap::new(),
            newline,
        }
    }

    fn parse(mut self) -> Result<Tree, TreeError> {
        let mut seen_marker = false;
        while self.pos < self.lines.len() {
            let text = self.lines[self.pos].text;
            if is_document_marker(text) {
                if seen_marker {
                    return Err(self.error(self.pos, "multiple documents are not supported"));
                }
                seen_marker = true;
            } else if !is_trivia(text) && !text.starts_with('%') {
                break;
            }
            self.pos += 1;
        }
        let leading = self.raw(0, self.pos);

        let root = if self.pos < self.lines.len() {
            let indent = self.indent_at(self.pos)?;
            let text = self.lines[self.pos].text;
            let content = &text[indent..];
            if is_dash(content) {
                Some(self.parse_sequence(indent, None)?)
            } else if self.key_line(self.pos, content)?.is_some() {
                Some(self.parse_mapping(indent, None)?)
            } else {
                return Err(self.error(self.pos, "document root must be a mapping or a sequence"));
            }
        } else {
            None
        };

        let trailing_start = self.pos;
        while self.pos < self.lines.len() {
            let text = self.lines[self.pos].text;
            if is_document_marker(text) {
                return Err(self.error(self.pos, "multiple documents are not supported"));
            }
            if !is_trivia(text) && text.trim_end() != "..." {
                return Err(self.error(self.pos, "unexpected content"));
            }
            self.pos += 1;
        }
        let trailing = self.raw(trailing_start, self.pos);

        Ok(Tree {
            nodes: self.nodes,
            root,
            leading,
            trailing,
            comments: self.comments,
            newline: self.newline,
        })
    }

    fn parse_mapping(&mut self, col: usize, inline: Option<&'s str>) -> Result<NodeId, TreeError> {
        let mut entries = Vec::new();
        let mut inline = inline;

        loop {
            let (leading, prefix, content) = match inline.take() {
                Some(content) => (String::new(), String::new(), content),
                None => {
                    let next = self.trivia_end(self.pos);
                    if next >= self.lines.len() {
                        break;
                    }
                    let indent = self.indent_at(next)?;
                    if indent < col {
                        break;
                    }
                    if indent > col {
                        return Err(self.error(next, "unexpected indentation"));
                    }
                    let text = self.lines[next].text;
                    if self.key_line(next, &text[col..])?.is_none() {
                        break;
                    }
                    let leading = self.take_trivia();
                    (leading, text[..col].to_string(), &text[col..])
                }
            };

            let line = self.pos;
            let Some(key_line) = self.key_line(line, content)? else {
                return Err(self.error(line, "expected a mapping key"));
            };
            let key_raw = &content[..key_line.key_len];
            let colon = &content[key_line.key_len..key_line.colon_end];
            let rest = &content[key_line.colon_end..];
            let key = decode_key(key_raw);

            let rest_col = col + key_line.colon_end;
            let value = self.parse_value(rest, rest_col, col, Context::MappingValue)?;
            entries.push(Entry {
                leading,
                prefix,
                key_raw: key_raw.to_string(),
                key,
                colon: colon.to_string(),
                value,
            });
        }

        Ok(self.push(Kind::Mapping(entries)))
    }

    fn parse_sequence(
        &mut self,
        col: usize,
        inline: Option<&'s str>,
    ) -> Result<NodeId, TreeError> {
        let mut items = Vec::new();
        let mut inline = inline;

        loop {
            let (leading, prefix, content) = match inline.take() {
                Some(content) => (String::new(), String::new(), content),
                None => {
                    let next = self.trivia_end(self.pos);
                    if next >= self.lines.len() {
                        break;
                    }
                    let indent = self.indent_at(next)?;
                    if indent < col {
                        break;
                    }
                    if indent > col {
                        return Err(self.error(next, "unexpected indentation"));
                    }
                    let text = self.lines[next].text;
                    if !is_dash(&text[col..]) {
                        break;
                    }
                    let leading = self.take_trivia();
                    (leading, text[..col].to_string(), &text[col..])
                }
            };

            let value = self.parse_value(&content[1..], col + 1, col, Context::SequenceItem)?;
            items.push(SeqItem {
                leading,
                prefix,
                value,
            });
        }

        Ok(self.push(Kind::Sequence(items)))
    }

    /// Parses the node after a `key:` or `-` indicator. `self.pos` is on the
    /// indicator's line; the line is consumed here or by a compact child.
    fn parse_value(
        &mut self,
        rest: &'s str,
        rest_col: usize,
        parent_col: usize,
        context: Context,
    ) -> Result<NodeId, TreeError> {
        let line = self.pos;
        let nl = self.lines[line].nl;
        let lead_len = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        let (lead, after_lead) = rest.split_at(lead_len);
        let (props, text) = split_properties(after_lead);

        if text.is_empty() || text.starts_with('#') {
            self.pos += 1;
            let (lead, own, gap) = if props.is_empty() {
                ("", "", lead)
            } else {
                let trimmed = props.trim_end();
                (lead, trimmed, &props[trimmed.len()..])
            };
            let id = self.parse_nested(parent_col, context)?;
            self.set_inline(id, lead, own, nl);
            self.add_comment(id, gap, text);
            return Ok(id);
        }

        if context == Context::SequenceItem && props.is_empty() {
            let body_col = rest_col + lead_len;
            let compact = if is_dash(text) {
                Some(self.parse_sequence(body_col, Some(text))?)
            } else if self.key_line(line, text)?.is_some() {
                Some(self.parse_mapping(body_col, Some(text))?)
            } else {
                None
            };
            if let Some(id) = compact {
                self.set_inline(id, lead, "", "");
                return Ok(id);
            }
        }

        self.pos += 1;
        match text.as_bytes()[0] {
            b'|' | b'>' => self.parse_block_scalar(line, lead, props, text, parent_col),
            b'"' | b'\'' => self.parse_quoted(line, lead, props, text, parent_col),
            b'[' | b'{' => self.parse_flow(line, lead, props, text, parent_col),
            _ => self.parse_plain(line, lead, props, text, parent_col),
        }
    }

    /// The value of an indicator with nothing after it on its own line.
    fn parse_nested(&mut self, parent_col: usize, context: Context) -> Result<NodeId, TreeError> {
        let next = self.trivia_end(self.pos);
        if next < self.lines.len() {
            let indent = self.indent_at(next)?;
            let text = self.lines[next].text;
            let content = &text[indent..];
            if indent > parent_col {
                if is_dash(content) {
                    return self.parse_sequence(indent, None);
                }
                if self.key_line(next, content)?.is_some() {
                    return self.parse_mapping(indent, None);
                }
                return Ok(self.parse_detached_scalar(parent_col));
            }
            if indent == parent_col && context == Context::MappingValue && is_dash(content) {
                return self.parse_sequence(indent, None);
            }
        }

        Ok(self.push(Kind::Scalar(ScalarNode {
            style: ScalarStyle::Plain,
            value: String::new(),
            props: String::new(),
            body: String::new(),
            parent_indent: parent_col,
            content_indent: parent_col + 2,
        })))
    }

    /// A scalar that starts on the line after its indicator.
    fn parse_detached_scalar(&mut self, parent_col: usize) -> NodeId {
        let start = self.pos;
        let first = self.trivia_end(start);
        let mut end = first;
        let mut last = first;
        while end < self.lines.len() {
            let text = self.lines[end].text;
            if text.trim().is_empty() {
                end += 1;
                continue;
            }
            if indent_of(text) <= parent_col || (end > first && text.trim_start().starts_with('#'))
            {
                break;
            }
            end += 1;
            last = end;
        }

        let joined = self.lines[first..last]
            .iter()
            .map(|l| l.text.trim())
            .collect::<Vec<_>>()
            .join("\n");
        let (style, value) = match joined.as_bytes().first() {
            Some(b'"') if joined.ends_with('"') && joined.len() > 1 => {
                (ScalarStyle::DoubleQuoted, scalar::decode_double(&joined))
            }
            Some(b'\'') if joined.ends_with('\'') && joined.len() > 1 => {
                (ScalarStyle::SingleQuoted, scalar::decode_single(&joined))
            }
            Some(b'[' | b'{') => (ScalarStyle::Flow, joined.clone()),
            _ => (ScalarStyle::Plain, scalar::decode_plain(&joined)),
        };

        let body = self.raw(start, last);
        self.pos = last;
        self.push(Kind::Scalar(ScalarNode {
            style,
            value,
            props: String::new(),
            body,
            parent_indent: parent_col,
            content_indent: parent_col + 2,
        }))
    }

    fn parse_block_scalar(
        &mut self,
        line: usize,
        lead: &str,
        props: &str,
        text: &'s str,
        parent_col: usize,
    ) -> Result<NodeId, TreeError> {
        let header_end = text.find([' ', '\t']).unwrap_or(text.len());
        let header = &text[..header_end];
        if !header[1..]
            .chars()
            .all(|c| matches!(c, '1'..='9' | '+' | '-'))
        {
            return Err(self.error(line, "invalid block scalar header"));
        }
        let Some(trailer) = split_trailing(&text[header_end..]) else {
            return Err(self.error(line, "unexpected text after block scalar header"));
        };

        let chomping = scalar::chomping_of(header);
        let mut content_indent = scalar::indentation_indicator(header).map(|d| parent_col + d);
        let mut end = self.pos;
        let mut last_content = self.pos;
        while end < self.lines.len() {
            let body_line = self.lines[end].text;
            if body_line.trim().is_empty() {
                end += 1;
                continue;
            }
            let indent = indent_of(body_line);
            match content_indent {
                None if indent > parent_col => content_indent = Some(indent),
                None => break,
                Some(ci) if indent < ci => break,
                Some(_) => {}
            }
            end += 1;
            last_content = end;
        }

        let body_end = if chomping == scalar::Chomping::Keep {
            end
        } else {
            last_content
        };
        let content_indent = content_indent.unwrap_or(parent_col + 2);
        let content: Vec<&str> = self.lines[self.pos..body_end]
            .iter()
            .map(|l| l.text.get(content_indent..).unwrap_or(""))
            .collect();
        let folded = header.starts_with('>');
        let value = scalar::decode_block(&content, folded, chomping);

        let body = self.raw(self.pos, body_end);
        self.pos = body_end;
        let id = self.push(Kind::Scalar(ScalarNode {
            style: if folded {
                ScalarStyle::Folded
            } else {
                ScalarStyle::Literal
            },
            value,
            props: props.to_string(),
            body,
            parent_indent: parent_col,
            content_indent,
        }));
        self.set_inline(id, lead, &format!("{props}{header}"), self.lines[line].nl);
        self.add_comment(id, trailer.0, trailer.1);
        Ok(id)
    }

    fn parse_quoted(
        &mut self,
        line: usize,
        lead: &str,
        props: &str,
        text: &'s str,
        parent_col: usize,
    ) -> Result<NodeId, TreeError> {
        let double = text.starts_with('"');
        let decode = |repr: &str| {
            if double {
                scalar::decode_double(repr)
            } else {
                scalar::decode_single(repr)
            }
        };
        let style = if double {
            ScalarStyle::DoubleQuoted
        } else {
            ScalarStyle::SingleQuoted
        };

        if let Some(end) = find_quote_end(&text[1..], double) {
            let repr = &text[..end + 2];
            let Some((gap, comment)) = split_trailing(&text[end + 2..]) else {
                return Err(self.error(line, "unexpected text after quoted scalar"));
            };
            let id = self.push(Kind::Scalar(ScalarNode {
                style,
                value: decode(repr),
                props: props.to_string(),
                body: String::new(),
                parent_indent: parent_col,
                content_indent: parent_col + 2,
            }));
            self.set_inline(id, lead, &format!("{props}{repr}"), self.lines[line].nl);
            self.add_comment(id, gap, comment);
            return Ok(id);
        }

        let start = self.pos;
        let mut joined = text.to_string();
        loop {
            if self.pos >= self.lines.len() {
                return Err(self.error(line, "unterminated quoted scalar"));
            }
            let continuation = self.lines[self.pos].text;
            self.pos += 1;
            joined.push('\n');
            if let Some(end) = find_quote_end(continuation, double) {
                joined.push_str(&continuation[..=end]);
                break;
            }
            joined.push_str(continuation);
        }

        let body = self.raw(start, self.pos);
        let id = self.push(Kind::Scalar(ScalarNode {
            style,
            value: decode(&joined),
            props: props.to_string(),
            body,
            parent_indent: parent_col,
            content_indent: parent_col + 2,
        }));
        self.set_inline(id, lead, &format!("{props}{text}"), self.lines[line].nl);
        Ok(id)
    }

    fn parse_flow(
        &mut self,
        line: usize,
        lead: &str,
        props: &str,
        text: &'s str,
        parent_col: usize,
    ) -> Result<NodeId, TreeError> {
        let mut scanner = FlowScanner::default();
        if let Some(end) = scanner.feed(text) {
            let repr = &text[..=end];
            let Some((gap, comment)) = split_trailing(&text[end + 1..]) else {
                return Err(self.error(line, "unexpected text after flow collection"));
            };
            let id = self.push(Kind::Scalar(ScalarNode {
                style: ScalarStyle::Flow,
                value: repr.to_string(),
                props: props.to_string(),
                body: String::new(),
                parent_indent: parent_col,
                content_indent: parent_col + 2,
            }));
            self.set_inline(id, lead, &format!("{props}{repr}"), self.lines[line].nl);
            self.add_comment(id, gap, comment);
            return Ok(id);
        }

        let start = self.pos;
        let mut joined = text.to_string();
        loop {
            if self.pos >= self.lines.len() {
                return Err(self.error(line, "unterminated flow collection"));
            }
            let continuation = self.lines[self.pos].text;
            self.pos += 1;
            joined.push('\n');
            joined.push_str(continuation);
            if scanner.feed(continuation).is_some() {
                break;
            }
        }

        let body = self.raw(start, self.pos);
        let id = self.push(Kind::Scalar(ScalarNode {
            style: ScalarStyle::Flow,
            value: joined,
            props: props.to_string(),
            body,
            parent_indent: parent_col,
            content_indent: parent_col + 2,
        }));
        self.set_inline(id, lead, &format!("{props}{text}"), self.lines[line].nl);
        Ok(id)
    }

    fn parse_plain(
        &mut self,
        line: usize,
        lead: &str,
        props: &str,
        text: &'s str,
        parent_col: usize,
    ) -> Result<NodeId, TreeError> {
        let (repr, gap, comment) = split_plain_comment(text);
        if repr.starts_with("- ") || repr == "-" {
            return Err(self.error(line, "unexpected sequence entry"));
        }

        let start = self.pos;
        let mut raw_lines = vec![repr];
        if comment.is_empty() {
            let mut end = self.pos;
            let mut last = self.pos;
            while end < self.lines.len() {
                let continuation = self.lines[end].text;
                if continuation.trim().is_empty() {
                    end += 1;
                    continue;
                }
                if indent_of(continuation) <= parent_col
                    || continuation.trim_start().starts_with('#')
                {
                    break;
                }
                for blank in &self.lines[last..end] {
                    raw_lines.push(blank.text.trim());
                }
                let (content, _, trailing_comment) = split_plain_comment(continuation.trim());
                raw_lines.push(content);
                end += 1;
                last = end;
                if !trailing_comment.is_empty() {
                    break;
                }
            }
            self.pos = last;
        }

        let value = scalar::decode_plain(&raw_lines.join("\n"));
        let body = self.raw(start, self.pos);
        let id = self.push(Kind::Scalar(ScalarNode {
            style: ScalarStyle::Plain,
            value,
            props: props.to_string(),
            body,
            parent_indent: parent_col,
            content_indent: parent_col + 2,
        }));
        self.set_inline(id, lead, &format!("{props}{repr}"), self.lines[line].nl);
        self.add_comment(id, gap, comment);
        Ok(id)
    }

    fn push(&mut self, kind: Kind) -> NodeId {
        self.nodes.push(Node {
            inline: Inline::default(),
            kind,
        });
        NodeId(self.nodes.len() - 1)
    }

    fn set_inline(&mut self, id: NodeId, lead: &str, text: &str, newline: &str) {
        self.nodes[id.0].inline = Inline {
            lead: lead.to_string(),
            text: text.to_string(),
            newline: newline.to_string(),
        };
    }

    fn add_comment(&mut self, id: NodeId, gap: &str, text: &str) {
        if gap.is_empty() && text.is_empty() {
            return;
        }
        self.comments.insert(
            id,
            EolComment {
                gap: gap.to_string(),
                text: text.to_string(),
            },
        );
    }

    fn trivia_end(&self, from: usize) -> usize {
        let mut end = from;
        while end < self.lines.len() && is_trivia(self.lines[end].text) {
            end += 1;
        }
        end
    }

    fn take_trivia(&mut self) -> String {
        let end = self.trivia_end(self.pos);
        let raw = self.raw(self.pos, end);
        self.pos = end;
        raw
    }

    fn raw(&self, from: usize, to: usize) -> String {
        self.lines[from..to]
            .iter()
            .flat_map(|l| [l.text, l.nl])
            .collect()
    }

    fn indent_at(&self, index: usize) -> Result<usize, TreeError> {
        let text = self.lines[index].text;
        let indent = indent_of(text);
        if text[indent..].starts_with('\t') {
            return Err(self.error(index, "tabs are not allowed for indentation"));
        }
        Ok(indent)
    }

    fn key_line(&self, index: usize, content: &str) -> Result<Option<KeyLine>, TreeError> {
        split_key_line(content).map_err(|message| self.error(index, message))
    }

    fn error(&self, index: usize, message: &str) -> TreeError {
        TreeError {
            line: index + 1,
            message: message.to_string(),
        }
    }
}

fn indent_of(text: &str) -> usize {
    text.len() - text.trim_start_matches(' ').len()
}

fn is_trivia(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn is_document_marker(text: &str) -> bool {
    text == "---"
        || text
            .strip_prefix("---")
            .is_some_and(|rest| rest.trim().is_empty() || rest.trim_start().starts_with('#'))
}

fn is_dash(content: &str) -> bool {
    content == "-" || content.starts_with("- ") || content.starts_with("-\t")
}

fn decode_key(raw: &str) -> String {
    if raw.starts_with('"') {
        scalar::decode_double(raw)
    } else if raw.starts_with('\'') {
        scalar::decode_single(raw)
    } else {
        raw.to_string()
    }
}

/// Locates `key:` at the start of `content`.
fn split_key_line(content: &str) -> Result<Option<KeyLine>, &'static str> {
    if content == "?" || content.starts_with("? ") || content.starts_with("?\t") {
        return Err("complex mapping keys are not supported");
    }
    let bytes = content.as_bytes();
    let Some(&first) = bytes.first() else {
        return Ok(None);
    };
    if first == b'#' || is_dash(content) {
        return Ok(None);
    }

    let colon_follows = |i: usize| {
        bytes.get(i) == Some(&b':') && matches!(bytes.get(i + 1), None | Some(b' ' | b'\t'))
    };

    if first == b'"' || first == b'\'' {
        let Some(end) = find_quote_end(&content[1..], first == b'"') else {
            return Ok(None);
        };
        let key_len = end + 2;
        let spaces = content[key_len..].len() - content[key_len..].trim_start_matches(' ').len();
        if colon_follows(key_len + spaces) {
            return Ok(Some(KeyLine {
                key_len,
                colon_end: key_len + spaces + 1,
            }));
        }
        return Ok(None);
    }

    if matches!(first, b'[' | b'{' | b'&' | b'*' | b'!' | b'|' | b'>' | b'%' | b'@' | b'`') {
        return Ok(None);
    }

    for i in 0..bytes.len() {
        if bytes[i] == b'#' && i > 0 && matches!(bytes[i - 1], b' ' | b'\t') {
            return Ok(None);
        }
        if colon_follows(i) {
            let key_len = content[..i].trim_end().len();
            if key_len == 0 {
                return Ok(None);
            }
            return Ok(Some(KeyLine {
                key_len,
                colon_end: i + 1,
            }));
        }
    }
    Ok(None)
}

/// Index of the closing quote in `s`, which starts after the opening quote.
fn find_quote_end(s: &str, double: bool) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match (double, bytes[i]) {
            (true, b'\\') => i += 1,
            (true, b'"') => return Some(i),
            (false, b'\'') if bytes.get(i + 1) == Some(&b'\'') => i += 1,
            (false, b'\'') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Splits leading `&anchor` and `!tag` properties, separators included.
fn split_properties(s: &str) -> (&str, &str) {
    let mut consumed = 0;
    loop {
        let rest = &s[consumed..];
        if !(rest.starts_with('&') || rest.starts_with('!')) {
            break;
        }
        let end = rest.find([' ', '\t']).unwrap_or(rest.len());
        let after = &rest[end..];
        let spaces = after.len() - after.trim_start_matches([' ', '\t']).len();
        consumed += end + spaces;
    }
    s.split_at(consumed)
}

/// Whitespace and optional comment after a complete token. `None` when other
/// text follows.
fn split_trailing(after: &str) -> Option<(&str, &str)> {
    let trimmed = after.trim_start_matches([' ', '\t']);
    let gap = &after[..after.len() - trimmed.len()];
    if trimmed.is_empty() {
        Some((gap, ""))
    } else if trimmed.starts_with('#') && !gap.is_empty() {
        Some((gap, trimmed))
    } else {
        None
    }
}

/// Splits a plain scalar line into text, comment gap and comment.
fn split_plain_comment(text: &str) -> (&str, &str, &str) {
    let bytes = text.as_bytes();
    let hash = (1..bytes.len()).find(|&i| bytes[i] == b'#' && matches!(bytes[i - 1], b' ' | b'\t'));
    let (before, comment) = match hash {
        Some(i) => (&text[..i], &text[i..]),
        None => (text, ""),
    };
    let repr = before.trim_end_matches([' ', '\t']);
    (repr, &before[repr.len()..], comment)
}

/// Tracks bracket depth of a flow collection across lines.
#[derive(Default)]
struct FlowScanner {
    depth: usize,
    quote: Option<u8>,
}

impl FlowScanner {
    /// Feeds one line; returns the byte index that closes the collection.
    fn feed(&mut self, line: &str) -> Option<usize> {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            match self.quote {
                Some(b'"') if b == b'\\' => i += 1,
                Some(q) if b == q => {
                    if q == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                        i += 1;
                    } else {
                        self.quote = None;
                    }
                }
                Some(_) => {}
                None => match b {
                    b'"' | b'\'' => self.quote = Some(b),
                    b'[' | b'{' => self.depth += 1,
                    b']' | b'}' => {
                        self.depth = self.depth.saturating_sub(1);
                        if self.depth == 0 {
                            return Some(i);
                        }
                    }
                    b'#' if i > 0 && matches!(bytes[i - 1], b' ' | b'\t') => break,
                    _ => {}
                },
            }
            i += 1;
        }
        None
    }
}
