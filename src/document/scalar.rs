//! Decoding and encoding of YAML scalar representations.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
    /// Flow collection kept verbatim; never re-encoded.
    Flow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chomping {
    Clip,
    Strip,
    Keep,
}

/// Fold line contents of a multi-line flow scalar: single breaks become a
/// space, each empty line becomes a newline.
pub fn fold_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    let mut breaks = 0;
    let mut started = false;
    for line in lines {
        if line.is_empty() {
            breaks += 1;
            continue;
        }
        if started {
            if breaks > 0 {
                out.push_str(&"\n".repeat(breaks));
            } else {
                out.push(' ');
            }
        }
        out.push_str(line);
        breaks = 0;
        started = true;
    }
    out
}

/// Value of a plain scalar spanning one or more raw lines.
pub fn decode_plain(raw: &str) -> String {
    fold_lines(raw.split('\n').map(str::trim))
}

/// Value of a single-quoted scalar; `raw` includes the quotes.
pub fn decode_single(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    fold_quoted(inner).replace("''", "'")
}

/// Value of a double-quoted scalar; `raw` includes the quotes.
pub fn decode_double(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    unescape(&fold_quoted(inner))
}

fn fold_quoted(inner: &str) -> String {
    if !inner.contains('\n') {
        return inner.to_string();
    }
    let lines: Vec<&str> = inner.split('\n').collect();
    let last = lines.len() - 1;
    let trimmed = lines.iter().enumerate().map(|(i, line)| match i {
        0 => line.trim_end(),
        i if i == last => line.trim_start(),
        _ => line.trim(),
    });
    fold_lines(trimmed)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') | Some('\t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some('e') => out.push('\u{1b}'),
            Some('f') => out.push('\u{0c}'),
            Some('v') => out.push('\u{0b}'),
            Some('N') => out.push('\u{85}'),
            Some('_') => out.push('\u{a0}'),
            Some('x') => push_code(&mut out, &mut chars, 2),
            Some('u') => push_code(&mut out, &mut chars, 4),
            Some('U') => push_code(&mut out, &mut chars, 8),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn push_code(out: &mut String, chars: &mut std::str::Chars<'_>, digits: usize) {
    let code: String = chars.by_ref().take(digits).collect();
    match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => out.push_str(&code),
    }
}

/// Value of a block scalar from its de-indented content lines.
pub fn decode_block(lines: &[&str], folded: bool, chomping: Chomping) -> String {
    let last_content = lines.iter().rposition(|l| !l.is_empty());
    let (core, trailing) = match last_content {
        Some(idx) => (&lines[..=idx], lines.len() - idx - 1),
        None => (&lines[..0], lines.len()),
    };

    let mut value = if folded {
        fold_block(core)
    } else {
        core.join("\n")
    };

    match chomping {
        Chomping::Strip => {}
        Chomping::Clip => {
            if !core.is_empty() {
                value.push('\n');
            }
        }
        Chomping::Keep => {
            let breaks = if core.is_empty() { trailing } else { trailing + 1 };
            value.push_str(&"\n".repeat(breaks));
        }
    }
    value
}

fn fold_block(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut breaks = 0;
    let mut previous_spaced = false;
    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            breaks += 1;
            continue;
        }
        let spaced = line.starts_with(' ') || line.starts_with('\t');
        if i > 0 {
            if spaced || previous_spaced {
                out.push_str(&"\n".repeat(breaks + 1));
            } else if breaks > 0 {
                out.push_str(&"\n".repeat(breaks));
            } else {
                out.push(' ');
            }
        }
        out.push_str(line);
        breaks = 0;
        previous_spaced = spaced;
    }
    out
}

pub fn chomping_of(header: &str) -> Chomping {
    if header.contains('-') {
        Chomping::Strip
    } else if header.contains('+') {
        Chomping::Keep
    } else {
        Chomping::Clip
    }
}

pub fn indentation_indicator(header: &str) -> Option<usize> {
    header
        .chars()
        .find(|c| c.is_ascii_digit())
        .and_then(|c| c.to_digit(10))
        .map(|d| d as usize)
}

const INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
];

/// Whether `value` can be written as a plain scalar and still read back as the
/// same string.
pub fn is_plain_safe(value: &str) -> bool {
    let Some(first) = value.chars().next() else {
        return false;
    };
    if INDICATORS.contains(&first) || first.is_whitespace() {
        return false;
    }
    if value.ends_with(char::is_whitespace) || value.ends_with(':') {
        return false;
    }
    if value.contains(": ") || value.contains(" #") || value.contains('\t') {
        return false;
    }
    if value.chars().any(|c| c.is_control()) {
        return false;
    }
    !looks_typed(value)
}

fn looks_typed(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "false" | "yes" | "no" | "on" | "off" | "null" | "~" | ".nan" | ".inf" | "-.inf"
    ) || value.parse::<f64>().is_ok()
}

pub fn encode_single(value: &str) -> Option<String> {
    if value.chars().any(|c| c.is_control()) {
        return None;
    }
    Some(format!("'{}'", value.replace('\'', "''")))
}

pub fn encode_double(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Literal block header and body for `value`, content indented at
/// `content_indent` under a parent at `parent_indent`.
pub fn encode_literal(
    value: &str,
    content_indent: usize,
    parent_indent: usize,
    newline: &str,
) -> (String, String) {
    let core = value.trim_end_matches('\n');
    let trailing = value.len() - core.len();
    let chomp = match (core.is_empty(), trailing) {
        (_, 0) => "-",
        (false, 1) => "",
        _ => "+",
    };

    let indicator = if core.starts_with(' ') || core.starts_with('\n') {
        (content_indent - parent_indent).to_string()
    } else {
        String::new()
    };

    let mut body = String::new();
    if !core.is_empty() {
        for line in core.split('\n') {
            if !line.is_empty() {
                body.push_str(&" ".repeat(content_indent));
                body.push_str(line);
            }
            body.push_str(newline);
        }
    }
    let extra_breaks = if core.is_empty() {
        trailing
    } else {
        trailing.saturating_sub(1)
    };
    body.push_str(&newline.repeat(extra_breaks));

    (format!("|{indicator}{chomp}"), body)
}
