use crate::types::InlineNode;

/// Leading shell prompt stripped before deciding whether code is runnable.
pub const PROMPT_MARKER: char = '$';

/// An opener nested deeper than this is treated like one that never closes.
pub const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Star,
    DoubleStar,
    Underscore,
    DoubleUnderscore,
    Backtick,
}

impl Marker {
    /// Doubled markers win over single ones; lookahead is one byte only.
    fn at(bytes: &[u8], index: usize) -> Option<Self> {
        let next = bytes.get(index + 1).copied();
        match bytes.get(index)? {
            b'*' if next == Some(b'*') => Some(Self::DoubleStar),
            b'*' => Some(Self::Star),
            b'_' if next == Some(b'_') => Some(Self::DoubleUnderscore),
            b'_' => Some(Self::Underscore),
            b'`' => Some(Self::Backtick),
            _ => None,
        }
    }

    pub fn literal(self) -> &'static str {
        match self {
            Self::Star => "*",
            Self::DoubleStar => "**",
            Self::Underscore => "_",
            Self::DoubleUnderscore => "__",
            Self::Backtick => "`",
        }
    }

    pub fn width(self) -> usize {
        self.literal().len()
    }

    fn wrap(self, children: Vec<InlineNode>) -> InlineNode {
        match self {
            Self::Star | Self::Underscore => InlineNode::Emphasis { children },
            Self::DoubleStar | Self::DoubleUnderscore => InlineNode::Strong { children },
            Self::Backtick => {
                let literal: String = children.iter().map(InlineNode::plain_text).collect();
                InlineNode::Code {
                    executable: is_executable(&literal),
                    children,
                }
            }
        }
    }
}

/// Result of scanning one span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanParse {
    /// Bytes of input consumed, including the closing marker when `closed`.
    pub consumed: usize,
    pub nodes: Vec<InlineNode>,
    /// False when input ended before the terminator was found.
    pub closed: bool,
}

pub fn parse_inline(text: &str) -> Vec<InlineNode> {
    parse_span(text, None).nodes
}

/// Scans `text` until `terminator` (or end of input when `None`).
///
/// An opener whose span never closes turns itself and everything after it
/// into literal text, so the enclosing span cannot close either.
pub fn parse_span(text: &str, terminator: Option<Marker>) -> SpanParse {
    scan(text, 0, terminator, 0)
}

/// Literal command text with any leading prompt marker removed.
pub fn command_text(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix(PROMPT_MARKER)
        .map(str::trim_start)
        .unwrap_or(trimmed)
}

/// A command line (as opposed to a bare token) still has whitespace once the
/// prompt marker is gone.
pub fn is_executable(text: &str) -> bool {
    command_text(text).contains(char::is_whitespace)
}

fn scan(input: &str, start: usize, terminator: Option<Marker>, depth: usize) -> SpanParse {
    let bytes = input.as_bytes();
    let mut nodes = Vec::new();
    let mut pending = String::new();
    let mut index = start;

    while index < bytes.len() {
        if bytes[index] == b'\\' {
            if let Some(escaped) = input[index + 1..].chars().next() {
                pending.push(escaped);
                index += 1 + escaped.len_utf8();
                continue;
            }
        }

        let Some(marker) = Marker::at(bytes, index) else {
            let Some(ch) = input[index..].chars().next() else {
                break;
            };
            pending.push(ch);
            index += ch.len_utf8();
            continue;
        };

        if Some(marker) == terminator {
            flush_text(&mut pending, &mut nodes);
            return SpanParse {
                consumed: index + marker.width(),
                nodes,
                closed: true,
            };
        }

        match open(input, index, marker, depth) {
            Ok((node, end)) => {
                flush_text(&mut pending, &mut nodes);
                nodes.push(node);
                index = end;
            }
            Err(end) => {
                pending.push_str(&input[index..end]);
                index = end;
            }
        }
    }

    flush_text(&mut pending, &mut nodes);
    SpanParse {
        consumed: bytes.len(),
        nodes,
        closed: terminator.is_none(),
    }
}

/// Parses the span opened by `marker` at `index`. `Err` carries the end of
/// the region to keep as literal text.
fn open(
    input: &str,
    index: usize,
    marker: Marker,
    depth: usize,
) -> Result<(InlineNode, usize), usize> {
    let content_start = index + marker.width();
    if marker == Marker::Backtick {
        return scan_code(input, content_start).ok_or(input.len());
    }
    if depth >= MAX_NESTING {
        return Err(input.len());
    }

    let inner = scan(input, content_start, Some(marker), depth + 1);
    if inner.closed {
        Ok((marker.wrap(inner.nodes), inner.consumed))
    } else {
        Err(inner.consumed)
    }
}

/// Code spans have their own scan: only an escaped backtick is special.
fn scan_code(input: &str, start: usize) -> Option<(InlineNode, usize)> {
    let bytes = input.as_bytes();
    let mut literal = String::new();
    let mut index = start;

    while index < bytes.len() {
        match bytes[index] {
            b'\\' if bytes.get(index + 1) == Some(&b'`') => {
                literal.push('`');
                index += 2;
            }
            b'`' => {
                let children = if literal.is_empty() {
                    Vec::new()
                } else {
                    vec![InlineNode::text(literal)]
                };
                return Some((Marker::Backtick.wrap(children), index + 1));
            }
            _ => {
                let ch = input[index..].chars().next()?;
                literal.push(ch);
                index += ch.len_utf8();
            }
        }
    }

    None
}

fn flush_text(pending: &mut String, nodes: &mut Vec<InlineNode>) {
    if !pending.is_empty() {
        nodes.push(InlineNode::text(std::mem::take(pending)));
    }
}
