use super::inline::{is_executable, parse_inline};
use crate::types::{BlockNode, CodeLine, InlineNode};

pub const FENCE: &str = "```";

/// Verdict lines the health checker prints on their own; they carry no prose.
pub const STATUS_BANNERS: [&str; 2] = ["HEALTHY", "UNHEALTHY"];

/// Splits turn text into blocks. Regions between fences alternate
/// prose/code; a fence left open runs to the end of the text.
pub fn parse_blocks(text: &str) -> Vec<BlockNode> {
    let mut blocks = Vec::new();
    for (index, region) in text.split(FENCE).enumerate() {
        if index % 2 == 1 {
            blocks.push(parse_code_region(region));
        } else {
            blocks.extend(region.split("\n\n").filter_map(parse_paragraph));
        }
    }
    blocks
}

pub fn is_status_banner(line: &str) -> bool {
    STATUS_BANNERS.contains(&line.trim())
}

fn parse_code_region(region: &str) -> BlockNode {
    let (language, body) = match region.split_once('\n') {
        Some((info, body)) => {
            let info = info.trim();
            ((!info.is_empty()).then(|| info.to_string()), body)
        }
        None => (None, region),
    };

    let body = body.strip_suffix('\n').unwrap_or(body);
    let lines = if body.is_empty() {
        Vec::new()
    } else {
        body.split('\n')
            .map(|line| {
                let line = line.strip_suffix('\r').unwrap_or(line);
                CodeLine {
                    text: line.to_string(),
                    executable: is_executable(line),
                }
            })
            .collect()
    };

    BlockNode::CodeBlock { language, lines }
}

fn parse_paragraph(paragraph: &str) -> Option<BlockNode> {
    let lines: Vec<&str> = paragraph
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }

    if let Some(items) = list_items(&lines, unordered_item) {
        return Some(BlockNode::UnorderedList { items });
    }
    if let Some(items) = list_items(&lines, ordered_item) {
        return Some(BlockNode::OrderedList { items });
    }

    let rows: Vec<_> = lines
        .into_iter()
        .filter(|line| !is_status_banner(line))
        .map(parse_inline)
        .collect();
    (!rows.is_empty()).then_some(BlockNode::Paragraph { lines: rows })
}

fn list_items(
    lines: &[&str],
    item: fn(&str) -> Option<&str>,
) -> Option<Vec<Vec<InlineNode>>> {
    lines
        .iter()
        .map(|line| item(line).map(parse_inline))
        .collect()
}

/// `  * item` or `- item`; whitespace after the bullet is required.
fn unordered_item(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix(['*', '-'])?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim_start())
}

/// `1) item`, with optional leading whitespace.
fn ordered_item(line: &str) -> Option<&str> {
    let rest = line.trim_start();
    let digits = rest.len() - rest.trim_start_matches(|ch: char| ch.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rest = rest[digits..].strip_prefix(')')?;
    Some(rest.trim_start())
}
