//! Flat transcript format.
//!
//! User input is wrapped in `[INST]`/`[/INST]`; everything outside a pair
//! belongs to the assistant. Assistant text is written bare, so the encoding
//! is asymmetric: two adjacent assistant turns decode as one.

use crate::markup::parse_blocks;
use crate::types::{RenderedTurn, Role, Turn};
use thiserror::Error;

pub const OPEN_SENTINEL: &str = "[INST]";
pub const CLOSE_SENTINEL: &str = "[/INST]";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("user turn opened at byte {offset} is never closed with {CLOSE_SENTINEL}")]
    UnterminatedUserTurn { offset: usize },
}

pub fn encode(turns: &[Turn]) -> String {
    let mut out = String::new();
    for turn in turns {
        match turn.role {
            Role::User => out.push_str(&user_turn(&turn.content)),
            Role::Assistant => out.push_str(&turn.content),
        }
    }
    out
}

/// Wire text for a single user turn.
pub fn user_turn(content: &str) -> String {
    format!("{OPEN_SENTINEL}{content}{CLOSE_SENTINEL}")
}

/// Splits a transcript into turns.
///
/// Empty user turns and whitespace-only assistant regions are dropped. An
/// opening sentinel without a closing one anywhere after it is a
/// [`ProtocolError`]; no partial result is returned.
pub fn decode(transcript: &str) -> Result<Vec<Turn>, ProtocolError> {
    let mut turns = Vec::new();
    let mut cursor = 0;

    while cursor < transcript.len() {
        let rest = &transcript[cursor..];
        let Some(open) = rest.find(OPEN_SENTINEL) else {
            push_assistant(&mut turns, rest);
            break;
        };

        push_assistant(&mut turns, &rest[..open]);

        let content_start = open + OPEN_SENTINEL.len();
        let Some(close) = rest[content_start..].find(CLOSE_SENTINEL) else {
            return Err(ProtocolError::UnterminatedUserTurn {
                offset: cursor + open,
            });
        };

        if close > 0 {
            turns.push(Turn::user(&rest[content_start..content_start + close]));
        }
        cursor += content_start + close + CLOSE_SENTINEL.len();
    }

    Ok(turns)
}

/// Decodes the transcript and parses every turn into blocks.
pub fn render_transcript(transcript: &str) -> Result<Vec<RenderedTurn>, ProtocolError> {
    Ok(decode(transcript)?
        .into_iter()
        .map(|turn| RenderedTurn {
            role: turn.role,
            blocks: parse_blocks(&turn.content),
        })
        .collect())
}

fn push_assistant(turns: &mut Vec<Turn>, text: &str) {
    if !text.trim().is_empty() {
        turns.push(Turn::assistant(text));
    }
}
