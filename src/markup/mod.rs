//! Markup parsing for turn text: fenced code, paragraphs, lists and inline
//! spans. Everything here is a pure function over its input.

pub mod block;
pub mod inline;

pub use block::{is_status_banner, parse_blocks, FENCE, STATUS_BANNERS};
pub use inline::{
    command_text, is_executable, parse_inline, parse_span, Marker, SpanParse, PROMPT_MARKER,
};
