mod api;
mod document;

pub use api::{CompletionRequest, CompletionToken};
pub use document::{BlockNode, CodeLine, InlineNode, RenderedTurn, Role, Turn};
