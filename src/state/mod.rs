mod conversation;

pub use conversation::{ChatSession, RequestTicket, StreamProgress};
