mod state;
mod streaming;


pub use state::{ChatSession, RequestTicket};
pub use streaming::StreamProgress;
