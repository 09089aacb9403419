pub mod event;
pub mod turn;

pub use event::{RuntimeEvent, TurnUpdate};
pub use turn::{drive_turn, handle_event, spawn_turn, TurnOutcome};
