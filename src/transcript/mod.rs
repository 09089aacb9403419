mod codec;

pub use codec::{
    decode, encode, render_transcript, user_turn, ProtocolError, CLOSE_SENTINEL, OPEN_SENTINEL,
};
