pub mod codec;
pub mod message;

pub use codec::{CodecError, LineCodec};
pub use message::{Message, NamesReply, ParseError, Sender};
