pub mod codec;
pub mod connection;
pub mod dispatcher;
pub mod legacy;
pub mod modern;
pub mod packets;
pub mod state;

pub use codec::{CodecError, CodecResult};
pub use connection::Connection;
pub use dispatcher::{Action, Dispatcher, Notification};
pub use packets::*;
pub use state::*;
