mod bus;

pub use bus::{Callback, EventBus, EventKind, EventResult, Priority, ServerEvent};
