//! Event fan-out
//!
//! [`LocalNotifier`] delivers in-process; [`EventDispatcher`] delivers what
//! other instances published on Redis.

mod dispatcher;
mod local;

pub use dispatcher::EventDispatcher;
pub use local::LocalNotifier;
