//! Async edit session: one controller per task, events in, reports out.

mod entity_form;
mod options;
mod saver;
mod session;

pub use entity_form::EntityForm;
pub use options::SessionOptions;
pub use saver::EntitySaver;
pub use session::{SessionError, SessionEvent, SessionHandle, SessionReport};
