pub mod document;
pub mod repository;
pub mod view;

pub use document::*;
pub use repository::{Apply, SessionRepository};
pub use view::{RoundView, SessionView, ViewChanges};
