pub mod manager;
mod runtime;
mod worker;

pub use manager::{MatchCoordinator, MatchError};
