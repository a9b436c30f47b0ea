pub mod config;
pub mod engine;
pub mod game;
pub mod room;
pub mod session;
pub mod store;
pub mod tokio_tools;

pub use config::{MatchConfig, RetryPolicy};
pub use engine::{resolve, Health, Move, Outcome, Resolution, MAX_HEALTH};
pub use game::{MatchCoordinator, MatchError, MatchSnapshot, Notice, Phase};
pub use room::{RoomCode, RoomEntry, RoomError};
pub use store::{DocumentStore, FirebaseDocumentStore, InMemoryDocumentStore, StoreError};
