pub mod coordinator;
pub mod expiry;
pub mod handshake;
pub mod machine;
pub mod presentation;
pub mod reset;
pub mod reveal;

#[cfg(test)]
mod testing;

pub use coordinator::{MatchCoordinator, MatchError};
pub use expiry::ExpiryMonitor;
pub use machine::{Command, Effect, Event, MatchMachine};
pub use presentation::{MatchSnapshot, Notice, Phase, RevealDisclosure, Shown};
pub use reveal::{DisclosedMessages, RevealStep};
