//! Frame lists, the ping-pong player and the status table that ties the AWG
//! command layer to the network-facing servers.

mod engine;
mod error;
mod list;
mod notifier;
mod player;

pub use awg_hw::MAX_WORDS_PER_FRAME;
pub use engine::{Engine, PlayerHandle};
pub use error::ListError;
pub use list::{List, MAX_TOTAL_FRAMES};
pub use notifier::ListState;
pub use player::DEFAULT_PERIOD_US;
