pub mod error;
pub mod types;
pub mod config;
pub mod events;

pub use error::{RoomError, Result};
pub use types::*;
pub use config::*;
pub use events::RoomMessage;
