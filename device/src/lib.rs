pub mod commands;
pub mod discovery;
pub mod node;
pub mod repository;

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    Emitter,
    Receiver,
    Both,
}

impl Role {
    /// Emitters answer discovery and accept listeners.
    pub fn emits(&self) -> bool {
        matches!(self, Role::Emitter | Role::Both)
    }

    /// Receivers broadcast discovery and listen to emitters.
    pub fn receives(&self) -> bool {
        matches!(self, Role::Receiver | Role::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Emitter => "emitter",
            Role::Receiver => "receiver",
            Role::Both => "emitter+receiver",
        }
    }
}
