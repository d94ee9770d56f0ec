//! Port traits: the boundary between the engine and its collaborators.

pub mod action_port;
pub mod config_port;
pub mod data_port;
pub mod indicator_port;
pub mod notification_port;
