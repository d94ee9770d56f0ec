//! Concrete adapter implementations for ports.

pub mod builtin_indicators;
pub mod console_channel;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod log_action_adapter;
