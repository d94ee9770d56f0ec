//! Core domain types and logic.

pub mod batch;
pub mod builder;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod graph_config;
pub mod group_signal;
pub mod incremental;
pub mod indicator;
pub mod pipeline;
pub mod signal;
pub mod snapshot;
pub mod spec_parser;
