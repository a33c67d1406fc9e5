//! spw-capture: SpaceWire Link Analyser capture and packet reconstruction
//!
//! This crate drives a Link Analyser through one triggered acquisition,
//! rebuilds the packets seen on both receivers and writes them as a
//! hexdump, an event log, or archive messages over ZeroMQ.

pub mod archiver;
pub mod common;
pub mod config;
pub mod data_source_emulator;
pub mod pipeline;
pub mod reader;
pub mod recorder;
