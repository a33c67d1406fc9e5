//! Decoder module for captured Link Analyser traces
//!
//! Converts the per-sample trace into reconstructed packets and time-code
//! tokens, one independent stream per receiver.

pub mod common;
pub mod reassembler;
pub mod window;

pub use common::{DecodedItem, DecodedTrace, ReconstructedPacket, StandaloneToken, Terminator};
pub use reassembler::{ReceiverDecoder, TraceDecoder, WindowedEvent};
pub use window::PreTriggerWindow;
