//! OpStudio - operator console for an ML platform
//!
//! This crate captures media on the operator's machine, submits it to the
//! platform's inference endpoints, and reconciles the asynchronous results
//! into a prediction overlay (vision) or a transcript board (audio). It also
//! reads the platform's informational panels through the same gateway.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Session state machines, capture value objects, overlay model
//! - **Application**: Use cases and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (reqwest, nokhwa, cpal, image)
//! - **CLI**: Command-line interface, argument parsing, and output formatting

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
