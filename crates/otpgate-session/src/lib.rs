//! Seam to the external messaging-protocol client.
//!
//! The actual wire protocol, cryptographic session handling, and message
//! encoding live in an external library behind [`SessionConnector`] /
//! [`SessionHandle`]. This crate defines the contract the gateway needs:
//! open a session attempt, observe its ordered event stream, and drive the
//! handful of outbound operations. [`mock::MockConnector`] implements the
//! same contract in-process for tests and for running the binary without a
//! real client.

pub mod connector;
pub mod error;
pub mod events;
pub mod mock;

pub use connector::{NewSession, NumberLookup, SentMessage, SessionConnector, SessionHandle};
pub use error::SessionError;
pub use events::{DisconnectCode, SessionEvent};
