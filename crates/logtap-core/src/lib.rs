//! # logtap-core
//!
//! Shared data model for the logtap record distribution server.
//!
//! - Flow addressing: parse request paths into [`FlowReference`] values
//! - Log records: [`Record`] with nested policy fields and a raw payload
//! - Access policy tag locations (`kubernetes.labels.*`)

#![deny(unsafe_code)]

pub mod flow;
pub mod record;

pub use flow::{FlowKind, FlowParseError, FlowReference};
pub use record::{ALLOW_LIST_LABEL, Record};
