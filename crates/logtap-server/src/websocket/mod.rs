//! WebSocket admission, subscriber lifecycle, and record fan-out.
//!
//! `gateway` admits connections (auth → flow parse → upgrade),
//! `registry` maps flows to live subscribers, and `subscriber` owns
//! the per-connection authorization-filtered send protocol.

pub mod gateway;
pub mod registry;
pub mod subscriber;
