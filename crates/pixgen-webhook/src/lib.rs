//! pixgen-webhook: Signed result callbacks
//!
//! Task outcomes are reported to the backend as HMAC-signed HTTP
//! POSTs with a fixed-backoff retry loop.

pub mod sender;
pub mod sign;

pub use sender::WebhookSender;
pub use sign::{sign, verify, SIGNATURE_HEADER};
