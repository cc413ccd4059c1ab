//! Daemon plumbing: unix-socket control surface, the gesture pipeline
//! thread, and event dispatch.

pub mod dispatch;
pub mod pipeline;
pub mod runtime;
pub mod server;

pub use server::{client_request, run_daemon};
