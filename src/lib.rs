//! chatpoll: submit queries to a chat backend and stream the answer as it is
//! produced, plus a rolling view of the backend's performance statistics.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod poller;
pub mod protocol;
pub mod sink;
pub mod stats;
