//! Per-connection channel bookkeeping

mod multiplexer;

pub use multiplexer::{ChannelTable, RequestVerdict};
