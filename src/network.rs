//! Address-level policy applied to connecting peers.

pub mod whitelist;

pub use whitelist::{WhitelistMatcher, WhitelistRange};
