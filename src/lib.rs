//! conndash: a daemon that samples the kernel conntrack table and
//! serves it over HTTP, plus a terminal dashboard that polls, filters,
//! sorts and charts the result.

pub mod client;
pub mod conntrack;
pub mod summary;
pub mod types;
