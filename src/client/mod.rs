pub mod charts;
pub mod fetch;
pub mod poll;
pub mod tui;
pub mod view;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
