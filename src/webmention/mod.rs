// Webmention API module.
// Provides the client and record types for the webmention.io jf2 API.

pub mod client;
pub mod types;

pub use client::WebmentionClient;
pub use types::*;
