//! parley-server: streams chat replies over server-sent events.
//!
//! One `POST /api/chat` request is one turn. The handler assembles a prompt
//! from the submitted history, the new message and a summary of any uploaded
//! files, asks the configured [`provider::ChatProvider`] for a reply and
//! forwards each text delta as a `data:` frame.

pub mod config;
pub mod error;
pub mod middleware;
pub mod prompt;
pub mod provider;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::ServerError;
pub use state::AppState;
