//! Client side of the parley streaming chat pipeline.
//!
//! [`ChatStore`] owns the single active conversation. A front-end calls
//! [`ChatStore::send_message`] / [`ChatStore::clear_chat`] and renders the
//! [`ChatSnapshot`]s published on [`ChatStore::subscribe`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parley_core::{ChatStore, ClientConfig, HttpTransport};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(&ClientConfig::from_env())?;
//! let store = Arc::new(ChatStore::new(Arc::new(transport)));
//!
//! let mut updates = store.subscribe();
//! tokio::spawn(async move {
//!     while updates.changed().await.is_ok() {
//!         let snap = updates.borrow_and_update().clone();
//!         println!("{:?}", snap.state);
//!     }
//! });
//!
//! store.send_message("hello", Vec::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod attachment;
pub mod auth;
pub mod config;
pub mod decoder;
pub mod store;
pub mod transport;

pub use attachment::AttachmentError;
pub use auth::{AuthError, Authenticator, CredentialTable, Credentials, Identity};
pub use config::ClientConfig;
pub use decoder::FrameDecoder;
pub use store::{ChatError, ChatSnapshot, ChatStore, TurnOutcome, TurnState};
pub use transport::{ByteStream, ChatTransport, FilePart, HttpTransport, TransportError, TurnRequest};

pub use parley_types as types;
