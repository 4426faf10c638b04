//! Client side of the session synchronisation protocol.
//!
//! [`SessionChannelBridge`] joins `session:<id>` over a [`transport::Socket`]
//! and shuttles traffic between that channel and a [`SessionUiPort`].

pub mod bridge;
pub mod connection;
pub mod context;
pub mod error;
pub mod phoenix;
pub mod ports;
pub mod transport;

pub use bridge::{dispatch, SessionChannelBridge};
pub use context::{HtmlSessionContext, SessionContext, StaticSessionContext};
pub use error::SessionError;
pub use phoenix::PhoenixConnector;
pub use ports::{ChannelUiPort, SessionUiPort, UiIntentSender, UiIntents, UiPortEvent};
