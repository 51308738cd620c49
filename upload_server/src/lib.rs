#![cfg_attr(feature = "strict", deny(warnings))]

pub use crate::auth::AuthSettings;
pub use crate::error::ServerError;
pub use crate::orchestrator::Orchestrator;
pub use crate::server::{UploadServer, UploadServerConfig};
pub use crate::session::{SessionState, SessionStore, UploadSession};

mod auth;
mod error;
mod handlers;
mod orchestrator;
mod server;
mod session;
