//! Client layer for the payment clearinghouse API.
//!
//! `transport` is the seam between the crate and the network: production
//! code wires in the reqwest-backed [`transport::HttpTransport`], tests
//! inject mocks. `session` owns the cached authentication token and
//! `provider_client` layers validation, retries and response-code
//! interpretation on top.

pub mod provider_client;
pub mod session;
pub mod transport;
pub mod wire;

pub use provider_client::ProviderClient;
pub use session::AuthSessionManager;
pub use transport::{HttpTransport, ProviderTransport};
