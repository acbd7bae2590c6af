//! Google-style OAuth 2.0 for installed applications: PKCE authorization
//! through a loopback redirect, a file token store and lazy refresh.

pub mod callback_server;
pub mod client_secrets;
pub mod error;
pub mod flow;
pub mod manager;
pub mod pkce;
pub mod storage;
pub mod types;

pub use {
    callback_server::CallbackServer,
    client_secrets::ClientSecrets,
    flow::{AuthorizationRequest, OAuthFlow},
    manager::{AccessTokenSource, TokenManager},
    storage::TokenStore,
    types::{OAuthConfig, OAuthTokens, PkceChallenge, serialize_option_secret, serialize_secret},
};

pub use error::{Error, Result};
