//! Authentication hook for validating user identity.
//!
//! pickban does not issue or check credentials itself. The lobby service
//! that sends users into a draft also hands them a token; an
//! [`Authenticator`] turns that token into a [`UserId`] during the
//! `hello` handshake.

use std::future::Future;

use pickban_protocol::UserId;

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// `hello` carried no token and the authenticator requires one.
    #[error("missing token")]
    MissingToken,

    #[error("authentication failed: {0}")]
    Rejected(String),
}

/// Validates a client's token and returns their identity.
///
/// `Send + Sync + 'static` because one instance is shared by every
/// connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use pickban::{AuthError, Authenticator};
/// use pickban_protocol::UserId;
///
/// /// Lets exactly one user in.
/// struct OnlyAlice;
///
/// impl Authenticator for OnlyAlice {
///     async fn authenticate(&self, token: Option<&str>) -> Result<UserId, AuthError> {
///         match token {
///             Some("alice-secret") => Ok(UserId(1)),
///             Some(_) => Err(AuthError::Rejected("unknown token".into())),
///             None => Err(AuthError::MissingToken),
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(
        &self,
        token: Option<&str>,
    ) -> impl Future<Output = Result<UserId, AuthError>> + Send;
}

/// Reads the token as a decimal user id. For local play and tests only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevAuthenticator;

impl Authenticator for DevAuthenticator {
    async fn authenticate(&self, token: Option<&str>) -> Result<UserId, AuthError> {
        let token = token.ok_or(AuthError::MissingToken)?;
        let id: u64 = token
            .trim()
            .parse()
            .map_err(|_| AuthError::Rejected("token must be a number".into()))?;
        Ok(UserId(id))
    }
}
