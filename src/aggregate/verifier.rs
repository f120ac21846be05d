//! Bearer credential verification.
//!
//! The gateway treats token checking as a black box owned by the user
//! service: given a credential it answers with an identity, a rejection,
//! or nothing at all.

use axum::http::{HeaderValue, StatusCode};
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::time::Duration;

use crate::error::GatewayError;
use crate::routing::Dispatcher;

#[derive(Debug)]
pub enum Verification {
    /// The credential is valid; carries the identity document.
    Valid(Value),
    /// The verifier looked at the credential and refused it.
    Rejected,
    /// The verifier could not be asked.
    Unavailable(GatewayError),
}

pub trait TokenVerifier: Send + Sync {
    fn verify<'a>(&'a self, credential: &'a HeaderValue) -> BoxFuture<'a, Verification>;
}

/// Asks the user service, through the breaker, whether a credential is valid.
pub struct UserServiceVerifier {
    dispatcher: Dispatcher,
    service: String,
    path: String,
    timeout: Duration,
}

impl UserServiceVerifier {
    pub fn new(dispatcher: Dispatcher, service: impl Into<String>, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            dispatcher,
            service: service.into(),
            path: path.into(),
            timeout,
        }
    }
}

impl TokenVerifier for UserServiceVerifier {
    fn verify<'a>(&'a self, credential: &'a HeaderValue) -> BoxFuture<'a, Verification> {
        Box::pin(async move {
            match self
                .dispatcher
                .get_json(&self.service, &self.path, Some(credential), self.timeout)
                .await
            {
                // `{ "valid": true, "user": {...} }` or a bare user document
                Ok(mut body) => {
                    let user = body.get_mut("user").map(Value::take);
                    Verification::Valid(user.unwrap_or(body))
                }
                Err(GatewayError::Downstream { status, .. })
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
                {
                    Verification::Rejected
                }
                Err(e) => Verification::Unavailable(e),
            }
        })
    }
}
