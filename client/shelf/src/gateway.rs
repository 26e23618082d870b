//! # Remote Gateway
//!
//! One network request per mutation, answered with exactly one [`Outcome`].
//!
//! ## Endpoints
//! - `POST /users/favorites/{movieId}`: toggles favorite membership
//! - `POST /users/watchlist/{movieId}`: toggles watchlist membership
//! - `POST /movies/rate/{movieId}` with `{ "rating": number }`: sets a rating
//! - `DELETE /movies/rate/{movieId}`: clears a rating
//!
//! Every response is `{ "success": bool, "data": ..., "error"?: string }` and every request carries the
//! session's bearer token.
//!
//! ## Classification
//!
//! | Response | Outcome |
//! |---|---|
//! | no response (connect, timeout, body cut off) | Unreachable |
//! | 502, 503, 504 | Unreachable |
//! | 401, 403 | Rejected, auth expired |
//! | 400, 422 | Rejected, bad request |
//! | 404 | Rejected, not found |
//! | other 5xx | Rejected, server |
//! | 2xx with `success: false`, other statuses | Rejected, refused |
//! | 2xx with an unreadable body | Rejected, malformed response |
//! | 2xx with `success: true` | Success |
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    model::{CollectionKind, MovieId, Operation, RatingValue},
    session::Credential,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRequest {
    pub kind: CollectionKind,
    pub movie_id: MovieId,
    pub operation: Operation,
}

impl MutationRequest {
    pub fn path(&self) -> String {
        match self.kind {
            CollectionKind::Favorite => format!("/users/favorites/{}", self.movie_id),
            CollectionKind::Watchlist => format!("/users/watchlist/{}", self.movie_id),
            CollectionKind::Rating => format!("/movies/rate/{}", self.movie_id),
        }
    }

    pub fn method(&self) -> Method {
        match (self.kind, self.operation) {
            (CollectionKind::Rating, Operation::Remove) => Method::DELETE,
            _ => Method::POST,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Rejected(Rejection),
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AuthExpired,
    BadRequest,
    NotFound,
    Refused,
    Server,
    MalformedResponse,
}

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn request(&self, request: &MutationRequest, credential: &Credential) -> Outcome;
}

#[derive(Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct RateBody {
    rating: RatingValue,
}

pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, request: &MutationRequest) -> String {
        format!("{}{}", self.base_url, request.path())
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn request(&self, request: &MutationRequest, credential: &Credential) -> Outcome {
        let url = self.url(request);

        let mut builder = self
            .client
            .request(request.method(), &url)
            .bearer_auth(credential.expose());

        if let Operation::SetRating(rating) = request.operation {
            builder = builder.json(&RateBody { rating });
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, "Remote unreachable: {e}");
                return Outcome::Unreachable(describe(&e));
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!(%url, %status, "Response body lost: {e}");
                return Outcome::Unreachable(describe(&e));
            }
        };

        let outcome = classify(status, &body);
        debug!(%url, %status, ?outcome, "Remote answered");

        outcome
    }
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        "could not connect".to_string()
    } else {
        error.to_string()
    }
}

pub fn classify(status: StatusCode, body: &[u8]) -> Outcome {
    let envelope = serde_json::from_slice::<Envelope>(body).ok();
    let message = envelope
        .as_ref()
        .and_then(|envelope| envelope.error.clone())
        .unwrap_or_else(|| status.to_string());

    let rejected = |reason| {
        Outcome::Rejected(Rejection {
            reason,
            message: message.clone(),
        })
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => rejected(RejectReason::AuthExpired),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            rejected(RejectReason::BadRequest)
        }
        StatusCode::NOT_FOUND => rejected(RejectReason::NotFound),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            Outcome::Unreachable(status.to_string())
        }
        status if status.is_server_error() => rejected(RejectReason::Server),
        status if status.is_success() => match envelope {
            Some(Envelope {
                success: true,
                data,
                ..
            }) => Outcome::Success(data),
            Some(_) => rejected(RejectReason::Refused),
            None => rejected(RejectReason::MalformedResponse),
        },
        _ => rejected(RejectReason::Refused),
    }
}
