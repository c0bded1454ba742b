//! Sponsorship API Module
//!
//! HTTP surface of the sponsorship service: a single co-sign-and-broadcast
//! endpoint plus a health check. The response body always has the
//! `{hash}` / `{error}` shape the pipeline client consumes.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};
use warp::{
    http::{Method, StatusCode},
    Filter, Rejection, Reply,
};

use crate::config::Config;
use crate::sponsor::{SponsorRequest, SponsorResponse, SponsorService};

// ============================================================================
// HANDLERS
// ============================================================================

/// Handler for the sponsorship endpoint.
///
/// Co-signs and broadcasts the submitted transaction. Malformed submissions
/// get HTTP 400; signing and broadcast failures get HTTP 500 with the error
/// text in the body.
pub async fn sponsor_handler(
    request: SponsorRequest,
    service: Arc<SponsorService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match service.sponsor(&request.serialized_tx).await {
        Ok(hash) => Ok(warp::reply::with_status(
            warp::reply::json(&SponsorResponse {
                hash: Some(hash),
                error: None,
            }),
            StatusCode::OK,
        )),
        Err(e) => {
            let status = if e.is_client_error() {
                warn!("rejected sponsorship request: {}", e);
                StatusCode::BAD_REQUEST
            } else {
                error!("sponsorship failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            };
            Ok(warp::reply::with_status(
                warp::reply::json(&SponsorResponse {
                    hash: None,
                    error: Some(e.to_string()),
                }),
                status,
            ))
        }
    }
}

/// Handler for the health endpoint.
pub async fn health_handler(
    service: Arc<SponsorService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    #[derive(Debug, Serialize)]
    struct Health {
        status: &'static str,
        #[serde(rename = "feePayer")]
        fee_payer: String,
    }

    let fee_payer = match service.fee_payer_address() {
        Ok(address) => address.to_string(),
        Err(e) => {
            error!("failed to derive fee-payer address: {}", e);
            return Ok(warp::reply::with_status(
                warp::reply::json(&SponsorResponse {
                    hash: None,
                    error: Some("fee payer unavailable".to_string()),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .into_response());
        }
    };

    Ok(warp::reply::json(&Health {
        status: "ok",
        fee_payer,
    })
    .into_response())
}

// ============================================================================
// WARP FILTER HELPERS
// ============================================================================

/// Creates a warp filter that injects the sponsor service into handlers.
pub fn with_service(
    service: Arc<SponsorService>,
) -> impl Filter<Extract = (Arc<SponsorService>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || service.clone())
}

// ============================================================================
// CORS CONFIGURATION
// ============================================================================

/// Creates a CORS filter based on the configured allowed origins.
fn create_cors_filter(allowed_origins: &[String]) -> warp::cors::Builder {
    let methods = vec![Method::GET, Method::POST, Method::OPTIONS];

    if allowed_origins.contains(&"*".to_string()) {
        warp::cors()
            .allow_any_origin()
            .allow_methods(methods)
            .allow_headers(vec!["content-type"])
    } else {
        let origins: Vec<&str> = allowed_origins.iter().map(|s| s.as_str()).collect();
        warp::cors()
            .allow_origins(origins)
            .allow_methods(methods)
            .allow_headers(vec!["content-type"])
    }
}

// ============================================================================
// REJECTION HANDLER
// ============================================================================

/// Global rejection handler converting warp rejections into the standard
/// `{error}` body with an appropriate status code.
pub async fn handle_rejection(rej: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    let (status, message) = if let Some(err) = rej.find::<warp::filters::body::BodyDeserializeError>()
    {
        (StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", err))
    } else if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "Endpoint not found".to_string())
    } else if rej.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    } else {
        error!("Unhandled rejection: {:?}", rej);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&SponsorResponse {
            hash: None,
            error: Some(message),
        }),
        status,
    ))
}

// ============================================================================
// API SERVER IMPLEMENTATION
// ============================================================================

/// REST API server for the sponsorship service.
pub struct ApiServer {
    config: Arc<Config>,
    service: Arc<SponsorService>,
}

impl ApiServer {
    pub fn new(config: Config, service: SponsorService) -> Self {
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
        }
    }

    /// Starts the API server on the configured host and port.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting sponsorship API on {}:{}",
            self.config.api.host, self.config.api.port
        );

        let routes = self.create_routes();

        let addr: std::net::SocketAddr =
            format!("{}:{}", self.config.api.host, self.config.api.port)
                .parse()
                .context("Failed to parse API server address")?;

        warp::serve(routes).run(addr).await;

        Ok(())
    }

    /// Creates all API routes for the server.
    pub(crate) fn create_routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        let service = self.service.clone();

        // Health check endpoint - reports the fee-payer address in use
        let health = warp::path("health")
            .and(warp::get())
            .and(with_service(service.clone()))
            .and_then(health_handler);

        // Sponsorship endpoint - co-signs and broadcasts a tagged transaction
        let sponsor = warp::path("api")
            .and(warp::path("sponsor"))
            .and(warp::post())
            .and(warp::body::json())
            .and(with_service(service))
            .and_then(sponsor_handler);

        health
            .or(sponsor)
            .with(create_cors_filter(&self.config.api.cors_origins))
            .recover(handle_rejection)
    }

    /// Public method for testing - exposes routes for integration tests
    #[allow(dead_code)] // Used by tests
    pub fn test_routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        self.create_routes()
    }
}
