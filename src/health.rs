// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Liveness endpoint reporting backend reachability

use crate::backend::SecretBackend;
use bytes::Bytes;
use http::{Method, Response, StatusCode};
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub const HEALTH_PATH: &str = "/health";

pub struct HealthServer<B> {
    backend: Arc<B>,
    port: u16,
}

impl<B: SecretBackend + 'static> HealthServer<B> {
    pub fn new(backend: Arc<B>, port: u16) -> Self {
        Self { backend, port }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        info!("Health endpoint listening on {}{}", addr, HEALTH_PATH);

        loop {
            let (stream, peer) = listener.accept().await?;
            let backend = self.backend.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let backend = backend.clone();
                    async move { Ok::<_, Infallible>(respond(backend.as_ref(), req.method(), req.uri().path()).await) }
                });

                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!("Health connection from {} failed: {}", peer, e);
                }
            });
        }
    }
}

fn text(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}

/// Answer one request: `GET /health` pings the backend
pub async fn respond<B: SecretBackend + ?Sized>(backend: &B, method: &Method, path: &str) -> Response<Full<Bytes>> {
    if method != Method::GET || path != HEALTH_PATH {
        return text(StatusCode::NOT_FOUND, "not found".to_string());
    }

    match backend.ping().await {
        Ok(()) => text(StatusCode::OK, "ok".to_string()),
        Err(e) => {
            warn!("Health check failed: {}", e);
            text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
