//! HTTP server setup for the auxiliary endpoints.
//!
//! # Responsibilities
//! - Wrap a Router with request tracing
//! - Serve it over plain TCP or TLS
//! - Stop accepting and drain when the root token is cancelled

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// How long in-flight requests get once shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A small HTTP server bound to the process lifetime.
pub struct HttpServer {
    name: &'static str,
    router: Router,
}

impl HttpServer {
    pub fn new(name: &'static str, router: Router) -> Self {
        Self {
            name,
            router: router.layer(TraceLayer::new_for_http()),
        }
    }

    /// Serve plain HTTP on an already bound listener until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(server = self.name, address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        tracing::info!(server = self.name, "HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: CancellationToken,
    ) -> Result<(), std::io::Error> {
        tracing::info!(server = self.name, address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let stopper = handle.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            stopper.graceful_shutdown(Some(DRAIN_TIMEOUT));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!(server = self.name, "HTTPS server stopped");
        Ok(())
    }
}
