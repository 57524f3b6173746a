//! HTTP trigger.
//!
//! `HttpTrigger` manages a hyper HTTP server that reshapes each request
//! into a gateway event and runs it through the adapter, exactly as the
//! serverless runtime would.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use cog_gateway::{Application, Gateway};
use cog_validator::Reply;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::convert::{event_from_parts, response_from_event, response_from_reply};

/// Callback type for handling HTTP requests.
pub type RequestHandler = Arc<dyn Fn(Request<Incoming>) -> BoxFuture + Send + Sync>;

type BoxFuture = std::pin::Pin<
    Box<dyn std::future::Future<Output = anyhow::Result<Response<Full<Bytes>>>> + Send>,
>;

/// HTTP trigger server.
///
/// Binds to a TCP port and forwards incoming HTTP requests to a
/// handler callback.
pub struct HttpTrigger {
    bind_addr: SocketAddr,
    handler: RequestHandler,
}

impl HttpTrigger {
    /// Create a new HTTP trigger bound to the given address.
    pub fn new(bind_addr: SocketAddr, handler: RequestHandler) -> Self {
        Self { bind_addr, handler }
    }

    /// Bind and serve until the shutdown signal is received.
    pub async fn serve(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .context("failed to bind HTTP trigger")?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    ///
    /// Spawns a tokio task per connection using HTTP/1.1.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        info!(addr = %listener.local_addr()?, "HTTP trigger listening");

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, peer_addr) = accept_result.context("accept failed")?;
                    let handler = self.handler.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let handler = handler.clone();
                            async move {
                                match handler(req).await {
                                    Ok(resp) => Ok::<_, hyper::Error>(resp),
                                    Err(e) => {
                                        error!(%peer_addr, error = %e, "request handler failed");
                                        Ok(internal_error())
                                    }
                                }
                            }
                        });

                        if let Err(e) = http1::Builder::new()
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(%peer_addr, error = %e, "connection error");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("HTTP trigger shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

fn internal_error() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Handler that runs every request through `gateway` into `app`.
///
/// Bodies over `max_body` bytes are answered with 413 without being
/// buffered. The application is synchronous, so each call runs on the
/// blocking pool.
pub fn gateway_handler<A>(gateway: Arc<Gateway>, app: Arc<A>, max_body: u64) -> RequestHandler
where
    A: Application + Send + Sync + 'static,
{
    Arc::new(move |req: Request<Incoming>| {
        let gateway = gateway.clone();
        let app = app.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            if declared_length(&parts.headers).is_some_and(|len| len > max_body) {
                return Ok(response_from_reply(Reply::too_large(max_body)));
            }

            let limit = usize::try_from(max_body).unwrap_or(usize::MAX);
            let body = match Limited::new(body, limit).collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                    return Ok(response_from_reply(Reply::too_large(max_body)));
                }
                Err(e) => return Err(anyhow::anyhow!("failed to read request body: {e}")),
            };
            let event = event_from_parts(&parts, body);

            let response = tokio::task::spawn_blocking(move || gateway.respond(&*app, &event))
                .await
                .context("gateway task failed")??;
            response_from_event(&response)
        })
    })
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
