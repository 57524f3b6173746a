//! Serverless runtime entry.
//!
//! Events arrive already in the gateway shape, so they go to the adapter
//! as they are, apart from the forwarding headers the public endpoint
//! needs for building absolute links.

use std::sync::Arc;

use cog_gateway::{Application, Gateway, InboundEvent, OutboundEvent};
use lambda_runtime::{Error, LambdaEvent, service_fn};
use tracing::debug;

/// Point the request at the public endpoint.
///
/// Only touches events that carry a headers mapping.
pub fn prepare_event(event: &mut InboundEvent, server_name: Option<&str>) {
    if let Some(headers) = event.headers.as_mut() {
        if let Some(name) = server_name {
            headers.set("Host", name);
        }
        headers.set("X-Forwarded-Proto", "https");
    }
}

/// Per-invocation handler state.
pub struct LambdaHandler<A> {
    gateway: Arc<Gateway>,
    app: Arc<A>,
    server_name: Option<String>,
}

impl<A> Clone for LambdaHandler<A> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            app: self.app.clone(),
            server_name: self.server_name.clone(),
        }
    }
}

impl<A> LambdaHandler<A>
where
    A: Application + Send + Sync + 'static,
{
    pub fn new(gateway: Gateway, app: Arc<A>, server_name: Option<String>) -> Self {
        Self {
            gateway: Arc::new(gateway),
            app,
            server_name,
        }
    }

    pub async fn handle(&self, event: LambdaEvent<InboundEvent>) -> Result<OutboundEvent, Error> {
        let mut payload = event.payload;
        prepare_event(&mut payload, self.server_name.as_deref());
        debug!(request_id = %event.context.request_id, path = %payload.path, "invocation");

        let gateway = self.gateway.clone();
        let app = self.app.clone();
        let response = tokio::task::spawn_blocking(move || gateway.respond(&*app, &payload)).await??;
        Ok(response)
    }
}

/// Poll the runtime API until the process is stopped.
pub async fn run<A>(handler: LambdaHandler<A>) -> Result<(), Error>
where
    A: Application + Send + Sync + 'static,
{
    lambda_runtime::run(service_fn(move |event: LambdaEvent<InboundEvent>| {
        let handler = handler.clone();
        async move { handler.handle(event).await }
    }))
    .await
}
