//! cog-gateway: adapts gateway HTTP events to a synchronous handler.
//!
//! A gateway trigger delivers each HTTP request as a JSON event and expects
//! a JSON event back. This crate translates the inbound event into a
//! CGI-style `RequestContext`, drives an [`Application`] with a fresh
//! `ResponseCapture`, and assembles the `OutboundEvent`.
//!
//! ```text
//! InboundEvent
//!   │
//!   ├── translate_request()      → RequestContext
//!   ├── Application::call()      → start_response + body chunks
//!   ├── ResponseCapture::finalize()
//!   │
//!   ▼
//! OutboundEvent
//! ```
//!
//! Every call owns its own context and capture; nothing is shared between
//! requests.

pub mod capture;
pub mod environ;
pub mod error;
pub mod event;

pub use capture::{BodyWriter, ResponseCapture};
pub use environ::{BodyStream, RequestContext, translate_request};
pub use error::{GatewayError, GatewayResult};
pub use event::{InboundEvent, OutboundEvent, Pairs};

use tracing::debug;

/// A downstream request handler.
///
/// The handler may call `start_response` on the capture (more than once to
/// override an earlier status) and write body bytes through the returned
/// writer; the chunks it returns are appended after those writes.
pub trait Application {
    fn call(&self, ctx: RequestContext, capture: &mut ResponseCapture) -> Vec<Vec<u8>>;
}

impl<F> Application for F
where
    F: Fn(RequestContext, &mut ResponseCapture) -> Vec<Vec<u8>>,
{
    fn call(&self, ctx: RequestContext, capture: &mut ResponseCapture) -> Vec<Vec<u8>> {
        self(ctx, capture)
    }
}

/// Event adapter.
#[derive(Debug, Clone, Default)]
pub struct Gateway {
    binary_media_types: Vec<String>,
}

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Media types whose response bodies are returned base64-encoded.
    ///
    /// Accepts exact types (`image/tiff`), families (`image/*`) and `*/*`.
    pub fn with_binary_media_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.binary_media_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Run one event through `app` and build the response event.
    pub fn respond<A>(&self, app: &A, event: &InboundEvent) -> GatewayResult<OutboundEvent>
    where
        A: Application + ?Sized,
    {
        let ctx = translate_request(event)?;
        let mut capture = ResponseCapture::new();
        let chunks = app.call(ctx, &mut capture);
        let response = capture.finalize_with(chunks, &self.binary_media_types)?;

        debug!(
            method = %event.http_method,
            path = %event.path,
            status = %response.status_code,
            "event handled"
        );

        Ok(response)
    }
}

/// Run one event through `app` with the default adapter settings.
pub fn respond<A>(app: &A, event: &InboundEvent) -> GatewayResult<OutboundEvent>
where
    A: Application + ?Sized,
{
    Gateway::new().respond(app, event)
}
