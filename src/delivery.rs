pub mod log;
pub mod smtp;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::DeliveryError;
use crate::render::RenderedImage;

/// One outgoing message: every report image of a run travels together.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<RenderedImage>,
}

/// Sink for finished reports.
///
/// A failed delivery is reported to the caller and never retried here.
pub trait Delivery: Send + Sync {
    fn name(&self) -> &str;

    fn deliver<'a>(&'a self, envelope: &'a Envelope)
    -> BoxFuture<'a, Result<(), Report<DeliveryError>>>;
}
