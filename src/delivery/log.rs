use error_stack::Report;
use futures::future::BoxFuture;

use crate::delivery::{Delivery, Envelope};
use crate::error::DeliveryError;

/// Logs what would have been sent. Used for dry runs and when mail is disabled.
pub struct LogDelivery;

impl Delivery for LogDelivery {
    fn name(&self) -> &str {
        "log"
    }

    fn deliver<'a>(
        &'a self,
        envelope: &'a Envelope,
    ) -> BoxFuture<'a, Result<(), Report<DeliveryError>>> {
        Box::pin(async move {
            for image in &envelope.attachments {
                tracing::info!(
                    file = %image.file_name,
                    content_type = image.content_type,
                    bytes = image.bytes.len(),
                    "attachment"
                );
            }
            tracing::warn!(
                subject = %envelope.subject,
                attachments = envelope.attachments.len(),
                "mail not sent (log delivery)"
            );
            Ok(())
        })
    }
}
