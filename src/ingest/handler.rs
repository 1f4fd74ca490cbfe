//! Caller-supplied event handlers.

use std::future::Future;

use crate::event::ContractEvent;
use crate::ingest::error::BoxError;

/// Receives delivered events, one at a time, in ledger order.
///
/// An error aborts the run; the event is not recorded as delivered.
pub trait EventHandler: Send {
    fn handle(&mut self, event: ContractEvent) -> impl Future<Output = Result<(), BoxError>> + Send;
}

impl<F, Fut, E> EventHandler for F
where
    F: FnMut(ContractEvent) -> Fut + Send,
    Fut: Future<Output = Result<(), E>> + Send,
    E: Into<BoxError>,
{
    fn handle(&mut self, event: ContractEvent) -> impl Future<Output = Result<(), BoxError>> + Send {
        let fut = self(event);
        async move { fut.await.map_err(Into::into) }
    }
}
