//! Races a blocking step against an optional deadline.
//!
//! The timer lives inside the returned future, so it is torn down on every
//! exit path: the operation finishing, failing, or the caller dropping it.
use std::future::Future;
use std::time::Duration;

use log::trace;

/// A step that ran past its bound. Carries the bound, not the wall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Expired(pub Duration);

/// Run `operation` to completion, or give up once `limit` has passed.
/// `None` waits forever.
pub(crate) async fn race<F>(limit: Option<Duration>, operation: F) -> Result<F::Output, Expired>
where
    F: Future,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, operation).await.map_err(|_| {
            trace!("deadline of {}ms passed", limit.as_millis());
            Expired(limit)
        }),
        None => Ok(operation.await),
    }
}
