//! The runtime model defines interface to adapt various async runtimes.
//!
//! The adaptor is provided as sub-crate:
//!
//! - [relay-rpc-tokio](https://docs.rs/relay-rpc-tokio)

use crate::io::Cancellable;
use std::future::Future;
use std::time::Duration;

/// Defines the interface we used from async runtime
///
/// See module level doc: [crate::runtime]
pub trait AsyncIO: Send + Sync + 'static {
    fn sleep(d: Duration) -> impl Future + Send;

    #[inline]
    fn timeout<F>(d: Duration, func: F) -> impl Future<Output = Result<F::Output, ()>> + Send
    where
        F: Future + Send,
    {
        Cancellable::new(func, Self::sleep(d))
    }

    /// spawn background coroutine, the handle is not kept
    fn spawn_detach<F, R>(&self, f: F)
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static;
}
