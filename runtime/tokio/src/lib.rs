#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # relay-rpc-tokio
//!
//! This crate provides a runtime adapter for [`relay-rpc`](https://docs.rs/relay-rpc) to work with the `tokio` runtime.
//! It implements the [`AsyncIO`](https://docs.rs/relay-rpc-core/latest/relay_rpc_core/runtime/index.html) trait to support `tokio`.
//!
use relay_rpc_core::runtime::AsyncIO;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;

/// The main struct for tokio runtime IO, assign this type to AsyncIO trait when used:
///
/// - `ClientFacts::IO` of relay-rpc
///
/// - the runtime parameter of the configuration backends in relay-rpc-config-center
#[derive(Clone)]
pub struct TokioRT(Handle);

impl TokioRT {
    /// Capture a tokio runtime handle to ensure background task can spawn
    #[inline]
    pub fn new(handle: Handle) -> Self {
        Self(handle)
    }

    /// Capture the handle of the runtime we are running in.
    ///
    /// Panics when called outside of a tokio runtime, like [Handle::current].
    #[inline]
    pub fn current() -> Self {
        Self(Handle::current())
    }
}

impl AsyncIO for TokioRT {
    #[inline(always)]
    fn sleep(d: Duration) -> impl Future + Send {
        tokio::time::sleep(d)
    }

    /// spawn background coroutine with captured runtime handle
    #[inline]
    fn spawn_detach<F, R>(&self, f: F)
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        self.0.spawn(f);
    }
}
