//! Invokers: the per-service handle which turns an [Invocation] into a remote call.

mod remote;
pub use remote::RemoteInvoker;

use crate::invocation::{Invocation, InvokeReply};
use crate::trace::CallContext;
use relay_rpc_core::Url;
use relay_rpc_core::error::RpcError;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait Invoker: Send + Sync + 'static {
    fn get_url(&self) -> &Url;

    fn is_available(&self) -> bool;

    /// Issue the call. A destroyed invoker fails with [RpcError::DestroyedInvoker].
    fn invoke(
        &self, ctx: &CallContext, invocation: &mut Invocation,
    ) -> impl Future<Output = Result<InvokeReply, RpcError>> + Send;

    /// Idempotent, teardown runs only on the first call.
    fn destroy(&self);
}

/// Lifecycle state shared by the invoker implementations
pub struct BaseInvoker {
    url: Arc<Url>,
    available: AtomicBool,
    destroyed: AtomicBool,
}

impl BaseInvoker {
    pub fn new(url: Arc<Url>) -> Self {
        Self { url, available: AtomicBool::new(true), destroyed: AtomicBool::new(false) }
    }

    #[inline]
    pub fn url(&self) -> &Arc<Url> {
        &self.url
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Mark the invoker destroyed, return true on the first call
    #[inline]
    pub fn destroy(&self) -> bool {
        self.available.store(false, Ordering::Release);
        !self.destroyed.swap(true, Ordering::AcqRel)
    }
}
