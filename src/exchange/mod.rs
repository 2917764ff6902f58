//! The exchange layer owns the connection to one endpoint.
//!
//! An [ExchangeClient] wraps a [ExchangeTransport] with a reference count, shared by every
//! invoker bound to the same endpoint through the [ExchangeClientPool].

mod pool;
pub use pool::ExchangeClientPool;

use crate::invocation::{Attachments, Callback, InvokeReply};
use captains_log::filter::LogFilter;
use crossfire::{AsyncRx, Tx, spsc};
use relay_rpc_core::error::{RpcError, RpcIntErr};
use relay_rpc_core::runtime::AsyncIO;
use relay_rpc_core::{ClientConfig, Url};
use rmpv::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// A trait implemented by the user for the client-side, to define the customizable plugin.
pub trait ClientFacts: Send + Sync + Sized + 'static {
    type IO: AsyncIO;

    /// The connection type created for every new endpoint
    type Transport: ExchangeTransport;

    fn spawn_detach<F, R>(&self, f: F)
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static;

    /// You should keep ClientConfig inside, get_config() will return the reference.
    fn get_config(&self) -> &ClientConfig;

    /// Construct a [captains_log::filter::LogFilter] to oganize log of a client
    fn new_logger(&self) -> Arc<LogFilter>;
}

/// Notify the waiter of a two-way request
pub type ResponseNoti = Tx<Result<Response, RpcIntErr>>;

/// This trait is for the transport under the exchange client: framing, encoding and the
/// table of in-flight requests belong here.
///
/// It must accept concurrent submission from any number of invokers.
pub trait ExchangeTransport: fmt::Debug + Send + Sync + Sized + 'static {
    /// Build the transport of an endpoint. Connecting may happen lazily in background,
    /// this function must not block.
    fn new(url: &Url, config: &ClientConfig) -> Self;

    /// Queue the request for the wire.
    ///
    /// With `noti`, the response (or the error) is sent through it once, and dropping it
    /// without sending means the connection is lost. Without `noti` the request is one-way.
    fn submit(&self, req: Request, noti: Option<ResponseNoti>) -> Result<(), RpcIntErr>;

    fn is_available(&self) -> bool;

    /// Close the connection, pending requests fail with an error
    fn close(&self);
}

/// The outgoing form of an invocation, attachments are final.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Arc<Url>,
    pub method_name: String,
    pub arguments: Vec<Value>,
    pub attachments: Attachments,
    /// codec identifier, the encoding itself belongs to the transport
    pub serialization: String,
    pub two_way: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub body: Value,
    pub attrs: HashMap<String, String>,
}

/// Shared client of one endpoint, with a count of the invokers bound to it.
pub struct ExchangeClient<F: ClientFacts> {
    facts: Arc<F>,
    logger: Arc<LogFilter>,
    endpoint: String,
    transport: F::Transport,
    active_number: AtomicU32,
    closed: AtomicBool,
}

impl<F: ClientFacts> ExchangeClient<F> {
    /// The active number starts at zero, the pool counts the first invoker.
    pub fn new(facts: Arc<F>, url: &Url) -> Self {
        let transport = F::Transport::new(url, facts.get_config());
        let logger = facts.new_logger();
        logger_debug!(logger, "ExchangeClient to {} created", url.endpoint_key());
        Self {
            facts,
            logger,
            endpoint: url.endpoint_key(),
            transport,
            active_number: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[inline]
    pub fn transport(&self) -> &F::Transport {
        &self.transport
    }

    #[inline]
    pub fn active_number(&self) -> u32 {
        self.active_number.load(Ordering::SeqCst)
    }

    /// Return the count after increase
    #[inline]
    pub fn increase_active_number(&self) -> u32 {
        self.active_number.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Return the count after decrease, which stays at zero once reached.
    pub fn decrease_active_number(&self) -> u32 {
        match self
            .active_number
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(prev) => prev - 1,
            Err(_) => {
                logger_warn!(self.logger, "{} decrease active number below zero", self);
                0
            }
        }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        !self.is_closed() && self.transport.is_available()
    }

    /// Close the transport, only the first call has effect
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.transport.close();
        logger_info!(self.logger, "{} closed", self);
    }

    #[inline]
    fn check_open(&self) -> Result<(), RpcIntErr> {
        if self.is_closed() { Err(RpcIntErr::Unreachable) } else { Ok(()) }
    }

    /// Two-way request, wait for the response until `timeout` (zero means no deadline).
    pub async fn request(&self, req: Request, timeout: Duration) -> Result<Response, RpcError> {
        self.check_open()?;
        let (tx, rx) = spsc::bounded_tx_blocking_rx_async::<Result<Response, RpcIntErr>>(1);
        self.transport.submit(req, Some(tx))?;
        Ok(wait_response::<F::IO>(rx, timeout).await?)
    }

    /// Two-way request without waiting, the callback receives the outcome in background.
    pub fn async_request(
        &self, req: Request, timeout: Duration, callback: Callback,
    ) -> Result<(), RpcError> {
        self.check_open()?;
        let (tx, rx) = spsc::bounded_tx_blocking_rx_async::<Result<Response, RpcIntErr>>(1);
        self.transport.submit(req, Some(tx))?;
        let logger = self.logger.clone();
        self.facts.spawn_detach(async move {
            let res = wait_response::<F::IO>(rx, timeout).await;
            if let Err(e) = res.as_ref() {
                logger_debug!(logger, "async request failed: {}", e);
            }
            callback(
                res.map(|resp| InvokeReply { rest: Some(resp.body), attrs: resp.attrs })
                    .map_err(RpcError::from),
            );
        });
        Ok(())
    }

    /// One-way request
    #[inline]
    pub fn send(&self, req: Request) -> Result<(), RpcError> {
        self.check_open()?;
        self.transport.submit(req, None)?;
        Ok(())
    }
}

async fn wait_response<IO: AsyncIO>(
    rx: AsyncRx<Result<Response, RpcIntErr>>, timeout: Duration,
) -> Result<Response, RpcIntErr> {
    let res = if timeout.is_zero() {
        rx.recv().await
    } else {
        match IO::timeout(timeout, rx.recv()).await {
            Ok(r) => r,
            Err(()) => return Err(RpcIntErr::Timeout),
        }
    };
    match res {
        Ok(r) => r,
        // the transport dropped the notifier without an answer
        Err(_) => Err(RpcIntErr::Unreachable),
    }
}

impl<F: ClientFacts> fmt::Display for ExchangeClient<F> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ExchangeClient {:?}", self.endpoint)
    }
}

impl<F: ClientFacts> fmt::Debug for ExchangeClient<F> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ExchangeClient({:?}, active={})", self.endpoint, self.active_number())
    }
}

/// An example ClientFacts for general use
pub struct ClientDefault<T: ExchangeTransport, IO: AsyncIO> {
    pub logger: Arc<LogFilter>,
    config: ClientConfig,
    rt: IO,
    _phan: std::marker::PhantomData<fn(&T)>,
}

impl<T: ExchangeTransport, IO: AsyncIO> ClientDefault<T, IO> {
    pub fn new(config: ClientConfig, rt: IO) -> Arc<Self> {
        Arc::new(Self { logger: Arc::new(LogFilter::new()), config, rt, _phan: Default::default() })
    }

    #[inline]
    pub fn set_log_level(&self, level: log::Level) {
        self.logger.set_level(level);
    }
}

impl<T: ExchangeTransport, IO: AsyncIO> ClientFacts for ClientDefault<T, IO> {
    type IO = IO;
    type Transport = T;

    #[inline]
    fn spawn_detach<F, R>(&self, f: F)
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        self.rt.spawn_detach(f);
    }

    #[inline]
    fn new_logger(&self) -> Arc<LogFilter> {
        self.logger.clone()
    }

    #[inline]
    fn get_config(&self) -> &ClientConfig {
        &self.config
    }
}
