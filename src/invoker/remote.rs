use super::{BaseInvoker, Invoker};
use crate::exchange::{ClientFacts, ExchangeClient, ExchangeClientPool, Request};
use crate::invocation::{Invocation, InvokeReply};
use crate::trace::{CallContext, inject_trace_ctx};
use captains_log::filter::LogFilter;
use parking_lot::RwLock;
use relay_rpc_core::constant::*;
use relay_rpc_core::error::RpcError;
use relay_rpc_core::url::{parse_bool, parse_duration};
use relay_rpc_core::{ConsumerConfig, Url};
use std::fmt;
use std::sync::{Arc, Once};
use std::time::Duration;

/// Invoker of one remote service, bound to the shared exchange client of its endpoint.
///
/// The client slot is read by every call and only written by [RemoteInvoker::set_client] and
/// [Invoker::destroy].
pub struct RemoteInvoker<F: ClientFacts> {
    base: BaseInvoker,
    client: RwLock<Option<Arc<ExchangeClient<F>>>>,
    pool: Arc<ExchangeClientPool<F>>,
    /// Service-level timeout, the fallback of the method-level one
    timeout: Duration,
    quit_once: Once,
    logger: Arc<LogFilter>,
}

impl<F: ClientFacts> RemoteInvoker<F> {
    /// `client` should come from `pool.acquire()`, this invoker owns one reference of it.
    pub fn new(
        url: Url, client: Arc<ExchangeClient<F>>, pool: Arc<ExchangeClientPool<F>>,
        consumer: &ConsumerConfig,
    ) -> Self {
        let timeout = url.get_param_duration(TIMEOUT_KEY, consumer.request_timeout);
        let logger = pool.logger().clone();
        logger_debug!(logger, "invoker of {} created, timeout {:?}", url, timeout);
        Self {
            base: BaseInvoker::new(Arc::new(url)),
            client: RwLock::new(Some(client)),
            pool,
            timeout,
            quit_once: Once::new(),
            logger,
        }
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.base.is_destroyed()
    }

    #[inline]
    pub fn client(&self) -> Option<Arc<ExchangeClient<F>>> {
        self.client.read().clone()
    }

    /// Swap the bound client, return the previous one. Reference counts are left to the caller.
    pub fn set_client(
        &self, client: Option<Arc<ExchangeClient<F>>>,
    ) -> Option<Arc<ExchangeClient<F>>> {
        std::mem::replace(&mut *self.client.write(), client)
    }

    /// Method-level `timeout` parameter if valid, else the service-level one.
    ///
    /// A generic call names the real method in its first argument.
    fn resolve_timeout(&self, invocation: &Invocation) -> Result<Duration, RpcError> {
        let url = self.base.url();
        let method = if url.get_param_bool(GENERIC_KEY, false) {
            match invocation.arguments().first().and_then(|arg| arg.as_str()) {
                Some(name) => name,
                None => {
                    return Err(RpcError::InvalidArgument(format!(
                        "generic call of {} expects the method name as first argument",
                        invocation.method_name()
                    )));
                }
            }
        } else {
            invocation.method_name()
        };
        if let Some(s) = url.get_method_param(method, TIMEOUT_KEY) {
            match parse_duration(s) {
                Ok(d) => return Ok(d),
                Err(e) => {
                    logger_debug!(self.logger, "method {} timeout {:?}: {}", method, s, e);
                }
            }
        }
        Ok(self.timeout)
    }

    fn is_async(&self, invocation: &Invocation) -> bool {
        match invocation.get_attachment(ASYNC_KEY) {
            None => false,
            Some(s) => match parse_bool(s) {
                Ok(b) => b,
                Err(e) => {
                    logger_warn!(self.logger, "attachment {}={:?} ignored: {}", ASYNC_KEY, s, e);
                    false
                }
            },
        }
    }

    fn fill_attachments(&self, ctx: &CallContext, invocation: &mut Invocation) -> String {
        let url = self.base.url();
        invocation.set_attachment(PATH_KEY, url.get_param_or(INTERFACE_KEY, ""));
        for key in ATTACHMENT_KEYS {
            if let Some(v) = url.get_param(key).filter(|v| !v.is_empty()) {
                invocation.set_attachment(key, v);
            }
        }
        if let Some(span) = ctx.span() {
            match inject_trace_ctx(span, invocation.attachments()) {
                Ok(attachments) => invocation.replace_attachments(attachments),
                Err(e) => {
                    logger_warn!(self.logger, "failed to inject span {:?}: {}", span, e);
                }
            }
        }
        let serialization = url
            .get_param(SERIALIZATION_KEY)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SERIALIZATION);
        invocation.set_attachment(SERIALIZATION_KEY, serialization);
        serialization.to_string()
    }
}

impl<F: ClientFacts> Invoker for RemoteInvoker<F> {
    #[inline]
    fn get_url(&self) -> &Url {
        self.base.url()
    }

    /// True when a client is bound and reports itself available
    #[inline]
    fn is_available(&self) -> bool {
        match self.client.read().as_ref() {
            Some(client) => client.is_available(),
            None => false,
        }
    }

    async fn invoke(
        &self, ctx: &CallContext, invocation: &mut Invocation,
    ) -> Result<InvokeReply, RpcError> {
        if !self.base.is_available() {
            return Err(RpcError::DestroyedInvoker);
        }
        let client = {
            let guard = self.client.read();
            let Some(client) = guard.as_ref() else {
                return Err(RpcError::ClientClosed);
            };
            // destroy may have run between the first check and the lock
            if !self.base.is_available() {
                return Err(RpcError::DestroyedInvoker);
            }
            client.clone()
        };

        let serialization = self.fill_attachments(ctx, invocation);
        let is_async = self.is_async(invocation);
        let timeout = self.resolve_timeout(invocation)?;
        invocation.set_attachment(TIMEOUT_KEY, &timeout.as_millis().to_string());

        if is_async {
            let req = self.new_request(invocation, serialization, invocation.has_callback());
            let res = match invocation.take_callback() {
                Some(cb) => client.async_request(req, timeout, cb),
                None => client.send(req),
            };
            if let Err(e) = res.as_ref() {
                logger_debug!(self.logger, "{} async call {} failed: {}", self, invocation.method_name(), e);
            }
            return res.map(|_| InvokeReply::default());
        }

        if !invocation.has_reply_slot() {
            return Err(RpcError::NoReply);
        }
        let req = self.new_request(invocation, serialization, true);
        match client.request(req, timeout).await {
            Ok(resp) => {
                invocation.fill_reply(resp.body.clone());
                Ok(InvokeReply { rest: Some(resp.body), attrs: resp.attrs })
            }
            Err(e) => {
                logger_debug!(self.logger, "{} call {} failed: {}", self, invocation.method_name(), e);
                Err(e)
            }
        }
    }

    /// Detach the client and release it to the pool, the connection is closed with the last
    /// invoker of the endpoint.
    fn destroy(&self) {
        self.quit_once.call_once(|| {
            self.base.destroy();
            let client = self.client.write().take();
            if let Some(client) = client {
                if self.pool.release(&client) {
                    logger_info!(self.logger, "{} destroyed with the last reference of {}", self, client);
                } else {
                    logger_debug!(self.logger, "{} destroyed", self);
                }
            }
        });
    }
}

impl<F: ClientFacts> RemoteInvoker<F> {
    #[inline]
    fn new_request(&self, invocation: &Invocation, serialization: String, two_way: bool) -> Request {
        Request {
            url: self.base.url().clone(),
            method_name: invocation.method_name().to_string(),
            arguments: invocation.arguments().to_vec(),
            attachments: invocation.attachments().clone(),
            serialization,
            two_way,
        }
    }
}

impl<F: ClientFacts> fmt::Display for RemoteInvoker<F> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RemoteInvoker({})", self.base.url().service_key())
    }
}
