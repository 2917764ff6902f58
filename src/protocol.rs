//! The owning layer of invokers: builds them against pooled clients and tears them down.

use crate::exchange::{ClientFacts, ExchangeClientPool};
use crate::invoker::{Invoker, RemoteInvoker};
use captains_log::filter::LogFilter;
use parking_lot::Mutex;
use relay_rpc_core::{ConsumerConfig, Url};
use std::sync::Arc;

pub struct RemoteProtocol<F: ClientFacts> {
    pool: Arc<ExchangeClientPool<F>>,
    consumer: ConsumerConfig,
    invokers: Mutex<Vec<Arc<RemoteInvoker<F>>>>,
    logger: Arc<LogFilter>,
}

impl<F: ClientFacts> RemoteProtocol<F> {
    pub fn new(facts: Arc<F>, consumer: ConsumerConfig) -> Self {
        let logger = facts.new_logger();
        Self {
            pool: Arc::new(ExchangeClientPool::new(facts)),
            consumer,
            invokers: Mutex::new(Vec::new()),
            logger,
        }
    }

    #[inline]
    pub fn pool(&self) -> &Arc<ExchangeClientPool<F>> {
        &self.pool
    }

    /// Build an invoker of the url, sharing the client of its endpoint
    pub fn refer(&self, url: Url) -> Arc<RemoteInvoker<F>> {
        let client = self.pool.acquire(&url);
        let invoker =
            Arc::new(RemoteInvoker::new(url, client, self.pool.clone(), &self.consumer));
        logger_info!(self.logger, "refer {}", invoker.get_url());
        let mut invokers = self.invokers.lock();
        // invokers destroyed on their own are dropped here
        invokers.retain(|i| !i.is_destroyed());
        invokers.push(invoker.clone());
        invoker
    }

    /// Number of referred invokers not destroyed yet
    pub fn invoker_count(&self) -> usize {
        let mut invokers = self.invokers.lock();
        invokers.retain(|i| !i.is_destroyed());
        invokers.len()
    }

    /// Number of invokers tracked for [RemoteProtocol::destroy]
    #[inline]
    pub fn tracked_count(&self) -> usize {
        self.invokers.lock().len()
    }

    /// Destroy every referred invoker, the pool is left empty.
    pub fn destroy(&self) {
        let invokers = std::mem::take(&mut *self.invokers.lock());
        for invoker in invokers {
            invoker.destroy();
        }
        logger_info!(self.logger, "protocol destroyed, {} clients left", self.pool.len());
    }
}
