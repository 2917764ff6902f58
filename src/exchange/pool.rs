use super::{ClientFacts, ExchangeClient};
use captains_log::filter::LogFilter;
use parking_lot::Mutex;
use relay_rpc_core::Url;
use std::collections::HashMap;
use std::sync::Arc;

/// Endpoint-keyed registry of shared exchange clients.
///
/// Lookup with increment, and decrement with eviction, happen under one lock, so two
/// acquires of an endpoint never build two clients, and a release racing an acquire never
/// evicts a client that was just handed out.
pub struct ExchangeClientPool<F: ClientFacts> {
    facts: Arc<F>,
    clients: Mutex<HashMap<String, Arc<ExchangeClient<F>>>>,
    logger: Arc<LogFilter>,
}

impl<F: ClientFacts> ExchangeClientPool<F> {
    pub fn new(facts: Arc<F>) -> Self {
        let logger = facts.new_logger();
        Self { facts, clients: Mutex::new(HashMap::new()), logger }
    }

    /// Return the client of the url's endpoint, its active number counts the caller.
    pub fn acquire(&self, url: &Url) -> Arc<ExchangeClient<F>> {
        let key = url.endpoint_key();
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&key) {
            if !client.is_closed() {
                let n = client.increase_active_number();
                logger_trace!(self.logger, "{} acquired, active {}", client, n);
                return client.clone();
            }
            logger_debug!(self.logger, "{} was closed, replace it", client);
        }
        let client = Arc::new(ExchangeClient::new(self.facts.clone(), url));
        client.increase_active_number();
        clients.insert(key, client.clone());
        client
    }

    /// Drop one reference of the client.
    ///
    /// When nobody holds it anymore, the entry is removed (if it is still this client) and the
    /// connection closed. Return true when the client was closed by this call.
    pub fn release(&self, client: &Arc<ExchangeClient<F>>) -> bool {
        let mut clients = self.clients.lock();
        let n = client.decrease_active_number();
        if n > 0 {
            logger_trace!(self.logger, "{} released, active {}", client, n);
            return false;
        }
        if clients.get(client.endpoint()).is_some_and(|cur| Arc::ptr_eq(cur, client)) {
            clients.remove(client.endpoint());
        } else {
            logger_debug!(self.logger, "{} no longer in pool", client);
        }
        drop(clients);
        if client.is_closed() {
            return false;
        }
        client.close();
        true
    }

    #[inline]
    pub(crate) fn logger(&self) -> &Arc<LogFilter> {
        &self.logger
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    #[inline]
    pub fn contains(&self, url: &Url) -> bool {
        self.clients.lock().contains_key(&url.endpoint_key())
    }
}
