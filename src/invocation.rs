//! The description of one call, and what comes back from it.

use relay_rpc_core::error::RpcError;
use rmpv::Value;
use std::collections::HashMap;
use std::fmt;

/// String metadata sent along with the request
pub type Attachments = HashMap<String, String>;

/// Receives the completion of an asynchronous call, out of band.
pub type Callback = Box<dyn FnOnce(Result<InvokeReply, RpcError>) + Send + 'static>;

/// A single call: method, arguments, attachments, an optional reply slot and callback.
///
/// Attachments may be changed until the invocation is handed to an invoker. The invoker adds
/// the reserved keys before dispatch, and they stay in place afterwards so the caller can
/// observe what was sent (including the resolved `timeout`).
pub struct Invocation {
    method_name: String,
    arguments: Vec<Value>,
    attachments: Attachments,
    reply: Option<Value>,
    callback: Option<Callback>,
}

impl Invocation {
    pub fn new(method_name: &str, arguments: Vec<Value>) -> Self {
        Self {
            method_name: method_name.to_string(),
            arguments,
            attachments: Attachments::new(),
            reply: None,
            callback: None,
        }
    }

    /// Prepare a reply slot, required by synchronous calls
    #[inline]
    pub fn with_reply(mut self) -> Self {
        self.reply = Some(Value::Nil);
        self
    }

    #[inline]
    pub fn with_callback<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Result<InvokeReply, RpcError>) + Send + 'static,
    {
        self.callback = Some(Box::new(f));
        self
    }

    #[inline]
    pub fn with_attachment(mut self, key: &str, value: &str) -> Self {
        self.set_attachment(key, value);
        self
    }

    #[inline]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    #[inline]
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    #[inline]
    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    #[inline]
    pub fn set_attachment(&mut self, key: &str, value: &str) {
        self.attachments.insert(key.to_string(), value.to_string());
    }

    #[inline]
    pub fn get_attachment(&self, key: &str) -> Option<&str> {
        self.attachments.get(key).map(|v| v.as_str())
    }

    #[inline]
    pub fn get_attachment_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_attachment(key).unwrap_or(default)
    }

    #[inline]
    pub(crate) fn replace_attachments(&mut self, attachments: Attachments) {
        self.attachments = attachments;
    }

    /// The reply slot, filled after a successful synchronous call
    #[inline]
    pub fn reply(&self) -> Option<&Value> {
        self.reply.as_ref()
    }

    #[inline]
    pub(crate) fn has_reply_slot(&self) -> bool {
        self.reply.is_some()
    }

    #[inline]
    pub(crate) fn fill_reply(&mut self, value: Value) {
        self.reply = Some(value);
    }

    #[inline]
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    #[inline]
    pub(crate) fn take_callback(&mut self) -> Option<Callback> {
        self.callback.take()
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method", &self.method_name)
            .field("args", &self.arguments.len())
            .field("attachments", &self.attachments)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// A successful call: the reply payload and the auxiliary attributes of the transport.
///
/// Asynchronous and one-way calls return an empty reply.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InvokeReply {
    pub rest: Option<Value>,
    pub attrs: HashMap<String, String>,
}
