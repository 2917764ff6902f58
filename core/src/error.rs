use std::fmt;

pub const RPC_ERR_PREFIX: &'static str = "rpc_";

/// The error of one invocation, returned by the invoker to the caller.
///
/// Nothing is retried at this layer. Transport errors pass through inside [RpcError::Transport].
#[derive(thiserror::Error, Clone, PartialEq)]
pub enum RpcError {
    /// The invoker is destroyed or being destroyed
    #[error("rpc_destroyed_invoker")]
    DestroyedInvoker,
    /// The exchange client of the invoker has been detached
    #[error("rpc_client_closed")]
    ClientClosed,
    /// A synchronous call without a reply slot
    #[error("rpc_no_reply")]
    NoReply,
    #[error("rpc_invalid_argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Transport(#[from] RpcIntErr),
}

impl fmt::Debug for RpcError {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl std::cmp::PartialEq<RpcIntErr> for RpcError {
    #[inline]
    fn eq(&self, other: &RpcIntErr) -> bool {
        if let Self::Transport(r) = self {
            return r == other;
        }
        false
    }
}

/// Errors generated below the invoker, by the exchange client and its transport.
///
/// "rpc_" prefix is reserved for internal error
#[derive(
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    PartialEq,
    PartialOrd,
    Clone,
    thiserror::Error,
)]
#[repr(u8)]
pub enum RpcIntErr {
    /// Ping or connect error, or the client is closed
    #[strum(serialize = "rpc_unreachable")]
    Unreachable = 0,
    /// IO error
    #[strum(serialize = "rpc_io_err")]
    IO = 1,
    /// No response within the resolved timeout
    #[strum(serialize = "rpc_timeout")]
    Timeout = 2,
    /// Method not found
    #[strum(serialize = "rpc_method_notfound")]
    Method = 3,
    /// service notfound
    #[strum(serialize = "rpc_service_notfound")]
    Service = 4,
    /// Encode Error
    #[strum(serialize = "rpc_encode")]
    Encode = 5,
    /// Decode Error
    #[strum(serialize = "rpc_decode")]
    Decode = 6,
    /// Internal error
    #[strum(serialize = "rpc_internal_err")]
    Internal = 7,
}

// The default Debug derive just ignore strum customized string, by strum only have a Display derive
impl fmt::Debug for RpcIntErr {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl RpcIntErr {
    #[inline]
    pub fn as_bytes<'a>(&'a self) -> &'a [u8] {
        self.as_ref().as_bytes()
    }
}

impl From<std::io::Error> for RpcIntErr {
    #[inline(always)]
    fn from(_e: std::io::Error) -> Self {
        Self::IO
    }
}

/// Errors of the dynamic configuration backends
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Nothing stored at the resolved path
    #[error("config not found: {0}")]
    NotFound(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// The underlying store failed or is closed
    #[error("config backend error: {0}")]
    Backend(String),
    #[error("base64 decode error: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("invalid value {value:?} for param {key}")]
    InvalidParam { key: String, value: String },
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum UrlError {
    #[error("missing scheme in {0:?}")]
    MissingScheme(String),
    #[error("invalid param {0:?}")]
    InvalidParam(String),
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),
    #[error("invalid bool {0:?}")]
    InvalidBool(String),
}
