#[macro_use]
extern crate captains_log;

pub mod exchange;
pub mod invocation;
pub mod invoker;
pub mod protocol;
pub mod trace;

pub use invocation::{Attachments, Callback, Invocation, InvokeReply};
pub use invoker::{Invoker, RemoteInvoker};
pub use protocol::RemoteProtocol;
pub use relay_rpc_core::error::{RpcError, RpcIntErr};
pub use relay_rpc_core::{ConsumerConfig, Url};
pub use trace::{CallContext, TraceSpan};
