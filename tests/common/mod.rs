#![allow(dead_code)]

pub use captains_log::logfn;
use captains_log::*;
use parking_lot::Mutex;
use relay_rpc::exchange::{ClientDefault, ExchangeTransport, Request, Response, ResponseNoti};
use relay_rpc::{ConsumerConfig, RemoteProtocol, RpcIntErr, Url};
use relay_rpc_core::ClientConfig;
use relay_rpc_core::url::parse_duration;
use relay_rpc_tokio::TokioRT;
use rmpv::Value;
use rstest::*;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Runtime;

pub const MOCK_DELAY_KEY: &str = "mock.delay";
pub const MOCK_FAIL_KEY: &str = "mock.fail";
pub const MOCK_DROP_KEY: &str = "mock.drop";
pub const MOCK_CONNECT_KEY: &str = "mock.connect";

pub type Facts = ClientDefault<MockTransport, TokioRT>;

/// Answers every two-way request with the method name as body and the request attachments
/// as attrs, behavior tuned by the `mock.*` params of the endpoint url.
///
/// `mock.connect` is the time the endpoint takes to accept a connection, the transport never
/// connects when it exceeds the configured connect timeout.
pub struct MockTransport {
    connected: bool,
    delay: Duration,
    fail: bool,
    drop_reply: bool,
    closed: AtomicBool,
    submitted: AtomicUsize,
    requests: Mutex<Vec<Request>>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MockTransport(submitted={})", self.submitted())
    }
}

impl MockTransport {
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().last().cloned()
    }
}

impl ExchangeTransport for MockTransport {
    fn new(url: &Url, config: &ClientConfig) -> Self {
        let connect = url.get_param_duration(MOCK_CONNECT_KEY, Duration::ZERO);
        Self {
            connected: connect <= config.connect_timeout,
            delay: url
                .get_param(MOCK_DELAY_KEY)
                .and_then(|s| parse_duration(s).ok())
                .unwrap_or(Duration::ZERO),
            fail: url.get_param_bool(MOCK_FAIL_KEY, false),
            drop_reply: url.get_param_bool(MOCK_DROP_KEY, false),
            closed: AtomicBool::new(false),
            submitted: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn submit(&self, req: Request, noti: Option<ResponseNoti>) -> Result<(), RpcIntErr> {
        if !self.is_available() {
            return Err(RpcIntErr::Unreachable);
        }
        if self.fail {
            return Err(RpcIntErr::IO);
        }
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(req.clone());
        let Some(noti) = noti else {
            return Ok(());
        };
        if self.drop_reply {
            return Ok(());
        }
        let resp = Response {
            body: Value::from(req.method_name.as_str()),
            attrs: req.attachments.clone(),
        };
        let delay = self.delay;
        std::thread::spawn(move || {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            let _ = noti.send(Ok(resp));
        });
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.connected && !self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[fixture]
pub fn runner() -> TestRunner {
    TestRunner::new()
}

pub struct TestRunner {
    rt: Runtime,
}

impl fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "")
    }
}

impl TestRunner {
    pub fn new() -> Self {
        recipe::raw_file_logger("/tmp/rpc_test.log", Level::Trace).test().build().expect("log");
        Self {
            rt: tokio::runtime::Builder::new_multi_thread()
                .worker_threads(8)
                .enable_all()
                .build()
                .unwrap(),
        }
    }

    pub fn facts(&self) -> std::sync::Arc<Facts> {
        let config = ClientConfig { connect_timeout: Duration::from_secs(1) };
        ClientDefault::new(config, TokioRT::new(self.rt.handle().clone()))
    }

    pub fn protocol(&self, request_timeout: Duration) -> RemoteProtocol<Facts> {
        RemoteProtocol::new(self.facts(), ConsumerConfig { request_timeout })
    }

    pub fn block_on<F: Future<Output = ()> + Send + 'static>(&self, f: F) {
        self.rt.block_on(f);
    }
}

pub fn service_url(location: &str) -> Url {
    Url::new("dubbo", location)
        .with_path("com.ikurento.user.UserProvider")
        .with_param("interface", "com.ikurento.user.UserProvider")
        .with_param("group", "myGroup")
        .with_param("version", "1.0.0")
}
