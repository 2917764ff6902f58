#![allow(dead_code)]

pub use captains_log::logfn;
use captains_log::*;
use parking_lot::Mutex;
use relay_rpc_config_center::{ConfigChangeEvent, ConfigurationListener};
use relay_rpc_tokio::TokioRT;
use rstest::*;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

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
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap(),
        }
    }

    pub fn rt(&self) -> TokioRT {
        TokioRT::new(self.rt.handle().clone())
    }

    pub fn block_on<F: Future<Output = ()> + Send + 'static>(&self, f: F) {
        self.rt.block_on(f);
    }
}

/// Keeps every event it receives
#[derive(Default)]
pub struct RecordListener {
    events: Mutex<Vec<ConfigChangeEvent>>,
}

impl RecordListener {
    pub fn events(&self) -> Vec<ConfigChangeEvent> {
        self.events.lock().clone()
    }

    /// Poll until `n` events arrived or the deadline passed
    pub async fn wait_for(&self, n: usize, timeout: Duration) -> Vec<ConfigChangeEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let events = self.events();
            if events.len() >= n || Instant::now() > deadline {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl ConfigurationListener for RecordListener {
    fn process(&self, event: &ConfigChangeEvent) {
        self.events.lock().push(event.clone());
    }
}
