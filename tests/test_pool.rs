mod common;

use common::*;
use relay_rpc::exchange::ExchangeClientPool;
use relay_rpc::{CallContext, Invocation, Invoker};
use rstest::*;
use std::sync::Arc;
use std::time::Duration;

#[logfn]
#[rstest]
fn test_invokers_share_client(runner: TestRunner) {
    let protocol = runner.protocol(Duration::from_secs(3));
    runner.block_on(async move {
        let invoker1 = protocol.refer(service_url("127.0.0.1:20000"));
        let invoker2 = protocol.refer(
            service_url("127.0.0.1:20000").with_path("com.ikurento.user.OrderProvider"),
        );
        let invoker3 = protocol.refer(service_url("127.0.0.1:20001"));
        let c1 = invoker1.client().expect("client");
        let c2 = invoker2.client().expect("client");
        let c3 = invoker3.client().expect("client");
        assert!(Arc::ptr_eq(&c1, &c2));
        assert_eq!(c1.active_number(), 2);
        assert!(!Arc::ptr_eq(&c1, &c3));
        assert_eq!(c3.active_number(), 1);
        assert_eq!(protocol.pool().len(), 2);
        assert_eq!(protocol.invoker_count(), 3);

        let ctx = CallContext::new();
        for invoker in [&invoker1, &invoker2] {
            let mut inv = Invocation::new("GetUser", vec![]).with_reply();
            invoker.invoke(&ctx, &mut inv).await.expect("invoke");
        }
        assert_eq!(c1.transport().submitted(), 2);

        protocol.destroy();
        assert!(c1.is_closed());
        assert!(c3.is_closed());
        assert!(protocol.pool().is_empty());
    });
}

#[logfn]
#[rstest]
fn test_concurrent_acquire(runner: TestRunner) {
    let pool = Arc::new(ExchangeClientPool::new(runner.facts()));
    let url = service_url("127.0.0.1:20000");
    let mut threads = Vec::new();
    for _ in 0..16 {
        let pool = pool.clone();
        let url = url.clone();
        threads.push(std::thread::spawn(move || pool.acquire(&url)));
    }
    let clients: Vec<_> = threads.into_iter().map(|th| th.join().expect("join")).collect();
    for c in clients.iter() {
        assert!(Arc::ptr_eq(c, &clients[0]));
    }
    assert_eq!(clients[0].active_number(), 16);
    assert_eq!(pool.len(), 1);

    let mut threads = Vec::new();
    for c in clients.iter().cloned() {
        let pool = pool.clone();
        threads.push(std::thread::spawn(move || pool.release(&c)));
    }
    let closed: usize =
        threads.into_iter().map(|th| th.join().expect("join")).filter(|closed| *closed).count();
    assert_eq!(closed, 1);
    assert_eq!(clients[0].active_number(), 0);
    assert!(clients[0].is_closed());
    assert!(pool.is_empty());
}

#[logfn]
#[rstest]
fn test_release_racing_acquire(runner: TestRunner) {
    let pool = Arc::new(ExchangeClientPool::new(runner.facts()));
    let url = service_url("127.0.0.1:20000");
    for _ in 0..100 {
        let first = pool.acquire(&url);
        let _pool = pool.clone();
        let _url = url.clone();
        let th = std::thread::spawn(move || _pool.acquire(&_url));
        pool.release(&first);
        let second = th.join().expect("join");
        // whoever won, the survivor is open and counted once
        assert!(!second.is_closed());
        assert_eq!(second.active_number(), 1);
        assert!(pool.contains(&url));
        assert!(pool.release(&second));
        assert!(pool.is_empty());
    }
}

#[logfn]
#[rstest]
fn test_destroyed_invokers_untracked(runner: TestRunner) {
    let protocol = runner.protocol(Duration::from_secs(3));
    let mut invokers = Vec::new();
    for port in 0..4 {
        invokers.push(protocol.refer(service_url(&format!("127.0.0.1:{}", 20000 + port))));
    }
    assert_eq!(protocol.tracked_count(), 4);
    for invoker in invokers.drain(..3) {
        invoker.destroy();
    }
    assert_eq!(protocol.tracked_count(), 4);
    let last = protocol.refer(service_url("127.0.0.1:20000"));
    assert_eq!(protocol.tracked_count(), 2);
    assert_eq!(protocol.invoker_count(), 2);
    assert_eq!(protocol.pool().len(), 2);
    protocol.destroy();
    assert!(last.is_destroyed());
    assert!(invokers[0].is_destroyed());
    assert_eq!(protocol.tracked_count(), 0);
    assert!(protocol.pool().is_empty());
}
