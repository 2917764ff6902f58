mod common;

use common::*;
use relay_rpc_config_center::*;
use relay_rpc_core::Url;
use relay_rpc_core::constant::*;
use relay_rpc_core::error::ConfigError;
use rstest::*;
use std::sync::Arc;
use std::time::Duration;

const RULE_KEY: &str = "org.apache.dubbo.DemoService.configurators";

fn zk_url() -> Url {
    Url::new("zookeeper", "127.0.0.1:2181")
}

fn new_watch(runner: &TestRunner, url: Url) -> (Arc<MemoryKvStore>, WatchConfiguration) {
    let store = Arc::new(MemoryKvStore::new());
    let config = WatchConfiguration::new(url, store.clone(), &runner.rt()).expect("new");
    (store, config)
}

#[logfn]
#[rstest]
fn test_resolve_path(runner: TestRunner) {
    let (store, config) = new_watch(&runner, zk_url());
    assert_eq!(config.root_path(), "/dubbo/config");
    assert_eq!(
        config.resolve_path(RULE_KEY, None),
        "/dubbo/config/org.apache.dubbo.DemoService/configurators"
    );
    assert_eq!(config.resolve_path("dubbo.properties", Some("dubbo")), "/dubbo/config/dubbo/dubbo.properties");
    assert_eq!(config.resolve_path("app", None), "/dubbo/config/app");

    store.put("/dubbo/config/org.apache.dubbo.DemoService/configurators", "rule: 1").expect("put");
    store.put("/dubbo/config/dubbo/dubbo.properties", "dubbo.protocol.port=20880").expect("put");
    assert_eq!(config.get_properties(RULE_KEY, None).expect("rule"), "rule: 1");
    assert_eq!(config.get_rule(RULE_KEY, None).expect("rule"), "rule: 1");
    assert_eq!(
        config.get_properties("dubbo.properties", Some("dubbo")).expect("props"),
        "dubbo.protocol.port=20880"
    );
    assert_eq!(
        config.get_internal_property("dubbo.properties", Some("dubbo")).expect("props"),
        "dubbo.protocol.port=20880"
    );
    assert!(matches!(
        config.get_properties("org.apache.dubbo.Other.configurators", None),
        Err(ConfigError::NotFound(_))
    ));

    let (_store, config) =
        new_watch(&runner, zk_url().with_param(CONFIG_NAMESPACE_KEY, "myns"));
    assert_eq!(config.root_path(), "/myns/config");
    assert_eq!(config.group_path("k", ""), "/myns/config/dubbo/k");
}

#[logfn]
#[rstest]
fn test_publish_and_keys(runner: TestRunner) {
    let (store, config) = new_watch(&runner, zk_url());
    config.publish_config("dubbo.properties", "dubbo", "a=1").expect("publish");
    config.publish_config("service.yml", "", "b: 2").expect("publish");
    config.publish_config("other", "mygroup", "c").expect("publish");
    assert_eq!(store.get("/dubbo/config/dubbo/service.yml").expect("get"), "b: 2");
    assert_eq!(config.get_properties("dubbo.properties", Some("dubbo")).expect("get"), "a=1");

    let keys = config.get_config_keys_by_group("dubbo").expect("keys");
    assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["dubbo.properties", "service.yml"]);
    let keys = config.get_config_keys_by_group("").expect("default group");
    assert_eq!(keys.len(), 2);
    assert!(matches!(config.get_config_keys_by_group("none"), Err(ConfigError::NotFound(_))));
    store.create("/dubbo/config/empty").expect("create");
    assert!(matches!(config.get_config_keys_by_group("empty"), Err(ConfigError::NotFound(_))));
}

#[logfn]
#[rstest]
fn test_base64(runner: TestRunner) {
    let (store, config) = new_watch(&runner, zk_url().with_param(CONFIG_BASE64_KEY, "true"));
    config.publish_config("dubbo.properties", "dubbo", "a=1").expect("publish");
    assert_eq!(store.get("/dubbo/config/dubbo/dubbo.properties").expect("raw"), "YT0x");
    assert_eq!(config.get_properties("dubbo.properties", Some("dubbo")).expect("get"), "a=1");

    store.put("/dubbo/config/dubbo/broken", "%%%").expect("put");
    assert!(matches!(config.get_properties("broken", Some("dubbo")), Err(ConfigError::Decode(_))));

    let store = Arc::new(MemoryKvStore::new());
    let r = WatchConfiguration::new(zk_url().with_param(CONFIG_BASE64_KEY, "yes"), store, &runner.rt());
    assert!(matches!(r, Err(ConfigError::InvalidParam { .. })));
}

#[logfn]
#[rstest]
fn test_listener(runner: TestRunner) {
    let (store, config) = new_watch(&runner, zk_url().with_param(CONFIG_BASE64_KEY, "true"));
    runner.block_on(async move {
        let listener = Arc::new(RecordListener::default());
        let other = Arc::new(RecordListener::default());
        let l: Arc<dyn ConfigurationListener> = listener.clone();
        config.add_listener(RULE_KEY, l.clone(), None);
        config.add_listener("dubbo.dubbo.properties", other.clone(), Some("dubbo"));

        let path = config.resolve_path(RULE_KEY, None);
        store.put(&path, "djE=").expect("put");
        store.put(&path, "djI=").expect("put");
        // not base64, skipped
        store.put(&path, "%%%").expect("put");
        store.delete(&path).expect("delete");
        config.publish_config("dubbo.properties", "dubbo", "a=1").expect("publish");

        let events = listener.wait_for(3, Duration::from_secs(3)).await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].key, RULE_KEY);
        assert_eq!(events[0].change_type, ConfigChangeType::Added);
        assert_eq!(events[0].value.as_deref(), Some("v1"));
        assert_eq!(events[1].change_type, ConfigChangeType::Modified);
        assert_eq!(events[1].value.as_deref(), Some("v2"));
        assert_eq!(events[2].change_type, ConfigChangeType::Deleted);
        assert_eq!(events[2].value, None);

        let events = other.wait_for(1, Duration::from_secs(3)).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].value.as_deref(), Some("a=1"));

        config.remove_listener(RULE_KEY, &l, None);
        store.put(&path, "djM=").expect("put");
        config.publish_config("dubbo.properties", "dubbo", "a=2").expect("publish");
        other.wait_for(2, Duration::from_secs(3)).await;
        assert_eq!(listener.events().len(), 3);
        config.destroy().await;
    });
}

#[logfn]
#[rstest]
fn test_destroy(runner: TestRunner) {
    let (store, config) = new_watch(&runner, zk_url());
    let config = Arc::new(config);
    runner.block_on(async move {
        assert!(config.is_available());
        assert_eq!(store.watcher_count(), 1);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let config = config.clone();
            handles.push(tokio::spawn(async move { config.destroy().await }));
        }
        for h in handles {
            h.await.expect("join");
        }
        assert!(!config.is_available());
        assert!(!store.is_connected());
        assert_eq!(store.watcher_count(), 0);
        config.destroy().await;
        assert!(matches!(config.get_properties(RULE_KEY, None), Err(ConfigError::Backend(_))));
    });
}

#[logfn]
#[rstest]
fn test_destroy_after_cancelled_destroy(runner: TestRunner) {
    let (store, config) = new_watch(&runner, zk_url());
    runner.block_on(async move {
        // may or may not finish before the deadline
        let _ = tokio::time::timeout(Duration::ZERO, config.destroy()).await;
        tokio::time::timeout(Duration::from_secs(2), config.destroy())
            .await
            .expect("destroy finished");
        assert!(!config.is_available());
        assert!(!store.is_connected());
        assert_eq!(store.watcher_count(), 0);
    });
}

#[logfn]
#[rstest]
fn test_config_center_select(runner: TestRunner) {
    let rt = runner.rt();
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let source: Arc<dyn ConfigSource> = Arc::new(MemoryConfigSource::new());
    let backends = Backends { kv: Some(kv.clone()), source: Some(source.clone()) };

    for scheme in ["zookeeper", "etcd", "watch"] {
        let c = ConfigCenter::new(Url::new(scheme, "127.0.0.1:2181"), &rt, backends.clone())
            .expect("watch");
        assert!(matches!(c, ConfigCenter::Watch(_)));
        assert_eq!(c.get_url().protocol(), scheme);
    }
    for scheme in ["apollo", "polling"] {
        let c = ConfigCenter::new(Url::new(scheme, "127.0.0.1:8080"), &rt, backends.clone())
            .expect("polling");
        assert!(matches!(c, ConfigCenter::Polling(_)));
    }
    for scheme in ["nop", "none"] {
        let c = ConfigCenter::new(Url::new(scheme, ""), &rt, Backends::default()).expect("nop");
        assert!(matches!(c, ConfigCenter::Nop(_)));
    }
    let r = ConfigCenter::new(Url::new("apollo", "127.0.0.1:8080"), &rt, Backends::with_kv(kv));
    assert!(matches!(r, Err(ConfigError::Backend(_))));
    let r = ConfigCenter::new(Url::new("zookeeper", "127.0.0.1:2181"), &rt, Backends::with_source(source));
    assert!(matches!(r, Err(ConfigError::Backend(_))));
    let r = ConfigCenter::new(Url::new("redis", "127.0.0.1:6379"), &rt, Backends::default());
    assert!(matches!(r, Err(ConfigError::Unsupported(_))));
}

#[logfn]
#[rstest]
fn test_config_center_dispatch(runner: TestRunner) {
    let kv = Arc::new(MemoryKvStore::new());
    let rt = runner.rt();
    let center = ConfigCenter::new(zk_url(), &rt, Backends::with_kv(kv.clone())).expect("new");
    runner.block_on(async move {
        center.publish_config("dubbo.properties", "dubbo", "a=1").expect("publish");
        assert_eq!(center.get_properties("dubbo.properties", Some("dubbo")).expect("get"), "a=1");
        assert_eq!(center.get_config_keys_by_group("dubbo").expect("keys").len(), 1);
        assert!(center.is_available());
        center.destroy().await;
        assert!(!center.is_available());
        assert!(!kv.is_connected());
    });
}
