mod common;

use common::{init_tracing, modbus_config, StubAdapter};
use otlink_core::ConnectionPool;
use otlink_sdk::{AdapterError, ConnectionConfig, Protocol, ProtocolAdapter};
use std::sync::{atomic::Ordering, Arc};
use std::time::Duration;

fn modbus_cfg(host: &str, unit: u8) -> ConnectionConfig {
    ConnectionConfig::parse(Protocol::Modbus, &modbus_config(host, unit)).unwrap()
}

#[tokio::test]
async fn second_lookup_with_equal_key_reuses_the_live_handle() {
    init_tracing();
    let stub = StubAdapter::new(Protocol::Modbus);
    let pool = ConnectionPool::new(vec![stub.clone() as Arc<dyn ProtocolAdapter>]);
    let cfg = modbus_cfg("10.0.0.5", 1);

    pool.get_handle(&cfg).await.unwrap();
    pool.get_handle(&cfg).await.unwrap();

    assert_eq!(stub.connect_attempts.load(Ordering::SeqCst), 1);
    assert_eq!(pool.cached_count(), 1);
}

#[tokio::test]
async fn stale_handle_is_evicted_disconnected_and_replaced() {
    init_tracing();
    let stub = StubAdapter::new(Protocol::Modbus);
    let pool = ConnectionPool::new(vec![stub.clone() as Arc<dyn ProtocolAdapter>]);
    let cfg = modbus_cfg("10.0.0.5", 1);

    pool.get_handle(&cfg).await.unwrap();
    stub.live.store(false, Ordering::SeqCst);
    pool.get_handle(&cfg).await.unwrap();

    assert_eq!(stub.connect_attempts.load(Ordering::SeqCst), 2);
    assert_eq!(stub.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(pool.cached_count(), 1);
}

#[tokio::test]
async fn connect_failures_are_never_cached() {
    init_tracing();
    let stub = StubAdapter::new(Protocol::Modbus);
    let pool = ConnectionPool::new(vec![stub.clone() as Arc<dyn ProtocolAdapter>]);
    let cfg = modbus_cfg("10.0.0.5", 1);

    stub.fail_connect.store(true, Ordering::SeqCst);
    let err = pool.get_handle(&cfg).await.expect_err("connect must fail");
    assert!(matches!(err, AdapterError::ConnectError(_)));
    assert_eq!(pool.cached_count(), 0);

    stub.fail_connect.store(false, Ordering::SeqCst);
    pool.get_handle(&cfg).await.unwrap();
    assert_eq!(pool.cached_count(), 1);
    assert_eq!(stub.connect_attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_adapter_is_a_fast_driver_unavailable_error() {
    init_tracing();
    let stub = StubAdapter::new(Protocol::Modbus);
    let pool = ConnectionPool::new(vec![stub as Arc<dyn ProtocolAdapter>]);
    let cfg = ConnectionConfig::parse(
        Protocol::OpcUa,
        &common::opcua_config("opc.tcp://plc:4840"),
    )
    .unwrap();

    let err = pool.get_handle(&cfg).await.expect_err("no opcua adapter");
    assert!(matches!(
        err,
        AdapterError::DriverUnavailable(Protocol::OpcUa)
    ));
}

#[tokio::test(start_paused = true)]
async fn first_connect_race_keeps_one_handle_and_discards_the_loser() {
    init_tracing();
    let stub = StubAdapter::new(Protocol::Modbus);
    *stub.connect_delay.lock().unwrap() = Some(Duration::from_millis(50));
    let pool = Arc::new(ConnectionPool::new(
        vec![stub.clone() as Arc<dyn ProtocolAdapter>],
    ));
    let cfg = modbus_cfg("10.0.0.5", 1);

    let (a, b) = tokio::join!(pool.get_handle(&cfg), pool.get_handle(&cfg));
    a.unwrap();
    b.unwrap();

    assert_eq!(stub.connect_attempts.load(Ordering::SeqCst), 2);
    assert_eq!(stub.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(pool.cached_count(), 1);
}

#[tokio::test]
async fn close_all_disconnects_every_cached_handle() {
    init_tracing();
    let stub = StubAdapter::new(Protocol::Modbus);
    let pool = ConnectionPool::new(vec![stub.clone() as Arc<dyn ProtocolAdapter>]);

    pool.get_handle(&modbus_cfg("10.0.0.5", 1)).await.unwrap();
    pool.get_handle(&modbus_cfg("10.0.0.5", 2)).await.unwrap();
    assert_eq!(pool.cached_count(), 2);

    pool.close_all().await;

    assert_eq!(pool.cached_count(), 0);
    assert_eq!(stub.disconnects.load(Ordering::SeqCst), 2);
}
