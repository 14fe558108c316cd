//! Registry behavior against scripted transports
//!
//! Every test runs on a paused clock so reconnect delays elapse instantly
//! and deterministically.

use pricefeed_ws::transport::{MockConnector, MockTransport};
use pricefeed_ws::{
    DisconnectReason, Hooks, LifecycleEvent, MarketEvent, StreamConfig, StreamStatus, SubscriptionRegistry,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const TICKER: &str = r#"{"e":"24hrTicker","E":1700000000000,"s":"BTCUSDT","p":"250.00","P":"0.58",
    "o":"43000.50","h":"43500.00","l":"42800.00","c":"43250.50","v":"1234.5","q":"53400000.1",
    "b":"43250.40","a":"43250.60"}"#;

const KLINE_1H: &str = r#"{"e":"kline","E":1700003600000,"s":"ETHUSDT","k":{"t":1700000000000,
    "T":1700003599999,"s":"ETHUSDT","i":"1h","o":"2600","c":"2650","h":"2660","l":"2590",
    "v":"120.5","n":42,"x":true}}"#;

const TRADE: &str = r#"{"e":"trade","E":1700000000001,"s":"ETHUSDT","t":777,"p":"2649.5",
    "q":"0.25","T":1700000000000,"m":true}"#;

const DEPTH5: &str = r#"{"lastUpdateId":160,"bids":[["0.0024","10"],["0.0023","5"]],
    "asks":[["0.0026","100"]]}"#;

type Collected = Arc<Mutex<Vec<MarketEvent>>>;

fn collector() -> (Collected, impl Fn(MarketEvent) + Send + Sync + 'static) {
    let events: Collected = Arc::default();
    let sink = Arc::clone(&events);
    (events, move |event| sink.lock().unwrap().push(event))
}

fn registry(connector: &MockConnector) -> SubscriptionRegistry {
    SubscriptionRegistry::with_connector(StreamConfig::default(), connector.clone())
}

fn frames(frames: &[&str]) -> MockTransport {
    let mut transport = MockTransport::new("");
    transport.push_responses(frames.iter().copied());
    transport
}

async fn next_matching<F>(events: &mut UnboundedReceiver<LifecycleEvent>, pred: F) -> LifecycleEvent
where
    F: Fn(&LifecycleEvent) -> bool,
{
    loop {
        let event = events.recv().await.expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn ticker_price_is_delivered_exactly() {
    let connector = MockConnector::new();
    connector.push(frames(&[TICKER]).held_open());

    let registry = registry(&connector);
    let (received, callback) = collector();
    let id = registry.subscribe_ticker("BTCUSDT", callback).unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    match &received[0] {
        MarketEvent::Ticker(t) => {
            assert_eq!(t.symbol, "BTCUSDT");
            assert_eq!(t.price, 43250.50);
            assert_eq!(t.price.to_string(), "43250.5");
            assert_eq!(t.bid, Some(43250.40));
        }
        other => panic!("expected ticker, got {:?}", other),
    }

    assert_eq!(registry.status(id), StreamStatus::Connected);
    assert_eq!(
        connector.urls(),
        vec!["wss://stream.binance.com:9443/ws/btcusdt@ticker"]
    );
}

#[tokio::test(start_paused = true)]
async fn kline_hour_candle_preserves_fields() {
    let connector = MockConnector::new();
    connector.push(frames(&[KLINE_1H]).held_open());

    let registry = registry(&connector);
    let (received, callback) = collector();
    registry.subscribe_kline("ethusdt", "1h", callback).unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(connector.urls(), vec!["wss://stream.binance.com:9443/ws/ethusdt@kline_1h"]);
    let received = received.lock().unwrap();
    let MarketEvent::Kline(k) = &received[0] else {
        panic!("expected kline, got {:?}", received[0]);
    };
    assert_eq!(k.symbol, "ETHUSDT");
    assert_eq!(k.interval, "1h");
    assert_eq!(k.open, 2600.0);
    assert_eq!(k.close, 2650.0);
    assert_eq!(k.high, 2660.0);
    assert_eq!(k.low, 2590.0);
    assert_eq!(k.volume, 120.5);
    assert!(k.is_closed);
}

#[tokio::test(start_paused = true)]
async fn depth_symbol_comes_from_stream_name() {
    let connector = MockConnector::new();
    connector.push(frames(&[DEPTH5]).held_open());

    let registry = registry(&connector);
    let (received, callback) = collector();
    registry.subscribe_depth("bnbbtc", 5, callback).unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(connector.urls(), vec!["wss://stream.binance.com:9443/ws/bnbbtc@depth5"]);
    let received = received.lock().unwrap();
    let MarketEvent::Depth(book) = &received[0] else {
        panic!("expected depth, got {:?}", received[0]);
    };
    assert_eq!(book.symbol, "BNBBTC");
    assert_eq!(book.last_update_id, 160);
    assert_eq!(book.bids.len(), 2);
    assert_eq!(book.best_ask().map(|l| l.price), Some(0.0026));
}

#[tokio::test(start_paused = true)]
async fn combined_subscription_delivers_every_stream() {
    let ticker = format!(r#"{{"stream":"btcusdt@ticker","data":{}}}"#, TICKER);
    let trade = format!(r#"{{"stream":"ethusdt@trade","data":{}}}"#, TRADE);

    let connector = MockConnector::new();
    connector.push(frames(&[ticker.as_str(), trade.as_str()]).held_open());

    let registry = registry(&connector);
    let (received, callback) = collector();
    let id = registry
        .subscribe_multiple(["btcusdt@ticker", "ethusdt@trade"], callback)
        .unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        connector.urls(),
        vec!["wss://stream.binance.com:9443/stream?streams=btcusdt@ticker/ethusdt@trade"]
    );

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 2);
    assert!(matches!(&received[0], MarketEvent::Ticker(t) if t.symbol == "BTCUSDT"));
    assert!(matches!(&received[1], MarketEvent::Trade(t) if t.symbol == "ETHUSDT" && t.trade_id == 777));

    let active = registry.list_active();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, id);
    assert_eq!(active[0].stream_name, "btcusdt@ticker/ethusdt@trade");
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_dropped_without_reconnecting() {
    let bad_price = TRADE.replace(r#""p":"2649.5""#, r#""p":"abc""#);

    let connector = MockConnector::new();
    connector.push(frames(&[bad_price.as_str(), "not json", TRADE]).held_open());

    let dropped = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&dropped);
    let hooks = Hooks::new().on_dropped(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let registry = registry(&connector).with_hooks(hooks);
    let (received, callback) = collector();
    let id = registry.subscribe_trade("ethusdt", callback).unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(received.lock().unwrap().len(), 1);
    assert_eq!(dropped.load(Ordering::SeqCst), 2);
    assert_eq!(connector.attempts(), 1);
    assert_eq!(registry.status(id), StreamStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_cancels_pending_reconnect() {
    let connector = MockConnector::new();
    let mut first = frames(&[TICKER]);
    first.push_close();
    connector.push(first);

    let registry = registry(&connector);
    let mut events = registry.take_event_receiver().unwrap();
    let (received, callback) = collector();
    let id = registry.subscribe_ticker("btcusdt", callback).unwrap();

    let scheduled = next_matching(&mut events, |e| matches!(e, LifecycleEvent::Reconnecting { .. })).await;
    assert_eq!(
        scheduled,
        LifecycleEvent::Reconnecting {
            id,
            attempt: 1,
            delay: Duration::from_secs(1),
        }
    );
    assert_eq!(received.lock().unwrap().len(), 1);

    // Would deliver another ticker if the timer were allowed to fire
    connector.push(frames(&[TICKER]).held_open());

    assert!(registry.unsubscribe(id));
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(received.lock().unwrap().len(), 1);
    assert_eq!(connector.attempts(), 1);
    assert_eq!(registry.status(id), StreamStatus::Unknown);
    assert!(registry.list_active().is_empty());
    assert_eq!(events.recv().await, Some(LifecycleEvent::Unsubscribed { id }));
}

#[tokio::test(start_paused = true)]
async fn stalled_connect_times_out_and_retries() {
    let connector = MockConnector::new();
    connector.push(MockTransport::stalled());
    connector.push(MockTransport::new("").held_open());

    let config = StreamConfig::default().with_timeout(Duration::from_secs(1));
    let registry = SubscriptionRegistry::with_connector(config, connector.clone());
    let mut events = registry.take_event_receiver().unwrap();
    let id = registry.subscribe_ticker("btcusdt", |_| {}).unwrap();

    let disconnected = next_matching(&mut events, |e| matches!(e, LifecycleEvent::Disconnected { .. })).await;
    match disconnected {
        LifecycleEvent::Disconnected {
            reason: DisconnectReason::ConnectFailed(message),
            ..
        } => assert!(message.contains("timeout"), "unexpected reason: {}", message),
        other => panic!("expected connect failure, got {:?}", other),
    }

    let connected = next_matching(&mut events, |e| matches!(e, LifecycleEvent::Connected { .. })).await;
    assert_eq!(
        connected,
        LifecycleEvent::Connected {
            id,
            is_reconnection: false
        }
    );
    assert_eq!(connector.attempts(), 2);
    assert_eq!(registry.status(id), StreamStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_remove_subscription() {
    let connector = MockConnector::new();
    let mut first = MockTransport::new("");
    first.push_close();
    connector.push(first);

    let dead_streams = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&dead_streams);
    let hooks = Hooks::new().on_dead(move |_, stream| sink.lock().unwrap().push(stream.to_string()));

    let registry = registry(&connector).with_hooks(hooks);
    let mut events = registry.take_event_receiver().unwrap();
    let id = registry.subscribe_ticker("btcusdt", |_| {}).unwrap();

    let mut delays = Vec::new();
    let mut reasons = Vec::new();
    loop {
        match events.recv().await.unwrap() {
            LifecycleEvent::Reconnecting { attempt, delay, .. } => {
                assert_eq!(attempt as usize, delays.len() + 1);
                delays.push(delay);
            }
            LifecycleEvent::Disconnected { reason, .. } => reasons.push(reason),
            LifecycleEvent::Dead { id: dead, stream_name } => {
                assert_eq!(dead, id);
                assert_eq!(stream_name, "btcusdt@ticker");
                break;
            }
            LifecycleEvent::Connected { is_reconnection, .. } => assert!(!is_reconnection),
            LifecycleEvent::Unsubscribed { .. } => panic!("unexpected unsubscribe"),
        }
    }

    assert_eq!(
        delays,
        [1, 2, 4, 8, 16].map(Duration::from_secs).to_vec()
    );
    assert_eq!(reasons.len(), 6);
    assert_eq!(reasons[0], DisconnectReason::ServerClosed);
    assert!(reasons[1..]
        .iter()
        .all(|r| matches!(r, DisconnectReason::ConnectFailed(_))));
    assert_eq!(connector.attempts(), 6);

    assert!(registry.list_active().is_empty());
    assert!(!registry.unsubscribe(id));
    assert_eq!(*dead_streams.lock().unwrap(), vec!["btcusdt@ticker".to_string()]);

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(registry.status(id), StreamStatus::Unknown);
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn successful_reopen_resets_retry_count() {
    let connector = MockConnector::new();
    connector.push(MockTransport::failing());
    connector.push(MockTransport::failing());
    let mut flaky = frames(&[TRADE]);
    flaky.push_close();
    connector.push(flaky);
    connector.push(frames(&[TRADE]).held_open());

    let registry = registry(&connector);
    let mut events = registry.take_event_receiver().unwrap();
    let (received, callback) = collector();
    let id = registry.subscribe_trade("ethusdt", callback).unwrap();

    let mut delays = Vec::new();
    let mut connects = Vec::new();
    while connects.len() < 2 {
        match events.recv().await.unwrap() {
            LifecycleEvent::Reconnecting { delay, .. } => delays.push(delay),
            LifecycleEvent::Connected { is_reconnection, .. } => connects.push(is_reconnection),
            _ => {}
        }
    }

    // Two failures back off 1s then 2s; the reopen resets the count so the
    // drop after it starts over at 1s.
    assert_eq!(delays, [1, 2, 1].map(Duration::from_secs).to_vec());
    assert_eq!(connects, vec![false, true]);
    assert_eq!(registry.retry_count(id), Some(0));

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(received.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn disabled_reconnect_dies_on_first_close() {
    let connector = MockConnector::new();
    let mut first = frames(&[TRADE]);
    first.push_close();
    connector.push(first);

    let config = StreamConfig::default().without_reconnect();
    let registry = SubscriptionRegistry::with_connector(config, connector.clone());
    let mut events = registry.take_event_receiver().unwrap();
    let id = registry.subscribe_trade("ethusdt", |_| {}).unwrap();

    let dead = next_matching(&mut events, LifecycleEvent::is_terminal).await;
    assert_eq!(
        dead,
        LifecycleEvent::Dead {
            id,
            stream_name: "ethusdt@trade".into(),
        }
    );
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn subscriptions_reconnect_independently() {
    let connector = MockConnector::new();
    // First subscription: drops immediately
    let mut dropping = MockTransport::new("");
    dropping.push_close();
    connector.push(dropping);
    // Second subscription: stays up
    connector.push(frames(&[TRADE]).held_open());

    let registry = registry(&connector);
    let a = registry.subscribe_ticker("btcusdt", |_| {}).unwrap();
    let b = registry.subscribe_trade("ethusdt", |_| {}).unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(registry.status(a), StreamStatus::Closed);
    assert_eq!(registry.retry_count(a), Some(1));
    assert_eq!(registry.status(b), StreamStatus::Connected);
    assert_eq!(registry.retry_count(b), Some(0));

    let statuses: Vec<_> = registry.list_active().into_iter().map(|s| (s.id, s.status)).collect();
    assert_eq!(
        statuses,
        vec![(a, StreamStatus::Closed), (b, StreamStatus::Connected)]
    );

    registry.shutdown().await;
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_everything() {
    let connector = MockConnector::new();
    for _ in 0..3 {
        connector.push(MockTransport::new("").held_open());
    }

    let connects = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&connects);
    let hooks = Hooks::new().on_connect(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let registry = registry(&connector).with_hooks(hooks);
    for symbol in ["btcusdt", "ethusdt", "bnbusdt"] {
        registry.subscribe_ticker(symbol, |_| {}).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 3);
    assert_eq!(registry.list_active().len(), 3);

    registry.shutdown().await;

    assert!(registry.is_empty());
    assert!(registry.list_active().is_empty());
    assert_eq!(registry.unsubscribe_all(), 0);
}
