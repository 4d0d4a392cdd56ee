//! End-to-end scenarios against the mock backend.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use tradelink::{
    BarData, BarUnit, DataField, Exchange, OrderEvent, OrderId, OrderStatus, Position, Quote,
    QuoteKind, RealtimeBarRequest, Side, Ticker, TradeOrder,
};
use tradelink_broker::mock::{FillMode, MockBackend};
use tradelink_broker::{
    Broker, BrokerClient, BrokerConfig, BrokerError, HistoricalDataRequest, ListenerId,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn eurusd() -> Ticker {
    Ticker::currency("EUR", "USD", Exchange::IDEALPRO).unwrap()
}

fn qqq() -> Ticker {
    Ticker::equity("QQQ", Exchange::NASDAQ).unwrap()
}

fn connected(backend: MockBackend) -> BrokerClient<MockBackend> {
    init_logging();
    let broker = BrokerClient::new(backend);
    broker.connect().unwrap();
    broker
}

fn wait_for(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting");
        thread::sleep(Duration::from_millis(2));
    }
}

type Log = Arc<Mutex<Vec<String>>>;

fn record_errors(broker: &impl Broker) -> Log {
    let log: Log = Arc::default();
    let sink = Arc::clone(&log);
    broker.add_broker_error_listener(Arc::new(move |e: &BrokerError| {
        sink.lock().push(e.to_string())
    }));
    log
}

fn record_events(broker: &impl Broker, name: &'static str, log: &Log) -> ListenerId {
    let sink = Arc::clone(log);
    broker.add_order_event_listener(Arc::new(move |e: &OrderEvent| -> anyhow::Result<()> {
        sink.lock().push(format!("{name}:{}:{}", e.order_id, e.status));
        Ok(())
    }))
}

// ============================================================================
// Order entry
// ============================================================================

#[test]
fn submit_fill_and_query() {
    let broker = connected(MockBackend::builder().market_price(1.1).build());
    let log: Log = Arc::default();
    record_events(&broker, "s", &log);

    let mut guard = broker.acquire_lock().unwrap();
    let id = guard.next_order_id().unwrap();
    let mut order = TradeOrder::market(eurusd(), Side::Buy, 20_000);
    order.assign_id(id).unwrap();
    guard.place_order(&order).unwrap();
    guard.release();

    wait_for(|| log.lock().len() == 2);
    assert_eq!(
        *log.lock(),
        vec![format!("s:{id}:SUBMITTED"), format!("s:{id}:FILLED")]
    );

    let status = broker.request_order_status(id).unwrap().unwrap();
    assert_eq!(status.status(), OrderStatus::Filled);
    assert_eq!(status.filled_quantity(), 20_000);
    assert_eq!(broker.fill_position(&eurusd()), 20_000);
    assert_eq!(broker.fill_positions().len(), 1);
}

#[test]
fn concurrent_submitters_get_increasing_ids() {
    let broker = Arc::new(connected(
        MockBackend::builder().fill_mode(FillMode::Manual).build(),
    ));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let broker = Arc::clone(&broker);
            thread::spawn(move || {
                (0..20)
                    .map(|_| broker.submit(TradeOrder::market(qqq(), Side::Buy, 1)).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let mut all = Vec::new();
    for h in handles {
        let ids = h.join().unwrap();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        all.extend(ids);
    }

    let placed: Vec<OrderId> = broker
        .backend()
        .placed_orders()
        .iter()
        .filter_map(TradeOrder::id)
        .collect();
    assert_eq!(placed.len(), 120);
    assert!(placed.windows(2).all(|w| w[0] < w[1]));
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 120);
}

#[test]
fn regressing_backend_id_is_refused() {
    let broker = connected(
        MockBackend::builder()
            .fill_mode(FillMode::Manual)
            .with_order_ids([5, 5])
            .build(),
    );
    assert_eq!(
        broker.submit(TradeOrder::market(qqq(), Side::Buy, 1)).unwrap(),
        OrderId(5)
    );
    let err = broker
        .submit(TradeOrder::market(qqq(), Side::Buy, 1))
        .unwrap_err();
    assert!(matches!(err, BrokerError::OrderIdRegression { .. }));
    assert_eq!(broker.backend().placed_orders().len(), 1);
}

#[test]
fn lock_times_out_while_held() {
    init_logging();
    let config = BrokerConfig::from_toml("[orders]\nlock_timeout_ms = 30").unwrap();
    let broker = Arc::new(BrokerClient::with_config(MockBackend::builder().build(), config));
    broker.connect().unwrap();

    let guard = broker.acquire_lock().unwrap();
    let other = Arc::clone(&broker);
    let res = thread::spawn(move || other.acquire_lock().map(|_| ()))
        .join()
        .unwrap();
    assert!(matches!(res, Err(BrokerError::LockTimeout(_))));
    drop(guard);
    assert!(broker.acquire_lock().is_ok());
}

#[test]
fn cancel_and_replace() {
    let broker = connected(
        MockBackend::builder()
            .fill_mode(FillMode::ImmediatePartial(0.5))
            .build(),
    );
    let original = broker
        .submit(TradeOrder::limit(qqq(), Side::Buy, 10, 300.0))
        .unwrap();
    wait_for(|| {
        broker.request_order_status(original).unwrap().map(|o| o.status())
            == Some(OrderStatus::PartiallyFilled)
    });
    assert_eq!(broker.open_orders().unwrap().len(), 1);

    let replacement = broker
        .cancel_and_replace_order(original, TradeOrder::limit(qqq(), Side::Buy, 5, 299.5))
        .unwrap();
    assert!(replacement > original);
    assert_eq!(broker.backend().cancelled_orders(), vec![original]);

    wait_for(|| {
        broker.request_order_status(original).unwrap().map(|o| o.status())
            == Some(OrderStatus::Cancelled)
    });
    let open: Vec<_> = broker
        .open_orders()
        .unwrap()
        .iter()
        .filter_map(TradeOrder::id)
        .collect();
    assert_eq!(open, vec![replacement]);
}

#[test]
fn cancel_by_order_value_needs_id() {
    let broker = connected(MockBackend::builder().build());
    let err = broker
        .cancel(&TradeOrder::market(qqq(), Side::Sell, 1))
        .unwrap_err();
    assert!(matches!(err, BrokerError::MissingOrderId));
}

#[test]
fn positions_from_backend() {
    let broker = connected(
        MockBackend::builder()
            .with_position(Position::reported(qqq(), -30, 310.0))
            .build(),
    );
    let positions = broker.all_positions().unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].quantity, -30);
}

// ============================================================================
// Event dispatch
// ============================================================================

#[test]
fn listeners_see_events_in_order() {
    let broker = connected(MockBackend::builder().fill_mode(FillMode::Manual).build());
    let log: Log = Arc::default();
    record_events(&broker, "L1", &log);
    record_events(&broker, "L2", &log);

    let hub = broker.events();
    let now = Utc::now();
    hub.push_order_event(OrderEvent::submitted(OrderId(1), now));
    hub.push_order_event(OrderEvent::submitted(OrderId(2), now));

    wait_for(|| log.lock().len() == 4);
    assert_eq!(
        *log.lock(),
        vec!["L1:1:SUBMITTED", "L2:1:SUBMITTED", "L1:2:SUBMITTED", "L2:2:SUBMITTED"]
    );
}

#[test]
fn failing_listener_does_not_starve_others() {
    let broker = connected(MockBackend::builder().fill_mode(FillMode::Manual).build());
    let errors = record_errors(&broker);
    let log: Log = Arc::default();
    broker.add_order_event_listener(Arc::new(|_: &OrderEvent| -> anyhow::Result<()> {
        anyhow::bail!("strategy blew up")
    }));
    broker.add_order_event_listener(Arc::new(|_: &OrderEvent| -> anyhow::Result<()> {
        panic!("strategy panicked")
    }));
    record_events(&broker, "ok", &log);

    let hub = broker.events();
    for id in 1..=3 {
        hub.push_order_event(OrderEvent::submitted(OrderId(id), Utc::now()));
    }

    wait_for(|| log.lock().len() == 3);
    wait_for(|| errors.lock().len() == 6);
    assert!(errors.lock()[0].contains("strategy blew up"));
    assert!(errors.lock()[1].contains("strategy panicked"));
    assert!(broker.is_processing_events());
}

#[test]
fn removed_listener_gets_nothing_more() {
    let broker = connected(MockBackend::builder().fill_mode(FillMode::Manual).build());
    let log: Log = Arc::default();
    let id = record_events(&broker, "x", &log);
    let hub = broker.events();

    hub.push_order_event(OrderEvent::submitted(OrderId(1), Utc::now()));
    wait_for(|| log.lock().len() == 1);

    assert!(broker.remove_order_event_listener(id));
    assert!(!broker.remove_order_event_listener(id));
    hub.push_order_event(OrderEvent::submitted(OrderId(2), Utc::now()));
    wait_for(|| broker.pending_events() == 0);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn illegal_transition_is_reported_not_delivered() {
    let broker = connected(MockBackend::builder().fill_mode(FillMode::Manual).build());
    let errors = record_errors(&broker);
    let log: Log = Arc::default();
    record_events(&broker, "x", &log);

    let id = broker
        .submit(TradeOrder::market(qqq(), Side::Buy, 5))
        .unwrap();
    let hub = broker.backend().hub().unwrap();
    let now = Utc::now();
    hub.push_order_event(OrderEvent::submitted(id, now));
    hub.push_order_event(OrderEvent::cancelled(id, now));
    hub.push_order_event(OrderEvent::filled(id, 5, 1.0, now));

    wait_for(|| errors.lock().len() == 1);
    assert_eq!(log.lock().len(), 2);
    assert_eq!(
        broker.request_order_status(id).unwrap().unwrap().status(),
        OrderStatus::Cancelled
    );
    assert!(broker.fill_positions().is_empty());
}

#[test]
fn listener_may_disconnect_from_callback() {
    let broker = Arc::new(connected(MockBackend::builder().build()));
    let weak = Arc::downgrade(&broker);
    let seen: Log = Arc::default();
    let sink = Arc::clone(&seen);
    broker.add_order_event_listener(Arc::new(move |e: &OrderEvent| -> anyhow::Result<()> {
        sink.lock().push(e.status.to_string());
        if e.status == OrderStatus::Filled {
            if let Some(broker) = weak.upgrade() {
                broker.disconnect()?;
            }
        }
        Ok(())
    }));

    broker.submit(TradeOrder::market(qqq(), Side::Buy, 1)).unwrap();
    wait_for(|| !broker.is_connected());
    assert_eq!(*seen.lock(), vec!["SUBMITTED", "FILLED"]);
    wait_for(|| !broker.is_processing_events());
}

#[test]
fn connection_loss_reaches_error_listeners() {
    let broker = connected(MockBackend::builder().build());
    let errors = record_errors(&broker);
    broker.backend().hub().unwrap().connection_lost("gateway restarted");

    assert!(!broker.is_connected());
    assert_eq!(*errors.lock(), vec!["connection error: gateway restarted"]);
    assert!(matches!(
        broker.submit(TradeOrder::market(qqq(), Side::Buy, 1)),
        Err(BrokerError::NotConnected)
    ));

    broker.connect().unwrap();
    assert!(broker.is_connected());
    assert_eq!(broker.backend().connect_count(), 2);
}

// ============================================================================
// Market data
// ============================================================================

#[test]
fn bar_subscriptions_are_shared() {
    let broker = connected(MockBackend::builder().build());
    let request = RealtimeBarRequest::new(eurusd(), 5, BarUnit::Second, DataField::Midpoint);
    let seen: Log = Arc::default();

    let subscribe = |name: &'static str| {
        let sink = Arc::clone(&seen);
        broker
            .subscribe_realtime_bars(
                request.clone(),
                Arc::new(move |_: &RealtimeBarRequest, bar: &BarData| -> anyhow::Result<()> {
                    sink.lock().push(format!("{name}:{}", bar.close));
                    Ok(())
                }),
            )
            .unwrap()
    };
    let a = subscribe("a");
    let b = subscribe("b");
    assert_eq!(broker.backend().bar_subscription_calls(), (1, 0));

    let hub = broker.backend().hub().unwrap();
    let bar = BarData::new(Utc::now(), 1.1, 1.2, 1.0, 1.15, 0.0, 5, BarUnit::Second);
    hub.deliver_bar(&request, &bar);
    assert_eq!(*seen.lock(), vec!["a:1.15", "b:1.15"]);

    assert!(broker.unsubscribe_realtime_bars(&request, a).unwrap());
    assert_eq!(broker.backend().bar_subscription_calls(), (1, 0));
    hub.deliver_bar(&request, &bar);
    assert_eq!(seen.lock().len(), 3);

    assert!(broker.unsubscribe_realtime_bars(&request, b).unwrap());
    assert_eq!(broker.backend().bar_subscription_calls(), (1, 1));
    assert!(!broker.unsubscribe_realtime_bars(&request, b).unwrap());
    assert_eq!(broker.backend().bar_subscription_calls(), (1, 1));
}

#[test]
fn quote_subscriptions_route_by_ticker() {
    let broker = connected(MockBackend::builder().build());
    let seen: Log = Arc::default();
    let sink = Arc::clone(&seen);
    let id = broker
        .subscribe_quotes(
            qqq(),
            Arc::new(move |q: &Quote| -> anyhow::Result<()> {
                sink.lock().push(format!("{:?}={}", q.kind, q.value));
                Ok(())
            }),
        )
        .unwrap();

    let hub = broker.events();
    hub.deliver_quote(&Quote::new(qqq(), QuoteKind::Bid, 300.1, Utc::now()));
    hub.deliver_quote(&Quote::new(eurusd(), QuoteKind::Bid, 1.1, Utc::now()));
    assert_eq!(*seen.lock(), vec!["Bid=300.1"]);

    assert!(broker.unsubscribe_quotes(&qqq(), id).unwrap());
    assert_eq!(broker.backend().quote_subscription_calls(), (1, 1));
}

#[test]
fn subscriptions_survive_reconnect() {
    let broker = connected(MockBackend::builder().build());
    let request = RealtimeBarRequest::new(eurusd(), 5, BarUnit::Second, DataField::Midpoint);
    let seen: Log = Arc::default();
    let sink = Arc::clone(&seen);
    let bars = broker
        .subscribe_realtime_bars(
            request.clone(),
            Arc::new(move |_: &RealtimeBarRequest, bar: &BarData| -> anyhow::Result<()> {
                sink.lock().push(format!("{}", bar.close));
                Ok(())
            }),
        )
        .unwrap();
    let quotes = broker
        .subscribe_quotes(qqq(), Arc::new(|_: &Quote| -> anyhow::Result<()> { Ok(()) }))
        .unwrap();

    broker.disconnect().unwrap();
    broker.connect().unwrap();
    assert_eq!(broker.backend().bar_subscription_calls(), (2, 0));
    assert_eq!(broker.backend().quote_subscription_calls(), (2, 0));

    let bar = BarData::new(Utc::now(), 1.1, 1.2, 1.0, 1.15, 0.0, 5, BarUnit::Second);
    broker.backend().hub().unwrap().deliver_bar(&request, &bar);
    assert_eq!(*seen.lock(), vec!["1.15"]);

    assert!(broker.unsubscribe_realtime_bars(&request, bars).unwrap());
    assert!(broker.unsubscribe_quotes(&qqq(), quotes).unwrap());
    assert_eq!(broker.backend().bar_subscription_calls(), (2, 1));
    assert_eq!(broker.backend().quote_subscription_calls(), (2, 1));
}

#[test]
fn subscribe_requires_connection() {
    init_logging();
    let broker = BrokerClient::new(MockBackend::builder().build());
    let request = RealtimeBarRequest::new(qqq(), 1, BarUnit::Minute, DataField::Trades);
    let res = broker.subscribe_realtime_bars(
        request,
        Arc::new(|_: &RealtimeBarRequest, _: &BarData| -> anyhow::Result<()> { Ok(()) }),
    );
    assert!(matches!(res, Err(BrokerError::NotConnected)));
    assert_eq!(broker.backend().bar_subscription_calls(), (0, 0));
}

// ============================================================================
// Historical data and time
// ============================================================================

fn hourly_bar(day: u32, hour: u32, close: f64) -> BarData {
    let ts = Utc.with_ymd_and_hms(2019, 11, day, hour, 0, 0).unwrap();
    BarData::new(ts, close, close + 0.01, close - 0.01, close, 0.0, 1, BarUnit::Hour)
}

fn one_day_request() -> HistoricalDataRequest {
    HistoricalDataRequest::new(
        eurusd(),
        Utc.with_ymd_and_hms(2019, 11, 29, 23, 0, 0).unwrap(),
        1,
        BarUnit::Day,
        1,
        BarUnit::Hour,
        DataField::Midpoint,
    )
}

#[test]
fn historical_bars_sorted_and_bounded() {
    let mut history: Vec<BarData> = (0..24).rev().map(|h| hourly_bar(29, h, 1.10)).collect();
    history.push(hourly_bar(27, 12, 1.0));
    let broker = connected(MockBackend::builder().with_history(history).build());

    let bars = broker.request_historical_data(&one_day_request()).unwrap();
    assert_eq!(bars.len(), 24);
    assert!(BarData::is_ascending(&bars));
    assert_eq!(broker.backend().history_requests(), 1);
}

#[test]
fn historical_failure_is_one_error() {
    let broker = connected(MockBackend::builder().fail_history("pacing violation").build());
    let err = broker
        .request_historical_data(&one_day_request())
        .unwrap_err();
    assert!(matches!(err, BrokerError::HistoricalData(_)));
    assert!(err.to_string().contains("pacing violation"));
    assert_eq!(broker.backend().history_requests(), 1);
}

#[test]
fn invalid_historical_request_is_not_sent() {
    let broker = connected(MockBackend::builder().build());
    let mut request = one_day_request();
    request.bar_size = 0;
    assert!(matches!(
        broker.request_historical_data(&request),
        Err(BrokerError::InvalidRequest(_))
    ));
    assert_eq!(broker.backend().history_requests(), 0);
}

#[test]
fn time_sync_publishes_broker_clock() {
    init_logging();
    let clock = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
    let config = BrokerConfig::from_toml("[time_sync]\ninterval_ms = 5").unwrap();
    let broker = BrokerClient::with_config(MockBackend::builder().clock(clock).build(), config);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    broker.add_time_update_listener(Arc::new(
        move |t: tradelink::Timestamp| -> anyhow::Result<()> {
            sink.lock().push(t);
            Ok(())
        },
    ));
    broker.connect().unwrap();

    wait_for(|| !seen.lock().is_empty());
    assert_eq!(seen.lock()[0], clock);
    assert_eq!(broker.last_broker_time(), Some(clock));
    assert_eq!(broker.current_time().unwrap(), clock);
    broker.disconnect().unwrap();
}

#[test]
fn combo_tickers() {
    let broker = connected(MockBackend::builder().build());
    let cl = Ticker::futures("CL", Exchange::NYMEX, 4, 2016).unwrap();
    let ho = Ticker::futures("HO", Exchange::NYMEX, 4, 2016).unwrap();

    let spread = broker.build_combo_ticker(&cl, &ho).unwrap();
    assert!(spread.is_combo());
    assert_eq!(spread.legs().len(), 2);

    let crack = broker.build_combo_ticker_with_ratios(&cl, 3, &ho, 2).unwrap();
    assert_eq!(crack.legs()[0].ratio, 3);
    assert_eq!(crack.legs()[1].ratio, 2);
    assert_ne!(spread, crack);

    assert!(matches!(
        broker.build_combo_ticker_with_ratios(&cl, 0, &ho, 1),
        Err(BrokerError::InvalidTicker(_))
    ));
}
