//! JSON shape of the value types, as adapters and journals see them.
#![cfg(feature = "serde")]

use chrono::{TimeZone, Utc};
use serde_json::json;
use tradelink::{
    Exchange, OrderEvent, OrderId, OrderStatus, Side, Ticker, TimeInForce, TradeOrder,
};

#[test]
fn exchange_is_its_code() {
    assert_eq!(serde_json::to_value(Exchange::OSE).unwrap(), json!("OSE.JPN"));
    let parsed: Exchange = serde_json::from_value(json!("IDEALPRO")).unwrap();
    assert_eq!(parsed, Exchange::IDEALPRO);
}

#[test]
fn unknown_exchange_does_not_deserialize() {
    let res: Result<Exchange, _> = serde_json::from_value(json!("MOON"));
    assert!(res.is_err());
}

#[test]
fn enums_use_wire_names() {
    assert_eq!(serde_json::to_value(Side::Sell).unwrap(), json!("SELL"));
    assert_eq!(
        serde_json::to_value(OrderStatus::PartiallyFilled).unwrap(),
        json!("PARTIALLY_FILLED")
    );
}

#[test]
fn order_and_event_round_trip() {
    let crude = Ticker::futures("CL", Exchange::NYMEX, 4, 2016)
        .unwrap()
        .with_multiplier(1000)
        .unwrap();
    let mut order = TradeOrder::limit(crude, Side::Buy, 2, 38.5)
        .with_time_in_force(TimeInForce::Gtc)
        .with_reference("roll");
    order.assign_id(OrderId(41)).unwrap();

    let json = serde_json::to_string(&order).unwrap();
    let back: TradeOrder = serde_json::from_str(&json).unwrap();
    assert_eq!(back, order);

    let ts = Utc.with_ymd_and_hms(2016, 3, 1, 14, 0, 0).unwrap();
    let event = OrderEvent::partially_filled(OrderId(41), 1, 38.4, ts);
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["order_id"], json!(41));
    assert_eq!(value["status"], json!("PARTIALLY_FILLED"));
    let back: OrderEvent = serde_json::from_value(value).unwrap();
    assert_eq!(back, event);
}

fn decode_ticker(value: serde_json::Value) -> Result<Ticker, serde_json::Error> {
    serde_json::from_value(value)
}

#[test]
fn ticker_decoding_applies_constructor_rules() {
    let crude = Ticker::futures("CL", Exchange::NYMEX, 4, 2016).unwrap();
    let mut value = serde_json::to_value(&crude).unwrap();
    assert_eq!(decode_ticker(value.clone()).unwrap(), crude);

    value["kind"]["Futures"]["expiry_month"] = json!(13);
    assert!(decode_ticker(value).is_err());

    let blank = json!({"symbol": "  ", "exchange": "NASDAQ", "multiplier": 1, "kind": "Equity"});
    assert!(decode_ticker(blank).is_err());

    let no_size = json!({"symbol": "QQQ", "exchange": "NASDAQ", "multiplier": 0, "kind": "Equity"});
    assert!(decode_ticker(no_size).is_err());
}

#[test]
fn combo_decoding_needs_two_legs() {
    let spy = Ticker::equity("SPY", Exchange::ARCA).unwrap();
    let qqq = Ticker::equity("QQQ", Exchange::NASDAQ).unwrap();
    let pair = Ticker::pair(spy, 1, qqq, 2).unwrap();
    let mut value = serde_json::to_value(&pair).unwrap();
    assert_eq!(decode_ticker(value.clone()).unwrap(), pair);

    let legs = value["kind"]["Combo"]["legs"].as_array_mut().unwrap();
    legs.truncate(1);
    assert!(decode_ticker(value).is_err());
}

#[test]
fn order_decoding_checks_fill_state() {
    let mut order = TradeOrder::market(Ticker::equity("QQQ", Exchange::NASDAQ).unwrap(), Side::Buy, 10);
    order.assign_id(OrderId(7)).unwrap();
    let value = serde_json::to_value(&order).unwrap();
    assert!(serde_json::from_value::<TradeOrder>(value.clone()).is_ok());

    let mut filled_without_fills = value.clone();
    filled_without_fills["status"] = json!("FILLED");
    assert!(serde_json::from_value::<TradeOrder>(filled_without_fills).is_err());

    let mut overfilled = value.clone();
    overfilled["status"] = json!("PARTIALLY_FILLED");
    overfilled["filled_quantity"] = json!(11);
    assert!(serde_json::from_value::<TradeOrder>(overfilled).is_err());

    let mut huge = value.clone();
    huge["quantity"] = json!(u64::MAX);
    assert!(serde_json::from_value::<TradeOrder>(huge).is_err());

    let mut unplaced = value;
    unplaced["id"] = json!(null);
    unplaced["status"] = json!("SUBMITTED");
    assert!(serde_json::from_value::<TradeOrder>(unplaced).is_err());
}
