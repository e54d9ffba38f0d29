//! Field accessor rules
//!
//! Each source lists, per canonical field, the raw field names to try in
//! priority order. Lookups fall back to a case-insensitive match.

use crate::domain::SourceKind;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Ordered candidate field names for each canonical field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRules {
    pub symbol: &'static [&'static str],
    pub price: &'static [&'static str],
    pub volume: &'static [&'static str],
    pub timestamp: &'static [&'static str],
}

const ASSETS_RULES: FieldRules = FieldRules {
    symbol: &["symbol", "id"],
    price: &["priceUsd", "price_usd", "price"],
    volume: &["volumeUsd24Hr", "volume_usd_24h", "volume"],
    timestamp: &["timestamp", "updated", "updatedAt"],
};

const TICKERS_RULES: FieldRules = FieldRules {
    symbol: &["symbol", "pair", "ticker", "market", "instrument_id"],
    price: &["last_trade_price", "last", "price", "close", "lastPrice"],
    volume: &["volume_24h", "volume", "vol", "baseVolume"],
    timestamp: &["timestamp", "time", "ts", "updated_at", "closeTime"],
};

const CSV_RULES: FieldRules = FieldRules {
    symbol: &["ticker"],
    price: &["price_usd"],
    volume: &["tx_volume"],
    timestamp: &["time"],
};

/// Unix values below this magnitude are seconds, above it milliseconds
const SECONDS_MAGNITUDE_LIMIT: f64 = 1e11;

const SYMBOL_SEPARATORS: &[char] = &['-', '/', '_', ':', ' '];

impl FieldRules {
    /// Rules for a source
    pub fn for_source(source: SourceKind) -> &'static FieldRules {
        match source {
            SourceKind::AssetsApi => &ASSETS_RULES,
            SourceKind::TickersApi => &TICKERS_RULES,
            SourceKind::Csv => &CSV_RULES,
        }
    }
}

fn lookup<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    fields.get(name).or_else(|| {
        fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

fn present<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    lookup(fields, name).filter(|v| !v.is_null())
}

/// First candidate that holds a non-empty string or number
pub fn first_text(fields: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|name| match present(fields, name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Parses a JSON number or numeric string into a finite float
pub fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// First candidate that parses as a finite number
pub fn first_number(fields: &Map<String, Value>, candidates: &[&str]) -> Option<f64> {
    candidates
        .iter()
        .find_map(|name| present(fields, name).and_then(parse_number))
}

fn from_unix(value: f64) -> Option<DateTime<Utc>> {
    let millis = if value.abs() < SECONDS_MAGNITUDE_LIMIT {
        value * 1000.0
    } else {
        value
    };
    Utc.timestamp_millis_opt(millis.round() as i64).single()
}

fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(number) = text.parse::<f64>() {
        return number.is_finite().then(|| from_unix(number)).flatten();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parses Unix seconds, Unix milliseconds or an ISO-8601 string
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).and_then(from_unix),
        Value::String(s) => parse_timestamp_text(s),
        _ => None,
    }
}

/// First candidate that parses as a timestamp
pub fn first_timestamp(fields: &Map<String, Value>, candidates: &[&str]) -> Option<DateTime<Utc>> {
    candidates
        .iter()
        .find_map(|name| present(fields, name).and_then(parse_timestamp))
}

/// Uppercases and keeps the base asset of compound tickers (`btc-usd` -> `BTC`)
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim()
        .split(SYMBOL_SEPARATORS)
        .find(|segment| !segment.is_empty())
        .unwrap_or("")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test_case("BTC-USD", "BTC" ; "dash pair")]
    #[test_case("eth/usdt", "ETH" ; "slash pair")]
    #[test_case("sol_usd", "SOL" ; "underscore pair")]
    #[test_case("  xrp  ", "XRP" ; "padded")]
    #[test_case("BITCOIN", "BITCOIN" ; "name")]
    #[test_case("-ada-usd", "ADA" ; "leading separator")]
    #[test_case("", "" ; "empty")]
    fn test_normalize_symbol(raw: &str, expected: &str) {
        assert_eq!(normalize_symbol(raw), expected);
    }

    #[test_case(json!(1_728_561_600), 1_728_561_600_000 ; "unix seconds")]
    #[test_case(json!(1_728_561_600_123_i64), 1_728_561_600_123 ; "unix millis")]
    #[test_case(json!("1728561600"), 1_728_561_600_000 ; "seconds as text")]
    #[test_case(json!("2024-10-10T12:00:00Z"), 1_728_561_600_000 ; "rfc3339")]
    #[test_case(json!("2024-10-10T14:00:00+02:00"), 1_728_561_600_000 ; "rfc3339 offset")]
    #[test_case(json!("2024-10-10 12:00:00"), 1_728_561_600_000 ; "naive datetime")]
    #[test_case(json!("2024-10-10"), 1_728_518_400_000 ; "date only")]
    fn test_parse_timestamp(value: Value, expected_ms: i64) {
        let parsed = parse_timestamp(&value).unwrap();
        assert_eq!(parsed.timestamp_millis(), expected_ms);
    }

    #[test_case(json!("yesterday") ; "words")]
    #[test_case(json!(true) ; "boolean")]
    #[test_case(json!(null) ; "null")]
    fn test_parse_timestamp_rejects(value: Value) {
        assert!(parse_timestamp(&value).is_none());
    }

    #[test_case(json!("68000.5"), Some(68000.5) ; "numeric text")]
    #[test_case(json!(42), Some(42.0) ; "integer")]
    #[test_case(json!(" 1e3 "), Some(1000.0) ; "scientific padded")]
    #[test_case(json!("NaN"), None ; "nan text")]
    #[test_case(json!("inf"), None ; "infinite text")]
    #[test_case(json!("n/a"), None ; "garbage")]
    fn test_parse_number(value: Value, expected: Option<f64>) {
        assert_eq!(parse_number(&value), expected);
    }

    #[test]
    fn test_fallback_chain_skips_unparseable_candidates() {
        let fields = object(json!({
            "last_trade_price": "n/a",
            "last": null,
            "price": "101.5",
            "close": "99"
        }));
        let rules = FieldRules::for_source(SourceKind::TickersApi);
        assert_eq!(first_number(&fields, rules.price), Some(101.5));
    }

    #[test]
    fn test_lookup_falls_back_to_case_insensitive() {
        let fields = object(json!({"Ticker": "btc", "PRICE_USD": "3"}));
        let rules = FieldRules::for_source(SourceKind::Csv);
        assert_eq!(first_text(&fields, rules.symbol).as_deref(), Some("btc"));
        assert_eq!(first_number(&fields, rules.price), Some(3.0));
    }
}
