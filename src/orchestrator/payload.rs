use serde_json::{Map, Value};

use crate::api::timeframe_millis;
use crate::error::PipelineError;
use crate::models::{SignalRequest, Side};
use crate::strategy::{is_routable, SymbolNormalizer};

const SYMBOL_KEYS: &[&str] = &["symbol", "ticker", "instrument"];
const SIGNAL_ID_KEYS: &[&str] = &["signalId", "signal_id", "id"];
const DEFAULT_ACTION: Side = Side::Buy;
pub const DEFAULT_TIMEFRAME: &str = "5m";

/// Build a typed request from an inbound webhook body
///
/// Either every field is valid or the whole payload is rejected with
/// [`PipelineError::MalformedPayload`]; no partial requests.
pub fn parse_payload(
    payload: &Value,
    normalizer: &SymbolNormalizer,
) -> Result<SignalRequest, PipelineError> {
    let fields = payload
        .as_object()
        .ok_or_else(|| PipelineError::MalformedPayload("payload is not a JSON object".into()))?;

    let raw_symbol = first_string(fields, SYMBOL_KEYS)?.ok_or_else(|| {
        PipelineError::MalformedPayload("missing symbol, ticker or instrument".into())
    })?;
    let symbol = normalizer.normalize(&raw_symbol);
    if !is_routable(&symbol) {
        return Err(PipelineError::MalformedPayload(format!(
            "cannot normalize symbol '{}'",
            raw_symbol
        )));
    }

    let action = match first_string(fields, &["action"])? {
        Some(action) => action.parse::<Side>()?,
        None => DEFAULT_ACTION,
    };

    let timeframe = first_string(fields, &["timeframe"])?
        .unwrap_or_else(|| DEFAULT_TIMEFRAME.to_string());
    if timeframe_millis(&timeframe).is_none() {
        return Err(PipelineError::MalformedPayload(format!(
            "unsupported timeframe '{}'",
            timeframe
        )));
    }

    let signal_id = first_string(fields, SIGNAL_ID_KEYS)?;

    let limit_price = match fields.get("price") {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_price(value)?),
    };

    Ok(SignalRequest {
        symbol,
        action,
        timeframe,
        signal_id,
        limit_price,
    })
}

// first non-empty value among `keys`; numbers are accepted as ids
fn first_string(fields: &Map<String, Value>, keys: &[&str]) -> Result<Option<String>, PipelineError> {
    for key in keys {
        match fields.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) if s.trim().is_empty() => continue,
            Some(Value::String(s)) => return Ok(Some(s.trim().to_string())),
            Some(Value::Number(n)) => return Ok(Some(n.to_string())),
            Some(other) => {
                return Err(PipelineError::MalformedPayload(format!(
                    "field '{}' must be a string, got {}",
                    key, other
                )))
            }
        }
    }
    Ok(None)
}

fn parse_price(value: &Value) -> Result<f64, PipelineError> {
    let price = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    price
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or_else(|| PipelineError::MalformedPayload(format!("invalid price {}", value)))
}
