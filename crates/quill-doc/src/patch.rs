//! Pure patch construction with dependent-field recomputation
//!
//! [`build_patch`] maps a freeform text value onto the document's field map
//! without mutating it, returning a fragment for the caller to merge. The
//! existing value's type decides what the text becomes ([`smart_convert`]):
//! the instruction stream carries unstructured text, so the field map is the
//! source of truth for types.
//!
//! Line items carry `qty`, `unitPrice`, and the derived `amount`; any patch
//! that touches the list also carries the recomputed `totalAmount`.

use serde_json::Value;

use crate::document::{FieldMap, AMOUNT_KEY, ITEMS_KEY, QTY_KEY, TOTAL_AMOUNT_KEY, UNIT_PRICE_KEY};
use crate::path::FieldPath;

/// Builds the field-map fragment for setting `path` to `new_value`.
///
/// Indexed and broadcast forms return the mutated list plus `totalAmount`.
/// An out-of-bounds index leaves every element untouched (the list and its
/// recomputed total are still returned) and logs a warning.
#[must_use]
pub fn build_patch(path: &FieldPath, new_value: &str, fields: &FieldMap) -> FieldMap {
    let mut patch = FieldMap::new();
    match path {
        FieldPath::Plain(key) => {
            let converted = smart_convert(new_value, fields.get(key));
            patch.insert(key.clone(), converted);
        }
        FieldPath::Indexed { list, index, prop } => {
            let mut items = cloned_list(fields, list);
            match items.get_mut(*index) {
                Some(element) => apply_item_update(element, prop, new_value),
                None => {
                    tracing::warn!(
                        "index {index} out of bounds for {list} (len {}); leaving list unchanged",
                        items.len()
                    );
                }
            }
            let total = total_amount(&items);
            patch.insert(list.clone(), Value::Array(items));
            patch.insert(TOTAL_AMOUNT_KEY.to_string(), total);
        }
        FieldPath::Broadcast { prop } => {
            let mut items = cloned_list(fields, ITEMS_KEY);
            for element in &mut items {
                apply_item_update(element, prop, new_value);
            }
            let total = total_amount(&items);
            patch.insert(ITEMS_KEY.to_string(), Value::Array(items));
            patch.insert(TOTAL_AMOUNT_KEY.to_string(), total);
        }
    }
    patch
}

/// Converts freeform text against the existing value's type.
///
/// Numeric existing values strip thousands separators and parse; on parse
/// failure the raw text passes through. Boolean existing values are true
/// iff the text equals `"true"`. Everything else stays text.
#[must_use]
pub fn smart_convert(text: &str, existing: Option<&Value>) -> Value {
    match existing {
        Some(Value::Number(_)) => {
            let cleaned: String = text.chars().filter(|c| *c != ',').collect();
            cleaned
                .trim()
                .parse::<f64>()
                .map_or_else(|_| Value::String(text.to_string()), json_number)
        }
        Some(Value::Bool(_)) => Value::Bool(text == "true"),
        _ => Value::String(text.to_string()),
    }
}

fn cloned_list(fields: &FieldMap, list: &str) -> Vec<Value> {
    fields
        .get(list)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Sets `prop` on one line item, recomputing `amount` when a factor of it
/// changed.
fn apply_item_update(element: &mut Value, prop: &str, new_value: &str) {
    let Some(object) = element.as_object_mut() else {
        tracing::warn!("line item is not an object; skipping");
        return;
    };
    let converted = smart_convert(new_value, object.get(prop));
    object.insert(prop.to_string(), converted);
    if prop == QTY_KEY || prop == UNIT_PRICE_KEY {
        let qty = number_of(object.get(QTY_KEY));
        let unit_price = number_of(object.get(UNIT_PRICE_KEY));
        object.insert(AMOUNT_KEY.to_string(), json_number(qty * unit_price));
    }
}

fn total_amount(items: &[Value]) -> Value {
    json_number(
        items
            .iter()
            .map(|element| number_of(element.get(AMOUNT_KEY)))
            .sum(),
    )
}

fn number_of(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

/// Stores whole results as integers so recomputed amounts keep the JSON
/// shape the templates expect; fractional results stay floats.
#[allow(clippy::cast_possible_truncation)]
fn json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}
