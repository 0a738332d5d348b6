use opcua::types::Variant;
use serde_json::{Number, Value};

/// Map an OPC UA variant to a JSON value.
///
/// Arrays and the remaining structured built-in types have no JSON
/// counterpart a reader could act on and map to `None`.
pub fn variant_to_json(variant: &Variant) -> Option<Value> {
    match variant {
        Variant::Empty => None,
        Variant::Boolean(b) => Some(Value::Bool(*b)),
        Variant::SByte(n) => Some(Value::from(*n)),
        Variant::Byte(n) => Some(Value::from(*n)),
        Variant::Int16(n) => Some(Value::from(*n)),
        Variant::UInt16(n) => Some(Value::from(*n)),
        Variant::Int32(n) => Some(Value::from(*n)),
        Variant::UInt32(n) => Some(Value::from(*n)),
        Variant::Int64(n) => Some(Value::from(*n)),
        Variant::UInt64(n) => Some(Value::from(*n)),
        Variant::Float(f) => Number::from_f64(*f as f64).map(Value::Number),
        Variant::Double(f) => Number::from_f64(*f).map(Value::Number),
        Variant::String(s) => Some(Value::String(s.as_ref().to_string())),
        Variant::LocalizedText(lt) => Some(Value::String(lt.text.as_ref().to_string())),
        Variant::DateTime(dt) => Some(Value::String(dt.as_chrono().to_rfc3339())),
        Variant::Guid(g) => Some(Value::String(g.to_string())),
        Variant::NodeId(id) => Some(Value::String(id.to_string())),
        Variant::StatusCode(code) => Some(Value::String(code.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::variant_to_json;
    use opcua::types::{UAString, Variant};
    use serde_json::json;

    #[test]
    fn scalar_variants_map_to_json() {
        assert_eq!(variant_to_json(&Variant::Boolean(true)), Some(json!(true)));
        assert_eq!(variant_to_json(&Variant::Int32(-7)), Some(json!(-7)));
        assert_eq!(variant_to_json(&Variant::UInt64(42)), Some(json!(42)));
        assert_eq!(variant_to_json(&Variant::Double(21.5)), Some(json!(21.5)));
        assert_eq!(
            variant_to_json(&Variant::String(UAString::from("running"))),
            Some(json!("running"))
        );
    }

    #[test]
    fn empty_and_non_finite_values_map_to_none() {
        assert_eq!(variant_to_json(&Variant::Empty), None);
        assert_eq!(variant_to_json(&Variant::Double(f64::NAN)), None);
    }
}
