use serde_json::{Map, Value};

/// Decode a request body into a flat field map based on Content-Type.
pub fn parse_body(content_type: Option<&str>, body: &[u8]) -> Result<Map<String, Value>, String> {
    let ct = content_type.unwrap_or("application/json");

    let value = if ct.contains("application/json") {
        serde_json::from_slice(body).map_err(|e| format!("Invalid JSON: {e}"))?
    } else if ct.contains("application/x-www-form-urlencoded") {
        parse_form_urlencoded(body)?
    } else {
        // Try JSON first, then form-urlencoded
        serde_json::from_slice(body)
            .map_err(|e| format!("Unable to parse body: {e}"))
            .or_else(|_| parse_form_urlencoded(body))?
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err("Request body must be an object of form fields".to_string()),
    }
}

fn parse_form_urlencoded(body: &[u8]) -> Result<Value, String> {
    let body_str = std::str::from_utf8(body).map_err(|e| format!("Invalid UTF-8: {e}"))?;

    let mut map = Map::new();
    for (k, v) in form_urlencoded::parse(body_str.as_bytes()) {
        map.insert(k.into_owned(), Value::String(v.into_owned()));
    }
    Ok(Value::Object(map))
}
