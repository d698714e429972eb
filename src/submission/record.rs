use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Known survey fields, in the fixed column order used by the sheet append
/// and the CSV export. `timestamp` is not listed: it is server-assigned at
/// receipt and always comes first.
pub const FIELD_NAMES: [&str; 18] = [
    "city_town",
    "location_name",
    "bottled_water_brands",
    "csd_brands",
    "malted_soft_drinks_brands",
    "energy_drinks_brands",
    "other_products",
    "products_source",
    "water_source",
    "csd_source",
    "malted_source",
    "energy_source",
    "other_products_source",
    "daily_sales",
    "payment_type",
    "average_weight",
    "pricing",
    "willingness",
];

/// One normalized survey response. Immutable once built; every known field
/// is present, with `""` standing in for anything the client omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub timestamp: String,
    #[serde(flatten)]
    fields: BTreeMap<String, String>,
}

impl Submission {
    /// Build a submission from a raw decoded body. Unknown fields are
    /// dropped; a client-supplied `timestamp` is ignored in favor of the
    /// server-assigned one.
    pub fn from_raw(timestamp: String, raw: &Map<String, Value>) -> Self {
        let mut fields = BTreeMap::new();
        for name in FIELD_NAMES {
            fields.insert(name.to_string(), normalize(raw.get(name)));
        }
        Submission { timestamp, fields }
    }

    pub(crate) fn from_stored(timestamp: String, fields: BTreeMap<String, String>) -> Self {
        Submission { timestamp, fields }
    }

    pub fn value(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    /// Field values in fixed column order, timestamp first.
    pub fn row(&self) -> Vec<&str> {
        let mut row = Vec::with_capacity(FIELD_NAMES.len() + 1);
        row.push(self.timestamp.as_str());
        for name in FIELD_NAMES {
            row.push(self.value(name));
        }
        row
    }
}

/// Missing and null become `""`; strings pass through verbatim; other JSON
/// scalars keep their canonical rendering. Nested values are not form data
/// and collapse to `""`.
fn normalize(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}
