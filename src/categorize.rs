use crate::error::{ExtractionError, Result};
use crate::response::ModelOutcome;
use crate::utils::{contains_any, humanize_key, normalize_key};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const LINE_ITEM_TERM: &str = "line item";
const ADDRESS_TERMS: &[&str] = &["address", "street", "city", "state", "postal code", "zip", "country"];
const INVOICE_TERMS: &[&str] = &["invoice", "number", "date", "currency", "total", "subtotal", "tax"];
const VENDOR_TERMS: &[&str] = &["vendor", "supplier", "seller"];
const CUSTOMER_TERMS: &[&str] = &["customer", "buyer", "client"];
const PAYMENT_TERMS: &[&str] = &["payment", "account", "bank"];

/// Tagged view over one value of an extraction result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResultValue<'a> {
    Null,
    Scalar(&'a Value),
    Object(&'a Map<String, Value>),
    List(&'a [Value]),
}

impl<'a> ResultValue<'a> {
    pub fn of(value: &'a Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Object(map) => Self::Object(map),
            Value::Array(items) => Self::List(items),
            scalar => Self::Scalar(scalar),
        }
    }

    /// Null and the empty string are treated as "not extracted".
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Scalar(Value::String(s)) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_object(&self) -> Option<&'a Map<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Invoice,
    Vendor,
    Customer,
    Payment,
    Other,
}

impl Bucket {
    pub const ALL: [Bucket; 5] = [
        Bucket::Invoice,
        Bucket::Vendor,
        Bucket::Customer,
        Bucket::Payment,
        Bucket::Other,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Bucket::Invoice => "Invoice Information",
            Bucket::Vendor => "Vendor Details",
            Bucket::Customer => "Customer Details",
            Bucket::Payment => "Payment Details",
            Bucket::Other => "Additional Information",
        }
    }
}

/// Where a top-level result key is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    LineItems,
    Bucket(Bucket),
}

/// Classifies a key by name alone. Values never influence placement.
pub fn classify_key(key: &str) -> Placement {
    let normalized = normalize_key(key);

    if normalized.contains(LINE_ITEM_TERM) || key == "line_items" {
        return Placement::LineItems;
    }

    if contains_any(&normalized, ADDRESS_TERMS) {
        let bucket = if contains_any(&normalized, VENDOR_TERMS) {
            Bucket::Vendor
        } else if contains_any(&normalized, CUSTOMER_TERMS) {
            Bucket::Customer
        } else {
            Bucket::Other
        };
        return Placement::Bucket(bucket);
    }

    let bucket = if contains_any(&normalized, INVOICE_TERMS) {
        Bucket::Invoice
    } else if contains_any(&normalized, VENDOR_TERMS) {
        Bucket::Vendor
    } else if contains_any(&normalized, CUSTOMER_TERMS) {
        Bucket::Customer
    } else if contains_any(&normalized, PAYMENT_TERMS) {
        Bucket::Payment
    } else {
        Bucket::Other
    };
    Placement::Bucket(bucket)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItems {
    pub key: String,
    pub value: Value,
}

/// An extraction result split into display sections.
///
/// Every input key lands in at most one place. Keys with null or empty string
/// values are dropped before bucketing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorizedResult {
    pub invoice: Map<String, Value>,
    pub vendor: Map<String, Value>,
    pub customer: Map<String, Value>,
    pub payment: Map<String, Value>,
    pub other: Map<String, Value>,
    pub line_items: Option<LineItems>,
    /// Keys removed by deduplication, in removal order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<String>,
}

impl CategorizedResult {
    pub fn bucket(&self, bucket: Bucket) -> &Map<String, Value> {
        match bucket {
            Bucket::Invoice => &self.invoice,
            Bucket::Vendor => &self.vendor,
            Bucket::Customer => &self.customer,
            Bucket::Payment => &self.payment,
            Bucket::Other => &self.other,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Map<String, Value> {
        match bucket {
            Bucket::Invoice => &mut self.invoice,
            Bucket::Vendor => &mut self.vendor,
            Bucket::Customer => &mut self.customer,
            Bucket::Payment => &mut self.payment,
            Bucket::Other => &mut self.other,
        }
    }

    /// Which bucket holds `key`, if any.
    pub fn bucket_of(&self, key: &str) -> Option<Bucket> {
        Bucket::ALL
            .into_iter()
            .find(|bucket| self.bucket(*bucket).contains_key(key))
    }

    pub fn is_empty(&self) -> bool {
        self.line_items.is_none() && Bucket::ALL.iter().all(|b| self.bucket(*b).is_empty())
    }

    /// All retained keys, buckets first then the line items key.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Bucket::ALL
            .iter()
            .flat_map(|b| self.bucket(*b).keys().map(String::as_str))
            .collect();
        if let Some(items) = &self.line_items {
            keys.push(&items.key);
        }
        keys
    }

    /// Line items as table rows. Mappings are kept as-is, a bare scalar entry
    /// becomes `{"Description": value}`.
    pub fn line_item_rows(&self) -> Vec<Map<String, Value>> {
        let Some(items) = &self.line_items else {
            return Vec::new();
        };

        let as_row = |value: &Value| -> Option<Map<String, Value>> {
            match ResultValue::of(value) {
                ResultValue::Object(map) => Some(map.clone()),
                v if v.is_absent() => None,
                _ => {
                    let mut row = Map::new();
                    row.insert("Description".to_string(), value.clone());
                    Some(row)
                }
            }
        };

        match ResultValue::of(&items.value) {
            ResultValue::List(entries) => entries.iter().filter_map(as_row).collect(),
            _ => as_row(&items.value).into_iter().collect(),
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        for bucket in Bucket::ALL {
            let data = self.bucket(bucket);
            if data.is_empty() {
                continue;
            }
            output.push_str(&format!("### {}\n\n", bucket.title()));
            for (key, value) in data {
                write_entry(&mut output, key, value);
            }
            output.push('\n');
        }

        let rows = self.line_item_rows();
        if !rows.is_empty() {
            output.push_str("### Line Items\n\n");
            write_line_items(&mut output, &rows);
        }

        output
    }
}

fn write_entry(output: &mut String, key: &str, value: &Value) {
    match ResultValue::of(value) {
        ResultValue::Object(map) => {
            output.push_str(&format!("**{}:**\n", humanize_key(key)));
            for (sub_key, sub_value) in map {
                match ResultValue::of(sub_value) {
                    v if v.is_absent() => {}
                    ResultValue::Object(inner) => {
                        output.push_str(&format!("- **{}**:\n", humanize_key(sub_key)));
                        for (inner_key, inner_value) in inner {
                            if !ResultValue::of(inner_value).is_absent() {
                                output.push_str(&format!(
                                    "  - **{}:** {}\n",
                                    humanize_key(inner_key),
                                    summarize_value(inner_value)
                                ));
                            }
                        }
                    }
                    _ => output.push_str(&format!(
                        "- **{}:** {}\n",
                        humanize_key(sub_key),
                        summarize_value(sub_value)
                    )),
                }
            }
        }
        _ => output.push_str(&format!(
            "**{}:** {}\n",
            humanize_key(key),
            summarize_value(value)
        )),
    }
}

fn write_line_items(output: &mut String, rows: &[Map<String, Value>]) {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    output.push_str(&format!("| {} |\n", columns.join(" | ")));
    output.push_str(&format!("|{}\n", "---|".repeat(columns.len())));
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| {
                row.get(*column)
                    .map(|v| summarize_value(v).replace('|', "\\|"))
                    .unwrap_or_default()
            })
            .collect();
        output.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
}

/// One-line rendering of any result value.
pub fn summarize_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !ResultValue::of(v).is_absent())
            .map(|(k, v)| format!("{}: {}", humanize_key(k), summarize_value(v)))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => {
            let separator = if items.iter().all(Value::is_object) { "; " } else { ", " };
            items
                .iter()
                .map(summarize_value)
                .collect::<Vec<_>>()
                .join(separator)
        }
        other => other.to_string(),
    }
}

/// Buckets a mapping-shaped extraction result and removes flat keys already
/// covered by a nested object in the same bucket.
///
/// Pruning walks each bucket in input order. When two mappings cover each
/// other, the earlier one is dropped and the key that comes later survives.
pub fn categorize(result: &Map<String, Value>) -> CategorizedResult {
    let mut categorized = CategorizedResult::default();

    for (key, value) in result {
        if ResultValue::of(value).is_absent() {
            continue;
        }
        match classify_key(key) {
            Placement::LineItems => {
                if let Some(previous) = &categorized.line_items {
                    warn!(
                        "Multiple line item keys in result; '{}' replaces '{}'",
                        key, previous.key
                    );
                }
                categorized.line_items = Some(LineItems {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
            Placement::Bucket(bucket) => {
                categorized.bucket_mut(bucket).insert(key.clone(), value.clone());
            }
        }
    }

    for bucket in Bucket::ALL {
        let removed = dedup_bucket(categorized.bucket_mut(bucket));
        categorized.duplicates.extend(removed);
    }

    debug!(
        "Categorized {} result keys ({} duplicates removed)",
        result.len(),
        categorized.duplicates.len()
    );
    categorized
}

pub fn categorize_value(result: &Value) -> Result<CategorizedResult> {
    match ResultValue::of(result) {
        ResultValue::Object(map) => Ok(categorize(map)),
        ResultValue::Null => Err(ExtractionError::InvalidResult(
            "expected a JSON object, got null".to_string(),
        )),
        ResultValue::List(_) => Err(ExtractionError::InvalidResult(
            "expected a JSON object, got an array".to_string(),
        )),
        ResultValue::Scalar(v) => Err(ExtractionError::InvalidResult(format!(
            "expected a JSON object, got {}",
            v
        ))),
    }
}

pub fn categorize_outcome(outcome: &ModelOutcome) -> Result<CategorizedResult> {
    match outcome {
        ModelOutcome::Extracted(value) => categorize_value(value),
        ModelOutcome::Failed { error, .. } => Err(ExtractionError::InvalidResult(format!(
            "extraction failed: {}",
            error
        ))),
    }
}

/// Normalized sub-keys of a mapping whose values are present.
fn present_sub_keys(map: &Map<String, Value>) -> Vec<String> {
    map.iter()
        .filter(|(_, v)| !ResultValue::of(v).is_absent())
        .map(|(k, _)| normalize_key(k))
        .filter(|k| !k.is_empty())
        .collect()
}

/// Walks the bucket in order. A key only counts as evidence while it is still
/// retained, so two entries can never remove each other.
fn dedup_bucket(bucket: &mut Map<String, Value>) -> Vec<String> {
    let keys: Vec<String> = bucket.keys().cloned().collect();
    let mut removed: Vec<String> = Vec::new();

    for candidate in &keys {
        let normalized = normalize_key(candidate);
        let is_mapping = bucket.get(candidate).is_some_and(Value::is_object);

        let duplicate = bucket
            .iter()
            .filter(|(other, _)| *other != candidate && !removed.contains(*other))
            .filter_map(|(other, value)| value.as_object().map(|map| (other, map)))
            .any(|(other, map)| {
                let sub_keys = present_sub_keys(map);
                if is_mapping {
                    sub_keys
                        .iter()
                        .any(|sub| normalized.contains(sub.as_str()) || sub.contains(&normalized))
                } else {
                    let container = normalize_key(other);
                    sub_keys
                        .iter()
                        .any(|sub| *sub == normalized || format!("{} {}", container, sub) == normalized)
                }
            });

        if duplicate {
            debug!("Dropping duplicate result key '{}'", candidate);
            removed.push(candidate.clone());
        }
    }

    for key in &removed {
        bucket.remove(key);
    }
    removed
}
