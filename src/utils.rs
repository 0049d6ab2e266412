/// Lowercases a key and turns underscores into spaces, so `Vendor_Name`
/// becomes `vendor name`.
pub fn normalize_key(key: &str) -> String {
    key.to_lowercase().replace('_', " ")
}

pub fn contains_any(haystack: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| haystack.contains(term))
}

/// Display label for a result key: `invoice_number` -> `Invoice Number`.
pub fn humanize_key(key: &str) -> String {
    key.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quotes a CSV cell when it contains a delimiter, quote or newline.
pub fn csv_escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
