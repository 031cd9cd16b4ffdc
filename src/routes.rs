//! Public route table and the index document served at the API roots.

use serde_json::{json, Value};

use crate::entity::DataType;

/// Version segment of every data route.
pub const API_VERSION: &str = "v1";

/// Upstream data sources listed in the index document.
pub const SOURCES: [&str; 2] = [
    "https://github.com/CSSEGISandData/COVID-19",
    "https://www.worldometers.info/coronavirus/",
];

/// Project repository listed in the index document.
pub const REPOSITORY: &str = "https://github.com/takitsu21/covid19-api";

/// Data routes relative to the API prefix, in documentation order.
pub const DATA_ROUTES: [&str; 7] = [
    "all/",
    "all/<country>",
    "history/<data_type>",
    "history/<data_type>/total",
    "history/<data_type>/<country>",
    "history/<data_type>/<country>/regions",
    "history/<data_type>/<country>/<region_name>",
];

/// Normalizes a configured base path to `""` or `/segment[/segment...]`.
///
/// ```
/// use covid19_api::routes::normalize_base_path;
///
/// assert_eq!(normalize_base_path(""), "");
/// assert_eq!(normalize_base_path("/"), "");
/// assert_eq!(normalize_base_path("covid/"), "/covid");
/// ```
#[must_use]
pub fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// `<base>/api/<version>`.
#[must_use]
pub fn api_prefix(base_path: &str) -> String {
    format!("{}/api/{API_VERSION}", normalize_base_path(base_path))
}

/// Full public route list under `base_path`.
#[must_use]
pub fn route_table(base_path: &str) -> Vec<String> {
    let prefix = api_prefix(base_path);
    DATA_ROUTES
        .iter()
        .map(|route| format!("{prefix}/{route}"))
        .collect()
}

/// The document served at `/`, `/api/` and `/api/v1/`.
#[must_use]
pub fn index_document(base_path: &str) -> Value {
    let data_types = DataType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(" | ");
    json!({
        "routes": route_table(base_path),
        "<data_type>": data_types,
        "Api version": API_VERSION,
        "sources": SOURCES,
        "github": REPOSITORY,
    })
}
