use serde::{Deserialize, Deserializer};

/// One page of the paginated catalog list.
#[derive(Debug, Deserialize)]
pub struct CatalogPageResponse {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    pub results: Vec<serde_json::Value>,
}

/// A single course record as served by the catalog API.
#[derive(Debug, Deserialize)]
pub struct CourseRecord {
    pub id: i64,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, alias = "catalog_nbr")]
    pub catalog_number: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub meeting_pattern: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default, deserialize_with = "units")]
    pub units: Option<f64>,
    #[serde(default)]
    pub combined_section: Option<String>,
    #[serde(default)]
    pub designation: Option<String>,
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default, alias = "first_name")]
    pub instructor_first_name: Option<String>,
    #[serde(default, alias = "last_name")]
    pub instructor_last_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Units {
    Number(f64),
    Text(String),
}

// The API serves units either as a number or as a decimal string ("3.00").
fn units<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Units>::deserialize(deserializer)?;
    Ok(raw.and_then(|units| match units {
        Units::Number(n) => Some(n),
        Units::Text(s) => s.trim().parse().ok(),
    }))
}
