//! SensorReading - the post-transform record published to the broker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One decoded sensor measurement.
///
/// Field names on the wire follow the device convention (`Value`,
/// `UnitOfMeasure`, `GUID`, ...). `time_created` may be absent in the raw
/// payload; the forwarder fills it in before publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SensorReading {
    pub value: f64,

    #[serde(default)]
    pub unit_of_measure: String,

    #[serde(default, alias = "Measure")]
    pub measure_name: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub organization: String,

    #[serde(default)]
    pub location: String,

    /// Stable device identifier
    #[serde(rename = "GUID", alias = "Guid", deserialize_with = "guid_from_any")]
    pub guid: String,

    /// Serialized even when unset; positional encodings rely on it
    #[serde(default)]
    pub time_created: Option<DateTime<Utc>>,
}

/// Devices report their id either as a string or as an integer.
fn guid_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum GuidRepr {
        Text(String),
        Int(i64),
    }

    Ok(match GuidRepr::deserialize(deserializer)? {
        GuidRepr::Text(s) => s,
        GuidRepr::Int(n) => n.to_string(),
    })
}
