use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// one telemetry sample as served by `/api/get-newest-temp`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// schema-defined row identifier, if the table has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,

    /// capture time
    #[serde(deserialize_with = "deserialize_time")]
    pub time: DateTime<Utc>,

    /// temperature in celsius
    pub temp: f64,

    /// relative humidity (0-100%)
    pub humidity: f64,

    /// pressure in hPa
    pub pressure: f64,

    /// camera frame: raw base64 jpeg or an already-prefixed url
    #[serde(default)]
    pub img: Option<String>,
}

/// accepts rfc 3339, or a naive timestamp which is taken as utc
fn deserialize_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_time(&raw).map_err(serde::de::Error::custom)
}

pub fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("unrecognised timestamp: {}", raw))
}

/// the three numeric channels of a reading
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Temperature,
    Humidity,
    Pressure,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Temperature, Metric::Humidity, Metric::Pressure];

    pub fn value(self, reading: &Reading) -> f64 {
        match self {
            Metric::Temperature => reading.temp,
            Metric::Humidity => reading.humidity,
            Metric::Pressure => reading.pressure,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature",
            Metric::Humidity => "Humidity",
            Metric::Pressure => "Pressure",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Humidity => "%",
            Metric::Pressure => " hPa",
        }
    }
}

// ==============================================================================
// object detection
// ==============================================================================

/// axis-aligned box in image pixels, serialized as `[x, y, width, height]`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn area(&self) -> f64 {
        (self.width * self.height).abs()
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x, y, width, height]: [f64; 4]) -> Self {
        Self { x, y, width, height }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class: String,
    /// confidence in 0..=1
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reading_from_endpoint_json() {
        let json = r#"{
            "id": 7,
            "time": "2024-05-01T12:30:00.000Z",
            "temp": 21.456,
            "humidity": 48.2,
            "pressure": 1012.7,
            "img": "/9j/4AAQ"
        }"#;
        let r: Reading = serde_json::from_str(json).unwrap();
        assert_eq!(r.id, Some(serde_json::json!(7)));
        assert_eq!(r.time, Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap());
        assert_eq!(r.img.as_deref(), Some("/9j/4AAQ"));
    }

    #[test]
    fn naive_time_is_utc() {
        let t = parse_time("2024-05-01 08:00:00").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn missing_image_and_null_body() {
        let json = r#"{"time":"2024-05-01T12:30:00Z","temp":1,"humidity":2,"pressure":3,"img":null}"#;
        let r: Reading = serde_json::from_str(json).unwrap();
        assert!(r.img.is_none());
        assert!(serde_json::from_str::<Reading>("null").is_err());
    }

    #[test]
    fn detection_uses_array_bbox() {
        let json = r#"[{"bbox":[10,20,30,40],"class":"person","score":0.87}]"#;
        let d: Vec<Detection> = serde_json::from_str(json).unwrap();
        assert_eq!(d[0].bbox, BoundingBox { x: 10.0, y: 20.0, width: 30.0, height: 40.0 });
        assert_eq!(d[0].bbox.area(), 1200.0);
        assert_eq!(d[0].class, "person");
    }
}
