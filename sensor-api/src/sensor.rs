use serde::Serialize;
use std::fmt;

/// Identifiers of the eight fixed sensors on the line
pub const SENSOR_IDS: [&str; 8] = ["1", "2", "3", "4", "5", "6", "7", "8"];

const WARNING_THRESHOLD: f64 = 60.0;
const ALERT_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Warning,
    Alert,
    Unknown,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ok => "ok",
            Status::Warning => "warning",
            Status::Alert => "alert",
            Status::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SensorKind {
    Digital,
    Analog,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDescriptor {
    pub name: String,
    pub kind: SensorKind,
    pub unit: &'static str,
}

/// Maps a reading value to its status tier.
///
/// Both thresholds are exclusive: 60 is still `Ok` and 80 is still `Warning`.
pub fn classify(value: Option<f64>) -> Status {
    match value {
        None => Status::Unknown,
        Some(v) if v > ALERT_THRESHOLD => Status::Alert,
        Some(v) if v > WARNING_THRESHOLD => Status::Warning,
        Some(_) => Status::Ok,
    }
}

pub fn describe(sensor_id: &str) -> SensorDescriptor {
    let known = |name: &str, kind, unit| SensorDescriptor {
        name: name.to_string(),
        kind,
        unit,
    };

    match sensor_id {
        "1" => known("Reed Switch", SensorKind::Digital, "cycles"),
        "2" => known("Absolute Pressure", SensorKind::Analog, "bar"),
        "3" => known("Differential Pressure", SensorKind::Analog, "bar"),
        "4" => known("Accelerometer", SensorKind::Analog, "g"),
        "5" => known("Temperature", SensorKind::Analog, "°C"),
        "6" => known("Strain Gauge", SensorKind::Analog, "µε"),
        "7" => known("Cycle Counter", SensorKind::Digital, "cycles"),
        "8" => known("Air Quality", SensorKind::Analog, "ppm"),
        other => SensorDescriptor {
            name: format!("Sensor {}", other),
            kind: SensorKind::Unknown,
            unit: "",
        },
    }
}

/// Whether `sensor_id` names one of the eight installed sensors.
///
/// Surrounding whitespace makes the id invalid; only the digits themselves
/// are accepted.
pub fn is_valid_sensor_id(sensor_id: &str) -> bool {
    if sensor_id.trim().is_empty() {
        return false;
    }
    sensor_id
        .parse::<i32>()
        .is_ok_and(|id| (1..=8).contains(&id))
}
