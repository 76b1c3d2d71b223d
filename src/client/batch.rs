use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::mpsc;

use crate::core::{Error, Result};
use crate::protocol::{Measurement, MeasurementKind, Scaled};

/// Name of the derived house minus solar current
pub const USAGE_CURRENT: &str = "UsageCurrent";

/// Which schedule produced a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Fast,
    Slow,
    Water,
}

/// Value of one batch entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    /// Scaled value such as a current or voltage
    Decimal(Scaled),
    /// Plain count such as amp-hours or a tank level
    Integer(u32),
    /// Named sub-fields
    Fields(BTreeMap<&'static str, u32>),
}

impl Reading {
    /// Batch value of a decoded measurement; `None` for unknown frames
    pub fn from_measurement(measurement: &Measurement) -> Option<Self> {
        let reading = match measurement {
            Measurement::SolarCurrent(v)
            | Measurement::HouseCurrent(v)
            | Measurement::HouseVoltage(v)
            | Measurement::VehicleVoltage(v) => Reading::Decimal(*v),
            Measurement::HouseCapacityAmpHours(v)
            | Measurement::FreshPercent(v)
            | Measurement::GrayPercent(v) => Reading::Integer(u32::from(*v)),
            Measurement::HouseCapacityPercent { percent, unknown } => Reading::Fields(
                [("Percent", u32::from(*percent)), ("Unknown", u32::from(*unknown))]
                    .into_iter()
                    .collect(),
            ),
            Measurement::Unknown(_) => return None,
        };
        Some(reading)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Decimal(v) => write!(f, "{}", v),
            Reading::Integer(v) => write!(f, "{}", v),
            Reading::Fields(fields) => {
                let parts: Vec<String> = fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

/// Measurements collected by one cadence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    /// Producing cadence
    pub cadence: Cadence,
    /// Wall-clock time the batch was completed
    pub collected_at: DateTime<Utc>,
    /// Name to value; `None` when the device did not answer
    pub readings: BTreeMap<String, Option<Reading>>,
}

impl Batch {
    /// Creates an empty batch stamped now
    pub fn new(cadence: Cadence) -> Self {
        Batch {
            cadence,
            collected_at: Utc::now(),
            readings: BTreeMap::new(),
        }
    }

    /// Records a polled measurement under its kind's name
    pub fn record(&mut self, kind: MeasurementKind, measurement: Option<&Measurement>) {
        self.insert(kind.name(), measurement.and_then(Reading::from_measurement));
    }

    /// Records an arbitrary entry
    pub fn insert(&mut self, name: impl Into<String>, reading: Option<Reading>) {
        self.readings.insert(name.into(), reading);
    }

    /// Looks up an entry; `None` if missing or absent
    pub fn get(&self, name: &str) -> Option<&Reading> {
        self.readings.get(name).and_then(Option::as_ref)
    }

    /// Flat `(name, value)` pairs; sub-fields are appended to their parent's
    /// name and absent readings are left out
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut flat = Vec::new();
        for (name, reading) in &self.readings {
            match reading {
                Some(Reading::Fields(fields)) => {
                    for (sub, value) in fields {
                        flat.push((format!("{}{}", name, sub), value.to_string()));
                    }
                }
                Some(reading) => flat.push((name.clone(), reading.to_string())),
                None => {}
            }
        }
        flat
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:", self.cadence)?;
        for (name, reading) in &self.readings {
            match reading {
                Some(reading) => write!(f, " {}={}", name, reading)?,
                None => write!(f, " {}=absent", name)?,
            }
        }
        Ok(())
    }
}

/// Consumer of completed batches
pub trait BatchSink {
    /// Hands over one batch; an error stops the scheduler
    fn emit(&mut self, batch: Batch) -> Result<()>;
}

/// Forwards batches to an async consumer from a blocking thread
impl BatchSink for mpsc::Sender<Batch> {
    fn emit(&mut self, batch: Batch) -> Result<()> {
        self.blocking_send(batch)
            .map_err(|_| Error::sink("Batch receiver closed"))
    }
}

impl BatchSink for Vec<Batch> {
    fn emit(&mut self, batch: Batch) -> Result<()> {
        self.push(batch);
        Ok(())
    }
}
