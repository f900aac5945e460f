//! Telemetry ingest: attribute reports in, flow / battery values out.
//!
//! A report payload is a run of records:
//!
//! ```text
//! ┌──────────────┬──────┬───────────────┐
//! │ attr_id u16LE│ type │ value (typed) │  × n
//! └──────────────┴──────┴───────────────┘
//! ```
//!
//! Parsing stops at the first record that is not one of the two known
//! (cluster, attribute, type) combinations, or that is truncated.  Values
//! decoded before that point are kept.

use crate::mesh::{
    ATTR_BATTERY_PERCENT_REMAINING, ATTR_FLOW_MEASURED_VALUE, CLUSTER_FLOW_MEASUREMENT,
    CLUSTER_POWER_CONFIG, TYPE_UINT8, TYPE_UINT16,
};

/// Battery reports arrive in half-percent units; converted values cap here.
const BATTERY_MAX_PERCENT: u8 = 100;

/// One decoded attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    /// Raw flow measurement.
    Flow(u16),
    /// Remaining battery, already converted to percent (0..=100).
    Battery(u8),
}

/// Iterator over the known records of one report payload.
pub struct ReportRecords<'a> {
    cluster: u16,
    payload: &'a [u8],
}

impl<'a> ReportRecords<'a> {
    pub fn new(cluster: u16, payload: &'a [u8]) -> Self {
        Self { cluster, payload }
    }
}

impl Iterator for ReportRecords<'_> {
    type Item = Reading;

    fn next(&mut self) -> Option<Reading> {
        let payload = self.payload;
        let [lo, hi, ty, rest @ ..] = payload else {
            return None;
        };
        let attr = u16::from_le_bytes([*lo, *hi]);

        let (reading, used) = match (self.cluster, attr, *ty) {
            (CLUSTER_FLOW_MEASUREMENT, ATTR_FLOW_MEASURED_VALUE, TYPE_UINT16) => {
                let [a, b, ..] = rest else {
                    self.payload = &[];
                    return None;
                };
                (Reading::Flow(u16::from_le_bytes([*a, *b])), 2)
            }
            (CLUSTER_POWER_CONFIG, ATTR_BATTERY_PERCENT_REMAINING, TYPE_UINT8) => {
                let [half, ..] = rest else {
                    self.payload = &[];
                    return None;
                };
                (Reading::Battery((half / 2).min(BATTERY_MAX_PERCENT)), 1)
            }
            _ => {
                self.payload = &[];
                return None;
            }
        };

        self.payload = &rest[used..];
        Some(reading)
    }
}

/// Last known flow and battery values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryIngest {
    flow: u16,
    battery: u8,
}

impl TelemetryIngest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flow(&self) -> u16 {
        self.flow
    }

    pub fn battery(&self) -> u8 {
        self.battery
    }

    /// Apply a report.  Returns `true` if any stored value changed.
    pub fn ingest(&mut self, cluster: u16, payload: &[u8]) -> bool {
        let mut changed = false;
        for reading in ReportRecords::new(cluster, payload) {
            match reading {
                Reading::Flow(v) if v != self.flow => {
                    self.flow = v;
                    changed = true;
                }
                Reading::Battery(v) if v != self.battery => {
                    self.battery = v;
                    changed = true;
                }
                _ => {}
            }
        }
        changed
    }
}
