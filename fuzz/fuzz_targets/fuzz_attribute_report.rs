//! Fuzz target: `TelemetryIngest::ingest`
//!
//! The first two bytes select the cluster; the rest is the report
//! payload.  Parsing must stop cleanly on truncated or unknown records and
//! never store an out-of-range battery value.
//!
//! cargo fuzz run fuzz_attribute_report

#![no_main]

use libfuzzer_sys::fuzz_target;
use wfms::events::REPORT_PAYLOAD_MAX;
use wfms::sensors::{ReportRecords, TelemetryIngest};

fuzz_target!(|data: &[u8]| {
    let [lo, hi, payload @ ..] = data else {
        return;
    };
    let cluster = u16::from_le_bytes([*lo, *hi]);
    let payload = &payload[..payload.len().min(REPORT_PAYLOAD_MAX)];

    let records = ReportRecords::new(cluster, payload).count();
    assert!(records <= payload.len() / 4, "more records than bytes allow");

    let mut ingest = TelemetryIngest::new();
    let changed = ingest.ingest(cluster, payload);
    assert!(records > 0 || !changed);
    assert!(ingest.battery() <= 100);
});
