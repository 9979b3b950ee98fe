//! Step traces exported by a transport engine.
//!
//! A trace is a CSV file with one row per step:
//!
//! ```text
//! event,volume,edep_mev,charge,momentum_mev,total_energy_mev,step_mm
//! 0,LogicScintFiber,0.183,-1,19999.9,20000.4,1.2
//! ```
//!
//! Steps of one event must be contiguous; events keep file order.

use crate::error::csv_row_error;
use crate::{Error, Result};
use photonyield_core::StepRecord;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// Expected trace header.
pub const TRACE_HEADER: &str = "event,volume,edep_mev,charge,momentum_mev,total_energy_mev,step_mm";

const TRACE_COLUMNS: [&str; 7] = [
    "event",
    "volume",
    "edep_mev",
    "charge",
    "momentum_mev",
    "total_energy_mev",
    "step_mm",
];

/// One recorded transport step.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceStep {
    /// Logical volume the step starts in.
    pub volume: String,
    /// Energy deposited along the step (MeV).
    pub edep_mev: f64,
    /// Particle charge in units of e.
    pub charge: f64,
    /// Momentum magnitude at the pre-step point (MeV).
    pub momentum_mev: f64,
    /// Total energy at the pre-step point (MeV).
    pub total_energy_mev: f64,
    /// Step length (mm).
    pub step_length_mm: f64,
}

impl TraceStep {
    /// Borrows the step as pipeline input.
    #[must_use]
    pub fn as_step_record(&self) -> StepRecord<'_, str> {
        StepRecord::at(self.volume.as_str())
            .with_edep(self.edep_mev)
            .with_particle(self.charge, self.momentum_mev, self.total_energy_mev)
            .with_step_length(self.step_length_mm)
    }
}

/// All steps of one simulated event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTrace {
    /// Event number as written by the transport engine.
    pub event_id: u64,
    /// Steps in the order they were recorded.
    pub steps: Vec<TraceStep>,
}

#[derive(Deserialize)]
struct TraceRow {
    event: u64,
    volume: String,
    edep_mev: f64,
    charge: f64,
    momentum_mev: f64,
    total_energy_mev: f64,
    step_mm: f64,
}

impl TraceRow {
    fn into_step(self) -> (u64, TraceStep) {
        let step = TraceStep {
            volume: self.volume,
            edep_mev: self.edep_mev,
            charge: self.charge,
            momentum_mev: self.momentum_mev,
            total_energy_mev: self.total_energy_mev,
            step_length_mm: self.step_mm,
        };
        (self.event, step)
    }
}

/// Reads a step trace file.
///
/// # Errors
/// Returns an error on I/O failure or a malformed row.
pub fn read_trace<P: AsRef<Path>>(path: P) -> Result<Vec<EventTrace>> {
    parse_trace(std::fs::File::open(path)?)
}

/// Parses a step trace from any reader.
///
/// Fields may be quoted; blank lines and lines starting with `#` are skipped.
///
/// # Errors
/// Returns an error on I/O failure, a wrong header, a malformed row, or an
/// event whose steps are not contiguous.
pub fn parse_trace<R: Read>(input: R) -> Result<Vec<EventTrace>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = rdr.headers()?;
    if !headers.iter().eq(TRACE_COLUMNS) {
        let found = headers.iter().collect::<Vec<_>>().join(",");
        return Err(Error::InvalidFormat(format!(
            "unexpected trace header '{found}', expected '{TRACE_HEADER}'"
        )));
    }

    let mut events: Vec<EventTrace> = Vec::new();
    let mut seen = HashSet::new();
    for row in rdr.deserialize::<TraceRow>() {
        let row = row.map_err(|e| csv_row_error(e, &TRACE_COLUMNS))?;
        let (event_id, step) = row.into_step();

        match events.last_mut() {
            Some(last) if last.event_id == event_id => last.steps.push(step),
            _ => {
                if !seen.insert(event_id) {
                    return Err(Error::InvalidFormat(format!(
                        "steps of event {event_id} are not contiguous"
                    )));
                }
                events.push(EventTrace {
                    event_id,
                    steps: vec![step],
                });
            }
        }
    }
    Ok(events)
}
