//! Scripted replay of frames and decisions
//!
//! A replay script is JSON lines, one record per line:
//!
//! ```text
//! {"kind":"frame","at_secs":0.0,"detections":[{"track_id":1,"box":[0,0,200,100]}]}
//! {"kind":"decision","at_secs":1.5,"track_id":1,"decision":"confirm"}
//! ```
//!
//! `at_secs` is virtual time since the start of the script and must not
//! decrease. A frame without `detections` (or with `null`) is an unavailable
//! frame. Blank lines and lines starting with `#` are ignored.

use crate::confirm::{self, Resolution};
use crate::detection::{Detection, FrameInput, TrackId};
use crate::error::{Error, Result};
use crate::monitor::{FallMonitor, FrameReport};
use fallguard_common::time::secs_to_duration;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};
use tracing::info;

/// One line of a replay script
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayRecord {
    Frame {
        at_secs: f64,
        #[serde(default)]
        detections: Option<Vec<Detection>>,
    },
    Decision {
        at_secs: f64,
        track_id: TrackId,
        decision: confirm::Decision,
    },
}

impl ReplayRecord {
    pub fn at_secs(&self) -> f64 {
        match self {
            ReplayRecord::Frame { at_secs, .. } | ReplayRecord::Decision { at_secs, .. } => {
                *at_secs
            }
        }
    }
}

/// One line of replay output
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ReplayOutput<'a> {
    Frame {
        at_secs: f64,
        #[serde(flatten)]
        report: &'a FrameReport,
    },
    Decision {
        at_secs: f64,
        track_id: TrackId,
        #[serde(skip_serializing_if = "Option::is_none")]
        resolution: Option<Resolution>,
        #[serde(skip_serializing_if = "Option::is_none")]
        incident_id: Option<uuid::Uuid>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Counts gathered while replaying
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames: usize,
    pub decisions: usize,
    pub rejected: usize,
    pub incidents: usize,
}

/// Parse a replay script
pub fn parse_script(reader: impl BufRead) -> Result<Vec<ReplayRecord>> {
    let mut records = Vec::new();
    let mut last_at = Duration::ZERO;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let record: ReplayRecord = serde_json::from_str(trimmed).map_err(|e| Error::Replay {
            line: line_no,
            message: e.to_string(),
        })?;

        let at = secs_to_duration(record.at_secs()).map_err(|e| Error::Replay {
            line: line_no,
            message: e.to_string(),
        })?;
        if at < last_at {
            return Err(Error::Replay {
                line: line_no,
                message: format!(
                    "at_secs {} is earlier than the previous record ({})",
                    record.at_secs(),
                    last_at.as_secs_f64()
                ),
            });
        }
        last_at = at;
        records.push(record);
    }

    Ok(records)
}

/// Drive `monitor` through `records`, writing one JSON line per record
pub async fn run_replay<W: Write>(
    monitor: &FallMonitor,
    records: Vec<ReplayRecord>,
    out: &mut W,
) -> Result<ReplaySummary> {
    let start = Instant::now();
    let mut summary = ReplaySummary::default();

    for record in records {
        let at_secs = record.at_secs();
        let now = start + secs_to_duration(at_secs)?;

        let output = match record {
            ReplayRecord::Frame { detections, .. } => {
                summary.frames += 1;
                let report = monitor
                    .process_frame_at(FrameInput::from_optional(detections), now)
                    .await;
                serde_json::to_string(&ReplayOutput::Frame {
                    at_secs,
                    report: &report,
                })
            }
            ReplayRecord::Decision {
                track_id, decision, ..
            } => {
                summary.decisions += 1;
                let line = match monitor.decide_at(track_id, decision, now).await {
                    Ok(outcome) => {
                        if outcome.incident.is_some() {
                            summary.incidents += 1;
                        }
                        ReplayOutput::Decision {
                            at_secs,
                            track_id,
                            resolution: Some(outcome.resolution),
                            incident_id: outcome.incident.map(|i| i.incident_id),
                            error: None,
                        }
                    }
                    Err(e @ Error::StaleDecision { .. }) => {
                        summary.rejected += 1;
                        ReplayOutput::Decision {
                            at_secs,
                            track_id,
                            resolution: None,
                            incident_id: None,
                            error: Some(e.to_string()),
                        }
                    }
                    Err(e) => return Err(e),
                };
                serde_json::to_string(&line)
            }
        }
        .map_err(|e| Error::Replay {
            line: summary.frames + summary.decisions,
            message: e.to_string(),
        })?;

        writeln!(out, "{output}")?;
    }

    info!(
        frames = summary.frames,
        decisions = summary.decisions,
        rejected = summary.rejected,
        incidents = summary.incidents,
        "Replay finished"
    );
    Ok(summary)
}
