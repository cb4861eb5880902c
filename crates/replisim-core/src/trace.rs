//! JSON Lines trace output.
//!
//! A run writes one header `meta_info` record, then for every tick a
//! `tick_info` record followed by a `meta_info` record describing the
//! traffic observed on that tick. Records for tick N are written before
//! tick N+1 starts, so the log replays in order.

use crate::balancer::{LbInfo, LbMeta};
use crate::client::ClientMeta;
use crate::clock::Tick;
use crate::traffic::{Traffic, TrafficMeta};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Failed to access trace file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode trace record: {0}")]
    Encode(serde_json::Error),
    #[error("Failed to parse JSON at line {line}: {source}")]
    JsonParse {
        line: usize,
        source: serde_json::Error,
    },
}

/// `(id, latency, expired)`, serialized as a three-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedTraffic(pub u64, pub Option<u64>, pub bool);

impl FinishedTraffic {
    pub fn from_traffic(traffic: &Traffic) -> Self {
        Self(traffic.id(), traffic.latency(), traffic.is_expired())
    }

    pub fn id(&self) -> u64 {
        self.0
    }

    pub fn latency(&self) -> Option<u64> {
        self.1
    }

    pub fn expired(&self) -> bool {
        self.2
    }
}

/// Per-tick outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInfo {
    pub tick: Tick,
    pub finished_traffics: Vec<FinishedTraffic>,
    pub lb_info: LbInfo,
}

/// Configuration header or newly observed traffic, depending on which
/// fields are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients: Option<Vec<ClientMeta>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb: Option<LbMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_traffic: Option<Vec<TrafficMeta>>,
}

impl MetaInfo {
    pub fn header(clients: Vec<ClientMeta>, lb: LbMeta) -> Self {
        Self {
            clients: Some(clients),
            lb: Some(lb),
            new_traffic: None,
        }
    }

    pub fn new_traffic(traffic: Vec<TrafficMeta>) -> Self {
        Self {
            new_traffic: Some(traffic),
            ..Self::default()
        }
    }
}

/// One line of the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceRecord {
    MetaInfo(MetaInfo),
    TickInfo(TickInfo),
}

/// Appends trace records to any writer, one JSON object per line.
pub struct TraceWriter<W: Write> {
    writer: W,
    records_written: u64,
}

impl TraceWriter<BufWriter<File>> {
    /// Create (or truncate) a trace file, creating parent directories.
    pub fn create(path: &Path) -> Result<Self, TraceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> TraceWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records_written: 0,
        }
    }

    pub fn write_record(&mut self, record: &TraceRecord) -> Result<(), TraceError> {
        serde_json::to_writer(&mut self.writer, record).map_err(TraceError::Encode)?;
        self.writer.write_all(b"\n")?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn flush(&mut self) -> Result<(), TraceError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> Result<W, TraceError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Parse a trace back into records.
pub fn read_trace<R: Read>(reader: BufReader<R>) -> Result<Vec<TraceRecord>, TraceError> {
    let mut records = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: TraceRecord =
            serde_json::from_str(trimmed).map_err(|e| TraceError::JsonParse {
                line: line_num + 1,
                source: e,
            })?;
        records.push(record);
    }
    Ok(records)
}

/// Load a trace file from disk.
pub fn load_trace(path: &Path) -> Result<Vec<TraceRecord>, TraceError> {
    let file = File::open(path)?;
    read_trace(BufReader::new(file))
}
