use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use anyhow::{bail, Context, Result};
use crate::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Source { Dictionary, Inventory }

impl Source {
    pub fn label(self) -> &'static str { match self { Source::Dictionary => "data dictionary", Source::Inventory => "client table" } }
}

pub fn parse_dictionary(bytes: &[u8]) -> Result<Frame> { crate::xlsx::read_first_sheet(bytes) }

pub fn parse_inventory(bytes: &[u8]) -> Result<Frame> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).flexible(true).from_reader(bytes);
    let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.trim_start_matches('\u{feff}').to_string()).collect();
    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        if rec.len() > columns.len() {
            let line = rec.position().map(|p| p.line()).unwrap_or(0);
            bail!("line {}: expected {} fields, saw {}", line, columns.len(), rec.len());
        }
        rows.push(rec.iter().map(|v| v.to_string()).collect());
    }
    Ok(Frame::new(columns, rows))
}

/// Parsed uploads keyed by a hash of their bytes, so a re-render on unchanged input skips parsing.
#[derive(Default)]
pub struct LoadCache {
    entries: HashMap<(Source, u64), Frame>,
    hits: usize,
}

impl LoadCache {
    pub fn new() -> Self { Self::default() }

    pub fn load(&mut self, source: Source, path: Option<&Path>) -> Result<Frame> {
        let Some(path) = path else { return Ok(Frame::default()) };
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {} {}", source.label(), path.display()))?;
        self.load_bytes(source, &bytes).with_context(|| format!("Failed to parse {} {}", source.label(), path.display()))
    }

    pub fn load_bytes(&mut self, source: Source, bytes: &[u8]) -> Result<Frame> {
        let mut h = DefaultHasher::new();
        bytes.hash(&mut h);
        let key = (source, h.finish());
        if let Some(f) = self.entries.get(&key) {
            self.hits += 1;
            log::debug!("{}: cache hit ({} rows)", source.label(), f.len());
            return Ok(f.clone());
        }
        let frame = match source {
            Source::Dictionary => parse_dictionary(bytes)?,
            Source::Inventory => parse_inventory(bytes)?,
        };
        log::info!("Loaded {}: {} rows, {} columns", source.label(), frame.len(), frame.columns.len());
        self.entries.insert(key, frame.clone());
        Ok(frame)
    }

    pub fn hits(&self) -> usize { self.hits }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn clear(&mut self) {
        log::debug!("Dropping {} cached uploads after {} hits", self.len(), self.hits);
        self.entries.clear();
        self.hits = 0;
    }
}
