//! Fixture patch model
//!
//! [`PatchTable::build`] validates the declared outputs and strips and
//! computes full DMX addressing for each strip. The table keeps two indexes:
//!
//! - by output line: strips in daisy-chain order (`pos_in_out_queue`)
//! - by universe: strips ordered by start channel, declaration order on ties
//!
//! A table is only ever replaced by another fully validated table.

use super::PixelProfile;
use crate::config::{AppConfig, OutputConfig};
use crate::error::{PixelBoxError, Result};
use crate::types::{
    is_valid_universe, OutputLabel, OutputLine, DMX_UNIVERSE_SIZE, MAX_PIXELS_PER_STRIP,
    SACN_UNIVERSE_MAX, SACN_UNIVERSE_MIN,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One strip with its resolved addressing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixturePatch {
    pub label: String,
    pub pixel_count: u16,
    pub universe: u16,
    pub start_channel: u16,
    pub output: OutputLine,
    pub output_label: OutputLabel,
    pub pos_in_out_queue: usize,
    pub profile: &'static PixelProfile,
}

impl FixturePatch {
    /// Last DMX channel used by the strip (1-based, inclusive)
    pub fn end_channel(&self) -> u16 {
        last_channel(self.start_channel, self.pixel_count, self.profile) as u16
    }

    /// DMX slots occupied by the whole strip
    pub fn footprint(&self) -> usize {
        self.pixel_count as usize * self.profile.footprint()
    }

    /// Serializable summary
    pub fn info(&self) -> PatchInfo {
        PatchInfo {
            label: self.label.clone(),
            pixel_count: self.pixel_count,
            universe: self.universe,
            start_channel: self.start_channel,
            end_channel: self.end_channel(),
            output: self.output,
            output_label: self.output_label,
            pos_in_out_queue: self.pos_in_out_queue,
            pixel_type: self.profile.label.to_string(),
        }
    }
}

fn last_channel(start_channel: u16, pixel_count: u16, profile: &PixelProfile) -> usize {
    (start_channel as usize + pixel_count as usize * profile.footprint()).saturating_sub(1)
}

/// Read-only view of a patched strip for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchInfo {
    pub label: String,
    pub pixel_count: u16,
    pub universe: u16,
    pub start_channel: u16,
    pub end_channel: u16,
    pub output: OutputLine,
    pub output_label: OutputLabel,
    pub pos_in_out_queue: usize,
    pub pixel_type: String,
}

/// Validated strips indexed by output line and by universe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchTable {
    by_output: BTreeMap<OutputLine, Vec<FixturePatch>>,
    by_universe: BTreeMap<u16, Vec<FixturePatch>>,
}

impl PatchTable {
    /// Build a table from an application config
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::build(&config.outputs)
    }

    /// Validate every output and strip, then build both indexes
    ///
    /// All violations are collected before failing.
    pub fn build(outputs: &BTreeMap<OutputLabel, OutputConfig>) -> Result<Self> {
        validate(outputs)?;

        let mut table = PatchTable::default();
        for (name, output) in outputs {
            let profile = output.profile().ok_or_else(|| {
                PixelBoxError::Config(format!("Unknown pixel type [{}]", output.pixel_type))
            })?;
            let queue = table.by_output.entry(output.gpio).or_default();
            for (pos, strip) in output.strips.iter().enumerate() {
                let patch = FixturePatch {
                    label: strip.label.clone(),
                    pixel_count: strip.pixel_count,
                    universe: strip.universe,
                    start_channel: strip.start_channel,
                    output: output.gpio,
                    output_label: *name,
                    pos_in_out_queue: pos,
                    profile,
                };
                queue.push(patch.clone());
                table
                    .by_universe
                    .entry(strip.universe)
                    .or_default()
                    .push(patch);
            }
        }

        for patches in table.by_universe.values_mut() {
            patches.sort_by_key(|p| p.start_channel);
        }

        Ok(table)
    }

    /// Replace this table with one built from `outputs`
    ///
    /// On failure the current table is left untouched.
    pub fn rebuild(&mut self, outputs: &BTreeMap<OutputLabel, OutputConfig>) -> Result<()> {
        *self = Self::build(outputs)?;
        Ok(())
    }

    /// Strips on one output line in queue order
    pub fn by_output(&self, line: OutputLine) -> &[FixturePatch] {
        self.by_output.get(&line).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Strips reading from one universe, ordered by start channel
    pub fn by_universe(&self, universe: u16) -> &[FixturePatch] {
        self.by_universe
            .get(&universe)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Strips on `line` reading from `universe`, in queue order
    pub fn by_output_universe(&self, line: OutputLine, universe: u16) -> Vec<&FixturePatch> {
        self.by_output(line)
            .iter()
            .filter(|p| p.universe == universe)
            .collect()
    }

    /// Every strip, grouped by output line
    pub fn all(&self) -> impl Iterator<Item = &FixturePatch> {
        self.by_output.values().flatten()
    }

    /// The whole by-output index
    pub fn outputs(&self) -> &BTreeMap<OutputLine, Vec<FixturePatch>> {
        &self.by_output
    }

    /// Output lines with at least one strip
    pub fn lines(&self) -> impl Iterator<Item = OutputLine> + '_ {
        self.by_output.keys().copied()
    }

    /// Universes with at least one strip, ascending
    pub fn universes(&self) -> Vec<u16> {
        self.by_universe.keys().copied().collect()
    }

    /// Number of patched strips
    pub fn len(&self) -> usize {
        self.by_output.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summaries of every strip, grouped by output line
    pub fn infos(&self) -> Vec<PatchInfo> {
        self.all().map(FixturePatch::info).collect()
    }
}

fn validate(outputs: &BTreeMap<OutputLabel, OutputConfig>) -> Result<()> {
    let errors = validation_errors(outputs);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(PixelBoxError::ConfigValidation(errors))
    }
}

/// Every problem with the declared outputs and strips, in declaration order
pub(crate) fn validation_errors(outputs: &BTreeMap<OutputLabel, OutputConfig>) -> Vec<String> {
    let mut errors = Vec::new();

    let mut pins: BTreeMap<OutputLine, usize> = BTreeMap::new();
    for output in outputs.values() {
        *pins.entry(output.gpio).or_default() += 1;
    }
    for (pin, _) in pins.iter().filter(|(_, count)| **count > 1) {
        errors.push(format!("Pin [{}] used on multiple outputs", pin));
    }

    let mut labels: HashMap<&str, usize> = HashMap::new();
    for strip in outputs.values().flat_map(|o| &o.strips) {
        *labels.entry(strip.label.as_str()).or_default() += 1;
    }

    for (name, output) in outputs {
        let profile = output.profile();
        if profile.is_none() {
            errors.push(format!(
                "Output [{}]: unknown pixel type [{}], expected one of {:?}",
                name,
                output.pixel_type,
                PixelProfile::labels().collect::<Vec<_>>()
            ));
        }

        for strip in &output.strips {
            if strip.label.trim().is_empty() {
                errors.push(format!("Strip [{} > ?]: label is empty", name));
            } else if labels.get(strip.label.as_str()).copied().unwrap_or(0) > 1 {
                errors.push(format!(
                    "Strip [{} > {}]: label used on multiple strips",
                    name, strip.label
                ));
            }

            let before = errors.len();
            if !(1..=MAX_PIXELS_PER_STRIP).contains(&strip.pixel_count) {
                errors.push(format!(
                    "Strip [{} > {}]: pixel_count [{}] outside 1..={}",
                    name, strip.label, strip.pixel_count, MAX_PIXELS_PER_STRIP
                ));
            }
            if !is_valid_universe(strip.universe) {
                errors.push(format!(
                    "Strip [{} > {}]: universe [{}] outside {}..={}",
                    name, strip.label, strip.universe, SACN_UNIVERSE_MIN, SACN_UNIVERSE_MAX
                ));
            }
            if !(1..=DMX_UNIVERSE_SIZE as u16).contains(&strip.start_channel) {
                errors.push(format!(
                    "Strip [{} > {}]: start_channel [{}] outside 1..={}",
                    name, strip.label, strip.start_channel, DMX_UNIVERSE_SIZE
                ));
            }
            let in_range = errors.len() == before;

            if let Some(profile) = profile.filter(|_| in_range) {
                if last_channel(strip.start_channel, strip.pixel_count, profile)
                    > DMX_UNIVERSE_SIZE
                {
                    errors.push(format!(
                        "Strip [{} > {}] does not fit in a single DMX universe",
                        name, strip.label
                    ));
                }
            }
        }
    }

    errors
}
