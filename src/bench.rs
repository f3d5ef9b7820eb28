//! The batched-lookup benchmark.
//!
//! A run has two phases. Population fills a [`HashMap`] with `capacity`
//! random 255-character keys and `[0, 90)` values, and keeps roughly one key
//! in `selectivity` as the lookup sample. The timed phase then walks the
//! sample in chunks of `buffer_size`: every chunk is first looked up into a
//! scratch buffer (the simulated prefetch pass), and only then summed. Only
//! the timed phase is measured.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::hint::black_box;
use std::time::Duration;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::Error;
use crate::error::Result;
use crate::hash_map::HashMap;
use crate::rng::KeyGenerator;

/// Number of keys generated, and root slots in the table, by default.
pub const DEFAULT_CAPACITY: usize = 3_800_000;

/// Seed used when none is given, so separate runs are comparable.
pub const DEFAULT_SEED: u64 = 20_170_404;

/// How the summation pass treats the last, partial chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SumMode {
    /// Always sum the whole scratch buffer. On a partial final chunk this
    /// re-adds whatever the previous chunk left in the tail of the buffer.
    #[default]
    Compat,
    /// Sum only the scratch slots the current chunk filled.
    Corrected,
}

/// How the lookup pass of each chunk is issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchMode {
    /// Plain lookups into the scratch buffer.
    #[default]
    Simulated,
    /// Hash the whole chunk and issue a cache prefetch for each root slot
    /// before doing the lookups.
    Hardware,
}

/// Parameters of one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// Keys to generate; also the number of root slots in the table.
    pub capacity: usize,
    /// Seed for the key generator.
    pub seed: u64,
    /// Sampling denominator: about one key in `selectivity` is looked up.
    pub selectivity: u32,
    /// Number of lookups per batch.
    pub buffer_size: usize,
    /// Summation behavior on the final chunk.
    pub mode: SumMode,
    /// Lookup pass behavior.
    pub prefetch: PrefetchMode,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            seed: DEFAULT_SEED,
            selectivity: 1,
            buffer_size: 1,
            mode: SumMode::default(),
            prefetch: PrefetchMode::default(),
        }
    }
}

impl BenchConfig {
    /// Checks that the run is well defined.
    ///
    /// Runs that skip this check keep the unvalidated behavior: a zero
    /// selectivity panics during population and a zero buffer size performs
    /// no lookups.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidCapacity);
        }
        if self.selectivity == 0 {
            return Err(Error::InvalidSelectivity);
        }
        if self.buffer_size == 0 {
            return Err(Error::InvalidBufferSize);
        }
        Ok(())
    }
}

/// A populated table and the keys sampled from it.
#[derive(Debug)]
pub struct Workload {
    map: HashMap<String, f64>,
    sample: Vec<String>,
}

impl Workload {
    /// Generates `config.capacity` entries and samples keys from them.
    ///
    /// For each entry the generator draws the key, then the value, then the
    /// sampling decision. The sample keeps generation order.
    ///
    /// # Panics
    ///
    /// Panics if `config.selectivity` is zero.
    pub fn populate(config: &BenchConfig) -> Self {
        let mut generator = KeyGenerator::new(config.seed);
        let mut map: HashMap<String, f64> = HashMap::with_capacity(config.capacity);
        let mut sample = Vec::with_capacity(
            config
                .capacity
                .checked_div(config.selectivity as usize)
                .unwrap_or(0),
        );

        for _ in 0..config.capacity {
            let key = generator.next_key();
            let value = generator.next_value();
            if generator.next_sample(config.selectivity) {
                sample.push(key.clone());
            }
            map.insert(key, value);
        }

        info!(
            entries = map.len(),
            sampled = sample.len(),
            "table populated"
        );

        Self { map, sample }
    }

    /// The populated table.
    pub fn map(&self) -> &HashMap<String, f64> {
        &self.map
    }

    /// The sampled keys, in generation order.
    pub fn sample(&self) -> &[String] {
        &self.sample
    }

    /// Runs and times the batched lookup-then-sum loop over the sample.
    pub fn measure(&self, config: &BenchConfig) -> Report {
        let n_strings = self.sample.len();
        if config.mode == SumMode::Compat && config.buffer_size > 0 {
            let tail = n_strings % config.buffer_size;
            if tail != 0 && n_strings > config.buffer_size {
                warn!(
                    stale = config.buffer_size - tail,
                    "final chunk is partial; stale scratch entries will be summed"
                );
            }
        }

        let begin = Instant::now();
        let sum = batched_sum(
            &self.map,
            &self.sample,
            config.buffer_size,
            config.mode,
            config.prefetch,
        );
        let elapsed = begin.elapsed();

        info!(elapsed_ms = elapsed.as_millis() as u64, "timed phase complete");

        Report::new(sum, elapsed, n_strings, config)
    }
}

/// Populates a table from `config` and measures it.
///
/// # Panics
///
/// Panics if `config.selectivity` is zero.
pub fn run(config: &BenchConfig) -> Report {
    debug!(?config, "starting benchmark");
    Workload::populate(config).measure(config)
}

/// Sums the values of `sample` in batches of `buffer_size`.
///
/// Each batch is looked up into a scratch buffer before any of it is summed.
/// The buffer is zeroed once and reused, so in [`SumMode::Compat`] a partial
/// final batch adds the values the previous batch left behind (or zeros, if
/// there was only one batch). A `buffer_size` of zero sums nothing.
///
/// # Panics
///
/// Panics if a sampled key is not in `map`.
pub fn batched_sum(
    map: &HashMap<String, f64>,
    sample: &[String],
    buffer_size: usize,
    mode: SumMode,
    prefetch: PrefetchMode,
) -> f64 {
    if buffer_size == 0 {
        return 0.0;
    }

    let mut buffer = vec![0.0f64; buffer_size];
    let mut hashes = match prefetch {
        PrefetchMode::Simulated => Vec::new(),
        PrefetchMode::Hardware => vec![0u64; buffer_size],
    };
    let mut sum = 0.0;

    for chunk in sample.chunks(buffer_size) {
        match prefetch {
            PrefetchMode::Simulated => {
                for (slot, key) in buffer.iter_mut().zip(chunk) {
                    *slot = *map.lookup(key.as_str());
                }
            }
            PrefetchMode::Hardware => {
                for (hash, key) in hashes.iter_mut().zip(chunk) {
                    *hash = map.hash_key(key.as_str());
                    map.prefetch(*hash);
                }
                for ((slot, key), hash) in buffer.iter_mut().zip(chunk).zip(&hashes) {
                    *slot = *map.lookup_hashed(*hash, key.as_str());
                }
            }
        }

        let filled = match mode {
            SumMode::Compat => buffer.len(),
            SumMode::Corrected => chunk.len(),
        };
        for value in &buffer[..filled] {
            sum += *value;
        }
    }

    black_box(sum)
}

/// Sums the values of `sample` one lookup at a time, with no scratch buffer.
///
/// # Panics
///
/// Panics if a sampled key is not in `map`.
pub fn scalar_sum(map: &HashMap<String, f64>, sample: &[String]) -> f64 {
    let mut sum = 0.0;
    for key in sample {
        sum += *map.lookup(key.as_str());
    }
    black_box(sum)
}

/// Result of one timed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Sum of every value added by the summation pass.
    pub sum: f64,
    /// `sum / n_strings`; NaN when nothing was sampled.
    pub average: f64,
    /// Wall time of the timed phase in whole milliseconds.
    pub duration: u64,
    /// Number of sampled keys.
    pub n_strings: usize,
    /// Batch width.
    pub buffer_size: usize,
    /// Summation mode the run used.
    pub mode: SumMode,
    /// Lookup pass the run used.
    pub prefetch: PrefetchMode,
}

impl Report {
    fn new(sum: f64, elapsed: Duration, n_strings: usize, config: &BenchConfig) -> Self {
        Self {
            sum,
            average: sum / n_strings as f64,
            duration: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            n_strings,
            buffer_size: config.buffer_size,
            mode: config.mode,
            prefetch: config.prefetch,
        }
    }

    /// Renders the report as pretty-printed, valid JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// The legacy report layout: tab-indented, a trailing comma after the last
/// field, and floats in six-significant-digit general notation.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        writeln!(f, "\t\"sum\":{},", format_general(self.sum))?;
        writeln!(f, "\t\"average\":{},", format_general(self.average))?;
        writeln!(f, "\t\"duration\":{},", self.duration)?;
        writeln!(f, "\t\"nStrings\":{},", self.n_strings)?;
        writeln!(f, "\t\"bufferSize\":{},", self.buffer_size)?;
        writeln!(f, "}}")
    }
}

/// Formats a float like `printf("%g")`: six significant digits, scientific
/// notation when the exponent is below -4 or at least 6, trailing zeros
/// removed.
pub fn format_general(value: f64) -> String {
    const PRECISION: i32 = 6;

    if value.is_nan() {
        return String::from(if value.is_sign_negative() { "-nan" } else { "nan" });
    }
    if value.is_infinite() {
        return String::from(if value > 0.0 { "inf" } else { "-inf" });
    }
    if value == 0.0 {
        return String::from(if value.is_sign_negative() { "-0" } else { "0" });
    }

    // Rounding to six digits can bump the exponent (999999.5 -> 1e+06), so
    // take it from the rounded scientific form.
    let scientific = alloc::format!("{:.*e}", (PRECISION - 1) as usize, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };

    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        alloc::format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (PRECISION - 1 - exponent) as usize;
        trim_fraction(&alloc::format!("{value:.decimals$}")).into()
    }
}

fn trim_fraction(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}
