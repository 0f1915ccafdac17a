//! Historical accuracy priors for fusion evidence.
//!
//! `PriorAccuracyTable` is an immutable, versioned value. Updates produce a
//! new table; `PriorStore` swaps it in behind an `Arc` so readers always hold
//! a complete snapshot, old or new.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ConfigError;

/// Kinds of evidence fusion can weigh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    Rsi,
    Macd,
    Bollinger,
    Stochastic,
    Volume,
    Trend,
    Pattern,
}

impl EvidenceSource {
    pub const ALL: [EvidenceSource; 7] = [
        EvidenceSource::Rsi,
        EvidenceSource::Macd,
        EvidenceSource::Bollinger,
        EvidenceSource::Stochastic,
        EvidenceSource::Volume,
        EvidenceSource::Trend,
        EvidenceSource::Pattern,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EvidenceSource::Rsi => "rsi",
            EvidenceSource::Macd => "macd",
            EvidenceSource::Bollinger => "bollinger",
            EvidenceSource::Stochastic => "stochastic",
            EvidenceSource::Volume => "volume",
            EvidenceSource::Trend => "trend",
            EvidenceSource::Pattern => "pattern",
        }
    }

    pub fn default_accuracy(self) -> f64 {
        match self {
            EvidenceSource::Rsi => 0.65,
            EvidenceSource::Macd => 0.68,
            EvidenceSource::Bollinger => 0.62,
            EvidenceSource::Stochastic => 0.60,
            EvidenceSource::Volume => 0.60,
            EvidenceSource::Trend => 0.70,
            EvidenceSource::Pattern => 0.72,
        }
    }
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EvidenceSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        EvidenceSource::ALL
            .into_iter()
            .find(|src| src.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownSource(s.to_string()))
    }
}

/// Hit rate per evidence source, each strictly inside (0, 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorAccuracyTable {
    version: u64,
    accuracies: BTreeMap<EvidenceSource, f64>,
}

impl Default for PriorAccuracyTable {
    fn default() -> Self {
        Self {
            version: 1,
            accuracies: EvidenceSource::ALL
                .into_iter()
                .map(|src| (src, src.default_accuracy()))
                .collect(),
        }
    }
}

impl PriorAccuracyTable {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn accuracy(&self, source: EvidenceSource) -> f64 {
        self.accuracies
            .get(&source)
            .copied()
            .unwrap_or_else(|| source.default_accuracy())
    }

    pub fn iter(&self) -> impl Iterator<Item = (EvidenceSource, f64)> + '_ {
        self.accuracies.iter().map(|(k, v)| (*k, *v))
    }

    /// BLAKE3 over the exact bit patterns of every (source, accuracy) pair.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (source, accuracy) in &self.accuracies {
            hasher.update(source.name().as_bytes());
            hasher.update(&accuracy.to_bits().to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    /// A new table with `rates` merged in and the version bumped.
    ///
    /// Every entry is validated before anything is applied: one bad name or
    /// rate rejects the whole update. Sources not named keep their value.
    pub fn with_updates<I, K>(&self, rates: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for (name, value) in rates {
            let name = name.as_ref();
            let source: EvidenceSource = name.parse()?;
            if !(value.is_finite() && value > 0.0 && value < 1.0) {
                return Err(ConfigError::InvalidAccuracy {
                    name: name.to_string(),
                    value,
                });
            }
            parsed.push((source, value));
        }

        let mut next = self.clone();
        next.accuracies.extend(parsed);
        next.version = self.version + 1;
        Ok(next)
    }
}

/// Process-wide holder of the current prior table.
///
/// Readers take an `Arc` snapshot at the start of an analysis; writers are
/// serialized and replace the whole table in one swap.
#[derive(Debug, Default)]
pub struct PriorStore {
    current: RwLock<Arc<PriorAccuracyTable>>,
    writer: Mutex<()>,
}

impl PriorStore {
    pub fn new(table: PriorAccuracyTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
            writer: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<PriorAccuracyTable> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Validate and apply a partial update. On error the table is unchanged.
    pub fn update<I, K>(&self, rates: I) -> Result<Arc<PriorAccuracyTable>, ConfigError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let base = self.snapshot();
        let next = match base.with_updates(rates) {
            Ok(table) => Arc::new(table),
            Err(err) => {
                warn!(error = %err, version = base.version(), "prior accuracy update rejected");
                return Err(err);
            }
        };

        {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *guard = Arc::clone(&next);
        }
        info!(
            version = next.version(),
            fingerprint = %next.fingerprint(),
            "prior accuracy table updated"
        );
        Ok(next)
    }
}
