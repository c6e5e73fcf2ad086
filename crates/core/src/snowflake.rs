//! Snowflake identifier generation.
//!
//! Ids are 63-bit positive integers laid out as:
//!
//! ```text
//! | 0 | 41 bits: ms since epoch | 10 bits: machine id | 12 bits: sequence |
//! ```
//!
//! One [`IdGenerator`] exists per process. Its `(last_ms, sequence)` pair sits
//! behind a mutex so concurrent callers never observe the same value.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::ConfigError;
use crate::types::{DbId, Timestamp};

/// Bits reserved for the machine id.
pub const MACHINE_ID_BITS: u32 = 10;

/// Bits reserved for the per-millisecond sequence.
pub const SEQUENCE_BITS: u32 = 12;

/// Largest accepted machine id (inclusive).
pub const MAX_MACHINE_ID: u16 = (1 << MACHINE_ID_BITS) - 1;

const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;
const MACHINE_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + MACHINE_ID_BITS;

/// Default epoch: 2024-10-24T00:00:00Z, in Unix milliseconds.
pub const DEFAULT_EPOCH_MS: i64 = 1_729_728_000_000;

/// Environment variable holding the machine id.
pub const MACHINE_ID_ENV: &str = "MACHINE_ID";

/// Parse a raw machine id value.
///
/// Missing, non-numeric, or out-of-range values are configuration errors; the
/// caller is expected to abort startup.
pub fn parse_machine_id(raw: Option<&str>) -> Result<u16, ConfigError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ConfigError::Missing(MACHINE_ID_ENV))?;

    let id: u16 = raw.parse().map_err(|_| ConfigError::Invalid {
        key: MACHINE_ID_ENV,
        reason: format!("'{raw}' is not a number"),
    })?;

    if id > MAX_MACHINE_ID {
        return Err(ConfigError::Invalid {
            key: MACHINE_ID_ENV,
            reason: format!("{id} exceeds the maximum of {MAX_MACHINE_ID}"),
        });
    }
    Ok(id)
}

/// Decomposed view of a snowflake id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    /// Milliseconds since the generator epoch.
    pub elapsed_ms: i64,
    pub machine_id: u16,
    pub sequence: u16,
}

impl IdParts {
    pub fn of(id: DbId) -> Self {
        Self {
            elapsed_ms: id >> TIMESTAMP_SHIFT,
            machine_id: ((id >> MACHINE_SHIFT) & i64::from(MAX_MACHINE_ID)) as u16,
            sequence: (id & SEQUENCE_MASK) as u16,
        }
    }
}

#[derive(Debug)]
struct State {
    last_ms: i64,
    sequence: i64,
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Process-wide snowflake id source.
pub struct IdGenerator {
    epoch_ms: i64,
    machine_id: u16,
    clock: Clock,
    state: Mutex<State>,
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator")
            .field("epoch_ms", &self.epoch_ms)
            .field("machine_id", &self.machine_id)
            .finish_non_exhaustive()
    }
}

impl IdGenerator {
    /// Build a generator for `machine_id` counting from `epoch`.
    pub fn new(machine_id: u16, epoch: Timestamp) -> Result<Self, ConfigError> {
        Self::with_clock(
            machine_id,
            epoch,
            Arc::new(|| chrono::Utc::now().timestamp_millis()),
        )
    }

    /// Build a generator with the default epoch.
    pub fn with_default_epoch(machine_id: u16) -> Result<Self, ConfigError> {
        let epoch = chrono::DateTime::from_timestamp_millis(DEFAULT_EPOCH_MS)
            .ok_or_else(|| ConfigError::Invalid {
                key: "EPOCH",
                reason: "default epoch out of range".into(),
            })?;
        Self::new(machine_id, epoch)
    }

    fn with_clock(machine_id: u16, epoch: Timestamp, clock: Clock) -> Result<Self, ConfigError> {
        if machine_id > MAX_MACHINE_ID {
            return Err(ConfigError::Invalid {
                key: MACHINE_ID_ENV,
                reason: format!("{machine_id} exceeds the maximum of {MAX_MACHINE_ID}"),
            });
        }
        Ok(Self {
            epoch_ms: epoch.timestamp_millis(),
            machine_id,
            clock,
            state: Mutex::new(State {
                last_ms: -1,
                sequence: 0,
            }),
        })
    }

    pub fn machine_id(&self) -> u16 {
        self.machine_id
    }

    /// Produce the next id. Values are strictly increasing within a process.
    pub fn next_id(&self) -> DbId {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        // A clock that steps backwards keeps issuing from the last tick.
        let mut now = ((self.clock)() - self.epoch_ms).max(0).max(state.last_ms);

        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // Sequence exhausted for this tick: borrow the next one.
                now = state.last_ms + 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = now;

        (now << TIMESTAMP_SHIFT) | (i64::from(self.machine_id) << MACHINE_SHIFT) | state.sequence
    }
}
