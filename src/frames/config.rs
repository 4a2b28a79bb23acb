// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Frame pipelining parameters.

Defaults can be overridden from the environment when the pipeline is built:

| Variable | Meaning | Default |
|---|---|---|
| `WAF_FRAME_SLOTS` | number of frame slots in the ring | 3 |
| `WAF_FENCE_TIMEOUT_MS` | longest a fence wait may block before the device is considered lost | 5000 |
*/

use std::time::Duration;

use crate::frames::accelerator::SubmitError;

pub const FRAME_SLOTS_VAR: &str = "WAF_FRAME_SLOTS";
pub const FENCE_TIMEOUT_VAR: &str = "WAF_FENCE_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum FrameConfigError {
    #[error("a frame ring needs at least one slot")]
    NoSlots,
    #[error("the fence timeout must be nonzero")]
    ZeroTimeout,
    #[error("{variable}={value:?} is not a valid setting")]
    InvalidEnvironment { variable: &'static str, value: String },
    #[error("{slots} frame slots but scene data is replicated {replicas} times")]
    ReplicaMismatch { slots: usize, replicas: usize },
    #[error("{slots} frame slots but the accelerator only has storage for {available}")]
    SlotLimit { slots: usize, available: usize },
    /// The scene or the height field does not fit the accelerator's per-slot storage.
    #[error(transparent)]
    Capacity(#[from] SubmitError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// How many frames the CPU may prepare ahead of the accelerator.
    pub slot_count: usize,
    /// The longest a slot acquisition may block before the device is considered lost.
    pub fence_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            slot_count: 3,
            fence_timeout: Duration::from_secs(5),
        }
    }
}

impl FrameConfig {
    /// Rejects a ring without slots and a zero fence timeout.
    pub fn validate(&self) -> Result<(), FrameConfigError> {
        if self.slot_count == 0 {
            return Err(FrameConfigError::NoSlots);
        }
        if self.fence_timeout.is_zero() {
            return Err(FrameConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// The default configuration with any overrides from the process environment applied.
    pub fn from_env() -> Result<Self, FrameConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /**
    The default configuration with overrides taken from `lookup`.

    `lookup` returns the value of a variable, or `None` when it is unset.
    */
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FrameConfigError> {
        let mut config = FrameConfig::default();
        if let Some(value) = lookup(FRAME_SLOTS_VAR) {
            config.slot_count = value
                .trim()
                .parse()
                .map_err(|_| FrameConfigError::InvalidEnvironment {
                    variable: FRAME_SLOTS_VAR,
                    value: value.clone(),
                })?;
        }
        if let Some(value) = lookup(FENCE_TIMEOUT_VAR) {
            let ms: u64 = value
                .trim()
                .parse()
                .map_err(|_| FrameConfigError::InvalidEnvironment {
                    variable: FENCE_TIMEOUT_VAR,
                    value: value.clone(),
                })?;
            config.fence_timeout = Duration::from_millis(ms);
        }
        config.validate()?;
        logwise::info_sync!(
            "frame config: {slots} slots, fence timeout {timeout}",
            slots = logwise::privacy::LogIt(&config.slot_count),
            timeout = logwise::privacy::LogIt(&config.fence_timeout)
        );
        Ok(config)
    }
}
