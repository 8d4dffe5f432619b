//! Startup capability descriptor.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::job::JobKind;

/// Immutable record of which backends and tools are usable in the
/// current deployment.
///
/// Produced once by the capability prober at startup and never re-probed;
/// an operator restart is required to pick up environment changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Whether the durable shared store answered the startup probe.
    pub durable_store_available: bool,
    /// Operator policy: reject submissions instead of degrading to the
    /// fallback backend when the durable store is down.
    pub must_use_durable: bool,
    /// Per-kind external tool availability.
    pub tools_available: HashMap<JobKind, bool>,
}

impl CapabilityDescriptor {
    /// Whether jobs of `kind` can be accepted at all (the kind's external
    /// tool was found at startup).
    pub fn kind_enabled(&self, kind: JobKind) -> bool {
        self.tools_available.get(&kind).copied().unwrap_or(false)
    }

    /// The job kinds that are disabled because their tool is missing.
    pub fn disabled_kinds(&self) -> Vec<JobKind> {
        JobKind::ALL
            .into_iter()
            .filter(|kind| !self.kind_enabled(*kind))
            .collect()
    }
}
