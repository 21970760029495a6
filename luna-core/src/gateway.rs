//! Trust boundary - the sole path from host code into plug-in code
//!
//! Every call that crosses into a plug-in goes through one of the three
//! entry points here, so the trust decision is visible in the signature at
//! the call site:
//!
//! - [`recoverable`] for call sites with a declared recovery policy:
//!   failures (including panics) come back as a typed
//!   [`CapabilityError`].
//! - [`fatal`] for call sites without one: errors are typed and
//!   propagated, and a panic unwinds through the caller unmodified — the
//!   gateway never swallows what it cannot recover.
//! - [`probe`] for pure applicability checks: a failing probe means "not
//!   applicable".
//!
//! Two carve-outs exist by design: a plug-in calling into its own code is
//! not mediated (there is nothing to protect a plug-in from itself), and
//! logger invocations are dispatched directly by the sink under the
//! assumption that they never raise.

use luna_plugin_api::PluginError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;

/// A plug-in capability invocation failed
#[derive(Error, Debug)]
pub enum CapabilityError {
    /// The plug-in panicked inside the capability
    #[error("Plug-in {plugin} panicked in {capability}")]
    Panicked { plugin: String, capability: String },

    /// The capability returned an error
    #[error("Plug-in {plugin} failed in {capability}: {source}")]
    Failed {
        plugin: String,
        capability: String,
        #[source]
        source: PluginError,
    },
}

impl CapabilityError {
    /// The identity of the plug-in that failed
    pub fn plugin(&self) -> &str {
        match self {
            CapabilityError::Panicked { plugin, .. } => plugin,
            CapabilityError::Failed { plugin, .. } => plugin,
        }
    }
}

/// Invoke a capability at a call site that declared a recovery policy.
///
/// Panics raised by the plug-in are contained and converted, so the caller
/// always gets a `Result` back.
pub fn recoverable<T>(
    plugin: &str,
    capability: &str,
    call: impl FnOnce() -> Result<T, PluginError>,
) -> Result<T, CapabilityError> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(CapabilityError::Failed {
            plugin: plugin.to_string(),
            capability: capability.to_string(),
            source,
        }),
        Err(_) => {
            tracing::error!(plugin, capability, "Plug-in panicked, containing");
            Err(CapabilityError::Panicked {
                plugin: plugin.to_string(),
                capability: capability.to_string(),
            })
        }
    }
}

/// Invoke a capability at a call site with no recovery policy.
///
/// Errors are typed for the caller to propagate; panics are not caught and
/// unwind as fatal to the current operation.
pub fn fatal<T>(
    plugin: &str,
    capability: &str,
    call: impl FnOnce() -> Result<T, PluginError>,
) -> Result<T, CapabilityError> {
    call().map_err(|source| CapabilityError::Failed {
        plugin: plugin.to_string(),
        capability: capability.to_string(),
        source,
    })
}

/// Run an applicability probe. Probes are pure judgements; any internal
/// failure means the plug-in is not applicable.
pub fn probe(plugin: &str, capability: &str, call: impl FnOnce() -> bool) -> bool {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(applicable) => applicable,
        Err(_) => {
            tracing::warn!(plugin, capability, "Probe panicked, treating as not applicable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_success() {
        let result = recoverable("p", "cap", || Ok(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_recoverable_error_is_typed() {
        let result: Result<(), _> =
            recoverable("p", "cap", || Err(PluginError::custom("broken")));
        match result {
            Err(CapabilityError::Failed {
                plugin, capability, ..
            }) => {
                assert_eq!(plugin, "p");
                assert_eq!(capability, "cap");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_recoverable_contains_panic() {
        let result: Result<(), _> = recoverable("p", "cap", || panic!("plug-in bug"));
        assert!(matches!(result, Err(CapabilityError::Panicked { .. })));
    }

    #[test]
    fn test_fatal_maps_error_without_catching() {
        let result: Result<(), _> = fatal("p", "write", || Err(PluginError::custom("disk full")));
        assert!(matches!(result, Err(CapabilityError::Failed { .. })));
    }

    #[test]
    #[should_panic(expected = "plug-in bug")]
    fn test_fatal_lets_panic_unwind() {
        let _: Result<(), _> = fatal("p", "write", || panic!("plug-in bug"));
    }

    #[test]
    fn test_probe_panic_means_not_applicable() {
        assert!(probe("p", "can_read", || true));
        assert!(!probe("p", "can_read", || false));
        assert!(!probe("p", "can_read", || panic!("probe bug")));
    }

    #[test]
    fn test_capability_error_plugin_accessor() {
        let err = CapabilityError::Panicked {
            plugin: "p".to_string(),
            capability: "cap".to_string(),
        };
        assert_eq!(err.plugin(), "p");
    }
}
