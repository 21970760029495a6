//! Contract for user interface plug-ins

use crate::error::PluginError;

/// A plug-in that runs a user interface on its own thread of control.
///
/// Several interface instances may be active at the same time; none may
/// block another's thread. The runtime verifies this contract only through
/// the non-blocking requirement on [`start`](UserInterfacePlugin::start).
///
/// A started-then-stopped instance may be started again, returning to its
/// pre-start state except for effects already applied to shared
/// application state.
pub trait UserInterfacePlugin: Send + Sync {
    /// Launch the interface. Must return immediately; the interface runs
    /// on a thread it spawns itself.
    fn start(&self) -> Result<(), PluginError>;

    /// Signal graceful termination and block until shutdown is complete
    fn stop(&self) -> Result<(), PluginError>;

    /// Block until the interface terminates naturally
    fn join(&self) -> Result<(), PluginError>;
}
