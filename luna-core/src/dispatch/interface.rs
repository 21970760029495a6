//! User interface lifecycle
//!
//! The manager tracks an explicit lifecycle state per interface plug-in
//! and makes the transitions idempotent: starting a running interface and
//! stopping a stopped one are no-ops, not errors. Blocking calls (`stop`,
//! `join`) run outside the state lock so interfaces shut down in parallel
//! and a slow one cannot wedge the manager.

use super::DispatchError;
use crate::gateway;
use crate::registry::{PluginDescriptor, Registry};
use luna_plugin_api::{Kind, UserInterfacePlugin};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Lifecycle state of one user interface plug-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterfaceState {
    /// Never started since load (or returned here after a restart)
    #[default]
    NotStarted,
    /// `start` succeeded and no termination has been observed
    Running,
    /// `stop` is in flight
    Stopping,
    /// Terminated; may be started again
    Stopped,
}

/// Starts, stops and tracks user interface plug-ins
pub struct InterfaceManager {
    registry: Arc<Registry>,
    states: Mutex<HashMap<String, InterfaceState>>,
}

impl InterfaceManager {
    pub(crate) fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            states: Mutex::new(HashMap::new()),
        }
    }

    fn descriptor(&self, identity: &str) -> Result<Arc<PluginDescriptor>, DispatchError> {
        self.registry
            .by_key(Kind::UserInterface, identity)
            .ok_or_else(|| DispatchError::UnknownKey {
                kind: Kind::UserInterface,
                key: identity.to_string(),
            })
    }

    fn with_plugin<T>(
        descriptor: &PluginDescriptor,
        call: impl FnOnce(&dyn UserInterfacePlugin) -> Result<T, DispatchError>,
    ) -> Result<T, DispatchError> {
        match descriptor.instance().as_user_interface() {
            Some(plugin) => call(plugin),
            None => Err(DispatchError::NoSuitablePlugin {
                kind: Kind::UserInterface,
                subject: descriptor.identity().to_string(),
            }),
        }
    }

    /// The lifecycle state of an interface
    pub fn state(&self, identity: &str) -> InterfaceState {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.get(identity).copied().unwrap_or_default()
    }

    fn set_state(&self, identity: &str, state: InterfaceState) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.insert(identity.to_string(), state);
    }

    /// Identities of all registered interface plug-ins
    pub fn identities(&self) -> Vec<String> {
        self.registry
            .by_kind(Kind::UserInterface)
            .iter()
            .map(|descriptor| descriptor.identity().to_string())
            .collect()
    }

    /// Start an interface. Starting one that is already running is a
    /// no-op; a stopped interface starts again from scratch.
    pub fn start(&self, identity: &str) -> Result<(), DispatchError> {
        let descriptor = self.descriptor(identity)?;
        {
            let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
            match states.get(identity).copied().unwrap_or_default() {
                InterfaceState::Running | InterfaceState::Stopping => return Ok(()),
                InterfaceState::NotStarted | InterfaceState::Stopped => {
                    // Claim the slot before releasing the lock so a
                    // concurrent start sees it as running.
                    states.insert(identity.to_string(), InterfaceState::Running);
                }
            }
        }
        let result = Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::recoverable(identity, "start", || plugin.start())?)
        });
        if result.is_err() {
            self.set_state(identity, InterfaceState::NotStarted);
        }
        result
    }

    /// Stop an interface, blocking until it has shut down. Stopping an
    /// interface that is not running is a no-op.
    pub fn stop(&self, identity: &str) -> Result<(), DispatchError> {
        let descriptor = self.descriptor(identity)?;
        {
            let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
            match states.get(identity).copied().unwrap_or_default() {
                InterfaceState::Running => {
                    states.insert(identity.to_string(), InterfaceState::Stopping);
                }
                _ => return Ok(()),
            }
        }
        // Blocking call, no lock held.
        let result = Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::recoverable(identity, "stop", || plugin.stop())?)
        });
        self.set_state(identity, InterfaceState::Stopped);
        result
    }

    /// Block until a running interface terminates. An interface whose
    /// stop is in flight is still alive, so joining waits for it too;
    /// only an interface that never started (or already stopped) returns
    /// immediately.
    pub fn join(&self, identity: &str) -> Result<(), DispatchError> {
        let descriptor = self.descriptor(identity)?;
        match self.state(identity) {
            InterfaceState::Running | InterfaceState::Stopping => {}
            InterfaceState::NotStarted | InterfaceState::Stopped => return Ok(()),
        }
        let result = Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::recoverable(identity, "join", || plugin.join())?)
        });
        self.set_state(identity, InterfaceState::Stopped);
        result
    }

    /// Stop every running interface. Failures are collected, not
    /// short-circuited; every interface gets its stop signal.
    pub fn stop_all(&self) -> Vec<(String, DispatchError)> {
        let mut failures = Vec::new();
        for identity in self.identities() {
            if let Err(error) = self.stop(&identity) {
                failures.push((identity, error));
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PluginDescriptor;
    use luna_plugin_api::{PluginError, PluginInstance, PluginManifest};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingInterface {
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    /// Orphan-rule workaround: a local handle so an `Arc`-shared interface
    /// can be boxed as a plug-in instance while the test keeps a clone
    struct Shared<P>(Arc<P>);

    impl<P: UserInterfacePlugin> UserInterfacePlugin for Shared<P> {
        fn start(&self) -> Result<(), PluginError> {
            self.0.start()
        }
        fn stop(&self) -> Result<(), PluginError> {
            self.0.stop()
        }
        fn join(&self) -> Result<(), PluginError> {
            self.0.join()
        }
    }

    impl UserInterfacePlugin for CountingInterface {
        fn start(&self) -> Result<(), PluginError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<(), PluginError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn join(&self) -> Result<(), PluginError> {
            Ok(())
        }
    }

    struct FailingInterface;

    impl UserInterfacePlugin for FailingInterface {
        fn start(&self) -> Result<(), PluginError> {
            Err(PluginError::custom("no display"))
        }
        fn stop(&self) -> Result<(), PluginError> {
            Ok(())
        }
        fn join(&self) -> Result<(), PluginError> {
            Ok(())
        }
    }

    fn manager_with_counting() -> (InterfaceManager, Arc<CountingInterface>) {
        let registry = Arc::new(Registry::new());
        let interface = Arc::new(CountingInterface::default());
        registry
            .register(PluginDescriptor::new(
                "tui",
                PluginManifest::default(),
                PluginInstance::UserInterface(Box::new(Shared(Arc::clone(&interface)))),
            ))
            .unwrap();
        (InterfaceManager::new(registry), interface)
    }

    #[test]
    fn test_start_is_idempotent() {
        let (manager, interface) = manager_with_counting();
        assert_eq!(manager.state("tui"), InterfaceState::NotStarted);
        manager.start("tui").unwrap();
        manager.start("tui").unwrap();
        assert_eq!(interface.starts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state("tui"), InterfaceState::Running);
    }

    #[test]
    fn test_stop_then_restart() {
        let (manager, interface) = manager_with_counting();
        manager.start("tui").unwrap();
        manager.stop("tui").unwrap();
        assert_eq!(manager.state("tui"), InterfaceState::Stopped);
        // Stopping again is a no-op.
        manager.stop("tui").unwrap();
        assert_eq!(interface.stops.load(Ordering::SeqCst), 1);
        // A stopped interface may start again.
        manager.start("tui").unwrap();
        assert_eq!(interface.starts.load(Ordering::SeqCst), 2);
        assert_eq!(manager.state("tui"), InterfaceState::Running);
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let (manager, interface) = manager_with_counting();
        manager.stop("tui").unwrap();
        assert_eq!(interface.stops.load(Ordering::SeqCst), 0);
        assert_eq!(manager.state("tui"), InterfaceState::NotStarted);
    }

    #[test]
    fn test_failed_start_leaves_not_started() {
        let registry = Arc::new(Registry::new());
        registry
            .register(PluginDescriptor::new(
                "headless",
                PluginManifest::default(),
                PluginInstance::UserInterface(Box::new(FailingInterface)),
            ))
            .unwrap();
        let manager = InterfaceManager::new(registry);
        assert!(manager.start("headless").is_err());
        assert_eq!(manager.state("headless"), InterfaceState::NotStarted);
    }

    #[test]
    fn test_unknown_interface() {
        let (manager, _interface) = manager_with_counting();
        assert!(matches!(
            manager.start("nope"),
            Err(DispatchError::UnknownKey { .. })
        ));
    }

    #[test]
    fn test_join_waits_while_stop_in_flight() {
        use std::sync::mpsc;

        /// Interface whose stop blocks until the test releases it
        struct SlowStopInterface {
            entered_stop: mpsc::Sender<()>,
            release_stop: Mutex<mpsc::Receiver<()>>,
            joins: AtomicUsize,
        }

        impl UserInterfacePlugin for SlowStopInterface {
            fn start(&self) -> Result<(), PluginError> {
                Ok(())
            }

            fn stop(&self) -> Result<(), PluginError> {
                self.entered_stop.send(()).ok();
                let receiver = self.release_stop.lock().unwrap();
                receiver.recv().ok();
                Ok(())
            }

            fn join(&self) -> Result<(), PluginError> {
                self.joins.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let interface = Arc::new(SlowStopInterface {
            entered_stop: entered_tx,
            release_stop: Mutex::new(release_rx),
            joins: AtomicUsize::new(0),
        });

        let registry = Arc::new(Registry::new());
        registry
            .register(PluginDescriptor::new(
                "tui",
                PluginManifest::default(),
                PluginInstance::UserInterface(Box::new(Shared(Arc::clone(&interface)))),
            ))
            .unwrap();
        let manager = Arc::new(InterfaceManager::new(registry));
        manager.start("tui").unwrap();

        let stopper = {
            let manager = Arc::clone(&manager);
            std::thread::spawn(move || manager.stop("tui").unwrap())
        };
        entered_rx.recv().unwrap();
        assert_eq!(manager.state("tui"), InterfaceState::Stopping);

        // The interface is still alive, so join must reach the plug-in
        // instead of returning early.
        manager.join("tui").unwrap();
        assert_eq!(interface.joins.load(Ordering::SeqCst), 1);

        release_tx.send(()).unwrap();
        stopper.join().unwrap();
        assert_eq!(manager.state("tui"), InterfaceState::Stopped);

        // Once stopped, join returns without touching the plug-in.
        manager.join("tui").unwrap();
        assert_eq!(interface.joins.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_all() {
        let registry = Arc::new(Registry::new());
        let first = Arc::new(CountingInterface::default());
        let second = Arc::new(CountingInterface::default());
        for (identity, interface) in [("first", &first), ("second", &second)] {
            registry
                .register(PluginDescriptor::new(
                    identity,
                    PluginManifest::default(),
                    PluginInstance::UserInterface(Box::new(Shared(Arc::clone(interface)))),
                ))
                .unwrap();
        }
        let manager = InterfaceManager::new(registry);
        manager.start("first").unwrap();
        manager.start("second").unwrap();
        assert!(manager.stop_all().is_empty());
        assert_eq!(first.stops.load(Ordering::SeqCst), 1);
        assert_eq!(second.stops.load(Ordering::SeqCst), 1);
    }
}
