use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::notifications::NotificationQueue;
use crate::types::DirectoryInfo;

/// Canonical composition state, owned by the composer.
pub struct State {
    /// Active directory; `None` until one is opened.
    pub directory: Option<DirectoryInfo>,
    /// User-visible failures.
    pub notifications: NotificationQueue,
    /// Bumped after every applied mutation, so readers can tell snapshots apart.
    pub revision: u64,

    // === Module extension data (TypeMap pattern) ===
    /// Module-owned stores keyed by type. Each module installs its own store
    /// via `Module::init_state()`; accessed through `get_ext`/`get_ext_mut`.
    pub module_data: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl State {
    pub fn new(notification_capacity: usize) -> Self {
        Self {
            directory: None,
            notifications: NotificationQueue::new(notification_capacity),
            revision: 0,
            module_data: HashMap::new(),
        }
    }

    /// Get a reference to module-owned state by type.
    pub fn get_ext<T: 'static + Send + Sync>(&self) -> Option<&T> {
        self.module_data.get(&TypeId::of::<T>()).and_then(|v| v.downcast_ref())
    }

    /// Get a mutable reference to module-owned state by type.
    pub fn get_ext_mut<T: 'static + Send + Sync>(&mut self) -> Option<&mut T> {
        self.module_data.get_mut(&TypeId::of::<T>()).and_then(|v| v.downcast_mut())
    }

    /// Set module-owned state by type. Replaces any existing value of this type.
    pub fn set_ext<T: 'static + Send + Sync>(&mut self, val: T) {
        self.module_data.insert(TypeId::of::<T>(), Box::new(val));
    }

    pub fn root(&self) -> Option<&str> {
        self.directory.as_ref().map(|d| d.path.as_str())
    }

    /// Whether `root` is the active directory.
    pub fn is_active(&self, root: &str) -> bool {
        self.root() == Some(root)
    }

    pub fn touch(&mut self) {
        self.revision += 1;
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new(crate::config::ENGINE.notification_capacity)
    }
}
