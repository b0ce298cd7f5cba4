//! Plugin registry.
//!
//! A registry is a set of typed slots, one per [`PluginKind`]. Plugins are
//! stored type-erased; the crate that consumes a kind (interpolation lives
//! in `vcms-interp`, optimization and stage types in `vcms-pipe`) defines
//! the trait object type and reads the slot back with [`PluginRegistry::iter`].
//!
//! Registration order matters: the most recently registered plugin of a
//! kind is consulted first, built-ins last.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

/// Category of an engine extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    /// Interpolation kernel factories.
    Interpolation,
    /// ICC tag-type readers/writers.
    TagType,
    /// Pixel formatter factories.
    Formatter,
    /// Pipeline optimization passes.
    Optimization,
    /// Custom stage types.
    StageType,
    /// Mutex factory for contexts shared across threads.
    Mutex,
}

/// Handler for one ICC tag type. Decoding itself happens outside the
/// engine; the registry only routes by signature.
pub trait TagTypeHandler: Send + Sync {
    /// Four-byte type signature this handler understands.
    fn signature(&self) -> u32;
}

/// Direction of a pixel formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatterDirection {
    /// Packed pixels to channel arrays.
    Input,
    /// Channel arrays to packed pixels.
    Output,
}

/// Factory for pixel formatters.
pub trait FormatterFactory: Send + Sync {
    /// Whether this factory provides a formatter for the packed `format`.
    fn supports(&self, format: u32, direction: FormatterDirection, float: bool) -> bool;
}

/// A lock handed out by a [`MutexFactory`].
pub trait PluginMutex: Send + Sync {
    /// Blocks until the lock is held.
    fn lock(&self);
    /// Releases the lock.
    fn unlock(&self);
}

/// Creates locks for contexts shared between threads.
pub trait MutexFactory: Send + Sync {
    /// Creates a new unlocked mutex.
    fn create(&self) -> Box<dyn PluginMutex>;
}

/// Registered plugins, grouped by kind.
///
/// Cloning is cheap in spirit: entries are `Arc`s, so a clone shares the
/// plugin objects but owns its own lists.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    slots: HashMap<PluginKind, Vec<Arc<dyn Any + Send + Sync>>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin of `kind`. `P` is the type consumers read back,
    /// typically an `Arc<dyn SomeTrait>`.
    pub fn register<P: Any + Send + Sync>(&mut self, kind: PluginKind, plugin: P) {
        self.slots.entry(kind).or_default().push(Arc::new(plugin));
    }

    /// Iterates plugins of `kind` stored as `P`, newest first.
    pub fn iter<P: Any + Send + Sync>(&self, kind: PluginKind) -> impl Iterator<Item = &P> + '_ {
        self.slots
            .get(&kind)
            .into_iter()
            .flat_map(|v| v.iter().rev())
            .filter_map(|p| p.downcast_ref::<P>())
    }

    /// Number of plugins registered under `kind`.
    pub fn count(&self, kind: PluginKind) -> usize {
        self.slots.get(&kind).map_or(0, Vec::len)
    }

    /// True when no plugin of any kind is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.values().all(Vec::is_empty)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut m = f.debug_map();
        for (k, v) in &self.slots {
            m.entry(k, &v.len());
        }
        m.finish()
    }
}

/// Default lock used when no mutex plugin is registered.
#[derive(Default)]
pub(crate) struct DefaultMutex {
    locked: Mutex<bool>,
    cv: Condvar,
}

impl PluginMutex for DefaultMutex {
    fn lock(&self) {
        let mut held = self.locked.lock().unwrap_or_else(|e| e.into_inner());
        while *held {
            held = self.cv.wait(held).unwrap_or_else(|e| e.into_inner());
        }
        *held = true;
    }

    fn unlock(&self) {
        let mut held = self.locked.lock().unwrap_or_else(|e| e.into_inner());
        *held = false;
        self.cv.notify_one();
    }
}
