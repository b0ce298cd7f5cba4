//! Engine context.
//!
//! A [`Context`] is a plain value carrying everything that varies between
//! users of the engine: an opaque user-data slot, the alarm codes, the
//! adaptation state, the plugin registry and the error handler.
//!
//! Contexts are not shared mutable state. [`Context::duplicate`] snapshots a
//! parent into an independent child; the plugin registry is shared by
//! reference and copied on first write, so registering a plugin on either
//! side never leaks into the other.
//!
//! The process-wide default context (what callers get when they have none of
//! their own) is reachable through [`Context::global`] and
//! [`Context::update_global`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vcms_core::Context;
//!
//! let mut parent = Context::new();
//! parent.set_alarm_codes([0x1234; 16]);
//!
//! let mut child = parent.duplicate(Some(Arc::new(7u32)));
//! child.set_alarm_codes([0; 16]);
//!
//! assert_eq!(parent.alarm_codes()[0], 0x1234);
//! assert_eq!(child.user_data::<u32>(), Some(&7));
//! ```

use std::any::Any;
use std::sync::{Arc, LazyLock, RwLock};

use tracing::{debug, error};

use crate::error::{CmsError, ErrorCode};
use crate::fixed::MAX_ALARM_CODES;
use crate::plugin::{DefaultMutex, MutexFactory, PluginKind, PluginMutex, PluginRegistry};

/// Opaque user data attached to a context.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Installable error handler: receives the error class and message.
pub type ErrorHandler = Arc<dyn Fn(ErrorCode, &str) + Send + Sync>;

const DEFAULT_ALARM_CODES: [u16; MAX_ALARM_CODES] =
    [0x7F00, 0x7F00, 0x7F00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

static GLOBAL: LazyLock<RwLock<Context>> = LazyLock::new(|| RwLock::new(Context::new()));

/// Scoped engine configuration and plugin registry.
#[derive(Clone)]
pub struct Context {
    user_data: Option<UserData>,
    alarm_codes: [u16; MAX_ALARM_CODES],
    adaptation_state: f64,
    plugins: Arc<PluginRegistry>,
    error_handler: Option<ErrorHandler>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("has_user_data", &self.user_data.is_some())
            .field("alarm_codes", &self.alarm_codes)
            .field("adaptation_state", &self.adaptation_state)
            .field("plugins", &self.plugins)
            .field("has_error_handler", &self.error_handler.is_some())
            .finish()
    }
}

impl Context {
    /// Creates a context with default state and no plugins.
    pub fn new() -> Self {
        Self {
            user_data: None,
            alarm_codes: DEFAULT_ALARM_CODES,
            adaptation_state: 1.0,
            plugins: Arc::new(PluginRegistry::new()),
            error_handler: None,
        }
    }

    /// Creates a context carrying `user_data`.
    pub fn with_user_data(user_data: UserData) -> Self {
        Self {
            user_data: Some(user_data),
            ..Self::new()
        }
    }

    /// Returns a snapshot of the process-wide default context.
    pub fn global() -> Self {
        GLOBAL.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Mutates the process-wide default context.
    ///
    /// Snapshots taken earlier with [`Context::global`] are unaffected.
    pub fn update_global<R>(f: impl FnOnce(&mut Context) -> R) -> R {
        let mut ctx = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
        f(&mut ctx)
    }

    /// Duplicates the process-wide default context.
    pub fn duplicate_global(new_user_data: Option<UserData>) -> Self {
        Self::global().duplicate(new_user_data)
    }

    /// Creates an independent child of this context.
    ///
    /// Alarm codes, adaptation state and error handler are copied by value;
    /// the plugin registry is snapshotted. User data is replaced by
    /// `new_user_data` when given, otherwise inherited.
    pub fn duplicate(&self, new_user_data: Option<UserData>) -> Self {
        debug!(plugins = ?self.plugins, "Duplicating context");
        Self {
            user_data: new_user_data.or_else(|| self.user_data.clone()),
            alarm_codes: self.alarm_codes,
            adaptation_state: self.adaptation_state,
            plugins: Arc::clone(&self.plugins),
            error_handler: self.error_handler.clone(),
        }
    }

    /// Returns the user data if it is a `T`.
    pub fn user_data<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.user_data.as_ref()?.downcast_ref::<T>()
    }

    /// Returns the raw user-data slot.
    pub fn user_data_raw(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    /// Replaces the user-data slot.
    pub fn set_user_data(&mut self, user_data: Option<UserData>) {
        self.user_data = user_data;
    }

    /// Current alarm codes.
    pub fn alarm_codes(&self) -> [u16; MAX_ALARM_CODES] {
        self.alarm_codes
    }

    /// Replaces the alarm codes.
    pub fn set_alarm_codes(&mut self, codes: [u16; MAX_ALARM_CODES]) {
        self.alarm_codes = codes;
    }

    /// Current adaptation state.
    pub fn adaptation_state(&self) -> f64 {
        self.adaptation_state
    }

    /// Sets the adaptation state and returns the previous one.
    ///
    /// Negative values only query: the state is left untouched.
    pub fn set_adaptation_state(&mut self, d: f64) -> f64 {
        let prev = self.adaptation_state;
        if d >= 0.0 {
            self.adaptation_state = d;
        }
        prev
    }

    /// Read access to the plugin registry.
    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Registers a plugin on this context only.
    ///
    /// Children duplicated before this call keep their own snapshot.
    pub fn register_plugin<P: Any + Send + Sync>(&mut self, kind: PluginKind, plugin: P) {
        debug!(?kind, "Registering plugin");
        Arc::make_mut(&mut self.plugins).register(kind, plugin);
    }

    /// Drops every plugin registered on this context.
    pub fn unregister_plugins(&mut self) {
        self.plugins = Arc::new(PluginRegistry::new());
    }

    /// Installs (or with `None` removes) the error handler.
    pub fn set_error_handler(&mut self, handler: Option<ErrorHandler>) {
        self.error_handler = handler;
    }

    /// Reports a construction failure through the error handler.
    ///
    /// Without a handler the error is logged.
    pub fn signal_error(&self, err: &CmsError) {
        self.signal(err.code(), &err.to_string());
    }

    /// Reports an arbitrary message through the error handler.
    pub fn signal(&self, code: ErrorCode, msg: &str) {
        match &self.error_handler {
            Some(handler) => handler(code, msg),
            None => error!(?code, "{msg}"),
        }
    }

    /// Creates a mutex from the newest registered factory, or the default one.
    pub fn create_mutex(&self) -> Box<dyn PluginMutex> {
        match self.plugins.iter::<Arc<dyn MutexFactory>>(PluginKind::Mutex).next() {
            Some(factory) => factory.create(),
            None => Box::new(DefaultMutex::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_defaults() {
        let ctx = Context::new();
        assert_eq!(ctx.alarm_codes()[0], 0x7F00);
        assert_eq!(ctx.alarm_codes()[3], 0);
        assert_eq!(ctx.adaptation_state(), 1.0);
        assert!(ctx.user_data_raw().is_none());
        assert!(ctx.plugins().is_empty());
    }

    #[test]
    fn test_duplicate_inherits() {
        let mut parent = Context::with_user_data(Arc::new(String::from("parent")));
        parent.set_alarm_codes([5; MAX_ALARM_CODES]);
        parent.set_adaptation_state(0.5);

        let child = parent.duplicate(None);
        assert_eq!(child.user_data::<String>().map(String::as_str), Some("parent"));
        assert_eq!(child.alarm_codes(), [5; MAX_ALARM_CODES]);
        assert_eq!(child.adaptation_state(), 0.5);

        let other = parent.duplicate(Some(Arc::new(1i64)));
        assert_eq!(other.user_data::<i64>(), Some(&1));
        assert!(other.user_data::<String>().is_none());
    }

    #[test]
    fn test_alarm_isolation() {
        let parent = Context::new();
        let mut a = parent.duplicate(None);
        let b = parent.duplicate(None);
        a.set_alarm_codes([0xAAAA; MAX_ALARM_CODES]);
        assert_eq!(parent.alarm_codes(), DEFAULT_ALARM_CODES);
        assert_eq!(b.alarm_codes(), DEFAULT_ALARM_CODES);
    }

    #[test]
    fn test_plugin_snapshot() {
        let mut parent = Context::new();
        parent.register_plugin(PluginKind::Formatter, 1u8);
        let child = parent.duplicate(None);
        parent.register_plugin(PluginKind::Formatter, 2u8);

        assert_eq!(parent.plugins().count(PluginKind::Formatter), 2);
        assert_eq!(child.plugins().count(PluginKind::Formatter), 1);
    }

    #[test]
    fn test_unregister_plugins() {
        let mut parent = Context::new();
        parent.register_plugin(PluginKind::Formatter, 1u8);
        parent.register_plugin(PluginKind::Optimization, 2u8);
        let child = parent.duplicate(None);

        parent.unregister_plugins();
        assert!(parent.plugins().is_empty());
        assert_eq!(child.plugins().count(PluginKind::Formatter), 1);
        assert_eq!(child.plugins().count(PluginKind::Optimization), 1);
    }

    #[test]
    fn test_adaptation_state_query() {
        let mut ctx = Context::new();
        assert_eq!(ctx.set_adaptation_state(0.25), 1.0);
        assert_eq!(ctx.set_adaptation_state(-1.0), 0.25);
        assert_eq!(ctx.adaptation_state(), 0.25);
    }

    #[test]
    fn test_error_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut ctx = Context::new();
        ctx.set_error_handler(Some(Arc::new(move |code: ErrorCode, msg: &str| {
            sink.lock().unwrap().push((code, msg.to_string()));
        })));

        ctx.signal_error(&CmsError::Range("too big".into()));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, ErrorCode::Range);
        assert!(seen[0].1.contains("too big"));
    }

    #[test]
    fn test_mutex_plugin() {
        struct Counting(Arc<AtomicUsize>);
        impl MutexFactory for Counting {
            fn create(&self) -> Box<dyn PluginMutex> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Box::new(DefaultMutex::default())
            }
        }

        let created = Arc::new(AtomicUsize::new(0));
        let mut ctx = Context::new();
        let m = ctx.create_mutex();
        m.lock();
        m.unlock();
        assert_eq!(created.load(Ordering::SeqCst), 0);

        ctx.register_plugin::<Arc<dyn MutexFactory>>(
            PluginKind::Mutex,
            Arc::new(Counting(Arc::clone(&created))),
        );
        let _m = ctx.create_mutex();
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_global_is_independent() {
        let snapshot = Context::global();
        let dup = Context::duplicate_global(Some(Arc::new(3u8)));
        assert_eq!(dup.user_data::<u8>(), Some(&3));
        assert_eq!(dup.alarm_codes(), snapshot.alarm_codes());
    }
}
