//! Configure-once-then-lock state machine shared by encryptors and digesters
//!
//! A value starts in the `Configuring` phase, where setters are accepted.
//! The first operation builds the engine from the configuration and moves to
//! `Locked`; from then on the engine is shared read-only and every setter
//! fails with `AlreadyInitialized`. Building happens under the lock, so
//! concurrent first operations derive key material exactly once.

use crate::error::{ErrorKind, PbeError, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

enum Phase<E> {
    Configuring,
    Locked(Arc<E>),
}

struct Inner<C, E> {
    config: C,
    phase: Phase<E>,
}

pub(crate) struct Lifecycle<C, E> {
    inner: Mutex<Inner<C, E>>,
}

impl<C, E> Lifecycle<C, E> {
    pub(crate) fn new(config: C) -> Self {
        Self {
            inner: Mutex::new(Inner {
                config,
                phase: Phase::Configuring,
            }),
        }
    }

    /// Applies `update` to the configuration unless it is locked.
    pub(crate) fn configure<R>(&self, update: impl FnOnce(&mut C) -> R) -> Result<R> {
        let mut inner = self.lock();
        if let Phase::Locked(_) = inner.phase {
            return Err(PbeError::configuration(
                ErrorKind::AlreadyInitialized,
                "already initialized: configuration cannot be changed after the first operation",
            ));
        }
        Ok(update(&mut inner.config))
    }

    /// Read access to the configuration in either phase.
    pub(crate) fn inspect<R>(&self, read: impl FnOnce(&C) -> R) -> R {
        read(&self.lock().config)
    }

    pub(crate) fn is_locked(&self) -> bool {
        matches!(self.lock().phase, Phase::Locked(_))
    }

    /// Returns the engine, building it on first use.
    ///
    /// If `build` fails the configuration stays unlocked so the caller can
    /// correct it.
    pub(crate) fn engine(&self, build: impl FnOnce(&mut C) -> Result<E>) -> Result<Arc<E>> {
        let mut inner = self.lock();
        if let Phase::Locked(engine) = &inner.phase {
            return Ok(Arc::clone(engine));
        }
        let engine = Arc::new(build(&mut inner.config)?);
        inner.phase = Phase::Locked(Arc::clone(&engine));
        Ok(engine)
    }

    // The state is only ever replaced wholesale, so a panic while holding the
    // lock cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, Inner<C, E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
