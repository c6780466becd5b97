//! Shared, lock-protected channel
//!
//! There is one `SharedChannel` per physical device. Holding its guard for
//! the whole of a logical transfer keeps the segments of two transfers from
//! interleaving on the bus.

use super::{Channel, ChannelDriver};
use crate::error::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard};

/// Cloneable handle to a channel behind a mutex
pub struct SharedChannel<D: ChannelDriver> {
    inner: Arc<Mutex<Channel<D>>>,
}

impl<D: ChannelDriver> Clone for SharedChannel<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: ChannelDriver> SharedChannel<D> {
    /// Put `channel` behind the device lock
    pub fn new(channel: Channel<D>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(channel)),
        }
    }

    /// Take the device lock
    pub fn lock(&self) -> Result<MutexGuard<'_, Channel<D>>> {
        self.inner.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Run `f` with the device lock held
    pub fn with<R>(&self, f: impl FnOnce(&mut Channel<D>) -> Result<R>) -> Result<R> {
        let mut channel = self.lock()?;
        f(&mut channel)
    }
}

impl<D: ChannelDriver> From<Channel<D>> for SharedChannel<D> {
    fn from(channel: Channel<D>) -> Self {
        Self::new(channel)
    }
}
