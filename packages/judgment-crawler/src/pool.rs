use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::errors::SessionError;
use crate::traits::{PageSession, SessionFactory};

/// Bounded pool of page sessions.
///
/// At most `capacity` sessions exist at once. `acquire` blocks while the
/// pool is exhausted and hands back a guard that returns the session on
/// drop. A factory failure releases the reserved slot instead of burning
/// capacity.
pub struct SessionPool<F: SessionFactory> {
    factory: F,
    capacity: usize,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<F::Session>>,
}

impl<F: SessionFactory> SessionPool<F> {
    pub fn new(factory: F, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            factory,
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
            idle: Mutex::new(Vec::with_capacity(capacity)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait for a free slot, then reuse an idle session or create one.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledSession<F>, SessionError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SessionError::Pool("pool is drained".to_string()))?;

        let idle = self
            .idle
            .lock()
            .ok()
            .and_then(|mut sessions| sessions.pop());

        let session = match idle {
            Some(session) => session,
            None => match self.factory.create().await {
                Ok(session) => {
                    debug!("created new pooled session");
                    session
                }
                // Permit drops here, so the slot stays available.
                Err(err) => return Err(err),
            },
        };

        Ok(PooledSession {
            pool: Arc::clone(self),
            session: Some(session),
            _permit: permit,
        })
    }

    /// Wait for all checked-out sessions to come home, close everything,
    /// and refuse further acquisitions.
    pub async fn drain(&self) {
        match self.permits.acquire_many(self.capacity as u32).await {
            Ok(permits) => permits.forget(),
            Err(_) => return, // already drained
        }
        self.permits.close();

        let sessions = self
            .idle
            .lock()
            .map(|mut idle| std::mem::take(&mut *idle))
            .unwrap_or_default();
        for mut session in sessions {
            session.close().await;
        }
        debug!("session pool drained");
    }
}

/// RAII guard for a checked-out session. Dropping it returns the session to
/// the idle list and frees the slot.
pub struct PooledSession<F: SessionFactory> {
    pool: Arc<SessionPool<F>>,
    session: Option<F::Session>,
    _permit: OwnedSemaphorePermit,
}

impl<F: SessionFactory> Deref for PooledSession<F> {
    type Target = F::Session;

    fn deref(&self) -> &F::Session {
        self.session.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<F: SessionFactory> DerefMut for PooledSession<F> {
    fn deref_mut(&mut self) -> &mut F::Session {
        self.session.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<F: SessionFactory> Drop for PooledSession<F> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            match self.pool.idle.lock() {
                Ok(mut idle) => idle.push(session),
                Err(_) => warn!("idle list poisoned, dropping session"),
            }
        }
    }
}
