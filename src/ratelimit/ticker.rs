//! Background periodic task owned by a limiter instance.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::error::{Result, TurnstileError};

/// Runs a maintenance closure every `period` until stopped.
///
/// The first run happens one full period after spawning. Dropping the ticker
/// without calling [`Ticker::stop`] also ends the task, since the shutdown
/// sender goes away with it.
pub(crate) struct Ticker {
    shutdown: Mutex<Option<(oneshot::Sender<()>, JoinHandle<()>)>>,
}

impl Ticker {
    /// Spawn the periodic task on the current tokio runtime.
    ///
    /// Fails with [`TurnstileError::Runtime`] when called outside a runtime.
    pub(crate) fn spawn<F>(name: &'static str, period: Duration, mut on_tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let runtime = Handle::try_current()?;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = runtime.spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!(task = name, "Stopping background task");
                        return;
                    }
                    _ = ticks.tick() => {
                        trace!(task = name, "Background tick");
                        on_tick();
                    }
                }
            }
        });

        Ok(Self {
            shutdown: Mutex::new(Some((shutdown_tx, handle))),
        })
    }

    /// Stop the task and wait for any in-flight tick to finish.
    ///
    /// Returns [`TurnstileError::AlreadyClosed`] on every call after the first.
    pub(crate) async fn stop(&self) -> Result<()> {
        let (shutdown_tx, handle) = self
            .shutdown
            .lock()
            .take()
            .ok_or(TurnstileError::AlreadyClosed)?;

        // The task may already have exited if the runtime is shutting down.
        let _ = shutdown_tx.send(());
        handle.await?;
        Ok(())
    }
}
