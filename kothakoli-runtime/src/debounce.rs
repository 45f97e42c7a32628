//! Coalesces bursts of snapshots into one write after a quiet period.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

type Sink<T> = Box<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static>;

enum Msg<T> {
    Snapshot(T),
    Flush(oneshot::Sender<anyhow::Result<()>>),
}

/// Handle to a background task that writes only the latest snapshot.
///
/// Dropping every handle writes any pending snapshot and ends the task.
pub struct DebouncedWriter<T> {
    tx: mpsc::UnboundedSender<Msg<T>>,
    writes: Arc<AtomicU64>,
}

impl<T> Clone for DebouncedWriter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            writes: self.writes.clone(),
        }
    }
}

impl<T: Send + 'static> DebouncedWriter<T> {
    /// Must be called inside a tokio runtime.
    pub fn spawn<F>(delay: Duration, sink: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writes = Arc::new(AtomicU64::new(0));
        tokio::spawn(run(delay, Box::new(sink), rx, writes.clone()));
        Self { tx, writes }
    }

    /// Replaces the pending snapshot and restarts the quiet-period timer.
    pub fn schedule(&self, value: T) {
        if self.tx.send(Msg::Snapshot(value)).is_err() {
            log::warn!("debounced writer is gone; snapshot dropped");
        }
    }

    /// Writes the pending snapshot now, if there is one.
    pub async fn flush(&self) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Msg::Flush(tx))
            .map_err(|_| anyhow::anyhow!("debounced writer is gone"))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("debounced writer is gone"))?
    }

    /// Completed writes so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

async fn run<T>(
    delay: Duration,
    sink: Sink<T>,
    mut rx: mpsc::UnboundedReceiver<Msg<T>>,
    writes: Arc<AtomicU64>,
) {
    let write = |value: &T| -> anyhow::Result<()> {
        let res = sink(value);
        match &res {
            Ok(()) => {
                writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => log::error!("debounced write failed: {e:#}"),
        }
        res
    };

    let mut pending: Option<T> = None;

    loop {
        let msg = if pending.is_some() {
            tokio::select! {
                msg = rx.recv() => msg,
                _ = tokio::time::sleep(delay) => {
                    if let Some(value) = pending.take() {
                        let _ = write(&value);
                    }
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match msg {
            Some(Msg::Snapshot(value)) => pending = Some(value),
            Some(Msg::Flush(done)) => {
                let res = match pending.take() {
                    Some(value) => write(&value),
                    None => Ok(()),
                };
                let _ = done.send(res);
            }
            None => {
                if let Some(value) = pending.take() {
                    let _ = write(&value);
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_writer(delay: Duration) -> (DebouncedWriter<u32>, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let w = DebouncedWriter::spawn(delay, move |v: &u32| {
            sink_seen.lock().unwrap().push(*v);
            Ok(())
        });
        (w, seen)
    }

    #[tokio::test]
    async fn bursts_coalesce_into_last_snapshot() {
        let (w, seen) = recording_writer(Duration::from_millis(40));
        for v in 1..=5 {
            w.schedule(v);
        }
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(*seen.lock().unwrap(), vec![5]);
        assert_eq!(w.writes(), 1);
    }

    #[tokio::test]
    async fn flush_writes_immediately() {
        let (w, seen) = recording_writer(Duration::from_secs(60));
        w.schedule(7);
        w.flush().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![7]);

        // Nothing pending: flush is a no-op.
        w.flush().await.unwrap();
        assert_eq!(w.writes(), 1);
    }

    #[tokio::test]
    async fn flush_reports_sink_errors() {
        let w = DebouncedWriter::spawn(Duration::from_secs(60), |_: &u32| {
            Err(anyhow::anyhow!("disk full"))
        });
        w.schedule(1);
        assert!(w.flush().await.is_err());
        assert_eq!(w.writes(), 0);
    }

    #[tokio::test]
    async fn dropping_handles_writes_pending() {
        let (w, seen) = recording_writer(Duration::from_secs(60));
        w.schedule(3);
        drop(w);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }
}
