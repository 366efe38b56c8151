use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, unbounded};

use crate::error::EngineError;

pub type WorkItem = Box<dyn FnOnce() + Send + 'static>;

pub trait WorkQueue: Send + Sync {
    fn queue_work_item(&self, item: WorkItem) -> Result<(), EngineError>;
}

#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn add(&self) {
        *self.count.lock().unwrap_or_else(|p| p.into_inner()) += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock().unwrap_or_else(|p| p.into_inner());
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait(&self) {
        let mut count = self.count.lock().unwrap_or_else(|p| p.into_inner());
        while *count > 0 {
            count = self.idle.wait(count).unwrap_or_else(|p| p.into_inner());
        }
    }
}

pub struct WorkerPool {
    tx: Option<Sender<WorkItem>>,
    handles: Vec<JoinHandle<()>>,
    pending: Arc<Pending>,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self, EngineError> {
        let (tx, rx) = unbounded::<WorkItem>();
        let pending = Arc::new(Pending::default());
        let mut handles = Vec::with_capacity(threads.max(1));
        for i in 0..threads.max(1) {
            let rx = rx.clone();
            let pending = Arc::clone(&pending);
            let handle = thread::Builder::new()
                .name(format!("hearth-worker-{i}"))
                .spawn(move || {
                    for item in rx.iter() {
                        if catch_unwind(AssertUnwindSafe(item)).is_err() {
                            log::error!("event=work_item_panicked module=worker thread={i}");
                        }
                        pending.done();
                    }
                })
                .map_err(|e| EngineError::Worker(format!("failed to spawn worker: {e}")))?;
            handles.push(handle);
        }
        Ok(Self {
            tx: Some(tx),
            handles,
            pending,
        })
    }

    /// Blocks until every queued item has run.
    pub fn wait_idle(&self) {
        self.pending.wait();
    }
}

impl WorkQueue for WorkerPool {
    fn queue_work_item(&self, item: WorkItem) -> Result<(), EngineError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| EngineError::Worker("worker pool shut down".into()))?;
        self.pending.add();
        tx.send(item).map_err(|_| {
            self.pending.done();
            EngineError::Worker("worker channel disconnected".into())
        })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_every_item() {
        let pool = WorkerPool::new(2).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let ran = Arc::clone(&ran);
            pool.queue_work_item(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        pool.wait_idle();
        assert_eq!(ran.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn survives_a_panicking_item() {
        let pool = WorkerPool::new(1).unwrap();
        pool.queue_work_item(Box::new(|| panic!("boom"))).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        pool.queue_work_item(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        pool.wait_idle();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
