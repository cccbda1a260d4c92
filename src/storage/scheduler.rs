use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use log::debug;
use log::error;
use parking_lot::Mutex;
use parking_lot::RwLock;

use crate::error::Result;
use crate::storage::page::PageId;
use crate::storage::DiskManager;

/// Sender half of a request completion, fulfilled by the worker once the
/// request has been serviced.
pub type DiskPromise = mpsc::Sender<Result<()>>;

/// Receiver half of a request completion, waited on by the issuer.
pub struct DiskFuture {
    inner: mpsc::Receiver<Result<()>>,
}

impl DiskFuture {
    /// Block until the scheduler fulfills the paired promise and return
    /// the outcome of the request.
    pub fn wait(&self) -> Result<()> {
        self.inner.recv()?
    }
}

/// A single disk I/O request against the device.
pub struct DiskRequest {
    /// true for a write to disk, false for a read from disk.
    pub is_write: bool,
    /// The frame buffer the request operates on, shared with the issuer:
    /// source for writes, destination for reads.
    pub data: Arc<RwLock<Box<[u8]>>>,
    /// The page being read from or written to.
    pub page_id: PageId,
    /// Fulfilled when the request has been serviced.
    pub done: DiskPromise,
}

/// Schedules I/O against the disk device on a background worker thread.
/// Requests are serviced in submission order; issuers that need
/// synchronous completion wait on the future paired with the request's
/// promise. Dropping the scheduler drains the queue and joins the worker.
pub struct DiskScheduler {
    disk: Arc<Mutex<Box<dyn DiskManager>>>,
    // mpsc senders are not Sync, the mutex lets the scheduler be shared.
    queue: Mutex<mpsc::Sender<Option<DiskRequest>>>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk: Box<dyn DiskManager>) -> DiskScheduler {
        let disk = Arc::new(Mutex::new(disk));
        let (tx, rx) = mpsc::channel::<Option<DiskRequest>>();
        let worker_disk = Arc::clone(&disk);
        let worker = thread::spawn(move || Self::run(worker_disk, rx));
        DiskScheduler { disk, queue: Mutex::new(tx), worker: Some(worker) }
    }

    /// The worker loop. A None request is the shutdown signal; a closed
    /// queue ends the loop as well.
    fn run(disk: Arc<Mutex<Box<dyn DiskManager>>>, rx: mpsc::Receiver<Option<DiskRequest>>) {
        while let Ok(Some(request)) = rx.recv() {
            let result = {
                let mut disk = disk.lock();
                if request.is_write {
                    let data = request.data.read();
                    disk.write_page(request.page_id, &data)
                } else {
                    let mut data = request.data.write();
                    disk.read_page(request.page_id, &mut data)
                }
            };
            // a send failure means the issuer dropped the future and no
            // longer cares about the outcome.
            if let Err(err) = request.done.send(result) {
                debug!("completion for page {} dropped: {}", request.page_id, err);
            }
        }
    }

    /// Create a paired promise/future for a request completion.
    pub fn create_promise() -> (DiskPromise, DiskFuture) {
        let (tx, rx) = mpsc::channel();
        (tx, DiskFuture { inner: rx })
    }

    /// Enqueue a request for the worker. The future paired with the
    /// request's promise resolves once the request is serviced.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        self.queue.lock().send(Some(request))?;
        Ok(())
    }

    /// Ensure the device has capacity for the given page id.
    pub fn increase_disk_space(&self, page_id: PageId) {
        self.disk.lock().increase_disk_space(page_id)
    }

    /// Record on the device that a page is free for reuse.
    pub fn deallocate_page(&self, page_id: PageId) {
        self.disk.lock().deallocate_page(page_id)
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // the worker may already be gone if it panicked, in which case
        // the send fails and there is nothing left to join cleanly.
        let _ = self.queue.lock().send(None);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("disk scheduler worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::Memory;
    use crate::storage::page::PAGE_SIZE;

    fn buffer(fill: u8) -> Arc<RwLock<Box<[u8]>>> {
        Arc::new(RwLock::new(vec![fill; PAGE_SIZE].into_boxed_slice()))
    }

    #[test]
    fn test_schedule_write_then_read() -> Result<()> {
        let scheduler = DiskScheduler::new(Box::new(Memory::new()));
        scheduler.increase_disk_space(0);

        // write a page full of 0xAB.
        let data = buffer(0xab);
        let (done, future) = DiskScheduler::create_promise();
        scheduler.schedule(DiskRequest { is_write: true, data, page_id: 0, done })?;
        future.wait()?;

        // read it back into a fresh buffer.
        let data = buffer(0);
        let (done, future) = DiskScheduler::create_promise();
        let request = DiskRequest { is_write: false, data: Arc::clone(&data), page_id: 0, done };
        scheduler.schedule(request)?;
        future.wait()?;
        assert!(data.read().iter().all(|&b| b == 0xab));

        Ok(())
    }

    #[test]
    fn test_requests_service_in_order() -> Result<()> {
        let scheduler = DiskScheduler::new(Box::new(Memory::new()));
        scheduler.increase_disk_space(0);

        // two writes to the same page, the later one must win.
        let (done1, future1) = DiskScheduler::create_promise();
        let (done2, future2) = DiskScheduler::create_promise();
        let first = DiskRequest { is_write: true, data: buffer(1), page_id: 0, done: done1 };
        let second = DiskRequest { is_write: true, data: buffer(2), page_id: 0, done: done2 };
        scheduler.schedule(first)?;
        scheduler.schedule(second)?;
        future1.wait()?;
        future2.wait()?;

        let data = buffer(0);
        let (done, future) = DiskScheduler::create_promise();
        let request = DiskRequest { is_write: false, data: Arc::clone(&data), page_id: 0, done };
        scheduler.schedule(request)?;
        future.wait()?;
        assert!(data.read().iter().all(|&b| b == 2));

        Ok(())
    }
}
