//! The single-threaded apartment host.
//!
//! One worker thread owns every platform accessibility object for the life
//! of the process. Work is marshalled in as boxed closures and results come
//! back over oneshot channels, so callers `await` without ever touching the
//! apartment. Jobs run strictly in submission order. A panicking job is
//! caught on the worker and surfaces to its caller as [`HostError::WorkPanicked`];
//! the worker itself keeps running.
//!
//! Shutdown drains queued work (senders dropped -> channel closes), then
//! waits for the worker with a 5 s budget before detaching it.

use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, warn};

/// Worker shutdown budget.
pub const HOST_DISPOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HostError {
    #[error("accessibility host stopped")]
    Stopped,
    #[error("apartment work panicked: {0}")]
    WorkPanicked(String),
}

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct ApartmentHost {
    tx: std::sync::Mutex<Option<mpsc::Sender<Job>>>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
    done_rx: crossbeam_channel::Receiver<()>,
}

impl ApartmentHost {
    /// Start the worker with no apartment initialization (tests, non-COM
    /// platforms).
    pub fn start() -> Self {
        Self::start_with_init(|| {})
    }

    /// Start the worker, running `init` first on the worker thread. On
    /// Windows the caller passes the COM apartment initialization here.
    pub fn start_with_init(init: impl FnOnce() + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let worker = std::thread::Builder::new()
            .name("lector-a11y".into())
            .spawn(move || {
                init();
                debug!(target: "a11y.host", "worker_start");
                while let Ok(job) = rx.recv() {
                    job();
                }
                debug!(target: "a11y.host", "worker_stop");
                let _ = done_tx.send(());
            })
            .expect("spawn apartment worker");
        Self {
            tx: std::sync::Mutex::new(Some(tx)),
            worker: std::sync::Mutex::new(Some(worker)),
            done_rx,
        }
    }

    /// Marshal `work` onto the apartment worker and await its result.
    pub async fn run<R, F>(&self, work: F) -> Result<R, HostError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let tx = match self.tx.lock().expect("host inbox lock").clone() {
            Some(tx) => tx,
            None => return Err(HostError::Stopped),
        };
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        let job: Job = Box::new(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(work))
                .map_err(|panic| HostError::WorkPanicked(panic_message(&panic)));
            let _ = reply_tx.send(result);
        });
        tx.send(job).map_err(|_| HostError::Stopped)?;
        let r = reply_rx.await.map_err(|_| HostError::Stopped)?;
        if let Err(ref e) = r {
            eprintln!("DEBUG RESULT ERR: {:?}", e);
        }
        r
    }

    /// Drain outstanding work and stop the worker. Bounded by
    /// [`HOST_DISPOSE_TIMEOUT`]; a wedged worker is detached and reported.
    /// Idempotent; later `run` calls report `Stopped`.
    pub fn shutdown(&self) {
        self.tx.lock().expect("host inbox lock").take(); // close the inbox; queued jobs still run
        match self.done_rx.recv_timeout(HOST_DISPOSE_TIMEOUT) {
            Ok(()) => {
                if let Some(worker) = self.worker.lock().expect("host worker lock").take() {
                    if worker.join().is_err() {
                        error!(target: "a11y.host", "worker_join_panicked");
                    }
                }
            }
            Err(_) => {
                warn!(target: "a11y.host", timeout_secs = HOST_DISPOSE_TIMEOUT.as_secs(), "worker_dispose_timeout");
                self.worker.lock().expect("host worker lock").take(); // detach
            }
        }
    }
}

impl Drop for ApartmentHost {
    fn drop(&mut self) {
        self.tx.lock().expect("host inbox lock").take();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    eprintln!("DEBUG PANIC TYPE: {:?}", panic.type_id());
    eprintln!("is &str: {}", panic.is::<&str>());
    eprintln!("is String: {}", panic.is::<String>());
    eprintln!("is Box<str>: {}", panic.is::<Box<str>>());
    eprintln!("is Box<dyn Any+Send>: {}", panic.is::<Box<dyn std::any::Any + Send>>());
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Windows apartment initialization, passed to [`ApartmentHost::start_with_init`]
/// by the binary.
#[cfg(windows)]
pub fn com_sta_init() {
    use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};
    // S_FALSE (already initialized on this thread) is fine.
    let _ = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
}
