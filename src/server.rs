//! Display actor
//!
//! [`DisplayServer`] moves a [`Display`] onto its own thread and feeds it
//! requests from a channel, one at a time, in the order they were sent. Any
//! number of cloned [`DisplayHandle`]s can submit requests; each call blocks
//! until the coordinator has replied.
//!
//! With an idle timeout, the server puts the panel to sleep once no request
//! has arrived for that long while it is initialized.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use moodink::{Builder, Display, DisplayServer, Lifecycle, Mood, SimulatedBackend};
//!
//! let config = Builder::reference_wiring().build()?;
//! let display = Display::<SimulatedBackend>::new(config);
//! let server = DisplayServer::spawn(display, Some(Duration::from_secs(300)))?;
//!
//! let handle = server.handle();
//! handle.init_display()?;
//! handle.show_mood(Mood::Thinking)?;
//! assert_eq!(handle.status()?.lifecycle, Lifecycle::Initialized);
//!
//! server.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::display::{Display, Lifecycle, Status};
use crate::driver::Region;
use crate::error::DisplayError;
use crate::hal::Open;
use crate::mood::Mood;

type Reply<T> = Sender<Result<T, DisplayError>>;

enum Request {
    Init(Reply<()>),
    Clear(Reply<()>),
    ShowMood(Mood, Reply<()>),
    DisplayImage(Vec<u8>, Reply<()>),
    DisplayRegion(Region, Vec<u8>, Reply<()>),
    Sleep(Reply<()>),
    Status(Reply<Status>),
    Shutdown(Reply<()>),
}

/// Cloneable client for a running [`DisplayServer`]
#[derive(Clone, Debug)]
pub struct DisplayHandle {
    tx: Sender<Request>,
}

impl DisplayHandle {
    fn call<T>(&self, request: impl FnOnce(Reply<T>) -> Request) -> Result<T, DisplayError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(request(reply_tx))
            .map_err(|_| DisplayError::ServerStopped)?;
        reply_rx.recv().map_err(|_| DisplayError::ServerStopped)?
    }

    /// See [`Display::init_display`]
    pub fn init_display(&self) -> Result<(), DisplayError> {
        self.call(Request::Init)
    }

    /// See [`Display::clear`]
    pub fn clear(&self) -> Result<(), DisplayError> {
        self.call(Request::Clear)
    }

    /// See [`Display::show_mood`]
    pub fn show_mood(&self, mood: Mood) -> Result<(), DisplayError> {
        self.call(|reply| Request::ShowMood(mood, reply))
    }

    /// See [`Display::display_image`]
    pub fn display_image(&self, image: Vec<u8>) -> Result<(), DisplayError> {
        self.call(|reply| Request::DisplayImage(image, reply))
    }

    /// See [`Display::display_region`]
    pub fn display_region(&self, region: Region, data: Vec<u8>) -> Result<(), DisplayError> {
        self.call(|reply| Request::DisplayRegion(region, data, reply))
    }

    /// See [`Display::sleep`]
    pub fn sleep(&self) -> Result<(), DisplayError> {
        self.call(Request::Sleep)
    }

    /// See [`Display::status`]
    pub fn status(&self) -> Result<Status, DisplayError> {
        self.call(Request::Status)
    }

    /// Ask the server to release the panel and exit
    pub fn shutdown(&self) -> Result<(), DisplayError> {
        self.call(Request::Shutdown)
    }
}

/// A [`Display`] running on a dedicated thread
#[derive(Debug)]
pub struct DisplayServer {
    handle: DisplayHandle,
    thread: JoinHandle<()>,
}

impl DisplayServer {
    /// Start serving `display`
    ///
    /// `idle_sleep` puts an initialized panel to sleep after that long
    /// without a request.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn<P>(display: Display<P>, idle_sleep: Option<Duration>) -> io::Result<Self>
    where
        P: Open + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("moodink-display".into())
            .spawn(move || serve(display, &rx, idle_sleep))?;
        Ok(Self {
            handle: DisplayHandle { tx },
            thread,
        })
    }

    /// A new client handle
    pub fn handle(&self) -> DisplayHandle {
        self.handle.clone()
    }

    /// Stop the server and wait for it to release the panel
    pub fn shutdown(self) {
        if self.handle.shutdown().is_err() {
            debug!("display server already stopped");
        }
        if self.thread.join().is_err() {
            warn!("display server thread panicked");
        }
    }
}

fn serve<P: Open>(mut display: Display<P>, rx: &Receiver<Request>, idle_sleep: Option<Duration>) {
    info!("display server started");
    let mut deadline: Option<Instant> = None;

    loop {
        let request = match deadline {
            Some(at) => match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                Ok(request) => request,
                Err(RecvTimeoutError::Timeout) => {
                    deadline = None;
                    if display.lifecycle() == Lifecycle::Initialized {
                        info!("idle timeout, putting display to sleep");
                        if let Err(e) = display.sleep() {
                            warn!("idle sleep failed: {e}");
                        }
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(request) => request,
                Err(_) => break,
            },
        };

        // A failed send means the caller gave up waiting; nothing to do.
        match request {
            Request::Init(reply) => {
                let _ = reply.send(display.init_display());
            }
            Request::Clear(reply) => {
                let _ = reply.send(display.clear());
            }
            Request::ShowMood(mood, reply) => {
                let _ = reply.send(display.show_mood(mood));
            }
            Request::DisplayImage(image, reply) => {
                let _ = reply.send(display.display_image(&image));
            }
            Request::DisplayRegion(region, data, reply) => {
                let _ = reply.send(display.display_region(region, &data));
            }
            Request::Sleep(reply) => {
                let _ = reply.send(display.sleep());
            }
            Request::Status(reply) => {
                let _ = reply.send(Ok(display.status()));
            }
            Request::Shutdown(reply) => {
                display.shutdown();
                let _ = reply.send(Ok(()));
                break;
            }
        }

        deadline = match idle_sleep {
            Some(idle) if display.lifecycle() == Lifecycle::Initialized => {
                Some(Instant::now() + idle)
            }
            _ => None,
        };
    }

    display.shutdown();
    info!("display server stopped");
}
