//! Display coordinator
//!
//! [`Display`] sits above the [`Driver`]: it owns at most one driver, tracks
//! the panel lifecycle and gates every operation on it. Operations take
//! `&mut self`, so they run one at a time; wrap a `Display` in a
//! [`DisplayServer`](crate::server::DisplayServer) to share it across threads.
//!
//! ## Lifecycle
//!
//! ```text
//! Stopped ─┐
//! Sleeping ├─init_display─▶ Initializing ─▶ Initialized ◀─▶ Refreshing
//! Error ───┘                     │               │  │
//!                                ▼               │  └─sleep─▶ Sleeping
//!                              Error ◀─failure───┘
//! ```
//!
//! ## Example
//!
//! ```
//! use moodink::{Builder, Display, Lifecycle, Mood, SimulatedBackend};
//!
//! let config = Builder::reference_wiring().build()?;
//! let mut display = Display::<SimulatedBackend>::new(config);
//!
//! // Everything but init is refused until the panel is up
//! assert!(display.show_mood(Mood::Happy).is_err());
//!
//! display.init_display()?;
//! display.show_mood(Mood::Happy)?;
//! display.sleep()?;
//! assert_eq!(display.status().lifecycle, Lifecycle::Sleeping);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use core::fmt;

use log::{debug, error, info, warn};

use crate::backend::BackendKind;
use crate::backend::simulated::CallLog;
use crate::config::{Config, ConfigSummary};
use crate::driver::{Driver, Region};
use crate::error::{ConfigError, DisplayError, Error};
use crate::hal::{Hal, Open};
use crate::mood::{Mood, MoodLibrary};

/// Coordinator lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// No driver yet
    Stopped,
    /// Running the reset-and-configure sequence
    Initializing,
    /// Ready for frames
    Initialized,
    /// A frame transfer is in progress
    Refreshing,
    /// Panel in deep sleep, driver released
    Sleeping,
    /// A hardware failure occurred; only `init_display` leaves this state
    Error,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::Refreshing => "refreshing",
            Self::Sleeping => "sleeping",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Diagnostic snapshot of a [`Display`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    /// Whether the panel accepts frames
    pub initialized: bool,
    /// Current lifecycle state
    pub lifecycle: Lifecycle,
    /// Backend the configuration selects
    pub backend: BackendKind,
    /// Configuration without the backend-selection fields
    pub config: ConfigSummary,
}

/// Lifecycle-gated front end for one panel
pub struct Display<P: Hal> {
    config: Config,
    driver: Option<Driver<P>>,
    lifecycle: Lifecycle,
    moods: MoodLibrary,
}

impl<P: Open> Display<P> {
    /// Coordinator with every mood showing a blank panel
    pub fn new(config: Config) -> Self {
        let moods = MoodLibrary::blank(config.dimensions);
        Self {
            config,
            driver: None,
            lifecycle: Lifecycle::Stopped,
            moods,
        }
    }

    /// Coordinator with a loaded mood library
    ///
    /// # Errors
    ///
    /// [`ConfigError::MoodDimensions`] if the library was validated against
    /// a panel size other than `config.dimensions`.
    pub fn with_moods(config: Config, moods: MoodLibrary) -> Result<Self, ConfigError> {
        let (panel, images) = (config.dimensions, moods.dimensions());
        if panel != images {
            return Err(ConfigError::MoodDimensions {
                rows: panel.rows,
                cols: panel.cols,
                actual_rows: images.rows,
                actual_cols: images.cols,
            });
        }
        let mut display = Self::new(config);
        display.moods = moods;
        Ok(display)
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Configuration the coordinator was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mood images
    pub fn moods(&self) -> &MoodLibrary {
        &self.moods
    }

    /// The live driver, if any
    pub fn driver(&self) -> Option<&Driver<P>> {
        self.driver.as_ref()
    }

    /// Call log of the live simulated backend
    pub fn call_log(&self) -> Option<CallLog> {
        self.driver
            .as_ref()
            .and_then(|driver| driver.backend().as_simulated())
            .map(|sim| sim.log())
    }

    /// Bring the panel up
    ///
    /// Does nothing if already initialized. From any other state a fresh
    /// driver is opened and the full init sequence runs.
    ///
    /// # Errors
    ///
    /// Returns the driver error and moves to [`Lifecycle::Error`] if the
    /// backend cannot be opened or the init sequence fails.
    pub fn init_display(&mut self) -> Result<(), DisplayError> {
        if self.lifecycle == Lifecycle::Initialized {
            debug!("display already initialized");
            return Ok(());
        }

        if let Some(stale) = self.driver.take() {
            release(stale);
        }

        self.lifecycle = Lifecycle::Initializing;
        info!("initializing display");
        match Driver::open(self.config.clone()) {
            Ok(driver) => {
                self.driver = Some(driver);
                self.lifecycle = Lifecycle::Initialized;
                info!("display initialized");
                Ok(())
            }
            Err(e) => {
                error!("display init failed: {e}");
                self.lifecycle = Lifecycle::Error;
                Err(e.into())
            }
        }
    }

    /// Fill the panel with white
    pub fn clear(&mut self) -> Result<(), DisplayError> {
        self.refresh(Driver::clear)
    }

    /// Show the image for a mood
    pub fn show_mood(&mut self, mood: Mood) -> Result<(), DisplayError> {
        self.ensure_initialized()?;
        info!("showing {mood}");
        let frame = self.moods.get(mood).clone();
        self.refresh(|driver| driver.display_image(frame.as_bytes()))
    }

    /// Full refresh with a caller-supplied frame
    ///
    /// # Errors
    ///
    /// A frame of the wrong length returns `Error::Validation` and leaves the
    /// display initialized.
    pub fn display_image(&mut self, image: &[u8]) -> Result<(), DisplayError> {
        self.refresh(|driver| driver.display_image(image))
    }

    /// Partial refresh of a byte-aligned region
    pub fn display_region(&mut self, region: Region, data: &[u8]) -> Result<(), DisplayError> {
        self.refresh(|driver| driver.display_region(region, data))
    }

    /// Put the panel into deep sleep and release the driver
    pub fn sleep(&mut self) -> Result<(), DisplayError> {
        self.ensure_initialized()?;
        let Some(driver) = self.driver.take() else {
            return Err(DisplayError::NotInitialized);
        };
        match driver.sleep() {
            Ok(()) => {
                self.lifecycle = Lifecycle::Sleeping;
                info!("display sleeping");
                Ok(())
            }
            Err(e) => {
                error!("display sleep failed: {e}");
                self.lifecycle = Lifecycle::Error;
                Err(e.into())
            }
        }
    }

    /// Diagnostic snapshot
    pub fn status(&self) -> Status {
        Status {
            initialized: self.lifecycle == Lifecycle::Initialized,
            lifecycle: self.lifecycle,
            backend: BackendKind::for_target(&self.config.target),
            config: self.config.summary(),
        }
    }

    fn ensure_initialized(&self) -> Result<(), DisplayError> {
        if self.lifecycle == Lifecycle::Initialized && self.driver.is_some() {
            Ok(())
        } else {
            debug!("rejected operation while {}", self.lifecycle);
            Err(DisplayError::NotInitialized)
        }
    }

    /// Run one driver operation under the lifecycle gate
    fn refresh<F>(&mut self, op: F) -> Result<(), DisplayError>
    where
        F: FnOnce(&mut Driver<P>) -> Result<(), Error>,
    {
        self.ensure_initialized()?;
        let Some(driver) = self.driver.as_mut() else {
            return Err(DisplayError::NotInitialized);
        };

        self.lifecycle = Lifecycle::Refreshing;
        match op(driver) {
            Ok(()) => {
                self.lifecycle = Lifecycle::Initialized;
                Ok(())
            }
            Err(e @ (Error::Validation { .. } | Error::InvalidRegion { .. })) => {
                self.lifecycle = Lifecycle::Initialized;
                Err(e.into())
            }
            Err(e) => {
                error!("display refresh failed: {e}");
                self.lifecycle = Lifecycle::Error;
                if let Some(driver) = self.driver.take() {
                    release(driver);
                }
                Err(e.into())
            }
        }
    }
}

impl<P: Hal> Display<P> {
    /// Release whatever driver exists and stop
    pub fn shutdown(&mut self) {
        if let Some(driver) = self.driver.take() {
            release(driver);
            info!("display shut down");
        }
        self.lifecycle = Lifecycle::Stopped;
    }
}

impl<P: Hal> Drop for Display<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn release<P: Hal>(driver: Driver<P>) {
    if let Err(e) = driver.close() {
        warn!("failed to release driver: {e}");
    }
}
