//! RGA engine access
//!
//! The [`RgaDriver`] trait is the seam to the hardware library. The engine
//! itself is process-wide, so it lives behind a reference-counted
//! [`EngineContext`]: the first [`EngineHandle`] initializes the driver and
//! the last one to drop deinitializes it.

pub mod scheduler;
pub mod software;

pub use scheduler::{CoreMask, CoreScheduler};
pub use software::SoftwareDriver;

use crate::error::{Error, Result};
use crate::surface::RgaSurface;
use parking_lot::Mutex;
use std::sync::Arc;

/// Operations of the RGA user-space library
pub trait RgaDriver: Send + Sync {
    /// Driver name for logging
    fn name(&self) -> &str {
        "rga"
    }

    /// Open the engine (`c_RkRgaInit`)
    fn init(&self) -> Result<()>;

    /// Close the engine (`c_RkRgaDeInit`)
    fn deinit(&self);

    /// Set the default core affinity (`imconfig(IM_CONFIG_SCHEDULER_CORE)`)
    fn configure_scheduler(&self, mask: CoreMask) -> Result<()>;

    /// Convert and scale `src` into `dst` (`c_RkRgaBlit`)
    ///
    /// Returns a negative errno-style code on failure.
    fn blit(&self, src: &RgaSurface, dst: &RgaSurface) -> i32;
}

impl<D: RgaDriver + ?Sized> RgaDriver for Arc<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn init(&self) -> Result<()> {
        (**self).init()
    }

    fn deinit(&self) {
        (**self).deinit()
    }

    fn configure_scheduler(&self, mask: CoreMask) -> Result<()> {
        (**self).configure_scheduler(mask)
    }

    fn blit(&self, src: &RgaSurface, dst: &RgaSurface) -> i32 {
        (**self).blit(src, dst)
    }
}

/// Shared engine state
pub struct EngineContext<D: RgaDriver> {
    driver: D,
    users: Mutex<usize>,
}

impl<D: RgaDriver> EngineContext<D> {
    pub fn new(driver: D) -> Arc<Self> {
        Arc::new(Self {
            driver,
            users: Mutex::new(0),
        })
    }

    /// Take a reference on the engine, initializing it on first use
    pub fn acquire(self: &Arc<Self>) -> Result<EngineHandle<D>> {
        let mut users = self.users.lock();
        if *users == 0 {
            self.driver.init().map_err(|e| match e {
                Error::EngineInit(_) => e,
                other => Error::EngineInit(other.to_string()),
            })?;
            tracing::info!(driver = self.driver.name(), "RGA engine initialized");
        }
        *users += 1;
        Ok(EngineHandle {
            context: Arc::clone(self),
        })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Handles currently alive
    pub fn users(&self) -> usize {
        *self.users.lock()
    }

    pub fn is_initialized(&self) -> bool {
        self.users() > 0
    }

    fn release(&self) {
        let mut users = self.users.lock();
        *users = users.saturating_sub(1);
        if *users == 0 {
            self.driver.deinit();
            tracing::info!(driver = self.driver.name(), "RGA engine released");
        }
    }
}

impl<D: RgaDriver> std::fmt::Debug for EngineContext<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("driver", &self.driver.name())
            .field("users", &self.users())
            .finish()
    }
}

/// Keeps the engine initialized while alive
pub struct EngineHandle<D: RgaDriver> {
    context: Arc<EngineContext<D>>,
}

impl<D: RgaDriver> EngineHandle<D> {
    pub fn driver(&self) -> &D {
        self.context.driver()
    }

    pub fn context(&self) -> &Arc<EngineContext<D>> {
        &self.context
    }
}

impl<D: RgaDriver> Drop for EngineHandle<D> {
    fn drop(&mut self) {
        self.context.release();
    }
}

impl<D: RgaDriver> std::fmt::Debug for EngineHandle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("context", &self.context)
            .finish()
    }
}
