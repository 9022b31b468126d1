//! Per-frame blit dispatch

use crate::buffer::MapAccess;
use crate::engine::{CoreMask, CoreScheduler, RgaDriver};
use crate::error::{Error, Result};
use crate::frame::FrameDescriptor;
use crate::surface::{self, AddressPath, RgaRect};
use serde::Serialize;

/// Progress of one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlitState {
    #[default]
    Idle,
    Resolving,
    Dispatching,
    Done,
    Error,
}

/// What a successful blit did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitReport {
    pub src_path: AddressPath,
    pub dst_path: AddressPath,
    pub src_rect: RgaRect,
    pub dst_rect: RgaRect,
    pub core: CoreMask,
}

/// Dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Frames blitted successfully
    pub frames: u64,
    /// Surfaces handed to the hardware by DMA-BUF fd
    pub zero_copy_surfaces: u64,
    /// Surfaces that needed a CPU mapping
    pub mapped_surfaces: u64,
    /// Dispatches that returned an error
    pub failures: u64,
}

impl DispatchStats {
    fn record_path(&mut self, path: AddressPath) {
        match path {
            AddressPath::ZeroCopy => self.zero_copy_surfaces += 1,
            AddressPath::Mapped => self.mapped_surfaces += 1,
        }
    }
}

/// Resolves both frames and runs one hardware blit
///
/// Every mapping taken while resolving is released before `dispatch`
/// returns, whatever the outcome.
#[derive(Debug, Default)]
pub struct BlitDispatcher {
    state: BlitState,
    stats: DispatchStats,
}

impl BlitDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BlitState {
        self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = DispatchStats::default();
    }

    /// Convert `src` into `dst` on the driver
    pub fn dispatch<D: RgaDriver + ?Sized>(
        &mut self,
        driver: &D,
        scheduler: &CoreScheduler,
        src: &FrameDescriptor<'_>,
        dst: &FrameDescriptor<'_>,
    ) -> Result<BlitReport> {
        let result = self.run(driver, scheduler, src, dst);
        match result {
            Ok(_) => {
                self.stats.frames += 1;
                self.transition(BlitState::Done);
            }
            Err(_) => {
                self.stats.failures += 1;
                self.transition(BlitState::Error);
            }
        }
        result
    }

    fn run<D: RgaDriver + ?Sized>(
        &mut self,
        driver: &D,
        scheduler: &CoreScheduler,
        src: &FrameDescriptor<'_>,
        dst: &FrameDescriptor<'_>,
    ) -> Result<BlitReport> {
        self.transition(BlitState::Resolving);
        let mut src_surface = surface::resolve(src, MapAccess::Read)?;
        self.stats.record_path(src_surface.path());
        let mut dst_surface = surface::resolve(dst, MapAccess::Write)?;
        self.stats.record_path(dst_surface.path());

        self.transition(BlitState::Dispatching);
        scheduler.apply(src_surface.surface_mut(), dst_surface.surface_mut());
        let code = driver.blit(src_surface.surface(), dst_surface.surface());

        let report = BlitReport {
            src_path: src_surface.path(),
            dst_path: dst_surface.path(),
            src_rect: src_surface.surface().rect,
            dst_rect: dst_surface.surface().rect,
            core: scheduler.mask(),
        };
        drop(dst_surface);
        drop(src_surface);

        if code < 0 {
            tracing::warn!(
                code,
                src = %report.src_rect.format,
                dst = %report.dst_rect.format,
                "RGA blit failed"
            );
            return Err(Error::HardwareBlit { code });
        }
        Ok(report)
    }

    fn transition(&mut self, next: BlitState) {
        tracing::trace!(from = ?self.state, to = ?next, "blit state");
        self.state = next;
    }
}
