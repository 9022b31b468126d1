//! The `rgavideoconvert` transform element
//!
//! Host-facing surface of the converter: lifecycle, caps transformation,
//! negotiated layout and per-frame conversion. The host calls these in the
//! usual order: `start`, `transform_caps`, `set_info` (or `set_caps`), then
//! `transform_frame` per frame and finally `stop`.

use crate::caps::{self, Caps, Direction};
use crate::config::ConvertConfig;
use crate::dispatch::{BlitDispatcher, BlitReport, DispatchStats};
use crate::engine::{CoreMask, CoreScheduler, EngineContext, EngineHandle, RgaDriver};
use crate::error::{Error, Result};
use crate::format;
use crate::frame::FrameDescriptor;
use crate::types::VideoInfo;
use std::sync::Arc;

/// Element name as registered with the host
pub const ELEMENT_NAME: &str = "rgavideoconvert";

/// RGA video convert/scale element
pub struct RgaVideoConvert<D: RgaDriver> {
    engine: Arc<EngineContext<D>>,
    handle: Option<EngineHandle<D>>,
    config: ConvertConfig,
    scheduler: CoreScheduler,
    dispatcher: BlitDispatcher,
    negotiated: Option<(VideoInfo, VideoInfo)>,
    passthrough: bool,
}

impl<D: RgaDriver> RgaVideoConvert<D> {
    /// Create an element with its own engine context
    pub fn new(driver: D, config: ConvertConfig) -> Self {
        Self::with_context(EngineContext::new(driver), config)
    }

    /// Create an element sharing an existing engine context
    pub fn with_context(engine: Arc<EngineContext<D>>, config: ConvertConfig) -> Self {
        Self {
            engine,
            handle: None,
            scheduler: CoreScheduler::new(config.core_mask),
            config,
            dispatcher: BlitDispatcher::new(),
            negotiated: None,
            passthrough: false,
        }
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<EngineContext<D>> {
        &self.engine
    }

    pub fn core_mask(&self) -> CoreMask {
        self.scheduler.mask()
    }

    /// Change the core mask
    ///
    /// Per-blit affinity changes with the next frame. The driver-wide default
    /// is only installed by `start`.
    pub fn set_core_mask(&mut self, mask: CoreMask) {
        tracing::debug!(old = %self.scheduler.mask(), new = %mask, "core mask changed");
        self.config.core_mask = mask;
        self.scheduler.set_mask(mask);
    }

    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Bring up the engine and install the core mask
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let handle = self.engine.acquire()?;
        self.scheduler.configure(handle.driver())?;
        tracing::info!(core_mask = %self.scheduler.mask(), "{} started", ELEMENT_NAME);
        self.handle = Some(handle);
        Ok(())
    }

    /// Release the engine
    pub fn stop(&mut self) {
        if self.handle.take().is_some() {
            tracing::info!(stats = ?self.dispatcher.stats(), "{} stopped", ELEMENT_NAME);
        }
    }

    /// Caps the other pad can accept given `caps` on this one
    pub fn transform_caps(&self, direction: Direction, caps: &Caps, filter: Option<&Caps>) -> Caps {
        caps::transform_caps(direction, caps, filter)
    }

    /// Accept the negotiated input and output layouts
    pub fn set_info(&mut self, in_info: &VideoInfo, out_info: &VideoInfo) -> Result<()> {
        let sides = [
            ("input", in_info, caps::MAX_INPUT_DIMENSION),
            ("output", out_info, caps::MAX_OUTPUT_DIMENSION),
        ];
        for (side, info, _) in sides {
            if !format::is_supported(info.format) {
                return Err(Error::UnsupportedFormat(format!(
                    "{} format {} has no RGA equivalent",
                    side, info.format
                )));
            }
        }
        for (side, info, max) in sides {
            let max = max as u32;
            if info.width > max || info.height > max {
                return Err(Error::InvalidGeometry(format!(
                    "{} size {} exceeds the RGA limit of {}x{}",
                    side,
                    info.resolution(),
                    max,
                    max
                )));
            }
        }

        self.passthrough = self.config.passthrough_on_same_caps && in_info == out_info;
        tracing::debug!(
            input = %in_info.format,
            in_size = %in_info.resolution(),
            output = %out_info.format,
            out_size = %out_info.resolution(),
            passthrough = self.passthrough,
            "negotiated"
        );
        self.negotiated = Some((in_info.clone(), out_info.clone()));
        Ok(())
    }

    /// Accept fixed input and output caps
    pub fn set_caps(&mut self, in_caps: &Caps, out_caps: &Caps) -> Result<()> {
        let in_info = VideoInfo::from_caps(in_caps)?;
        let out_info = VideoInfo::from_caps(out_caps)?;
        self.set_info(&in_info, &out_info)
    }

    /// Negotiated (input, output) layouts
    pub fn negotiated(&self) -> Option<(&VideoInfo, &VideoInfo)> {
        self.negotiated.as_ref().map(|(i, o)| (i, o))
    }

    /// Input and output are identical and frames can be forwarded as-is
    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    /// Convert one frame
    ///
    /// Errors only affect this frame; the element stays usable.
    pub fn transform_frame(
        &mut self,
        src: &FrameDescriptor<'_>,
        dst: &FrameDescriptor<'_>,
    ) -> Result<BlitReport> {
        let handle = self.handle.as_ref().ok_or(Error::NotStarted)?;
        self.dispatcher
            .dispatch(handle.driver(), &self.scheduler, src, dst)
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }
}

impl<D: RgaDriver> std::fmt::Debug for RgaVideoConvert<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgaVideoConvert")
            .field("config", &self.config)
            .field("started", &self.is_started())
            .field("negotiated", &self.negotiated)
            .field("passthrough", &self.passthrough)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::HeapBuffer;
    use crate::engine::SoftwareDriver;
    use crate::types::VideoFormat;

    fn element(mask: CoreMask) -> RgaVideoConvert<SoftwareDriver> {
        RgaVideoConvert::new(
            SoftwareDriver::new(),
            ConvertConfig::default().with_core_mask(mask),
        )
    }

    #[test]
    fn test_unsupported_output_rejected() {
        let mut conv = element(CoreMask::AUTO);
        let in_info = VideoInfo::new(VideoFormat::Nv12, 1280, 720).unwrap();
        let out_info = VideoInfo::new(VideoFormat::Yuy2, 1280, 720).unwrap();

        let err = conv.set_info(&in_info, &out_info).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(ref m) if m.contains("output")));
        assert!(err.is_negotiation());
        assert!(conv.negotiated().is_none());

        let err = conv.set_info(&out_info, &in_info).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(ref m) if m.contains("input")));
        assert_eq!(conv.engine().driver().blit_count(), 0);
    }

    #[test]
    fn test_oversized_geometry_rejected() {
        let mut conv = element(CoreMask::AUTO);
        let small_in = VideoInfo::new(VideoFormat::Nv12, 1280, 720).unwrap();
        let small_out = VideoInfo::new(VideoFormat::Bgr, 640, 480).unwrap();

        let huge_in = VideoInfo::new(VideoFormat::Nv12, 16000, 16000).unwrap();
        let err = conv.set_info(&huge_in, &small_out).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry(ref m) if m.contains("input")));

        let huge_out = VideoInfo::new(VideoFormat::Bgr, 8000, 8000).unwrap();
        let err = conv.set_info(&small_in, &huge_out).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry(ref m) if m.contains("output")));

        let tall_out = VideoInfo::new(VideoFormat::Bgr, 640, 4097).unwrap();
        assert!(conv.set_info(&small_in, &tall_out).is_err());
        assert!(conv.negotiated().is_none());

        // 5000 is within the input limit but not the output one
        let wide_in = VideoInfo::new(VideoFormat::Nv12, 5000, 5000).unwrap();
        let max_out = VideoInfo::new(VideoFormat::Bgr, 4096, 4096).unwrap();
        conv.set_info(&wide_in, &max_out).unwrap();
        assert!(conv.set_info(&max_out, &wide_in).is_err());
    }

    #[test]
    fn test_passthrough_on_identical_info() {
        let mut conv = element(CoreMask::AUTO);
        let info = VideoInfo::new(VideoFormat::Rgba, 640, 480).unwrap();
        conv.set_info(&info, &info).unwrap();
        assert!(conv.is_passthrough());

        let scaled = VideoInfo::new(VideoFormat::Rgba, 320, 240).unwrap();
        conv.set_info(&info, &scaled).unwrap();
        assert!(!conv.is_passthrough());

        let mut conv = RgaVideoConvert::new(
            SoftwareDriver::new(),
            ConvertConfig::default().with_passthrough(false),
        );
        conv.set_info(&info, &info).unwrap();
        assert!(!conv.is_passthrough());
    }

    #[test]
    fn test_set_caps() {
        let mut conv = element(CoreMask::AUTO);
        let in_caps: Caps = "video/x-raw, format=NV12, width=1920, height=1080, framerate=30/1"
            .parse()
            .unwrap();
        let out_caps: Caps = "video/x-raw, format=BGRx, width=1280, height=720, framerate=30/1"
            .parse()
            .unwrap();
        conv.set_caps(&in_caps, &out_caps).unwrap();
        let (i, o) = conv.negotiated().unwrap();
        assert_eq!(i.format, VideoFormat::Nv12);
        assert_eq!((o.width, o.height), (1280, 720));
    }

    #[test]
    fn test_transform_requires_start() {
        let mut conv = element(CoreMask::AUTO);
        let info = VideoInfo::new(VideoFormat::Rgba, 16, 16).unwrap();
        let src_buf = HeapBuffer::new(info.size);
        let dst_buf = HeapBuffer::new(info.size);
        let src = FrameDescriptor::new(&info, &src_buf);
        let dst = FrameDescriptor::new(&info, &dst_buf);

        assert!(matches!(conv.transform_frame(&src, &dst), Err(Error::NotStarted)));
        assert_eq!(src_buf.map_count(), 0);

        conv.start().unwrap();
        conv.transform_frame(&src, &dst).unwrap();
        assert_eq!(conv.stats().frames, 1);

        conv.stop();
        assert!(matches!(conv.transform_frame(&src, &dst), Err(Error::NotStarted)));
    }

    #[test]
    fn test_start_configures_non_auto_mask() {
        let mut conv = element(CoreMask::RGA3);
        conv.start().unwrap();
        conv.start().unwrap();
        assert_eq!(conv.engine().driver().scheduler_calls(), vec![CoreMask::RGA3]);
        assert_eq!(conv.engine().driver().init_count(), 1);

        conv.stop();
        assert_eq!(conv.engine().driver().deinit_count(), 1);
        assert!(!conv.is_started());
    }

    #[test]
    fn test_auto_mask_skips_scheduler() {
        let mut conv = element(CoreMask::AUTO);
        conv.start().unwrap();
        assert!(conv.engine().driver().scheduler_calls().is_empty());

        let info = VideoInfo::new(VideoFormat::Bgrx, 8, 8).unwrap();
        let src_buf = HeapBuffer::new(info.size);
        let dst_buf = HeapBuffer::new(info.size);
        conv.transform_frame(
            &FrameDescriptor::new(&info, &src_buf),
            &FrameDescriptor::new(&info, &dst_buf),
        )
        .unwrap();
        assert_eq!(
            conv.engine().driver().last_blit_cores(),
            Some((CoreMask::AUTO, CoreMask::AUTO))
        );
    }

    #[test]
    fn test_set_core_mask_applies_to_next_frame() {
        let mut conv = element(CoreMask::AUTO);
        conv.start().unwrap();
        conv.set_core_mask(CoreMask::RGA2_CORE0);
        assert_eq!(conv.config().core_mask, CoreMask::RGA2_CORE0);

        let info = VideoInfo::new(VideoFormat::Rgb, 8, 8).unwrap();
        let src_buf = HeapBuffer::new(info.size);
        let dst_buf = HeapBuffer::new(info.size);
        let report = conv
            .transform_frame(
                &FrameDescriptor::new(&info, &src_buf),
                &FrameDescriptor::new(&info, &dst_buf),
            )
            .unwrap();
        assert_eq!(report.core, CoreMask::RGA2_CORE0);
        assert!(conv.engine().driver().scheduler_calls().is_empty());
    }

    #[test]
    fn test_frame_error_keeps_element_usable() {
        let mut conv = element(CoreMask::AUTO);
        conv.start().unwrap();
        let info = VideoInfo::new(VideoFormat::Rgba, 16, 16).unwrap();
        let src_buf = HeapBuffer::new(info.size);
        let good_dst = HeapBuffer::new(info.size);
        let bad_dst = HeapBuffer::new(0);
        let src = FrameDescriptor::new(&info, &src_buf);

        let err = conv
            .transform_frame(&src, &FrameDescriptor::new(&info, &bad_dst))
            .unwrap_err();
        assert!(err.is_per_frame());
        conv.transform_frame(&src, &FrameDescriptor::new(&info, &good_dst))
            .unwrap();

        let stats = conv.stats();
        assert_eq!((stats.frames, stats.failures), (1, 1));
        assert_eq!(src_buf.active_maps(), 0);
    }

    #[test]
    fn test_shared_engine_context() {
        let ctx = EngineContext::new(SoftwareDriver::new());
        let mut a = RgaVideoConvert::with_context(Arc::clone(&ctx), ConvertConfig::default());
        let mut b = RgaVideoConvert::with_context(Arc::clone(&ctx), ConvertConfig::default());

        a.start().unwrap();
        b.start().unwrap();
        assert_eq!(ctx.users(), 2);
        assert_eq!(ctx.driver().init_count(), 1);

        a.stop();
        assert!(ctx.is_initialized());
        drop(b);
        assert!(!ctx.is_initialized());
        assert_eq!(ctx.driver().deinit_count(), 1);
    }

    #[test]
    fn test_init_failure_is_fatal_to_start() {
        let mut conv = RgaVideoConvert::new(
            SoftwareDriver::new().with_init_failure(),
            ConvertConfig::default(),
        );
        assert!(matches!(conv.start(), Err(Error::EngineInit(_))));
        assert!(!conv.is_started());
    }
}
