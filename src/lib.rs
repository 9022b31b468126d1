//! rgaconvert: Rockchip RGA video convert/scale
//!
//! Colorspace conversion and scaling of raw video frames on the Rockchip RGA
//! 2D engine, packaged as a single transform stage for a media pipeline host.
//!
//! # Features
//!
//! - **Formats**: host pixel formats mapped onto RGA surface formats
//! - **Negotiation**: caps transformation with the RGA's asymmetric size limits
//!   (8192 in, 4096 out)
//! - **Zero-copy**: DMA-BUF frames go to the hardware by fd, anything else is
//!   mapped for the duration of one blit
//! - **Scheduling**: core affinity across the RGA3 and RGA2 units
//!
//! # Example
//!
//! ```rust,no_run
//! use rgaconvert::{
//!     ConvertConfig, CoreMask, FrameDescriptor, HeapBuffer, RgaVideoConvert, SoftwareDriver,
//!     VideoFormat, VideoInfo,
//! };
//!
//! fn main() -> rgaconvert::Result<()> {
//!     let config = ConvertConfig::default().with_core_mask(CoreMask::RGA3);
//!     let mut convert = RgaVideoConvert::new(SoftwareDriver::new(), config);
//!     convert.start()?;
//!
//!     let in_info = VideoInfo::new(VideoFormat::Nv12, 1920, 1080)?;
//!     let out_info = VideoInfo::new(VideoFormat::Bgr, 640, 480)?;
//!     convert.set_info(&in_info, &out_info)?;
//!
//!     let src = HeapBuffer::new(in_info.size);
//!     let dst = HeapBuffer::new(out_info.size);
//!     convert.transform_frame(
//!         &FrameDescriptor::new(&in_info, &src),
//!         &FrameDescriptor::new(&out_info, &dst),
//!     )?;
//!     convert.stop();
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod caps;
pub mod config;
pub mod dispatch;
pub mod element;
pub mod engine;
pub mod error;
pub mod format;
pub mod frame;
pub mod surface;
pub mod types;

// Re-exports for convenience
pub use buffer::{DmaBuffer, FrameBuffer, HeapBuffer, MapAccess, MappedBuffer};
pub use caps::{transform_caps, Caps, Direction};
pub use config::ConvertConfig;
pub use dispatch::{BlitDispatcher, BlitReport, DispatchStats};
pub use element::{RgaVideoConvert, ELEMENT_NAME};
pub use engine::{CoreMask, CoreScheduler, EngineContext, RgaDriver, SoftwareDriver};
pub use error::{Error, Result};
pub use format::{to_rga_format, RgaFormat};
pub use frame::FrameDescriptor;
pub use surface::{resolve, ResolvedSurface, RgaSurface};
pub use types::{Framerate, Resolution, VideoFormat, VideoInfo};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
