//! Capability negotiation
//!
//! Provides:
//! - A small caps model (typed values, structures, features)
//! - Caps string parsing and printing
//! - Direction-aware caps transformation with the RGA size bounds

mod negotiate;
mod parse;
mod structure;
mod value;

pub use negotiate::{
    pad_template_caps, transform_caps, Direction, PadDirection, MAX_INPUT_DIMENSION,
    MAX_OUTPUT_DIMENSION, RAW_VIDEO,
};
pub use structure::{Caps, CapsEntry, CapsFeatures, Structure, FEATURE_DMABUF, FEATURE_SYSTEM_MEMORY};
pub use value::{Fraction, Value};

use crate::error::{Error, Result};
use crate::types::{Framerate, VideoFormat, VideoInfo};

impl VideoInfo {
    /// Build from fixed raw video caps
    pub fn from_caps(caps: &Caps) -> Result<Self> {
        if !caps.is_fixed() {
            return Err(Error::InvalidGeometry(format!("caps are not fixed: {}", caps)));
        }
        let s = caps
            .structure(0)
            .ok_or_else(|| Error::InvalidGeometry("empty caps".into()))?;
        if s.name() != RAW_VIDEO {
            return Err(Error::UnsupportedFormat(format!("not raw video: {}", s.name())));
        }

        let format: VideoFormat = s
            .get("format")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::UnsupportedFormat("caps have no format".into()))?
            .parse()?;
        let dimension = |key: &str| -> Result<u32> {
            let v = s
                .get(key)
                .and_then(Value::as_int)
                .ok_or_else(|| Error::InvalidGeometry(format!("caps have no {key}")))?;
            u32::try_from(v).map_err(|_| Error::InvalidGeometry(format!("negative {key}: {v}")))
        };
        let width = dimension("width")?;
        let height = dimension("height")?;

        let mut info = VideoInfo::new(format, width, height)?;
        if let Some(fps) = s.get("framerate").and_then(Value::as_fraction) {
            if fps.num >= 0 {
                info.framerate = Framerate::new(fps.num as u32, fps.den as u32);
            }
        }
        Ok(info)
    }

    /// Fixed raw video caps for this layout
    pub fn to_caps(&self) -> Caps {
        Caps::from_structure(
            Structure::new(RAW_VIDEO)
                .with_field("format", Value::str(self.format.name()))
                .with_field("width", Value::Int(self.width as i32))
                .with_field("height", Value::Int(self.height as i32))
                .with_field(
                    "framerate",
                    Value::Fraction(Fraction::new(
                        self.framerate.num as i32,
                        self.framerate.den as i32,
                    )),
                ),
        )
    }
}
