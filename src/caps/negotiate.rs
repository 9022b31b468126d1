//! Caps transformation across the converter
//!
//! The RGA scaler accepts larger sources than it can produce, so the
//! geometry a pad may advertise depends on which side of the element it
//! describes.

use super::structure::{Caps, Structure};
use super::value::{Fraction, Value};
use crate::format::SUPPORTED_FORMATS;
use serde::{Deserialize, Serialize};

/// Largest frame the RGA can write
pub const MAX_OUTPUT_DIMENSION: i32 = 4096;
/// Largest frame the RGA can read
pub const MAX_INPUT_DIMENSION: i32 = 8192;

/// Media type of raw video caps
pub const RAW_VIDEO: &str = "video/x-raw";

/// Fields renegotiated independently on each side of the converter
const FORMAT_FIELDS: [&str; 3] = ["format", "colorimetry", "chroma-site"];

/// Which side of the converter the produced caps describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Input caps are given; produce what the output side may carry
    Downstream,
    /// Output caps are given; produce what the input side may accept
    Upstream,
}

impl Direction {
    /// Hardware width/height bound for the produced side
    pub fn max_dimension(self) -> i32 {
        match self {
            Direction::Downstream => MAX_OUTPUT_DIMENSION,
            Direction::Upstream => MAX_INPUT_DIMENSION,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Downstream => f.write_str("downstream"),
            Direction::Upstream => f.write_str("upstream"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "downstream" | "down" => Ok(Direction::Downstream),
            "upstream" | "up" => Ok(Direction::Upstream),
            _ => Err(crate::error::Error::Config(format!(
                "unknown negotiation direction {s:?}"
            ))),
        }
    }
}

/// Element pads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadDirection {
    /// Input pad
    Sink,
    /// Output pad
    Src,
}

/// Static caps of a pad: every supported format within the hardware bound
pub fn pad_template_caps(pad: PadDirection) -> Caps {
    let max = match pad {
        PadDirection::Sink => MAX_INPUT_DIMENSION,
        PadDirection::Src => MAX_OUTPUT_DIMENSION,
    };
    let formats = SUPPORTED_FORMATS
        .iter()
        .map(|f| Value::str(f.name()))
        .collect();
    Caps::from_structure(
        Structure::new(RAW_VIDEO)
            .with_field("format", Value::List(formats))
            .with_field("width", Value::IntRange(1, max))
            .with_field("height", Value::IntRange(1, max))
            .with_field("framerate", Value::FractionRange(Fraction::ZERO, Fraction::MAX)),
    )
}

/// Compute the caps the other side of the converter may use
///
/// Each structure gets the direction's hardware size bound. Unless its
/// features are `ANY`, the format-identity fields are dropped since the
/// converter can change them. Structures already covered by an earlier result
/// are skipped. A filter, when given, is intersected with the filter's
/// order taking preference.
pub fn transform_caps(direction: Direction, caps: &Caps, filter: Option<&Caps>) -> Caps {
    tracing::debug!(%direction, %caps, "transforming caps");

    let bound = Value::IntRange(1, direction.max_dimension());
    let mut out = Caps::new_empty();

    for (i, entry) in caps.iter().enumerate() {
        if i > 0 && out.is_subset_entry(&entry.structure, &entry.features) {
            continue;
        }

        let mut structure = entry.structure.clone();
        structure.set("width", bound.clone());
        structure.set("height", bound.clone());

        if !entry.features.is_any() {
            structure.remove_fields(&FORMAT_FIELDS);
        }

        out.merge(structure, entry.features.clone());
    }

    if let Some(filter) = filter {
        out = filter.intersect_first(&out);
    }

    tracing::debug!(caps = %out, "transformed caps");
    out
}
