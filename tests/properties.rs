//! Property tests for negotiation bounds, surface alignment, core masks and
//! mapping release.

use proptest::prelude::*;

use rgaconvert::caps::{transform_caps, Caps, Direction, Structure, Value};
use rgaconvert::{
    resolve, BlitDispatcher, CoreMask, CoreScheduler, FrameDescriptor, HeapBuffer, MapAccess,
    SoftwareDriver, VideoFormat, VideoInfo,
};

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Downstream), Just(Direction::Upstream)]
}

/// Raw video caps with arbitrary ranges or fixed sizes
fn arb_caps() -> impl Strategy<Value = Caps> {
    let dim = prop_oneof![
        (1i32..20000).prop_map(Value::Int),
        (1i32..20000, 1i32..20000).prop_map(|(a, b)| Value::int_range(a.min(b), a.max(b))),
    ];
    prop::collection::vec((dim.clone(), dim), 1..4).prop_map(|sizes| {
        let mut caps = Caps::new_empty();
        for (w, h) in sizes {
            caps.append(
                Structure::new("video/x-raw")
                    .with_field("format", Value::str("NV12"))
                    .with_field("width", w)
                    .with_field("height", h),
                Default::default(),
            );
        }
        caps
    })
}

fn int_bounds(v: &Value) -> (i32, i32) {
    match v {
        Value::Int(i) => (*i, *i),
        Value::IntRange(lo, hi) => (*lo, *hi),
        other => panic!("unexpected dimension value {other}"),
    }
}

fn arb_yuv_format() -> impl Strategy<Value = VideoFormat> {
    prop_oneof![
        Just(VideoFormat::I420),
        Just(VideoFormat::Yv12),
        Just(VideoFormat::Nv12),
        Just(VideoFormat::Nv21),
        Just(VideoFormat::Y42b),
        Just(VideoFormat::Nv16),
        Just(VideoFormat::Nv61),
    ]
}

fn arb_mask() -> impl Strategy<Value = CoreMask> {
    (0u32..8).prop_map(|bits| CoreMask::from_raw(bits).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Transformed caps never exceed the bound of the produced side.
    #[test]
    fn transformed_caps_within_bound(direction in arb_direction(), caps in arb_caps(), filter in proptest::option::of(arb_caps())) {
        let out = transform_caps(direction, &caps, filter.as_ref());
        for entry in out.iter() {
            for key in ["width", "height"] {
                let (lo, hi) = int_bounds(entry.structure.get(key).expect("dimension present"));
                prop_assert!(lo >= 1);
                prop_assert!(hi <= direction.max_dimension());
            }
            if filter.is_none() {
                prop_assert!(!entry.structure.has_field("format"));
            }
        }
    }

    /// Chroma-subsampled surfaces always get even rectangles.
    #[test]
    fn yuv_surfaces_are_even(format in arb_yuv_format(), width in 2u32..1024, height in 2u32..1024) {
        let info = VideoInfo::new(format, width, height).unwrap();
        let buffer = HeapBuffer::new(info.size);
        let frame = FrameDescriptor::new(&info, &buffer);

        let resolved = resolve(&frame, MapAccess::Read).unwrap();
        let rect = resolved.surface().rect;
        prop_assert_eq!(rect.width % 2, 0);
        prop_assert_eq!(rect.height % 2, 0);
        prop_assert!(width - rect.width <= 1);
        prop_assert!(height - rect.height <= 1);
        prop_assert!(rect.wstride >= rect.width);
    }

    /// Masks survive a trip through their textual form and stay within the defined bits.
    #[test]
    fn mask_composition(a in arb_mask(), b in arb_mask()) {
        let both = a | b;
        prop_assert_eq!(both.to_string().parse::<CoreMask>().unwrap(), both);
        prop_assert_eq!(both.bits() & !CoreMask::all().bits(), 0);
        prop_assert!(both.contains(a) && both.contains(b));
    }

    /// Undefined mask bits are always rejected.
    #[test]
    fn undefined_mask_bits_rejected(bits in 8u32..u32::MAX) {
        prop_assert!(CoreMask::from_raw(bits).is_err());
    }

    /// Every mapping taken during a dispatch is released, whatever the outcome.
    #[test]
    fn dispatch_never_leaks(
        src_ok in any::<bool>(),
        dst_ok in any::<bool>(),
        blit_ok in any::<bool>(),
        mask in arb_mask(),
    ) {
        let info = VideoInfo::new(VideoFormat::Nv12, 64, 32).unwrap();
        let src_buf = HeapBuffer::new(if src_ok { info.size } else { 0 });
        let dst_buf = HeapBuffer::new(if dst_ok { info.size } else { 0 });
        let src = FrameDescriptor::new(&info, &src_buf);
        let dst = FrameDescriptor::new(&info, &dst_buf);

        let driver = if blit_ok {
            SoftwareDriver::new()
        } else {
            SoftwareDriver::new().with_blit_error(-5)
        };
        let result = BlitDispatcher::new().dispatch(&driver, &CoreScheduler::new(mask), &src, &dst);

        prop_assert_eq!(result.is_ok(), src_ok && dst_ok && blit_ok);
        prop_assert_eq!(src_buf.map_count(), src_buf.unmap_count());
        prop_assert_eq!(dst_buf.map_count(), dst_buf.unmap_count());
    }
}
