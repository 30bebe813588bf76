#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use thumbvote_core::{FrameObservation, GestureClass, Timestamp};
use thumbvote_gesture::HoldConfig;
use thumbvote_test::replay;

#[derive(Arbitrary, Debug)]
struct Frame {
    step_ms: u16,
    detected: Option<bool>,
}

#[derive(Arbitrary, Debug)]
struct Input {
    hold_ms: u16,
    frames: Vec<Frame>,
}

fuzz_target!(|input: Input| {
    let Ok(hold) = HoldConfig::from_millis(u64::from(input.hold_ms)) else {
        return;
    };

    let mut t = 0u64;
    let frames: Vec<FrameObservation> = input
        .frames
        .iter()
        .map(|f| {
            t += u64::from(f.step_ms);
            let class = f.detected.map(|up| {
                if up {
                    GestureClass::Positive
                } else {
                    GestureClass::Negative
                }
            });
            FrameObservation::new(Timestamp::from_millis(t), class)
        })
        .collect();

    let report = replay(hold, &frames);
    assert!(report.holds_contract(), "{:?}", report.violations);
});
