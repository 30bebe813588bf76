#![no_main]

use libfuzzer_sys::fuzz_target;
use thumbvote_runtime::RuntimeConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = RuntimeConfig::from_json_str(text) {
        // Validation may reject, but must never panic
        let _ = config.validate();
        let _ = config.hold();
        let _ = config.observation_policy();
    }
});
