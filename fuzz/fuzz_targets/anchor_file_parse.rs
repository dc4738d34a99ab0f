//! Fuzz target for anchor file parsing.

#![no_main]

use anchorkit::anchors::persist::from_anchor_str;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    if let Ok(content) = std::str::from_utf8(data) {
        let _ = from_anchor_str(content);
    }
});
