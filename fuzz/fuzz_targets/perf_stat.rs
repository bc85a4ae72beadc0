#![no_main]

use aggregate::parser::{extract_counters, LuleshExtractor, MetricExtractor};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Extractors must never panic on arbitrary log text
    if let Ok(input) = std::str::from_utf8(data) {
        let _ = extract_counters(input);
        let _ = LuleshExtractor.extract(input);
    }
});
