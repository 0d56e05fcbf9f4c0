#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let lengths = nhid::ReportLengths::from_report_descriptor(data);
    std::hint::black_box(lengths);
});
