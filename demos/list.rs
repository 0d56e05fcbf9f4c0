fn main() {
    env_logger::init();
    if !nhid::supported() {
        println!("HID is not supported on this platform");
        return;
    }

    let mut devices = nhid::devices();
    for dev in devices.by_ref() {
        println!(
            "{:04x}:{:04x} {} {} ({})",
            dev.vendor_id(),
            dev.product_id(),
            dev.manufacturer(),
            dev.product(),
            dev.path()
        );
        let lengths = dev.report_lengths();
        println!(
            "  report lengths: input={} output={} feature={}",
            lengths.input, lengths.output, lengths.feature
        );
    }
    if let Some(e) = devices.take_error() {
        println!("enumeration failed: {e}");
    }
}
