use std::env;

fn parse_hex(s: &str) -> u16 {
    u16::from_str_radix(s.trim_start_matches("0x"), 16).expect("IDs should be hex")
}

fn main() {
    env_logger::init();
    let mut args = env::args().skip(1);
    let (Some(vid), Some(pid)) = (args.next(), args.next()) else {
        eprintln!("usage: feature_report <vid> <pid> [report number]");
        return;
    };
    let report_id: u8 = args.next().map_or(0, |s| s.parse().expect("report number"));

    let info = nhid::find_devices(parse_hex(&vid), parse_hex(&pid))
        .next()
        .expect("device should be connected");
    println!("Device info: {info:?}");

    let device = info.open().unwrap();

    let mut buf = vec![0; usize::from(info.feature_report_length()).max(2)];
    buf[0] = report_id;
    match device.read_feature(&mut buf) {
        Ok(n) => println!("feature report {report_id}: {:02x?}", &buf[..n]),
        Err(e) => println!("failed to read feature report {report_id}: {e}"),
    }

    device.close();
    println!("state after close: {:?}", device.state());
}
