//! Report lengths from a raw HID report descriptor.
//!
//! Only the global and main items that affect report sizes are interpreted;
//! usages, logical ranges and collections are skipped.

use std::collections::BTreeMap;

/// Maximum report lengths declared by a device, per report type.
///
/// Each length counts the report number byte, which is also present for
/// devices that don't use numbered reports (where it is 0). A length of 0
/// means the device declares no report of that type.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ReportLengths {
    /// Longest input report.
    pub input: u16,

    /// Longest output report.
    pub output: u16,

    /// Longest feature report.
    pub feature: u16,
}

const TYPE_MAIN: u8 = 0;
const TYPE_GLOBAL: u8 = 1;

const MAIN_INPUT: u8 = 0x8;
const MAIN_OUTPUT: u8 = 0x9;
const MAIN_FEATURE: u8 = 0xB;

const GLOBAL_REPORT_SIZE: u8 = 0x7;
const GLOBAL_REPORT_ID: u8 = 0x8;
const GLOBAL_REPORT_COUNT: u8 = 0x9;
const GLOBAL_PUSH: u8 = 0xA;
const GLOBAL_POP: u8 = 0xB;

const LONG_ITEM_PREFIX: u8 = 0xFE;

#[derive(Copy, Clone, Default)]
struct Globals {
    report_size: u32,
    report_count: u32,
    report_id: u8,
}

impl ReportLengths {
    /// Compute the report lengths declared by a report descriptor.
    ///
    /// Parsing stops quietly at the first truncated item, so a malformed
    /// descriptor yields the lengths declared before the damage.
    pub fn from_report_descriptor(descriptor: &[u8]) -> ReportLengths {
        // bits per (report type, report id)
        let mut bits: BTreeMap<(u8, u8), u32> = BTreeMap::new();
        let mut globals = Globals::default();
        let mut stack = Vec::new();

        let mut rest = descriptor;
        while let Some((&prefix, tail)) = rest.split_first() {
            if prefix == LONG_ITEM_PREFIX {
                let Some((&len, tail)) = tail.split_first() else {
                    break;
                };
                // one tag byte, then `len` data bytes
                let skip = 1 + len as usize;
                if tail.len() < skip {
                    break;
                }
                rest = &tail[skip..];
                continue;
            }

            let size = match prefix & 0x03 {
                3 => 4,
                n => n as usize,
            };
            if tail.len() < size {
                break;
            }
            let (data, tail) = tail.split_at(size);
            rest = tail;

            let value = data
                .iter()
                .rev()
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
            let item_type = (prefix >> 2) & 0x03;
            let tag = prefix >> 4;

            match (item_type, tag) {
                (TYPE_MAIN, MAIN_INPUT | MAIN_OUTPUT | MAIN_FEATURE) => {
                    let entry = bits.entry((tag, globals.report_id)).or_insert(0);
                    *entry = entry.saturating_add(
                        globals.report_size.saturating_mul(globals.report_count),
                    );
                }
                (TYPE_GLOBAL, GLOBAL_REPORT_SIZE) => globals.report_size = value,
                (TYPE_GLOBAL, GLOBAL_REPORT_COUNT) => globals.report_count = value,
                (TYPE_GLOBAL, GLOBAL_REPORT_ID) => globals.report_id = value as u8,
                (TYPE_GLOBAL, GLOBAL_PUSH) => stack.push(globals),
                (TYPE_GLOBAL, GLOBAL_POP) => {
                    if let Some(g) = stack.pop() {
                        globals = g;
                    }
                }
                _ => {}
            }
        }

        let longest = |tag: u8| -> u16 {
            bits.iter()
                .filter(|((t, _), _)| *t == tag)
                .map(|(_, &b)| b.div_ceil(8).saturating_add(1))
                .max()
                .map_or(0, |len| u16::try_from(len).unwrap_or(u16::MAX))
        };

        ReportLengths {
            input: longest(MAIN_INPUT),
            output: longest(MAIN_OUTPUT),
            feature: longest(MAIN_FEATURE),
        }
    }
}
