// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

use pretty_assertions::assert_eq;
use sal::ColorMode;
use sal::FlowMeter;
use sal::GateState;
use sal::StreamFilter;
use sal::StreamGate;
use soho::sim::BusOp;
use soho::ChipFamily;
use soho::Status;

use super::common::open;

const QCI_DEV: u8 = 0x1e;

fn filter() -> StreamFilter {
    StreamFilter {
        stream_handle: Some(0x0abc),
        priority: Some(6),
        gate_id: 3,
        meter_id: Some(9),
        max_sdu: 1500,
        block_oversize: false,
    }
}

#[test]
fn test_filter_lifecycle() -> anyhow::Result<()> {
    for family in [ChipFamily::BonsaiZ1, ChipFamily::Fir] {
        let (bus, dev) = open(family);
        assert_eq!(dev.qci_stream_filter_get(17)?, None);

        dev.qci_stream_filter_set(17, &filter())?;
        assert_eq!(dev.qci_stream_filter_get(17)?, Some(filter()));
        // Filter 17, word 0: the valid word.
        assert_eq!(
            bus.window_peek("qci", QCI_DEV, 17 << 3),
            Some(0xc000 | 0x0abc)
        );

        dev.qci_stream_filter_clear(17)?;
        assert_eq!(dev.qci_stream_filter_get(17)?, None);
        assert_eq!(bus.violations(), 0);
    }
    Ok(())
}

// Pointers of every command written to the QCI window.
fn cmd_pointers(ops: &[BusOp]) -> Vec<u16> {
    ops.iter()
        .filter_map(|op| match op {
            BusOp::Write {
                dev: QCI_DEV,
                reg: 0x00,
                value,
            } => Some(*value & 0x0fff),
            _ => None,
        })
        .collect()
}

// Full command words written to the QCI window.
fn cmd_words(ops: &[BusOp]) -> Vec<u16> {
    ops.iter()
        .filter_map(|op| match op {
            BusOp::Write {
                dev: QCI_DEV,
                reg: 0x00,
                value,
            } => Some(*value),
            _ => None,
        })
        .collect()
}

// Data words written to the QCI window, in order.
fn data_writes(ops: &[BusOp]) -> Vec<u16> {
    ops.iter()
        .filter_map(|op| match op {
            BusOp::Write {
                dev: QCI_DEV,
                reg: 0x01,
                value,
            } => Some(*value),
            _ => None,
        })
        .collect()
}

// The valid word is invalidated first and set last on the way in, and read
// first on the way out.  An unused entry costs a single read.
#[test]
fn test_entry_word_order() -> anyhow::Result<()> {
    let (bus, dev) = open(ChipFamily::Fir);

    bus.clear_transactions();
    dev.qci_flow_meter_set(5, &FlowMeter::default())?;
    let meter = (2 << 10) | (5 << 3);
    assert_eq!(
        cmd_pointers(&bus.transactions()),
        vec![6, 0, 1, 2, 3, 4, 5, 6]
            .into_iter()
            .map(|w| meter | w)
            .collect::<Vec<u16>>()
    );

    bus.clear_transactions();
    assert_eq!(dev.qci_stream_gate_get(2)?, None);
    assert_eq!(cmd_pointers(&bus.transactions()), vec![(1 << 10) | (2 << 3)]);
    Ok(())
}

#[test]
fn test_overwrite_live_filter() -> anyhow::Result<()> {
    let (bus, dev) = open(ChipFamily::Fir);
    dev.qci_stream_filter_set(0, &filter())?;

    let replacement = StreamFilter {
        stream_handle: Some(0x0123),
        priority: None,
        gate_id: 1,
        meter_id: None,
        max_sdu: 9000,
        block_oversize: true,
    };
    bus.clear_transactions();
    dev.qci_stream_filter_set(0, &replacement)?;

    let ops = bus.transactions();
    assert_eq!(cmd_pointers(&ops), vec![0, 1, 2, 3, 0]);
    let data = data_writes(&ops);
    // The old entry stops matching before any of its words change, and only
    // the final write makes the new one live.
    assert_eq!(data[0] & 0x8000, 0);
    assert_eq!(data[4] & 0x8000, 0x8000);
    assert_eq!(dev.qci_stream_filter_get(0)?, Some(replacement));
    assert_eq!(bus.violations(), 0);
    Ok(())
}

#[test]
fn test_gate_and_meter() -> anyhow::Result<()> {
    let (bus, dev) = open(ChipFamily::BonsaiZ1);
    let gate = StreamGate {
        initial_state: GateState::Closed,
        initial_ipv: Some(7),
        close_on_invalid_rx: true,
        close_on_octets_exceeded: false,
    };
    let gate31 = (1 << 10) | (31 << 3);

    bus.clear_transactions();
    dev.qci_stream_gate_set(31, &gate)?;
    // busy | write (0b011) | pointer
    assert_eq!(
        cmd_words(&bus.transactions()),
        vec![0xb000 | gate31, 0xb000 | gate31 | 1, 0xb000 | gate31]
    );

    bus.clear_transactions();
    assert_eq!(dev.qci_stream_gate_get(31)?, Some(gate));
    // busy | read (0b100) | pointer
    assert_eq!(
        cmd_words(&bus.transactions()),
        vec![0xc000 | gate31, 0xc000 | gate31 | 1]
    );

    let meter = FlowMeter {
        cir: 100_000,
        cbs: 4096,
        eir: 200_000,
        ebs: 8192,
        coupling: false,
        color_mode: ColorMode::Aware,
        drop_on_yellow: true,
    };
    dev.qci_flow_meter_set(63, &meter)?;
    assert_eq!(dev.qci_flow_meter_get(63)?, Some(meter));

    dev.qci_flow_meter_clear(63)?;
    assert_eq!(dev.qci_flow_meter_get(63)?, None);
    Ok(())
}

#[test]
fn test_table_sizes() {
    let (_bus, bonsai) = open(ChipFamily::BonsaiZ1);
    let (_bus, fir) = open(ChipFamily::Fir);

    // BonsaiZ1 has 32 gates; Fir has 64.
    let r = bonsai.qci_stream_gate_set(32, &StreamGate::default());
    assert_eq!(Status::from(&r), Status::BadParam);
    let r = fir.qci_stream_gate_set(32, &StreamGate::default());
    assert_eq!(Status::from(&r), Status::Ok);

    let r = bonsai.qci_stream_filter_get(64);
    assert_eq!(Status::from(&r), Status::BadParam);
    let r = fir.qci_stream_filter_get(127);
    assert_eq!(Status::from(&r), Status::Ok);

    // A filter may only name gates and meters that exist.
    let f = StreamFilter {
        gate_id: 40,
        ..filter()
    };
    let r = bonsai.qci_stream_filter_set(0, &f);
    assert_eq!(Status::from(&r), Status::BadParam);
    let r = fir.qci_stream_filter_set(0, &f);
    assert_eq!(Status::from(&r), Status::Ok);
}
