// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

use std::sync::Arc;
use std::thread;

use sal::FlowCtrl;
use sal::FlowCtrlMode;
use sal::StreamFilter;
use soho::ChipFamily;

use super::common::open;

const THREADS: u16 = 8;
const ROUNDS: u16 = 25;

// Many threads hammering the same windows never interleave their
// transactions, and every one of them sees its own writes.
#[test]
fn test_shared_windows() -> anyhow::Result<()> {
    let (bus, dev) = open(ChipFamily::Fir);
    bus.set_latency("qci", 2);
    bus.set_latency("flow_ctrl", 1);
    let dev = Arc::new(dev);

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let dev = dev.clone();
            thread::spawn(move || -> anyhow::Result<()> {
                for round in 0..ROUNDS {
                    let filter = StreamFilter {
                        stream_handle: Some(t * 100 + round),
                        gate_id: t,
                        max_sdu: 1500,
                        ..Default::default()
                    };
                    dev.qci_stream_filter_set(t, &filter)?;
                    assert_eq!(dev.qci_stream_filter_get(t)?, Some(filter));

                    // Every thread shares port 0's flow-control window.
                    dev.flow_ctrl_reg_write(0, 0x20 + t as u8, round as u8)?;
                    assert_eq!(
                        dev.flow_ctrl_reg_read(0, 0x20 + t as u8)?,
                        round as u8
                    );
                    dev.port_flow_ctrl_set(
                        0,
                        FlowCtrl {
                            enabled: round % 2 == 0,
                            mode: FlowCtrlMode::RxOnly,
                        },
                    )?;
                }
                Ok(())
            })
        })
        .collect();

    for w in workers {
        w.join().expect("worker panicked")?;
    }
    assert_eq!(bus.violations(), 0);
    Ok(())
}
