// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

use std::io::Write;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use sal::RangeCheck;
use soho::config::DeviceConfig;
use soho::sim::BusChaos;
use soho::sim::BusOp;
use soho::sim::SimBus;
use soho::ChipFamily;
use soho::Device;
use soho::Status;
use soho::SwitchError;

use super::common::logger;
use super::common::open;
use super::common::open_with;

const CMD: u8 = 0x1a;
const DATA: u8 = 0x1b;

// Idle check and completion poll both pass at once: two polls, one data
// write, one command write, in that order.
#[test]
fn test_write_transaction() -> anyhow::Result<()> {
    let (bus, dev) = open(ChipFamily::Topaz);
    bus.clear_transactions();
    dev.flow_ctrl_reg_write(3, 0x10, 0x81)?;
    assert_eq!(
        bus.transactions(),
        vec![
            BusOp::Read {
                dev: 3,
                reg: CMD,
                value: 0
            },
            BusOp::Write {
                dev: 3,
                reg: DATA,
                value: 0x81
            },
            BusOp::Write {
                dev: 3,
                reg: CMD,
                value: 0x9010
            },
            BusOp::Read {
                dev: 3,
                reg: CMD,
                value: 0
            },
        ]
    );
    Ok(())
}

// Busy never clears: the read fails within the bound and the data register
// is never touched.
#[test]
fn test_stuck_read() {
    let (bus, dev) = open(ChipFamily::Topaz);
    bus.set_stuck("flow_ctrl", true);
    bus.clear_transactions();

    let r = dev.flow_ctrl_reg_read(3, 0x10);
    assert_eq!(Status::from(&r), Status::Fail);
    assert!(matches!(
        r,
        Err(SwitchError::Timeout {
            window: "flow_ctrl",
            dev: 3,
            reg: CMD
        })
    ));

    let ops = bus.transactions();
    assert_eq!(ops.len(), 5);
    assert!(!ops
        .iter()
        .any(|op| matches!(op, BusOp::Read { reg: DATA, .. })));

    // Other windows are unaffected.
    dev.ext_port_ctrl_write(3, 0x01, 0x1234)
        .expect("ext port control should still work");
}

#[test]
fn test_configured_bound() -> anyhow::Result<()> {
    let config = DeviceConfig::from_toml("poll_attempts = 3")?;
    let (bus, dev) = open_with(ChipFamily::Fir, &config);

    bus.set_latency("tcam", 2);
    assert_eq!(dev.tcam_range_check_get(1)?, RangeCheck::default());

    // Three busy polls is one too many for a bound of three.
    bus.set_latency("tcam", 3);
    let r = dev.tcam_range_check_get(1);
    assert!(matches!(r, Err(SwitchError::Timeout { window: "tcam", .. })));
    Ok(())
}

#[test]
fn test_bus_faults() -> anyhow::Result<()> {
    let log = logger();
    let bus = SimBus::for_family(&log, ChipFamily::Amethyst);
    bus.set_chaos(BusChaos::uniform(1.0)?);

    match Device::open(&log, Arc::new(bus.clone()), &DeviceConfig::default()) {
        Err(e) => {
            assert!(matches!(e, SwitchError::Bus { .. }));
            assert_eq!(e.status(), Status::Fail);
        }
        Ok(_) => panic!("opened a switch over a failing bus"),
    }

    bus.set_chaos(BusChaos::default());
    let dev = Device::open(&log, Arc::new(bus.clone()), &DeviceConfig::default())?;
    bus.set_chaos(BusChaos::uniform(1.0)?);
    let r = dev.port_pvid_get(0);
    assert_eq!(Status::from(&r), Status::Fail);
    Ok(())
}

#[test]
fn test_config_file() -> anyhow::Result<()> {
    let path = std::env::temp_dir()
        .join(format!("soho-config-{}.toml", std::process::id()));
    let mut f = std::fs::File::create(&path)?;
    writeln!(f, "family = \"peridot\"")?;
    writeln!(f, "lock_timeout_ms = 100")?;
    drop(f);

    let config = DeviceConfig::from_file(&path);
    std::fs::remove_file(&path)?;
    let config = config?;
    assert_eq!(config.family, Some(ChipFamily::Peridot));

    // Naming the family skips probing.
    let (_bus, dev) = open_with(ChipFamily::Peridot, &config);
    assert_eq!(dev.family(), ChipFamily::Peridot);
    assert_eq!(dev.revision(), None);
    Ok(())
}

// A caller that gives up on a stuck window does not leave the window looking
// busy to the next caller, once the hardware recovers.
#[test]
fn test_recovery_after_timeout() -> anyhow::Result<()> {
    let (bus, dev) = open(ChipFamily::Topaz);
    bus.set_stuck("flow_ctrl", true);
    let r = dev.flow_ctrl_reg_read(0, 1);
    assert_eq!(Status::from(&r), Status::Fail);
    bus.set_stuck("flow_ctrl", false);

    std::thread::scope(|s| s.spawn(|| dev.flow_ctrl_reg_write(0, 1, 5)).join())
        .map_err(|_| anyhow::anyhow!("writer panicked"))??;
    assert_eq!(dev.flow_ctrl_reg_read(0, 1)?, 5);
    assert_eq!(bus.violations(), 0);
    Ok(())
}
