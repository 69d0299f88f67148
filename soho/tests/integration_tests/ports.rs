// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

use sal::FlowCtrl;
use sal::FlowCtrlMode;
use sal::PortState;
use soho::config::DeviceConfig;
use soho::sim::BusOp;
use soho::sim::SimBus;
use soho::ChipFamily;
use soho::Status;
use soho::SwitchError;
use strum::IntoEnumIterator;

use super::common::open;
use super::common::open_with;
use super::common::port_addr;

#[test]
fn test_pvid_every_family() -> anyhow::Result<()> {
    for family in ChipFamily::iter() {
        let (bus, dev) = open(family);
        let last = dev.num_ports() - 1;

        // Bits outside the VID field survive the update.
        bus.poke(port_addr(family, last), 0x07, 0xf000);
        dev.port_pvid_set(last, 0x123)?;
        assert_eq!(dev.port_pvid_get(last)?, 0x123);
        assert_eq!(bus.peek(port_addr(family, last), 0x07), 0xf123);
    }
    Ok(())
}

#[test]
fn test_bad_port_and_vid() {
    let (bus, dev) = open(ChipFamily::Agate);
    bus.clear_transactions();

    let r = dev.port_pvid_set(7, 1);
    assert_eq!(Status::from(&r), Status::BadParam);
    let r = dev.port_pvid_set(0, 0x1000);
    assert_eq!(Status::from(&r), Status::BadParam);
    let r = dev.port_state_get(200);
    assert_eq!(Status::from(&r), Status::BadParam);

    // Nothing reached the bus.
    assert!(bus.transactions().is_empty());
}

#[test]
fn test_port_state() -> anyhow::Result<()> {
    let (bus, dev) = open(ChipFamily::Pearl);
    for state in [
        PortState::Disabled,
        PortState::Blocking,
        PortState::Learning,
        PortState::Forwarding,
    ] {
        dev.port_state_set(10, state)?;
        assert_eq!(dev.port_state_get(10)?, state);
    }
    assert_eq!(bus.peek(port_addr(ChipFamily::Pearl, 10), 0x04) & 0x3, 3);
    Ok(())
}

#[test]
fn test_port_map() -> anyhow::Result<()> {
    let config = DeviceConfig::from_toml("port_map = [5, 4, 3]")?;
    let (bus, dev) = open_with(ChipFamily::Topaz, &config);
    assert_eq!(dev.num_ports(), 3);

    dev.port_pvid_set(0, 42)?;
    assert_eq!(bus.peek(port_addr(ChipFamily::Topaz, 5), 0x07), 42);
    assert!(matches!(
        dev.port_pvid_set(3, 42),
        Err(SwitchError::BadParam(_))
    ));
    Ok(())
}

#[test]
fn test_port_map_too_wide() {
    let log = super::common::logger();
    let bus = soho::sim::SimBus::for_family(&log, ChipFamily::Topaz);
    let config = DeviceConfig {
        port_map: Some(vec![0, 6]),
        ..Default::default()
    };
    let r = soho::Device::open(&log, std::sync::Arc::new(bus), &config);
    assert!(matches!(r, Err(SwitchError::Config(_))));
}

#[test]
fn test_direct_flow_ctrl() -> anyhow::Result<()> {
    for family in [ChipFamily::Agate, ChipFamily::Pearl] {
        let (bus, dev) = open(family);
        let addr = port_addr(family, 1);
        bus.poke(addr, 0x01, 0x0003);

        let fc = FlowCtrl {
            enabled: true,
            mode: FlowCtrlMode::RxTx,
        };
        dev.port_flow_ctrl_set(1, fc)?;
        assert_eq!(bus.peek(addr, 0x01), 0x00c3);
        assert_eq!(dev.port_flow_ctrl_get(1)?, fc);

        dev.port_flow_ctrl_set(
            1,
            FlowCtrl {
                enabled: false,
                mode: FlowCtrlMode::RxTx,
            },
        )?;
        assert_eq!(bus.peek(addr, 0x01), 0x0043);
        assert!(!dev.port_flow_ctrl_get(1)?.enabled);

        let r = dev.port_flow_ctrl_set(
            1,
            FlowCtrl {
                enabled: true,
                mode: FlowCtrlMode::TxOnly,
            },
        );
        assert_eq!(Status::from(&r), Status::BadParam);

        // No flow-control window on these families.
        let r = dev.flow_ctrl_reg_read(1, 0x10);
        assert_eq!(Status::from(&r), Status::NotSupported);
        let r = dev.ext_port_ctrl_write(1, 0x00, 0);
        assert_eq!(Status::from(&r), Status::NotSupported);
    }
    Ok(())
}

#[test]
fn test_windowed_flow_ctrl() -> anyhow::Result<()> {
    for family in [
        ChipFamily::Topaz,
        ChipFamily::Peridot,
        ChipFamily::Amethyst,
        ChipFamily::Fir,
    ] {
        let (bus, dev) = open(family);
        let addr = port_addr(family, 2);
        bus.window_poke("flow_ctrl", addr, 0x10, 0x40);

        let fc = FlowCtrl {
            enabled: true,
            mode: FlowCtrlMode::TxOnly,
        };
        dev.port_flow_ctrl_set(2, fc)?;
        assert_eq!(bus.window_peek("flow_ctrl", addr, 0x10), Some(0xc2));
        assert_eq!(dev.port_flow_ctrl_get(2)?, fc);

        let r = dev.port_flow_ctrl_set(
            2,
            FlowCtrl {
                enabled: true,
                mode: FlowCtrlMode::Pfc,
            },
        );
        assert_eq!(Status::from(&r), Status::BadParam, "{family}");
        assert_eq!(bus.violations(), 0);
    }
    Ok(())
}

// Commands written to the flow-control window of the port at `addr`.
fn fc_commands(bus: &SimBus, addr: u8) -> Vec<u16> {
    bus.transactions()
        .into_iter()
        .filter_map(|op| match op {
            BusOp::Write { dev, reg: 0x1a, value } if dev == addr => Some(value),
            _ => None,
        })
        .collect()
}

#[test]
fn test_bonsai_flow_ctrl() -> anyhow::Result<()> {
    let family = ChipFamily::BonsaiZ1;
    let (bus, dev) = open(family);
    let addr = port_addr(family, 4);

    let fc = FlowCtrl {
        enabled: true,
        mode: FlowCtrlMode::Pfc,
    };
    bus.clear_transactions();
    dev.port_flow_ctrl_set(4, fc)?;
    assert_eq!(bus.window_peek("flow_ctrl", addr, 0x08), Some(0x0d));
    assert_eq!(bus.window_peek("flow_ctrl", addr, 0x10), None);
    // busy | read (0b11) | 0x08, then busy | write (0b10) | 0x08
    assert_eq!(fc_commands(&bus, addr), vec![0xb008, 0xa008]);

    bus.clear_transactions();
    assert_eq!(dev.port_flow_ctrl_get(4)?, fc);
    assert_eq!(fc_commands(&bus, addr), vec![0xb008]);

    // Its flow-control window tolerates slower hardware than the others.
    bus.set_latency("flow_ctrl", 12);
    dev.flow_ctrl_reg_write(4, 0x20, 0x5a)?;
    assert_eq!(dev.flow_ctrl_reg_read(4, 0x20)?, 0x5a);
    Ok(())
}

#[test]
fn test_indirect_registers() -> anyhow::Result<()> {
    let family = ChipFamily::Peridot;
    let (bus, dev) = open(family);
    let addr = port_addr(family, 9);

    dev.flow_ctrl_reg_write(9, 0x7f, 0xa5)?;
    assert_eq!(bus.window_peek("flow_ctrl", addr, 0x7f), Some(0xa5));
    assert_eq!(dev.flow_ctrl_reg_read(9, 0x7f)?, 0xa5);

    // The pointer field is seven bits wide.
    let r = dev.flow_ctrl_reg_write(9, 0x80, 0);
    assert_eq!(Status::from(&r), Status::BadParam);

    dev.ext_port_ctrl_write(9, 0xff, 0xbeef)?;
    assert_eq!(bus.window_peek("ext_port_ctrl", addr, 0xff), Some(0xbeef));
    assert_eq!(dev.ext_port_ctrl_read(9, 0xff)?, 0xbeef);
    Ok(())
}

#[test]
fn test_unsupported_tables() {
    for family in [ChipFamily::Agate, ChipFamily::Topaz, ChipFamily::Peridot]
    {
        let (_bus, dev) = open(family);
        let r = dev.qci_stream_filter_get(0);
        assert_eq!(Status::from(&r), Status::NotSupported);
        let r = dev.qci_flow_meter_clear(0);
        assert_eq!(Status::from(&r), Status::NotSupported);
        let r = dev.tcam_range_check_get(0);
        assert_eq!(Status::from(&r), Status::NotSupported);
    }
    let (_bus, dev) = open(ChipFamily::Amethyst);
    let r = dev.qci_stream_gate_get(0);
    assert_eq!(Status::from(&r), Status::NotSupported);
}
