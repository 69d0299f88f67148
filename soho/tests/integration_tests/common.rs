// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

use std::sync::Arc;

use ::common::logging::LogFormat;
use slog::Logger;

use soho::config::DeviceConfig;
use soho::sim::SimBus;
use soho::ChipFamily;
use soho::Device;

pub(crate) fn logger() -> Logger {
    ::common::logging::init("test", &None, LogFormat::Human)
        .expect("failed to build test logger")
}

/// Open a simulated member of `family`, probing it the way real hardware
/// would be probed.
pub(crate) fn open(family: ChipFamily) -> (SimBus, Device) {
    open_with(family, &DeviceConfig::default())
}

pub(crate) fn open_with(
    family: ChipFamily,
    config: &DeviceConfig,
) -> (SimBus, Device) {
    let log = logger();
    let bus = SimBus::for_family(&log, family);
    let dev = Device::open(&log, Arc::new(bus.clone()), config)
        .unwrap_or_else(|e| panic!("failed to open {family}: {e}"));
    (bus, dev)
}

/// The SMI address of physical port `port`.
pub(crate) fn port_addr(family: ChipFamily, port: u8) -> u8 {
    soho::family::layout(family).port_base + port
}
