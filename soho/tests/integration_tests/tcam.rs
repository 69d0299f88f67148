// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

use sal::RangeCheck;
use sal::RangeField;
use soho::ChipFamily;
use soho::Status;

use super::common::open;

#[test]
fn test_range_checks() -> anyhow::Result<()> {
    for (family, units) in [
        (ChipFamily::Amethyst, 4),
        (ChipFamily::BonsaiZ1, 8),
        (ChipFamily::Fir, 8),
    ] {
        let (bus, dev) = open(family);
        let check = RangeCheck {
            enabled: true,
            field: RangeField::FrameLength,
            low: 64,
            high: 1518,
        };
        dev.tcam_range_check_set(units - 1, &check)?;
        assert_eq!(dev.tcam_range_check_get(units - 1)?, check);
        assert_eq!(
            bus.window_peek("tcam", 0x1f, (u16::from(units - 1) << 2) | 2),
            Some(0x8003)
        );

        let r = dev.tcam_range_check_get(units);
        assert_eq!(Status::from(&r), Status::BadParam, "{family}");

        let r = dev.tcam_range_check_set(
            0,
            &RangeCheck {
                low: 2,
                high: 1,
                ..check
            },
        );
        assert_eq!(Status::from(&r), Status::BadParam);
    }
    Ok(())
}

#[test]
fn test_unprogrammed_unit() -> anyhow::Result<()> {
    let (_bus, dev) = open(ChipFamily::Fir);
    assert_eq!(dev.tcam_range_check_get(0)?, RangeCheck::default());
    Ok(())
}
