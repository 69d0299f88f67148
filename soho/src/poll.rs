// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

use std::time::Duration;

use sal::SwitchError;
use sal::SwitchResult;

/// How many times to check a condition before giving up, and how long to
/// wait between checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, interval: Duration) -> SwitchResult<Self> {
        if attempts == 0 {
            return Err(SwitchError::BadParam(
                "retry policy needs at least one attempt".to_string(),
            ));
        }
        Ok(RetryPolicy { attempts, interval })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn with_attempts(self, attempts: u32) -> SwitchResult<Self> {
        RetryPolicy::new(attempts, self.interval)
    }

    pub fn with_interval(self, interval: Duration) -> Self {
        RetryPolicy { interval, ..self }
    }
}

/// Evaluate `done` until it reports true, at most `policy.attempts()` times,
/// sleeping for the policy's interval between evaluations.
///
/// Returns the 1-based attempt on which the condition held, or `None` if it
/// never did.  An error from `done` ends polling immediately.
pub fn poll_until<F>(policy: RetryPolicy, mut done: F) -> SwitchResult<Option<u32>>
where
    F: FnMut() -> SwitchResult<bool>,
{
    for attempt in 1..=policy.attempts {
        if done()? {
            return Ok(Some(attempt));
        }
        if attempt < policy.attempts && !policy.interval.is_zero() {
            std::thread::sleep(policy.interval);
        }
    }
    Ok(None)
}
