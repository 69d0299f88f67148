// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Root logger construction for applications embedding the switch layer.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;

use anyhow::Context;
use slog::Drain;
use slog::Logger;
use thiserror::Error;

/// How log records are rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line, human-readable text
    #[default]
    Human,
    /// Bunyan-style JSON, one record per line
    Json,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid log format: {0}")]
pub struct LogFormatError(String);

impl FromStr for LogFormat {
    type Err = LogFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            _ => Err(LogFormatError(s.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Human => write!(f, "human"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

fn writer(log_file: &Option<String>) -> anyhow::Result<Box<dyn Write + Send>> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {path}"))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(std::io::stdout())),
    }
}

/// Build the root logger for `name`.  Records go to `log_file` when one is
/// given, and to stdout otherwise.
pub fn init(
    name: &str,
    log_file: &Option<String>,
    format: LogFormat,
) -> anyhow::Result<Logger> {
    let out = writer(log_file)?;
    let drain = match format {
        LogFormat::Human => {
            let decorator = slog_term::PlainDecorator::new(out);
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            slog_async::Async::new(drain).build().fuse()
        }
        LogFormat::Json => {
            let drain = slog_bunyan::new(out).build().fuse();
            slog_async::Async::new(drain).build().fuse()
        }
    };
    Ok(Logger::root(drain, slog::o!("name" => name.to_string())))
}
