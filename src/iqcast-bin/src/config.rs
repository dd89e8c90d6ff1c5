// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! `key = value` configuration files.
//!
//! Each line is blank, a `#` comment, or `key = value` with whitespace
//! trimmed around both sides. A backslash escapes the next character,
//! so `\#` and `\=` lose their special meaning. Lines without `=` are
//! ignored; later definitions overwrite earlier ones; unknown keys are
//! accepted and stored.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::io;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration key \"{0}\"")]
    Missing(&'static str),

    #[error("invalid value \"{value}\" for configuration key \"{key}\": {detail}")]
    Invalid {
        key: &'static str,
        value: String,
        detail: String,
    },
}

pub struct Config {
    values: BTreeMap<String, String>,
}

/// The built-in configuration: an Airspy at 111.1 MHz, 2.5 MSPS
/// 16-bit I/Q, decimated by 60, forwarded to 127.0.0.1:10001.
impl Default for Config {
    fn default() -> Self {
        let mut values = BTreeMap::new();
        for (key, value) in [
            ("device", "airspy"),
            ("frequency", "111100000"),
            ("sample_rate", "2500000"),
            ("sample_type", "int"),
            ("decimation", "60"),
            ("host", "127.0.0.1"),
            ("port", "10001"),
            ("count", "-1"),
        ] {
            values.insert(key.to_string(), value.to_string());
        }
        Self { values }
    }
}

impl Config {
    /// Merge a configuration file into this map; existing keys are
    /// replaced by the file's definitions.
    pub fn read_file(&mut self, path: &Path) -> io::Result<()> {
        let content = std::fs::read_to_string(path)?;

        for line in content.lines() {
            if let Some((key, value)) = parse_line(line) {
                self.values.insert(key, value);
            }
        }

        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    /// Fetch and parse a required key.
    pub fn require_parsed<T>(&self, key: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        Self::parse_value(key, self.require(key)?)
    }

    /// Fetch and parse an optional key.
    pub fn parsed<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key).map(|v| Self::parse_value(key, v)).transpose()
    }

    fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: value.to_string(),
            detail: e.to_string(),
        })
    }
}

/// Split one line into a key/value pair, or `None` when the line
/// defines nothing.
fn parse_line(line: &str) -> Option<(String, String)> {
    let mut key = String::new();
    let mut value = String::new();
    let mut has_value = false;
    let mut escaped = false;

    for ch in line.chars() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
            continue;
        } else if ch == '#' {
            break;
        } else if ch == '=' {
            // Every unescaped separator is swallowed; the first one
            // ends the key.
            has_value = true;
            continue;
        }

        if has_value {
            value.push(ch);
        } else {
            key.push(ch);
        }
    }

    has_value.then(|| (key.trim().to_string(), value.trim().to_string()))
}
