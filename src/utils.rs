// This file is part of the terraform-provider-huaweicloud project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::cell::RefCell;
use std::time::Duration;

use thiserror::Error;
use tf_provider::value::{Value, ValueList, ValueString};
use tf_provider::schema::Schema;
use tf_provider::{AttributePath, Diagnostics};

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

pub(crate) trait WithValidate {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

/// Collect a list of statuses, falling back to `default` when the list is null or unknown
pub(crate) fn statuses_or(list: &ValueList<ValueString<'_>>, default: &[&str]) -> Vec<String> {
    match list {
        Value::Value(list) => list
            .iter()
            .filter_map(|status| status.as_deref_option().map(str::to_owned))
            .collect(),
        _ => default.iter().map(|status| status.to_string()).collect(),
    }
}

/// Whether the list and all its items are known at plan time
pub(crate) fn statuses_known(list: &ValueList<ValueString<'_>>) -> bool {
    match list {
        Value::Value(list) => list.iter().all(|status| !status.is_unknown()),
        Value::Null => true,
        Value::Unknown => false,
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("invalid duration `{input}`: {source}")]
    Invalid {
        input: String,
        source: humantime::DurationError,
    },
}

/// Parse a duration written the way Terraform timeouts are: `30m`, `1h30m`, `45s`, `500ms`
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let input = input.trim();
    match input {
        "" => Err(DurationError::Empty),
        "0" => Ok(Duration::ZERO),
        _ => humantime::parse_duration(input).map_err(|source| DurationError::Invalid {
            input: input.to_owned(),
            source,
        }),
    }
}

/// Parse an optional duration attribute, reporting failures on `attr_path`
pub(crate) fn duration_or(
    diags: &mut Diagnostics,
    value: &ValueString<'_>,
    default: Duration,
    attr_path: AttributePath,
) -> Option<Duration> {
    match value.as_deref_option() {
        None => Some(default),
        Some(text) => match parse_duration(text) {
            Ok(duration) => Some(duration),
            Err(err) => {
                diags.error("Invalid duration", err.to_string(), attr_path);
                None
            }
        },
    }
}

pub struct DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    iter: RefCell<T>,
    sep: &'a str,
}

pub trait DisplayJoinable {
    type Joiner<'a>;
    fn join_with(self, sep: &str) -> Self::Joiner<'_>;
}

impl<T, I> DisplayJoinable for T
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    type Joiner<'a> = DisplayJoiner<'a, T, I>;

    fn join_with(self, sep: &str) -> Self::Joiner<'_> {
        DisplayJoiner {
            iter: RefCell::new(self),
            sep,
        }
    }
}

impl<'a, T, I> std::fmt::Display for DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        let mut iter = self.iter.try_borrow_mut().or(Err(std::fmt::Error))?;
        for elt in iter.by_ref() {
            f.write_str(sep)?;
            f.write_fmt(format_args!("{elt}"))?;
            sep = self.sep;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_terraform_durations() {
        assert_eq!(parse_duration("30m"), Ok(Duration::from_secs(1800)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert_eq!(parse_duration(" "), Err(DurationError::Empty));
        for input in ["30", "3x", "m", "soon"] {
            assert!(
                matches!(parse_duration(input), Err(DurationError::Invalid { .. })),
                "{input}"
            );
        }
    }

    #[test]
    fn huge_durations_are_errors() {
        for input in ["9999999999999999h", "18446744073709551615s1s"] {
            assert!(
                matches!(parse_duration(input), Err(DurationError::Invalid { .. })),
                "{input}"
            );
        }
    }

    #[test]
    fn joins_for_display() {
        let statuses = ["Running", "Available"];
        assert_eq!(
            statuses.iter().join_with(", ").to_string(),
            "Running, Available"
        );
    }

    #[test]
    fn statuses_fall_back_to_default() {
        let list: ValueList<ValueString> = Value::Null;
        assert_eq!(statuses_or(&list, &["Running"]), vec!["Running"]);
        assert!(statuses_known(&list));
        assert!(!statuses_known(&Value::Unknown));

        let list: ValueList<ValueString> =
            Value::Value(vec![Value::Value(std::borrow::Cow::Borrowed("Ready"))]);
        assert_eq!(statuses_or(&list, &["Running"]), vec!["Ready"]);
    }
}
