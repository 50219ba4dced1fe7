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

//! Dotted paths into JSON response bodies (`status.phase`, `items.0.id`)

use std::fmt::Display;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JsonPathError {
    #[error("path is empty")]
    Empty,
    #[error("path `{0}` contains an empty segment")]
    EmptySegment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    /// Numeric segment: an array index, or a key when the node is an object
    Index(usize, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self, JsonPathError> {
        if path.is_empty() {
            return Err(JsonPathError::Empty);
        }
        let segments = path
            .split('.')
            .map(|segment| match segment {
                "" => Err(JsonPathError::EmptySegment(path.to_owned())),
                _ => Ok(match segment.parse::<usize>() {
                    Ok(index) => Segment::Index(index, segment.to_owned()),
                    Err(_) => Segment::Key(segment.to_owned()),
                }),
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { segments })
    }

    pub fn lookup<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(value, |node, segment| match (segment, node) {
                (Segment::Key(key), Value::Object(map)) => map.get(key),
                (Segment::Index(_, key), Value::Object(map)) => map.get(key),
                (Segment::Index(index, _), Value::Array(items)) => items.get(*index),
                _ => None,
            })
    }

    /// Scalar value at the path rendered as text; `None` for missing, null or composite values
    pub fn lookup_str(&self, value: &Value) -> Option<String> {
        match self.lookup(value)? {
            Value::String(s) => Some(s.clone()),
            scalar @ (Value::Number(_) | Value::Bool(_)) => Some(scalar.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl FromStr for JsonPath {
    type Err = JsonPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for JsonPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        for segment in &self.segments {
            let (Segment::Key(name) | Segment::Index(_, name)) = segment;
            write!(f, "{sep}{name}")?;
            sep = ".";
        }
        Ok(())
    }
}
