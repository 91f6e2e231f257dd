//! Stage requests as supplied by callers and configuration.

use crate::errors::ValidationError;
use crate::registry::StageId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static RANGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*-\s*(\d+)$").expect("range pattern is a valid regex"));

/// One entry of an explicit request: a typed id, a stage number or a name.
///
/// Selectors are not validated until the request is resolved against a
/// registry, so a request may name stages that turn out to be unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageSelector {
    /// A stage number (canonical position).
    Number(u32),
    /// A stage id.
    Id(StageId),
    /// A stage name as typed by a user.
    Name(String),
}

impl From<StageId> for StageSelector {
    fn from(id: StageId) -> Self {
        Self::Id(id)
    }
}

impl From<u32> for StageSelector {
    fn from(number: u32) -> Self {
        Self::Number(number)
    }
}

impl From<&str> for StageSelector {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl fmt::Display for StageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// The set of stages a caller asks to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRequest {
    /// Every registered stage.
    All,
    /// An explicit list, in any order, possibly with repeats.
    Stages(Vec<StageSelector>),
}

impl StageRequest {
    /// Creates an explicit request.
    #[must_use]
    pub fn stages<S: Into<StageSelector>>(selectors: impl IntoIterator<Item = S>) -> Self {
        Self::Stages(selectors.into_iter().map(Into::into).collect())
    }

    /// Parses a textual request.
    ///
    /// Accepts `all`, or a list separated by commas or whitespace whose
    /// items are stage numbers (`4`), inclusive ranges (`2-4`) or names
    /// (`segmentation`).
    ///
    /// # Errors
    ///
    /// Returns an error for empty input, an inverted range or a range wider
    /// than the number of stages.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let mut selectors = Vec::new();
        for token in trimmed.split(|c: char| c == ',' || c.is_whitespace()).filter(|t| !t.is_empty()) {
            if let Some(caps) = RANGE_PATTERN.captures(token) {
                let start = parse_number(input, &caps[1])?;
                let end = parse_number(input, &caps[2])?;
                if start > end {
                    return Err(ValidationError::MalformedRequest {
                        input: input.to_string(),
                        reason: format!("range {start}-{end} is inverted"),
                    });
                }
                if usize::try_from(end - start).map_or(true, |span| span >= StageId::ALL.len()) {
                    return Err(ValidationError::MalformedRequest {
                        input: input.to_string(),
                        reason: format!("range {start}-{end} covers more than {} stages", StageId::ALL.len()),
                    });
                }
                selectors.extend((start..=end).map(StageSelector::Number));
            } else if token.bytes().all(|b| b.is_ascii_digit()) {
                selectors.push(StageSelector::Number(parse_number(input, token)?));
            } else {
                selectors.push(StageSelector::Name(token.to_string()));
            }
        }

        if selectors.is_empty() {
            return Err(ValidationError::EmptyRequest);
        }
        Ok(Self::Stages(selectors))
    }

    /// Builds a request from a configuration value: a string (see
    /// [`parse`](Self::parse)) or an array of numbers and names.
    ///
    /// # Errors
    ///
    /// Returns an error if the value has another shape.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ValidationError> {
        match value {
            serde_json::Value::String(s) => Self::parse(s),
            serde_json::Value::Number(_) => Self::parse(&value.to_string()),
            serde_json::Value::Array(items) => {
                let mut selectors = Vec::with_capacity(items.len());
                for item in items {
                    match Self::from_value(item)? {
                        Self::All => return Ok(Self::All),
                        Self::Stages(more) => selectors.extend(more),
                    }
                }
                if selectors.is_empty() {
                    return Err(ValidationError::EmptyRequest);
                }
                Ok(Self::Stages(selectors))
            }
            other => Err(ValidationError::MalformedRequest {
                input: other.to_string(),
                reason: "expected a string, a number or an array".to_string(),
            }),
        }
    }
}

fn parse_number(input: &str, digits: &str) -> Result<u32, ValidationError> {
    digits.parse().map_err(|_| ValidationError::MalformedRequest {
        input: input.to_string(),
        reason: format!("'{digits}' is not a valid stage number"),
    })
}
