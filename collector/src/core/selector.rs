//! Selector parsing: `suite[:case[.test]]`.
//!
//! The case/test helpers disagree on ambiguous input on purpose: when the part
//! after `:` does not split into exactly two pieces on `.`, [`parse_case`]
//! returns it whole while [`parse_test`] returns `None`.

use serde::Serialize;

const SUITE_DELIMITER: char = ':';
const TEST_DELIMITER: char = '.';

/// A parsed selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selector {
    pub suite: String,
    pub case: Option<String>,
    pub test: Option<String>,
}

impl Selector {
    pub fn parse(cmd: &str) -> Self {
        Self {
            suite: parse_suite(cmd).to_string(),
            case: parse_case(cmd).map(str::to_string),
            test: parse_test(cmd).map(str::to_string),
        }
    }
}

/// Everything before the first `:`, or the whole command.
pub fn parse_suite(cmd: &str) -> &str {
    match cmd.split_once(SUITE_DELIMITER) {
        Some((suite, _)) => suite,
        None => cmd,
    }
}

/// Case part of the selector.
///
/// Falls back to the whole remainder when it is not exactly `case.test`.
pub fn parse_case(cmd: &str) -> Option<&str> {
    let rest = remainder(cmd)?;
    match split_case_test(rest) {
        Some((case, _)) => non_empty(case),
        None => Some(rest),
    }
}

/// Test part of the selector; `None` unless the remainder is exactly `case.test`.
pub fn parse_test(cmd: &str) -> Option<&str> {
    let rest = remainder(cmd)?;
    split_case_test(rest).and_then(|(_, test)| non_empty(test))
}

fn remainder(cmd: &str) -> Option<&str> {
    cmd.split_once(SUITE_DELIMITER)
        .and_then(|(_, rest)| non_empty(rest))
}

fn split_case_test(rest: &str) -> Option<(&str, &str)> {
    let mut pieces = rest.split(TEST_DELIMITER);
    match (pieces.next(), pieces.next(), pieces.next()) {
        (Some(case), Some(test), None) => Some((case, test)),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}
