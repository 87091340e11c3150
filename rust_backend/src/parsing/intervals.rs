use crate::core::domain::TimeInterval;
use crate::core::error::{TimeSeriesError, TimeSeriesResult};

/// Parser for `"tmin-tmax"` selection strings
pub struct IntervalParser;

impl IntervalParser {
    pub fn parse(input: &str) -> TimeSeriesResult<Vec<TimeInterval>> {
        parse_interval_string(input)
    }

    /// Parse several selection strings; any malformed token fails the whole batch.
    pub fn parse_all<S: AsRef<str>>(inputs: &[S]) -> TimeSeriesResult<Vec<TimeInterval>> {
        let mut intervals = Vec::new();
        for input in inputs {
            intervals.extend(parse_interval_string(input.as_ref())?);
        }
        Ok(intervals)
    }
}

/// Parse a comma-separated list of `"tmin-tmax"` tokens.
pub fn parse_interval_string(input: &str) -> TimeSeriesResult<Vec<TimeInterval>> {
    input.split(',').map(parse_interval_token).collect()
}

/// Parse a single `"tmin-tmax"` token.
///
/// Both bounds may carry a sign or an exponent (`"-1e-3--5"`). The separator is
/// the first `-` that directly follows a digit or a decimal point.
pub fn parse_interval_token(token: &str) -> TimeSeriesResult<TimeInterval> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TimeSeriesError::FormatError(
            "empty time interval".to_string(),
        ));
    }

    let split_at = find_separator(token).ok_or_else(|| {
        TimeSeriesError::FormatError(format!(
            "'{}' is not of the form 'tmin-tmax'",
            token
        ))
    })?;

    let start = parse_bound(&token[..split_at], token)?;
    let stop = parse_bound(&token[split_at + 1..], token)?;

    TimeInterval::new(start, stop)
}

fn find_separator(token: &str) -> Option<usize> {
    let mut previous: Option<char> = None;
    for (idx, ch) in token.char_indices() {
        if ch == '-' && matches!(previous, Some(p) if p.is_ascii_digit() || p == '.') {
            return Some(idx);
        }
        if !ch.is_whitespace() {
            previous = Some(ch);
        }
    }
    None
}

fn parse_bound(raw: &str, token: &str) -> TimeSeriesResult<f64> {
    let value = raw.trim().parse::<f64>().map_err(|e| {
        TimeSeriesError::FormatError(format!(
            "invalid bound '{}' in '{}': {}",
            raw.trim(),
            token,
            e
        ))
    })?;
    if !value.is_finite() {
        return Err(TimeSeriesError::FormatError(format!(
            "non-finite bound in '{}'",
            token
        )));
    }
    Ok(value)
}
