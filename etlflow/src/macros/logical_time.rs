//! The `logicalStartTime` macro function.

use crate::errors::MacroFailure;
use chrono::format::{Item, StrftimeItems};
use chrono::{FixedOffset, Offset, TimeZone, Utc};
use regex::Regex;
use std::fmt::Write as _;

const OFFSET_PATTERN: &str = r"^\s*([+-]?\s*\d+\s*[smhd]\s*)+$";
const OFFSET_TERM_PATTERN: &str = r"([+-]?)\s*(\d+)\s*([smhd])";
const TIMEZONE_PATTERN: &str = r"^([+-])(\d{2}):?(\d{2})?$";

fn compile(pattern: &str) -> Result<Regex, MacroFailure> {
    Regex::new(pattern).map_err(|err| MacroFailure::InvalidArguments(err.to_string()))
}

/// Renders the logical start time for `${logicalStartTime(...)}`.
///
/// With no arguments the result is the epoch-millisecond value. Otherwise the
/// arguments are `format`, an optional `offset` subtracted from the start
/// time, and an optional `timezone`. An empty format renders epoch
/// milliseconds of the shifted time.
///
/// # Errors
///
/// Returns `MacroFailure::InvalidArguments` for an invalid format, offset or
/// timezone, or more than three arguments.
pub fn render_logical_start_time(
    logical_start_time: i64,
    args: &[String],
) -> Result<String, MacroFailure> {
    if args.len() > 3 {
        return Err(MacroFailure::InvalidArguments(format!(
            "logicalStartTime takes at most 3 arguments, got {}",
            args.len()
        )));
    }

    let offset_ms = match args.get(1) {
        Some(offset) if !offset.is_empty() => parse_offset(offset)?,
        _ => 0,
    };
    let millis = logical_start_time.checked_sub(offset_ms).ok_or_else(|| {
        MacroFailure::InvalidArguments(format!("offset {offset_ms}ms overflows the start time"))
    })?;

    let format = args.first().map_or("", String::as_str);
    if format.is_empty() {
        return Ok(millis.to_string());
    }

    let timezone = match args.get(2) {
        Some(tz) if !tz.is_empty() => parse_timezone(tz)?,
        _ => utc_offset(),
    };
    let instant = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        MacroFailure::InvalidArguments(format!("{millis} is not a valid timestamp"))
    })?;

    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(MacroFailure::InvalidArguments(format!(
            "invalid date format '{format}'"
        )));
    }

    let mut rendered = String::new();
    write!(
        rendered,
        "{}",
        instant
            .with_timezone(&timezone)
            .format_with_items(items.iter())
    )
    .map_err(|_| MacroFailure::InvalidArguments(format!("cannot render format '{format}'")))?;
    Ok(rendered)
}

/// Parses an offset such as `1d`, `1d-4h` or `+30m` into milliseconds.
///
/// Terms are summed; the result is what gets subtracted from the start time.
///
/// # Errors
///
/// Returns `MacroFailure::InvalidArguments` if the offset is malformed.
pub fn parse_offset(offset: &str) -> Result<i64, MacroFailure> {
    if !compile(OFFSET_PATTERN)?.is_match(offset) {
        return Err(MacroFailure::InvalidArguments(format!(
            "invalid time offset '{offset}'"
        )));
    }

    let mut total: i64 = 0;
    for term in compile(OFFSET_TERM_PATTERN)?.captures_iter(offset) {
        let amount: i64 = term[2].parse().map_err(|_| {
            MacroFailure::InvalidArguments(format!("time offset '{offset}' is too large"))
        })?;
        let unit_ms = match &term[3] {
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            _ => 86_400_000,
        };
        let signed = if &term[1] == "-" { -amount } else { amount };
        total = signed
            .checked_mul(unit_ms)
            .and_then(|ms| total.checked_add(ms))
            .ok_or_else(|| {
                MacroFailure::InvalidArguments(format!("time offset '{offset}' is too large"))
            })?;
    }
    Ok(total)
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

fn parse_timezone(timezone: &str) -> Result<FixedOffset, MacroFailure> {
    if matches!(timezone, "UTC" | "GMT" | "Z") {
        return Ok(utc_offset());
    }

    let invalid = || MacroFailure::InvalidArguments(format!("unsupported timezone '{timezone}'"));
    let captures = compile(TIMEZONE_PATTERN)?
        .captures(timezone)
        .ok_or_else(invalid)?;
    let hours: i32 = captures[2].parse().map_err(|_| invalid())?;
    let minutes: i32 = captures
        .get(3)
        .map_or(Ok(0), |m| m.as_str().parse())
        .map_err(|_| invalid())?;
    let seconds = hours * 3600 + minutes * 60;
    let seconds = if &captures[1] == "-" { -seconds } else { seconds };
    FixedOffset::east_opt(seconds).ok_or_else(invalid)
}
