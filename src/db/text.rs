//! PostgreSQL text output for values decoded from the binary protocol.
//!
//! Prepared statements receive results in binary format, plain statements in
//! text format. These renderers reproduce the server's text output (ISO
//! DateStyle, `postgres` IntervalStyle, UTC session time zone, C monetary
//! locale) so both paths produce the same strings.

use chrono::Timelike;
use sqlx::types::chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, Utc};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Renders a `float8` the way `float8out` does.
pub fn float8(value: f64) -> String {
    special_float(value.is_nan(), value.is_infinite(), value.is_sign_negative())
        .unwrap_or_else(|| shortest_float(format!("{value:e}"), value.to_string(), 15))
}

/// Renders a `float4` the way `float4out` does.
pub fn float4(value: f32) -> String {
    special_float(value.is_nan(), value.is_infinite(), value.is_sign_negative())
        .unwrap_or_else(|| shortest_float(format!("{value:e}"), value.to_string(), 6))
}

fn special_float(nan: bool, infinite: bool, negative: bool) -> Option<String> {
    match (nan, infinite, negative) {
        (true, _, _) => Some("NaN".to_string()),
        (_, true, true) => Some("-Infinity".to_string()),
        (_, true, false) => Some("Infinity".to_string()),
        _ => None,
    }
}

// Exponent notation below 1e-4 and from 10^digits upwards, fixed otherwise.
fn shortest_float(scientific: String, fixed: String, digits: i32) -> String {
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return fixed;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= digits {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else {
        fixed
    }
}

/// Renders a `time` value: `HH:MM:SS[.ffffff]` with trailing zeros trimmed.
pub fn time(value: NaiveTime) -> String {
    format!(
        "{:02}:{:02}:{:02}{}",
        value.hour(),
        value.minute(),
        value.second(),
        fraction(i64::from(value.nanosecond() / 1_000))
    )
}

/// Renders a `timetz` value.
pub fn time_tz(value: NaiveTime, offset: FixedOffset) -> String {
    format!("{}{}", time(value), utc_offset(offset.local_minus_utc()))
}

/// Renders a `timestamp` value.
pub fn timestamp(value: NaiveDateTime) -> String {
    format!("{} {}", value.date(), time(value.time()))
}

/// Renders a `timestamptz` value in UTC.
pub fn timestamp_utc(value: DateTime<Utc>) -> String {
    format!("{}+00", timestamp(value.naive_utc()))
}

/// Renders a UTC offset: `+HH`, with `:MM` and `:SS` only when non-zero.
pub fn utc_offset(seconds: i32) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let seconds = seconds.unsigned_abs();
    let (hours, minutes, secs) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);

    let mut out = format!("{sign}{hours:02}");
    if minutes != 0 || secs != 0 {
        out.push_str(&format!(":{minutes:02}"));
    }
    if secs != 0 {
        out.push_str(&format!(":{secs:02}"));
    }
    out
}

fn fraction(micros: i64) -> String {
    if micros == 0 {
        return String::new();
    }
    let digits = format!("{:06}", micros.abs());
    format!(".{}", digits.trim_end_matches('0'))
}

/// Renders an `interval` in the `postgres` IntervalStyle.
pub fn interval(months: i32, days: i32, microseconds: i64) -> String {
    let mut out = String::new();
    let mut negative_before = false;

    let parts = [
        (i64::from(months / 12), "year"),
        (i64::from(months % 12), "mon"),
        (i64::from(days), "day"),
    ];
    for (value, unit) in parts {
        if value == 0 {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        if negative_before && value > 0 {
            out.push('+');
        }
        let plural = if value == 1 { "" } else { "s" };
        out.push_str(&format!("{value} {unit}{plural}"));
        negative_before = value < 0;
    }

    if out.is_empty() || microseconds != 0 {
        let hours = microseconds / 3_600_000_000;
        let minutes = microseconds / 60_000_000 % 60;
        let seconds = microseconds / 1_000_000 % 60;
        let micros = microseconds % 1_000_000;

        if !out.is_empty() {
            out.push(' ');
        }
        if microseconds < 0 {
            out.push('-');
        } else if negative_before {
            out.push('+');
        }
        out.push_str(&format!(
            "{:02}:{:02}:{:02}{}",
            hours.abs(),
            minutes.abs(),
            seconds.abs(),
            fraction(micros)
        ));
    }

    out
}

/// Renders a `money` amount held in cents, e.g. `-$1,234.50`.
pub fn money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let units = (cents / 100).to_string();

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, digit) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{sign}${grouped}.{:02}", cents % 100)
}

/// Renders an `inet` or `cidr` from its binary wire form.
///
/// Returns `None` if the bytes are malformed.
pub fn inet(bytes: &[u8], cidr: bool) -> Option<String> {
    let (header, address) = bytes.split_first_chunk::<4>()?;
    let [family, bits, is_cidr, len] = *header;
    if address.len() != usize::from(len) {
        return None;
    }

    let (address, max_bits) = match family {
        2 => {
            let octets: [u8; 4] = address.try_into().ok()?;
            (Ipv4Addr::from(octets).to_string(), 32)
        }
        3 => {
            let octets: [u8; 16] = address.try_into().ok()?;
            (Ipv6Addr::from(octets).to_string(), 128)
        }
        _ => return None,
    };

    if cidr || is_cidr != 0 || bits != max_bits {
        Some(format!("{address}/{bits}"))
    } else {
        Some(address)
    }
}

/// Renders a `macaddr` from its six wire bytes.
pub fn macaddr(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 6 {
        return None;
    }
    let parts: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
    Some(parts.join(":"))
}

/// Renders a one-dimensional array from its elements' text, `None` being NULL.
pub fn array<I>(items: I) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut out = String::from("{");
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match item {
            None => out.push_str("NULL"),
            Some(text) if needs_quotes(&text) => {
                out.push('"');
                for c in text.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
            }
            Some(text) => out.push_str(&text),
        }
    }
    out.push('}');
    out
}

fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || text.eq_ignore_ascii_case("NULL")
        || text.chars().any(|c| {
            matches!(
                c,
                '{' | '}' | ',' | '"' | '\\' | ' ' | '\t' | '\n' | '\r' | '\x0B' | '\x0C'
            )
        })
}
