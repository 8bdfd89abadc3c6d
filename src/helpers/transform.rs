//! Pure derivations from worked-day entries: billing period, time blocks,
//! invoice numbering and consultant name handling.

use chrono::{Datelike, NaiveDate, NaiveTime, TimeDelta};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::error::{InvoiceError, Result};
use crate::models::entry::EntryCollection;
use crate::models::invoice::{BillingPeriod, CellValue, ConsultantName, TimeBlock};

const BASE_HOURS: f64 = 8.0;
const QUARTER_MINUTES: f64 = 15.0;
const MINUTES_PER_DAY: f64 = 1440.0;

pub fn detect_period(entries: &EntryCollection) -> Result<BillingPeriod> {
    let first = entries.first().ok_or(InvoiceError::EmptyInput)?;
    let month = first.date.month();
    let year = first.date.year();

    let max_day = entries.iter().map(|e| e.date.day()).max().unwrap_or(1);

    let (start_day, end_day) = if max_day <= 15 {
        (1, 15)
    } else {
        (16, last_day_of_month(year, month))
    };

    let period = BillingPeriod { month, year, start_day, end_day };
    info!("Detected billing period: {}", period.label());
    Ok(period)
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// Morning 7:00-11:00 and afternoon from 12:00; only the afternoon end moves,
/// by `hours - 8` rounded to the nearest quarter hour (ties to even).
pub fn compute_time_blocks(hours: f64) -> TimeBlock {
    let diff_minutes = (hours - BASE_HOURS) * 60.0;
    let quarters = (diff_minutes / QUARTER_MINUTES).round_ties_even();
    // Only the wall-clock position matters, so wrap within one day.
    let minutes = (quarters * QUARTER_MINUTES).rem_euclid(MINUTES_PER_DAY) as i64;
    let adjust = TimeDelta::minutes(minutes);

    let (afternoon_to, _) = hm(16, 0).overflowing_add_signed(adjust);

    TimeBlock {
        morning_from: hm(7, 0),
        morning_to: hm(11, 0),
        afternoon_from: hm(12, 0),
        afternoon_to,
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Next invoice number from the current cell content; absent or
/// non-numeric content counts as zero.
pub fn next_invoice_number(current: &CellValue) -> i64 {
    let value = match current {
        CellValue::Number(n) if n.is_finite() => n.trunc() as i64,
        CellValue::Text(s) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    };
    debug!("Current invoice number: {}", value);
    value + 1
}

fn middle_initial() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]\.$").expect("static regex"))
}

/// First word is the first name. A single-letter initial in second position
/// is skipped when a third word follows; otherwise the second word is the
/// surname. A lone word stands in for both.
pub fn parse_consultant_name(full_name: &str) -> Result<ConsultantName> {
    let full_name = full_name.trim();
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    let first = *parts.first().ok_or(InvoiceError::MissingConsultantName)?;

    let surname = if parts.len() >= 3 && middle_initial().is_match(parts[1]) {
        parts[2]
    } else if parts.len() >= 2 {
        parts[1]
    } else {
        first
    };

    let initial: String = first.chars().take(1).flat_map(char::to_uppercase).collect();

    Ok(ConsultantName {
        full_name: full_name.to_string(),
        short_name: format!("{}. {}", initial, surname),
    })
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("static regex"))
}

pub fn safe_filename(name: &str) -> String {
    unsafe_chars().replace_all(name, "_").into_owned()
}

/// `J. Perez INV (11 - 1 al 15 - 2025)` with unsafe characters replaced.
pub fn artifact_stem(short_name: &str, period: &BillingPeriod) -> String {
    safe_filename(&format!("{} INV ({})", short_name, period.label()))
}
