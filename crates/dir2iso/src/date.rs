//! Date codec for the two on-disk date representations.
//!
//! Directory records carry a 7-byte [`NumericalDate`]; volume descriptors
//! carry a 17-byte [`DigitsDate`]. Both are derived from one [`IsoDate`] and
//! both can be decoded back into one.

use crate::prelude::*;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Offset, Timelike};

/// Smallest offset from GMT, in 15 minute intervals (-12:00).
pub const MIN_GMT_OFFSET: i8 = -48;
/// Largest offset from GMT, in 15 minute intervals (+13:00).
pub const MAX_GMT_OFFSET: i8 = 52;

/// A calendar timestamp plus its offset from GMT in 15 minute units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IsoDate {
  datetime: NaiveDateTime,
  gmt_offset: i8,
}

impl IsoDate {
  pub fn new(datetime: NaiveDateTime, gmt_offset: i8) -> Self {
    Self {
      datetime,
      gmt_offset: gmt_offset.clamp(MIN_GMT_OFFSET, MAX_GMT_OFFSET),
    }
  }

  /// The "no date" sentinel, `1900-01-01T00:00:00` at GMT.
  pub fn no_date() -> Self {
    let date = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default();
    Self::new(date.and_time(NaiveTime::MIN), 0)
  }

  pub fn datetime(&self) -> NaiveDateTime {
    self.datetime
  }

  pub fn gmt_offset(&self) -> i8 {
    self.gmt_offset
  }

  /// Binary form used inside directory records.
  pub fn numerical(&self) -> NumericalDate {
    let dt = &self.datetime;

    NumericalDate {
      years_since_1900: (dt.year().clamp(1900, 2155) - 1900) as u8,
      month: dt.month() as u8,
      day: dt.day() as u8,
      hour: dt.hour() as u8,
      minute: dt.minute() as u8,
      second: dt.second() as u8,
      gmt_offset: self.gmt_offset,
    }
  }

  /// ASCII form used inside volume descriptors.
  pub fn digits(&self) -> DigitsDate {
    let dt = &self.datetime;

    DigitsDate {
      year: dt.year().clamp(0, 9999) as u16,
      month: dt.month() as u8,
      day: dt.day() as u8,
      hour: dt.hour() as u8,
      minute: dt.minute() as u8,
      second: dt.second() as u8,
      hundreths: (dt.nanosecond() / 10_000_000).min(99) as u8,
      gmt_offset: self.gmt_offset,
    }
  }
}

impl<Tz: chrono::TimeZone> From<chrono::DateTime<Tz>> for IsoDate {
  fn from(dt: chrono::DateTime<Tz>) -> Self {
    let offset_seconds = dt.offset().fix().local_minus_utc();
    Self::new(dt.naive_local(), (offset_seconds / (15 * 60)) as i8)
  }
}

impl From<NaiveDateTime> for IsoDate {
  fn from(datetime: NaiveDateTime) -> Self {
    Self::new(datetime, 0)
  }
}

fn calendar(
  year: i32,
  month: u8,
  day: u8,
  hour: u8,
  minute: u8,
  second: u8,
  millis: u32,
) -> Result<NaiveDateTime> {
  NaiveDate::from_ymd_opt(year, month.into(), day.into())
    .and_then(|date| date.and_hms_milli_opt(hour.into(), minute.into(), second.into(), millis))
    .ok_or_else(|| {
      Error::InvalidDate(format!(
        "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{millis:03}"
      ))
    })
}

/// Directory record date: one byte per field, years counted from 1900.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericalDate {
  pub years_since_1900: u8,
  pub month: u8,
  pub day: u8,
  pub hour: u8,
  pub minute: u8,
  pub second: u8,
  pub gmt_offset: i8,
}

impl NumericalDate {
  pub const LENGTH: usize = 7;

  pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
    [
      self.years_since_1900,
      self.month,
      self.day,
      self.hour,
      self.minute,
      self.second,
      self.gmt_offset as u8,
    ]
  }

  pub fn from_bytes(bytes: &[u8; Self::LENGTH]) -> Self {
    Self {
      years_since_1900: bytes[0],
      month: bytes[1],
      day: bytes[2],
      hour: bytes[3],
      minute: bytes[4],
      second: bytes[5],
      gmt_offset: bytes[6] as i8,
    }
  }
}

impl TryFrom<NumericalDate> for IsoDate {
  type Error = Error;

  fn try_from(date: NumericalDate) -> Result<Self> {
    let datetime = calendar(
      1900 + i32::from(date.years_since_1900),
      date.month,
      date.day,
      date.hour,
      date.minute,
      date.second,
      0,
    )?;

    Ok(IsoDate::new(datetime, date.gmt_offset))
  }
}

/// Volume descriptor date: `YYYYMMDDHHMMSScc` digits plus a signed offset byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitsDate {
  pub year: u16,
  pub month: u8,
  pub day: u8,
  pub hour: u8,
  pub minute: u8,
  pub second: u8,
  pub hundreths: u8,
  pub gmt_offset: i8,
}

impl DigitsDate {
  pub const LENGTH: usize = 17;

  pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
    let digits = format!(
      "{:04}{:02}{:02}{:02}{:02}{:02}{:02}",
      self.year % 10000,
      self.month % 100,
      self.day % 100,
      self.hour % 100,
      self.minute % 100,
      self.second % 100,
      self.hundreths % 100,
    );

    let mut bytes = [0u8; Self::LENGTH];
    bytes[..16].copy_from_slice(&digits.as_bytes()[..16]);
    bytes[16] = self.gmt_offset as u8;
    bytes
  }

  pub fn from_bytes(bytes: &[u8; Self::LENGTH]) -> Result<Self> {
    fn number(digits: &[u8]) -> Result<u16> {
      digits.iter().try_fold(0u16, |acc, &b| {
        if b.is_ascii_digit() {
          Ok(acc * 10 + u16::from(b - b'0'))
        } else {
          Err(Error::InvalidDate(format!(
            "non-digit {:?} in date field",
            char::from(b)
          )))
        }
      })
    }

    Ok(Self {
      year: number(&bytes[0..4])?,
      month: number(&bytes[4..6])? as u8,
      day: number(&bytes[6..8])? as u8,
      hour: number(&bytes[8..10])? as u8,
      minute: number(&bytes[10..12])? as u8,
      second: number(&bytes[12..14])? as u8,
      hundreths: number(&bytes[14..16])? as u8,
      gmt_offset: bytes[16] as i8,
    })
  }
}

impl TryFrom<DigitsDate> for IsoDate {
  type Error = Error;

  fn try_from(date: DigitsDate) -> Result<Self> {
    let datetime = calendar(
      i32::from(date.year),
      date.month,
      date.day,
      date.hour,
      date.minute,
      date.second,
      u32::from(date.hundreths) * 10,
    )?;

    Ok(IsoDate::new(datetime, date.gmt_offset))
  }
}
