use anyhow::anyhow;
use chrono::{
  Days,
  NaiveDate,
  NaiveTime,
  Timelike
};
use regex::Regex;

const CLOCK_FORMAT: &str = "%H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a time of day typed by the user:
/// `HH:MM` on the 24h clock or `H:MM am|pm`.
pub fn parse_clock_time(
  token: &str
) -> anyhow::Result<NaiveTime> {
  let clock_re = Regex::new(
    r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$",
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile failure: \
       {e}"
    )
  })?;
  let invalid = || {
    anyhow!(
      "invalid time '{token}': expected \
       HH:MM or H:MM am/pm"
    )
  };
  let captures = clock_re
    .captures(token.trim())
    .ok_or_else(invalid)?;

  let raw_hour = captures["hour"]
    .parse::<u32>()
    .map_err(|_| invalid())?;
  let minute = captures["minute"]
    .parse::<u32>()
    .map_err(|_| invalid())?;

  let hour = match captures
    .name("ampm")
    .map(|m| {
      m.as_str().to_ascii_lowercase()
    }) {
    | Some(ampm) => {
      if raw_hour == 0 || raw_hour > 12 {
        return Err(invalid());
      }
      match (ampm.as_str(), raw_hour) {
        | ("am", 12) => 0,
        | ("am", h) => h,
        | ("pm", 12) => 12,
        | (_, h) => h + 12
      }
    }
    | None => raw_hour
  };

  NaiveTime::from_hms_opt(hour, minute, 0)
    .ok_or_else(invalid)
}

/// Parse a due date: `YYYY-MM-DD`, `today`,
/// `tomorrow` or a relative `+Nd`.
pub fn parse_due_date(
  token: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = token.trim();
  match token.to_ascii_lowercase().as_str()
  {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!("date out of range")
        });
    }
    | _ => {}
  }

  let rel_re =
    Regex::new(r"^\+(?P<num>\d+)d$")
      .map_err(|e| {
        anyhow!(
          "internal regex compile \
           failure: {e}"
        )
      })?;
  if let Some(caps) =
    rel_re.captures(token)
  {
    let days = caps["num"]
      .parse::<u64>()
      .map_err(|e| {
        anyhow!(
          "invalid day offset \
           '{token}': {e}"
        )
      })?;
    return today
      .checked_add_days(Days::new(days))
      .ok_or_else(|| {
        anyhow!(
          "date out of range: {token}"
        )
      });
  }

  NaiveDate::parse_from_str(
    token,
    DATE_FORMAT
  )
  .map_err(|e| {
    anyhow!(
      "invalid date '{token}': {e} \
       (expected YYYY-MM-DD)"
    )
  })
}

/// `21:05` -> `9:05 PM`; midnight shows as
/// `12:00 AM`.
#[must_use]
pub fn format_clock_12h(
  time: NaiveTime
) -> String {
  let hour = time.hour();
  let ampm =
    if hour >= 12 { "PM" } else { "AM" };
  let display_hour = match hour % 12 {
    | 0 => 12,
    | h => h
  };
  format!(
    "{display_hour}:{:02} {ampm}",
    time.minute()
  )
}

#[must_use]
pub fn format_date(
  date: NaiveDate
) -> String {
  date.format(DATE_FORMAT).to_string()
}

/// Serde adapter storing a time of day as
/// `HH:MM`.
pub mod hhmm_serde {
  use chrono::NaiveTime;
  use serde::Serializer;

  use super::CLOCK_FORMAT;

  fn serialize<S>(
    time: &NaiveTime,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &time
        .format(CLOCK_FORMAT)
        .to_string()
    )
  }

  fn parse<E: serde::de::Error>(
    raw: &str
  ) -> Result<NaiveTime, E> {
    NaiveTime::parse_from_str(
      raw,
      CLOCK_FORMAT
    )
    .map_err(E::custom)
  }

  pub mod option {
    use chrono::NaiveTime;
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      time: &Option<NaiveTime>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match time {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    // Blank strings read as unset.
    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<Option<NaiveTime>, D::Error>
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      match opt.as_deref().map(str::trim) {
        | None | Some("") => Ok(None),
        | Some(raw) => {
          super::parse(raw).map(Some)
        }
      }
    }
  }
}
