use mysql_async::FromRowError;
use serde_json::{Number, Value};
use sluice_core::{Row, RowNames};
use time::{Date, Month, PrimitiveDateTime, Time, macros::format_description};

pub(crate) struct RowWrap(pub(crate) Row);

impl mysql_async::prelude::FromRow for RowWrap {
    fn from_row_opt(mut row: mysql_async::Row) -> Result<Self, FromRowError>
    where
        Self: Sized,
    {
        let labels: RowNames = row
            .columns()
            .iter()
            .map(|v| v.name_str().into_owned())
            .collect();
        let values = (0..row.len())
            .map(|i| {
                row.take::<mysql_async::Value, _>(i)
                    .map(decode_value)
                    .expect("Unexpected error: the column does not exist")
            })
            .collect();
        Ok(RowWrap(Row::new(labels, values)))
    }
}

/// Decode a driver value into the JSON representation rows carry through
/// bounding and formatting. Byte payloads are treated as text, MySQL has no
/// reliable marker separating BLOB from VARCHAR at this level. Note that the
/// text protocol delivers every scalar as bytes, so typed numbers only show
/// up on the binary (parameterized) path.
pub(crate) fn decode_value(value: mysql_async::Value) -> Value {
    type MySQLValue = mysql_async::Value;
    match value {
        MySQLValue::NULL => Value::Null,
        MySQLValue::Bytes(v) => Value::String(String::from_utf8_lossy(&v).into_owned()),
        MySQLValue::Int(v) => Value::Number(v.into()),
        MySQLValue::UInt(v) => Value::Number(v.into()),
        MySQLValue::Float(v) => Number::from_f64(v as f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        MySQLValue::Double(v) => Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        MySQLValue::Date(year, month, day, hour, minute, second, micro) => Value::String(
            format_timestamp(year, month, day, hour, minute, second, micro),
        ),
        MySQLValue::Time(negative, days, hours, minutes, seconds, micro) => Value::String(
            format_duration(negative, days, hours, minutes, seconds, micro),
        ),
    }
}

/// MySQL allows zero dates, which `time` rightfully rejects. Those fall back
/// to a plain positional rendering instead of failing the whole row.
fn format_timestamp(
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    micro: u32,
) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let parsed = Month::try_from(month)
        .ok()
        .and_then(|m| Date::from_calendar_date(year as i32, m, day).ok())
        .zip(Time::from_hms_micro(hour, minute, second, micro).ok());
    let mut out = match parsed.and_then(|(date, time)| {
        PrimitiveDateTime::new(date, time).format(format).ok()
    }) {
        Some(v) => v,
        None => format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"),
    };
    if micro > 0 {
        out.push_str(&format!(".{micro:06}"));
    }
    out
}

fn format_duration(
    negative: bool,
    days: u32,
    hours: u8,
    minutes: u8,
    seconds: u8,
    micro: u32,
) -> String {
    let mut out = format!(
        "{}{:02}:{minutes:02}:{seconds:02}",
        if negative { "-" } else { "" },
        days * 24 + hours as u32,
    );
    if micro > 0 {
        out.push_str(&format!(".{micro:06}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_scalars() {
        assert_eq!(decode_value(mysql_async::Value::NULL), Value::Null);
        assert_eq!(decode_value(mysql_async::Value::Int(-7)), json!(-7));
        assert_eq!(decode_value(mysql_async::Value::UInt(42)), json!(42));
        assert_eq!(decode_value(mysql_async::Value::Double(1.5)), json!(1.5));
        assert_eq!(
            decode_value(mysql_async::Value::Bytes(b"caf\xc3\xa9".to_vec())),
            json!("café"),
        );
    }

    #[test]
    fn decode_non_utf8_bytes_are_lossy() {
        let value = decode_value(mysql_async::Value::Bytes(vec![0xff, 0x61]));
        assert_eq!(value, json!("\u{fffd}a"));
    }

    #[test]
    fn decode_timestamps() {
        assert_eq!(
            decode_value(mysql_async::Value::Date(2024, 2, 29, 23, 59, 7, 0)),
            json!("2024-02-29 23:59:07"),
        );
        assert_eq!(
            decode_value(mysql_async::Value::Date(2024, 1, 2, 3, 4, 5, 120000)),
            json!("2024-01-02 03:04:05.120000"),
        );
        // Zero dates are valid in MySQL and must not break decoding.
        assert_eq!(
            decode_value(mysql_async::Value::Date(0, 0, 0, 0, 0, 0, 0)),
            json!("0000-00-00 00:00:00"),
        );
    }

    #[test]
    fn decode_durations() {
        assert_eq!(
            decode_value(mysql_async::Value::Time(false, 1, 2, 3, 4, 0)),
            json!("26:03:04"),
        );
        assert_eq!(
            decode_value(mysql_async::Value::Time(true, 0, 0, 30, 0, 500)),
            json!("-00:30:00.000500"),
        );
    }
}
