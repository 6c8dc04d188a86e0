//! Date and datetime coercions

use super::{input_text, FunctionRegistry};
use crate::graph::{vocab, Literal};
use crate::processor::TemplateState;
use crate::template::{MapError, MapResult, Value};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use std::sync::LazyLock;

static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[12]\d{3}$").unwrap());

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %B %Y", "%B %d, %Y", "%d/%m/%Y", "%Y/%m/%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"];

/// A parsed point in time, with the offset if the input carried one
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ParsedDateTime {
    pub local: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl ParsedDateTime {
    fn is_midnight(&self) -> bool {
        self.local.time() == NaiveTime::MIN
    }

    fn date_lexical(&self) -> String {
        self.local.date().format("%Y-%m-%d").to_string()
    }

    /// ISO-8601, seconds always present, fraction only when non-zero
    fn datetime_lexical(&self) -> String {
        let mut s = if self.local.nanosecond() == 0 {
            self.local.format("%Y-%m-%dT%H:%M:%S").to_string()
        } else {
            self.local.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
        };
        if let Some(offset) = self.offset {
            s.push_str(&offset.to_string());
        }
        s
    }
}

/// Parse the accepted date and datetime layouts
pub(crate) fn parse_datetime(input: &str) -> Option<ParsedDateTime> {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(with_offset(dt));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(with_offset(dt));
        }
    }
    for date_fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, date_fmt) {
            return Some(ParsedDateTime {
                local: date.and_time(NaiveTime::MIN),
                offset: None,
            });
        }
        for time_fmt in TIME_FORMATS {
            for sep in [" ", "T"] {
                let fmt = format!("{}{}{}", date_fmt, sep, time_fmt);
                if let Ok(local) = NaiveDateTime::parse_from_str(s, &fmt) {
                    return Some(ParsedDateTime {
                        local,
                        offset: None,
                    });
                }
            }
        }
    }
    None
}

fn with_offset(dt: DateTime<FixedOffset>) -> ParsedDateTime {
    ParsedDateTime {
        local: dt.naive_local(),
        offset: Some(*dt.offset()),
    }
}

fn parse_or_fail(function: &str, text: &str) -> MapResult<ParsedDateTime> {
    parse_datetime(text)
        .ok_or_else(|| MapError::transform(function, format!("could not parse date from '{}'", text)))
}

fn as_date(value: Value, _: &mut TemplateState<'_>, _: &[Value]) -> MapResult<Value> {
    let Some(text) = input_text(&value) else {
        return Ok(Value::Null);
    };
    let parsed = parse_or_fail("asDate", &text)?;
    Ok(Literal::typed(parsed.date_lexical(), vocab::XSD_DATE).into())
}

fn as_datetime(value: Value, _: &mut TemplateState<'_>, _: &[Value]) -> MapResult<Value> {
    let Some(text) = input_text(&value) else {
        return Ok(Value::Null);
    };
    let parsed = parse_or_fail("asDateTime", &text)?;
    Ok(Literal::typed(parsed.datetime_lexical(), vocab::XSD_DATETIME).into())
}

/// A bare year is January 1st; midnight is a plain date
fn as_date_or_datetime(value: Value, _: &mut TemplateState<'_>, _: &[Value]) -> MapResult<Value> {
    let Some(text) = input_text(&value) else {
        return Ok(Value::Null);
    };
    let text = text.trim();
    if RE_YEAR.is_match(text) {
        return Ok(Literal::typed(format!("{}-01-01", text), vocab::XSD_DATE).into());
    }
    let parsed = parse_or_fail("asDateOrDatetime", text)?;
    Ok(if parsed.is_midnight() {
        Literal::typed(parsed.date_lexical(), vocab::XSD_DATE)
    } else {
        Literal::typed(parsed.datetime_lexical(), vocab::XSD_DATETIME)
    }
    .into())
}

pub(super) fn install(registry: &mut FunctionRegistry) {
    registry.register("asDate", as_date);
    registry.register("asDateTime", as_datetime);
    registry.register("asDatetime", as_datetime);
    registry.register("asDateOrDatetime", as_date_or_datetime);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexical(s: &str) -> String {
        let p = parse_datetime(s).unwrap_or_else(|| panic!("failed to parse {}", s));
        if p.is_midnight() && p.offset.is_none() {
            p.date_lexical()
        } else {
            p.datetime_lexical()
        }
    }

    #[test]
    fn parses_supported_layouts() {
        assert_eq!(lexical("2023-05-18"), "2023-05-18");
        assert_eq!(lexical("18 May 2023"), "2023-05-18");
        assert_eq!(lexical("18 Sep 2023"), "2023-09-18");
        assert_eq!(lexical("May 18, 2023"), "2023-05-18");
        assert_eq!(lexical("18/05/2023"), "2023-05-18");
        assert_eq!(lexical("2023-05-18T10:30:00"), "2023-05-18T10:30:00");
        assert_eq!(lexical("2023-05-18 10:30"), "2023-05-18T10:30:00");
        assert_eq!(lexical("18/05/2023 10:30:15"), "2023-05-18T10:30:15");
        assert_eq!(lexical("2023-05-18T10:30:00+01:00"), "2023-05-18T10:30:00+01:00");
        assert_eq!(lexical("2023-05-18T10:30:00.250"), "2023-05-18T10:30:00.250000");
        assert!(parse_datetime("not a date").is_none());
    }

    #[test]
    fn date_or_datetime_picks_by_time_of_day() {
        let mut h = crate::processor::testing::Harness::new("{}");
        let mut state = h.state(Vec::<(String, Value)>::new());
        assert_eq!(
            as_date_or_datetime(Value::str("1998"), &mut state, &[]).unwrap(),
            Value::from(Literal::typed("1998-01-01", vocab::XSD_DATE))
        );
        assert_eq!(
            as_date_or_datetime(Value::str("2020-02-03 00:00"), &mut state, &[]).unwrap(),
            Value::from(Literal::typed("2020-02-03", vocab::XSD_DATE))
        );
        assert_eq!(
            as_date_or_datetime(Value::str("2020-02-03 09:15"), &mut state, &[]).unwrap(),
            Value::from(Literal::typed("2020-02-03T09:15:00", vocab::XSD_DATETIME))
        );
    }

    #[test]
    fn unparsable_dates_are_transform_errors() {
        let mut h = crate::processor::testing::Harness::new("{}");
        let mut state = h.state(Vec::<(String, Value)>::new());
        assert!(matches!(
            as_date(Value::str("soon"), &mut state, &[]),
            Err(MapError::Transform { .. })
        ));
        assert_eq!(as_date(Value::Null, &mut state, &[]).unwrap(), Value::Null);
    }
}
