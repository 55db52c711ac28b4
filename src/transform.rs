//! Declarative date conversion for decoded responses.
//!
//! The service sends every `Edm.DateTimeOffset` as an ISO-8601 string. Each
//! entity set carries a generated rule table naming its date fields and the
//! navigation properties that may hold further entities, so a response can
//! be walked without knowing its Rust type:
//!
//! - [`TransformOp::This`]: the field itself is a date string.
//! - [`TransformOp::Loop`]: the field is an array; apply the nested rules to
//!   every element.
//! - [`TransformOp::Select`]: the field is an optional object; apply the
//!   nested rules to it.
//!
//! Nested rules are thunks so that tables can reference each other
//! cyclically (`Sag` -> `SagAktør` -> `Sag`).

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::ClientError;

/// Deferred reference to another rule table.
pub type RuleTable = fn() -> &'static [TransformField];

/// Traversal operator of a [`TransformField`].
#[derive(Clone, Copy, Debug)]
pub enum TransformOp {
    This,
    Loop(RuleTable),
    Select(RuleTable),
}

/// One rule: a field name and what to do with the value found there.
#[derive(Clone, Copy, Debug)]
pub struct TransformField {
    pub field: &'static str,
    pub op: TransformOp,
}

/// Calls `visit` with the JSON pointer and value of every date leaf that
/// `rules` reaches in `value`.
///
/// Absent and `null` members are skipped at every level, so an unexpanded
/// navigation property or an empty array costs nothing.
pub fn visit_dates<F>(
    value: &mut Value,
    rules: &[TransformField],
    visit: &mut F,
) -> Result<(), ClientError>
where
    F: FnMut(&str, &mut Value) -> Result<(), ClientError>,
{
    let mut pointer = String::new();
    walk(value, rules, &mut pointer, visit)
}

fn walk<F>(
    value: &mut Value,
    rules: &[TransformField],
    pointer: &mut String,
    visit: &mut F,
) -> Result<(), ClientError>
where
    F: FnMut(&str, &mut Value) -> Result<(), ClientError>,
{
    let Value::Object(object) = value else {
        return Ok(());
    };

    for rule in rules {
        let Some(member) = object.get_mut(rule.field) else {
            continue;
        };
        if member.is_null() {
            continue;
        }

        let base = pointer.len();
        push_segment(pointer, rule.field);

        match rule.op {
            TransformOp::This => {
                if !member.is_string() {
                    return Err(unexpected(pointer, "a date string"));
                }
                visit(pointer.as_str(), member)?;
            }
            TransformOp::Loop(nested) => {
                let Value::Array(items) = member else {
                    return Err(unexpected(pointer, "an array"));
                };
                let nested = nested();
                for (position, item) in items.iter_mut().enumerate() {
                    let item_base = pointer.len();
                    pointer.push('/');
                    pointer.push_str(&position.to_string());
                    walk(item, nested, pointer, visit)?;
                    pointer.truncate(item_base);
                }
            }
            TransformOp::Select(nested) => {
                if !member.is_object() {
                    return Err(unexpected(pointer, "an object"));
                }
                walk(member, nested(), pointer, visit)?;
            }
        }

        pointer.truncate(base);
    }

    Ok(())
}

fn push_segment(pointer: &mut String, field: &str) {
    pointer.push('/');
    // RFC 6901 escaping.
    pointer.push_str(&field.replace('~', "~0").replace('/', "~1"));
}

fn unexpected(pointer: &str, expected: &'static str) -> ClientError {
    ClientError::UnexpectedShape {
        pointer: pointer.to_owned(),
        expected,
    }
}

/// Rewrites every date leaf reached by `rules` as canonical UTC RFC 3339.
///
/// After normalization the value deserializes into the generated entity
/// types, whose date members are `DateTime<Utc>`. Non-date members are left
/// untouched.
pub fn normalize_dates(value: &mut Value, rules: &[TransformField]) -> Result<(), ClientError> {
    visit_dates(value, rules, &mut |pointer, leaf| {
        let raw = leaf.as_str().unwrap_or_default();
        let parsed = parse_date(raw).ok_or_else(|| ClientError::InvalidDate {
            pointer: pointer.to_owned(),
            value: raw.to_owned(),
        })?;
        *leaf = Value::String(format_date(&parsed));
        Ok(())
    })
}

/// Collects every date leaf reached by `rules` as `(pointer, date)` pairs.
pub fn collect_dates(
    value: &Value,
    rules: &[TransformField],
) -> Result<Vec<(String, DateTime<Utc>)>, ClientError> {
    // The walk needs `&mut`; work on a copy so callers can keep a shared view.
    let mut scratch = value.clone();
    let mut found = Vec::new();
    visit_dates(&mut scratch, rules, &mut |pointer, leaf| {
        let raw = leaf.as_str().unwrap_or_default();
        let parsed = parse_date(raw).ok_or_else(|| ClientError::InvalidDate {
            pointer: pointer.to_owned(),
            value: raw.to_owned(),
        })?;
        found.push((pointer.to_owned(), parsed));
        Ok(())
    })?;
    Ok(found)
}

/// Parses an ISO-8601 timestamp as sent by the service.
///
/// Accepts RFC 3339 with any offset, and offset-less
/// `YYYY-MM-DDTHH:MM:SS[.fff]`, which is taken as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Formats a date the way it travels on the wire: RFC 3339, `Z` suffix,
/// fractional seconds only when non-zero.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{
        TransformField, TransformOp, collect_dates, format_date, normalize_dates, parse_date,
    };
    use crate::ClientError;

    fn person_rules() -> &'static [TransformField] {
        const RULES: &[TransformField] = &[
            TransformField {
                field: "born",
                op: TransformOp::This,
            },
            TransformField {
                field: "Cases",
                op: TransformOp::Loop(case_rules),
            },
        ];
        RULES
    }

    fn case_rules() -> &'static [TransformField] {
        const RULES: &[TransformField] = &[
            TransformField {
                field: "opened",
                op: TransformOp::This,
            },
            TransformField {
                field: "Owner",
                op: TransformOp::Select(person_rules),
            },
        ];
        RULES
    }

    #[test]
    fn converts_nested_and_looped_leaves() {
        let mut value = json!({
            "born": "1970-01-02T03:04:05",
            "name": "2001-01-01T00:00:00",
            "Cases": [
                { "opened": "2020-05-06T07:08:09+02:00", "Owner": { "born": "1980-01-01T00:00:00Z" } },
                { "opened": "2021-01-01T00:00:00.5Z", "Owner": null }
            ]
        });

        normalize_dates(&mut value, person_rules()).expect("dates normalize");

        assert_eq!(value["born"], "1970-01-02T03:04:05Z");
        assert_eq!(value["name"], "2001-01-01T00:00:00");
        assert_eq!(value["Cases"][0]["opened"], "2020-05-06T05:08:09Z");
        assert_eq!(value["Cases"][0]["Owner"]["born"], "1980-01-01T00:00:00Z");
        assert_eq!(value["Cases"][1]["opened"], "2021-01-01T00:00:00.500Z");
        assert_eq!(value["Cases"][1]["Owner"], Value::Null);
    }

    #[test]
    fn loop_over_empty_array_is_a_no_op() {
        let mut value = json!({ "born": null, "Cases": [] });
        let before = value.clone();
        normalize_dates(&mut value, person_rules()).expect("nothing to do");
        assert_eq!(value, before);
    }

    #[test]
    fn select_over_absent_object_is_a_no_op() {
        let mut value = json!({ "opened": "2020-01-01T00:00:00Z" });
        normalize_dates(&mut value, case_rules()).expect("owner is absent");
        assert_eq!(value, json!({ "opened": "2020-01-01T00:00:00Z" }));
    }

    #[test]
    fn reports_pointer_of_invalid_date() {
        let mut value = json!({ "Cases": [{ "opened": "2020-01-01" }, { "opened": "yesterday" }] });
        let error = normalize_dates(&mut value, person_rules()).expect_err("invalid date");
        match error {
            ClientError::InvalidDate { pointer, value } => {
                assert_eq!(pointer, "/Cases/0/opened");
                assert_eq!(value, "2020-01-01");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_non_array_loop_target() {
        let mut value = json!({ "Cases": { "opened": "2020-01-01T00:00:00Z" } });
        let error = normalize_dates(&mut value, person_rules()).expect_err("wrong shape");
        assert!(matches!(
            error,
            ClientError::UnexpectedShape { ref pointer, expected: "an array" } if pointer == "/Cases"
        ));
    }

    #[test]
    fn rejects_non_string_date_leaf() {
        let mut value = json!({ "Cases": [{ "opened": 1_700_000_000 }] });
        let error = normalize_dates(&mut value, person_rules()).expect_err("wrong shape");
        assert!(matches!(
            error,
            ClientError::UnexpectedShape { ref pointer, expected: "a date string" }
                if pointer == "/Cases/0/opened"
        ));
    }

    #[test]
    fn rejects_non_object_select_target() {
        let mut value = json!({
            "opened": "2020-01-01T00:00:00Z",
            "Owner": ["1970-01-01T00:00:00Z"]
        });
        let error = normalize_dates(&mut value, case_rules()).expect_err("wrong shape");
        assert!(matches!(
            error,
            ClientError::UnexpectedShape { ref pointer, expected: "an object" } if pointer == "/Owner"
        ));
        assert_eq!(error.to_string(), "expected an object at '/Owner'");
    }

    #[test]
    fn collects_dates_with_pointers() {
        let value = json!({
            "born": "1970-01-01T00:00:00Z",
            "Cases": [{ "opened": "2020-01-01T12:00:00Z" }]
        });
        let dates = collect_dates(&value, person_rules()).expect("dates collect");
        let pointers: Vec<_> = dates.iter().map(|(pointer, _)| pointer.as_str()).collect();
        assert_eq!(pointers, ["/born", "/Cases/0/opened"]);
        assert_eq!(format_date(&dates[1].1), "2020-01-01T12:00:00Z");
    }

    #[test]
    fn formatting_reproduces_utc_wire_values() {
        for wire in [
            "2014-10-01T00:00:00Z",
            "2023-06-15T13:45:30Z",
            "2023-06-15T13:45:30.250Z",
        ] {
            let parsed = parse_date(wire).expect("valid date");
            assert_eq!(format_date(&parsed), wire);
        }
    }

    #[test]
    fn offset_less_timestamps_are_utc() {
        let parsed = parse_date("2014-10-01T08:30:00").expect("valid date");
        assert_eq!(format_date(&parsed), "2014-10-01T08:30:00Z");
        assert!(parse_date("2014-10-01").is_none());
    }
}
