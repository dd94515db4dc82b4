//! Request validation.
//!
//! Each endpoint carries a declarative rule set evaluated against the raw
//! JSON body before any store access. All failures are reported at once,
//! one entry per failed field, and the whole batch comes back as HTTP 400.
//! The messages are part of the wire contract existing clients match on,
//! so they are kept verbatim, capitalization quirks included.

use serde_json::Value;

/// One per-field check.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Present, non-empty, and a JSON string.
    RequiredString {
        field: &'static str,
        missing: &'static str,
        not_string: &'static str,
    },
    /// Present and non-empty; any JSON shape accepted.
    Required {
        field: &'static str,
        missing: &'static str,
    },
    /// Absent (or null) is fine; anything else must be a string.
    OptionalString {
        field: &'static str,
        not_string: &'static str,
    },
}

/// Empty strings, zero, false, and null all count as "not provided".
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

impl Rule {
    fn apply(&self, body: &Value) -> Option<&'static str> {
        match *self {
            Rule::RequiredString {
                field,
                missing,
                not_string,
            } => match body.get(field) {
                None => Some(missing),
                Some(value) if is_falsy(value) => Some(missing),
                Some(Value::String(_)) => None,
                Some(_) => Some(not_string),
            },
            Rule::Required { field, missing } => match body.get(field) {
                None => Some(missing),
                Some(value) if is_falsy(value) => Some(missing),
                Some(_) => None,
            },
            Rule::OptionalString { field, not_string } => match body.get(field) {
                None | Some(Value::Null) => None,
                Some(Value::String(_)) => None,
                Some(_) => Some(not_string),
            },
        }
    }
}

/// Evaluate a rule set. Returns the failure messages in rule order;
/// an empty vec means the body passed.
pub fn check(rules: &[Rule], body: &Value) -> Vec<&'static str> {
    rules.iter().filter_map(|rule| rule.apply(body)).collect()
}

// ── Field extraction ────────────────────────────────────────────────

/// Borrow a field as a string, if it is one.
pub fn str_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}

/// Field as owned text: strings pass through and bare numbers are
/// stringified, since clients send ids both ways.
pub fn text_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

// ── Rule sets ───────────────────────────────────────────────────────

pub const USER_LOGIN: &[Rule] = &[
    Rule::RequiredString {
        field: "username",
        missing: "username is required",
        not_string: "username should be string",
    },
    Rule::RequiredString {
        field: "password",
        missing: "password is required",
        not_string: "password should be string",
    },
];

pub const USER_ADD: &[Rule] = &[
    Rule::RequiredString {
        field: "username",
        missing: "username is required",
        not_string: "username should be string",
    },
    Rule::RequiredString {
        field: "password",
        missing: "password is required",
        not_string: "password should be string",
    },
    Rule::RequiredString {
        field: "clientId",
        missing: "clientId is required",
        not_string: "clientId should be string",
    },
    Rule::OptionalString {
        field: "phone",
        not_string: "phone should be string",
    },
    Rule::OptionalString {
        field: "email",
        not_string: "email should be string",
    },
];

pub const USER_UPDATE: &[Rule] = &[
    Rule::Required {
        field: "id",
        missing: "user id is required",
    },
    Rule::RequiredString {
        field: "username",
        missing: "username is required",
        not_string: "username should be string",
    },
    Rule::OptionalString {
        field: "password",
        not_string: "password should be string",
    },
    Rule::OptionalString {
        field: "phone",
        not_string: "phone should be string",
    },
    Rule::OptionalString {
        field: "email",
        not_string: "email should be string",
    },
];

pub const USER_DELETE: &[Rule] = &[Rule::Required {
    field: "userId",
    missing: "userId is required",
}];

pub const USER_DELETE_BY_CLIENT: &[Rule] = &[Rule::Required {
    field: "clientId",
    missing: "clientId is required",
}];

pub const DEVICE_ADD: &[Rule] = &[
    Rule::RequiredString {
        field: "deviceName",
        missing: "deviceName is required",
        not_string: "deviceName should be string",
    },
    Rule::RequiredString {
        field: "model",
        missing: "Model is required",
        not_string: "Model should be string",
    },
    Rule::Required {
        field: "create_user",
        missing: "user is required",
    },
];

pub const DEVICE_UPDATE: &[Rule] = &[
    Rule::Required {
        field: "deviceName",
        missing: "deviceName is required",
    },
    Rule::Required {
        field: "model",
        missing: "model is required",
    },
    Rule::Required {
        field: "update_user",
        missing: "update user is required",
    },
];

pub const DEVICE_DELETE: &[Rule] = &[Rule::Required {
    field: "id",
    missing: "device id is required",
}];

pub const DEVICE_GET: &[Rule] = &[Rule::Required {
    field: "id",
    missing: "device id is required",
}];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_login_body_passes() {
        let body = json!({"username": "alice", "password": "Secret1@"});
        assert!(check(USER_LOGIN, &body).is_empty());
    }

    #[test]
    fn missing_fields_all_reported_at_once() {
        let errors = check(USER_LOGIN, &json!({}));
        assert_eq!(errors, vec!["username is required", "password is required"]);
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let body = json!({"username": "", "password": "Secret1@"});
        assert_eq!(check(USER_LOGIN, &body), vec!["username is required"]);
    }

    #[test]
    fn non_string_reports_one_type_error() {
        let body = json!({"username": 42, "password": "Secret1@"});
        assert_eq!(check(USER_LOGIN, &body), vec!["username should be string"]);
    }

    #[test]
    fn zero_and_false_count_as_missing() {
        let body = json!({"username": 0, "password": false});
        assert_eq!(
            check(USER_LOGIN, &body),
            vec!["username is required", "password is required"]
        );
    }

    #[test]
    fn optional_fields_skip_when_absent() {
        let body = json!({
            "username": "alice",
            "password": "Secret1@",
            "clientId": "1001"
        });
        assert!(check(USER_ADD, &body).is_empty());
    }

    #[test]
    fn optional_fields_are_type_checked_when_present() {
        let body = json!({
            "username": "alice",
            "password": "Secret1@",
            "clientId": "1001",
            "phone": 5550100
        });
        assert_eq!(check(USER_ADD, &body), vec!["phone should be string"]);
    }

    #[test]
    fn device_add_messages_are_preserved() {
        let errors = check(DEVICE_ADD, &json!({}));
        assert_eq!(
            errors,
            vec!["deviceName is required", "Model is required", "user is required"]
        );
    }

    #[test]
    fn device_update_messages_are_preserved() {
        let errors = check(DEVICE_UPDATE, &json!({}));
        assert_eq!(
            errors,
            vec![
                "deviceName is required",
                "model is required",
                "update user is required"
            ]
        );
    }

    #[test]
    fn required_accepts_any_nonempty_shape() {
        let body = json!({
            "deviceName": "edge-01",
            "model": "rpi4",
            "create_user": 1234
        });
        assert!(check(DEVICE_ADD, &body).is_empty());
    }

    #[test]
    fn non_object_body_fails_every_required_rule() {
        let errors = check(USER_LOGIN, &json!(["not", "an", "object"]));
        assert_eq!(errors, vec!["username is required", "password is required"]);
    }

    #[test]
    fn text_field_coerces_numbers() {
        let body = json!({"id": 42, "name": "edge", "flag": true});
        assert_eq!(text_field(&body, "id").as_deref(), Some("42"));
        assert_eq!(text_field(&body, "name").as_deref(), Some("edge"));
        assert_eq!(text_field(&body, "flag"), None);
        assert_eq!(text_field(&body, "absent"), None);
    }

    #[test]
    fn str_field_borrows_strings_only() {
        let body = json!({"id": 42, "name": "edge"});
        assert_eq!(str_field(&body, "name"), Some("edge"));
        assert_eq!(str_field(&body, "id"), None);
    }
}
