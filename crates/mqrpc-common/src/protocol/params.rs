//! Param Parser
//!
//! Strict conversion of the opaque `data` payload field into typed values.
//! Every failure is a `BadRequest` so callers can bubble it to the bus
//! boundary unchanged.

use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

/// Parses `data` as a canonical base-10 `i16`.
pub fn to_short(data: &str) -> AppResult<i16> {
    parse_integer(data, "a 16-bit integer")
}

/// Parses `data` as a canonical base-10 `i32`.
pub fn to_int(data: &str) -> AppResult<i32> {
    parse_integer(data, "a 32-bit integer")
}

/// Parses `data` as a canonical base-10 `i64`.
pub fn to_long(data: &str) -> AppResult<i64> {
    parse_integer(data, "a 64-bit integer")
}

fn parse_integer<T: std::str::FromStr>(data: &str, expected: &str) -> AppResult<T> {
    data.parse().map_err(|_| {
        AppError::bad_request("PARSE_ERROR", format!("Expected {expected}."))
            .with_details(format!("got {data:?}"))
    })
}

/// Decodes `data` as JSON into `T`.
///
/// Fails with `DATA_INVALID` on decode failure or when the decoded value is
/// JSON `null`.
pub fn to_object<T: DeserializeOwned>(data: &str) -> AppResult<T> {
    to_nullable_object(data)?
        .ok_or_else(|| AppError::bad_request("DATA_INVALID", "Data must not be null."))
}

/// Decodes `data` as JSON into `T`, treating JSON `null` as absent.
pub fn to_nullable_object<T: DeserializeOwned>(data: &str) -> AppResult<Option<T>> {
    serde_json::from_str(data).map_err(|e| {
        AppError::bad_request("DATA_INVALID", "Data is not valid JSON.")
            .with_details(e.to_string())
    })
}

/// Decodes `data` as a JSON sequence of `T`.
///
/// Fails with `DATA_INVALID` on decode failure or a null sequence, and with
/// `DATA_EMPTY` when `require_non_empty` is set and the sequence is empty.
pub fn to_list_object<T: DeserializeOwned>(data: &str, require_non_empty: bool) -> AppResult<Vec<T>> {
    let list: Vec<T> = to_object(data)?;
    if require_non_empty && list.is_empty() {
        return Err(AppError::bad_request("DATA_EMPTY", "Data must not be empty."));
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
    }

    #[test]
    fn test_integer_parsing() {
        assert_eq!(to_short("-5").unwrap(), -5i16);
        assert_eq!(to_int("42").unwrap(), 42);
        assert_eq!(to_long("9000000000").unwrap(), 9_000_000_000i64);
    }

    #[test]
    fn test_integer_rejects_non_canonical_input() {
        for bad in ["", "abc", "1.5", "0x10", " 7"] {
            let err = to_int(bad).unwrap_err();
            assert_eq!(err.code, "PARSE_ERROR", "input {bad:?} should fail");
            assert_eq!(err.status(), 400);
        }
    }

    #[test]
    fn test_integer_rejects_out_of_range() {
        assert_eq!(to_short("40000").unwrap_err().code, "PARSE_ERROR");
        assert_eq!(to_int("3000000000").unwrap_err().code, "PARSE_ERROR");
    }

    #[test]
    fn test_to_object() {
        let user: User = to_object(r#"{"name":"Ada"}"#).unwrap();
        assert_eq!(user.name, "Ada");
    }

    #[test]
    fn test_to_object_rejects_null_and_garbage() {
        assert_eq!(to_object::<User>("null").unwrap_err().code, "DATA_INVALID");
        assert_eq!(to_object::<User>("{").unwrap_err().code, "DATA_INVALID");
    }

    #[test]
    fn test_to_nullable_object_allows_null() {
        assert_eq!(to_nullable_object::<User>("null").unwrap(), None);
        let user = to_nullable_object::<User>(r#"{"name":"Ada"}"#).unwrap();
        assert_eq!(user, Some(User { name: "Ada".into() }));
    }

    #[test]
    fn test_to_list_object() {
        let users: Vec<User> = to_list_object(r#"[{"name":"Ada"}]"#, true).unwrap();
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn test_to_list_object_empty_policy() {
        let users: Vec<User> = to_list_object("[]", false).unwrap();
        assert!(users.is_empty());
        assert_eq!(
            to_list_object::<User>("[]", true).unwrap_err().code,
            "DATA_EMPTY"
        );
    }

    #[test]
    fn test_to_list_object_rejects_null() {
        assert_eq!(
            to_list_object::<User>("null", false).unwrap_err().code,
            "DATA_INVALID"
        );
    }
}
