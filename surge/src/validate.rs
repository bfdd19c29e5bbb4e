//! Reply validators shared by load phases and conformance steps.
use crate::error::ValidationError;
use surge_core::{extract_objects, Value};

/// Accepts a map whose `status` is `"OK"`.
pub fn expect_ok(res: &Value) -> Result<(), ValidationError> {
    match res.get("status") {
        Some(Value::String(status)) if status == "OK" => Ok(()),
        _ => Err(ValidationError::NotOk(res.to_string())),
    }
}

/// Accepts anything that is not an OK status map.
pub fn expect_error(res: &Value) -> Result<(), ValidationError> {
    match res.get("status") {
        Some(Value::String(status)) if status == "OK" => Err(ValidationError::UnexpectedOk),
        _ => Ok(()),
    }
}

/// Accepts a well-formed query reply, whatever the number of objects.
pub fn expect_objects(res: &Value) -> Result<(), ValidationError> {
    extract_objects(res)?;
    Ok(())
}

pub fn expect_count(
    n: usize,
) -> impl Fn(&Value) -> Result<(), ValidationError> + Send + Sync + Clone + 'static {
    move |res| {
        let actual = extract_objects(res)?.len();
        if actual != n {
            return Err(ValidationError::Count {
                expected: n,
                actual,
            });
        }
        Ok(())
    }
}

/// Checks the `entity` of the first returned object.
pub fn expect_entity(
    expected: &str,
) -> impl Fn(&Value) -> Result<(), ValidationError> + Send + Sync + Clone + 'static {
    let expected = expected.to_string();
    move |res| {
        let objects = extract_objects(res)?;
        let first = objects.first().ok_or(ValidationError::NoObjects)?;
        let actual = first.get("entity").cloned().unwrap_or_default().to_string();
        if actual != expected {
            return Err(ValidationError::Entity {
                expected: expected.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// Checks `data.next_cursor`, rendered as text; a missing cursor reads `nil`.
pub fn expect_next_cursor(
    expected: &str,
) -> impl Fn(&Value) -> Result<(), ValidationError> + Send + Sync + Clone + 'static {
    let expected = expected.to_string();
    move |res| {
        let data = res.field("data")?.as_map()?;
        let actual = data.get("next_cursor").cloned().unwrap_or_default().to_string();
        if actual != expected {
            return Err(ValidationError::NextCursor {
                expected: expected.clone(),
                actual,
            });
        }
        Ok(())
    }
}
