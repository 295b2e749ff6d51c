use std::env;
use std::fmt::Display;
use std::str::FromStr;

use crate::{AppError, AppResult};

/// Reads a variable that must be present.
pub fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

/// Reads a variable, treating blank values as unset.
#[must_use]
pub fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Parses a variable, falling back to `default` when it is unset or blank.
pub fn parse_env<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match optional_env(name) {
        Some(value) => parse_value(name, value.as_str()),
        None => Ok(default),
    }
}

fn parse_value<T>(name: &str, value: &str) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse::<T>()
        .map_err(|error| AppError::Validation(format!("invalid {name} value '{value}': {error}")))
}

#[cfg(test)]
mod tests {
    use super::parse_value;
    use crate::AppError;

    #[test]
    fn parse_error_names_the_variable() {
        let result = parse_value::<u32>("AUDIT_LEASE_SECONDS", "soon");
        assert!(matches!(
            result,
            Err(AppError::Validation(message)) if message.starts_with("invalid AUDIT_LEASE_SECONDS value 'soon'")
        ));
    }

    #[test]
    fn parses_typed_values() {
        assert!(matches!(parse_value::<u16>("DAYS", "365"), Ok(365)));
        assert!(parse_value::<u16>("DAYS", "70000").is_err());
    }
}
