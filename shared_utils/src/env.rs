use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// This is a thin wrapper around `std::env::var` that provides a more
/// ergonomic and specific error type for missing variables.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    std::env::var(name).map_err(|_| MissingEnvVarError(name.to_string()))
}

/// Reads an environment variable, falling back to the first name in `aliases`
/// that is set.
///
/// Useful when a credential has been renamed upstream and both the old and the
/// new variable name are in circulation.
pub fn get_env_var_any(names: &[&str]) -> Result<String, MissingEnvVarError> {
    for name in names {
        if let Ok(value) = std::env::var(name) {
            return Ok(value);
        }
    }
    Err(MissingEnvVarError(names.join(" / ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_var_reports_its_name() {
        let err = get_env_var("DATASET_SYNC_DEFINITELY_NOT_SET").unwrap_err();
        assert!(err.to_string().contains("DATASET_SYNC_DEFINITELY_NOT_SET"));
    }

    #[test]
    fn any_falls_through_to_error_listing_all_names() {
        let err = get_env_var_any(&["DS_NOPE_A", "DS_NOPE_B"]).unwrap_err();
        assert!(err.to_string().contains("DS_NOPE_A"));
        assert!(err.to_string().contains("DS_NOPE_B"));
    }

    #[test]
    fn present_var_is_returned() {
        // PATH is set in any environment these tests run in.
        assert!(get_env_var("PATH").is_ok());
        assert!(get_env_var_any(&["DS_NOPE_A", "PATH"]).is_ok());
    }
}
