//! Validation helpers for DTOs.

use validator::ValidationError;

/// Length of a share code.
pub const SHARE_CODE_LENGTH: usize = 8;

/// Validates that a share code is exactly 8 ASCII letters or digits.
///
/// # Examples
///
/// ```ignore
/// validate_share_code("aB3dE5fG") // Ok
/// validate_share_code("aB3dE5f")  // Err - too short
/// validate_share_code("aB3dE5f!") // Err - punctuation
/// ```
pub fn validate_share_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != SHARE_CODE_LENGTH {
        let mut err = ValidationError::new("share_code_length");
        err.message = Some(
            format!(
                "Share code must be exactly {SHARE_CODE_LENGTH} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("share_code_format");
        err.message = Some("Share code must contain only letters and digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that every player name has visible characters.
pub fn validate_player_names(names: &[String]) -> Result<(), ValidationError> {
    if let Some(seat) = names.iter().position(|name| name.trim().is_empty()) {
        let mut err = ValidationError::new("player_name_empty");
        err.message = Some(format!("Player name at seat {seat} must not be empty").into());
        return Err(err);
    }
    Ok(())
}
