use std::collections::HashSet;
use thiserror::Error;

use crate::config::ApiLimits;

#[derive(Debug, Error)]
pub enum QueueValidationError {
    #[error("file name must not be empty")]
    EmptyFileName,
    #[error("file name exceeds {0} bytes")]
    FileNameTooLong(usize),
    #[error("file name must not contain path separators")]
    FileNameWithPath,
    #[error("at least one variant must be selected")]
    NoVariantsSelected,
    #[error("variant selection exceeds limit of {0}")]
    TooManyVariants(usize),
    #[error("variant selector '{0}' is invalid")]
    InvalidVariantSelector(String),
    #[error("variant selectors must be unique")]
    DuplicateVariantSelectors,
}

/// Validate a queue request before an item is constructed. An item with
/// zero selected variants cannot be queued.
pub fn validate_queue_request(
    file_name: &str,
    selectors: &[String],
    limits: &ApiLimits,
) -> Result<(), QueueValidationError> {
    if file_name.trim().is_empty() {
        return Err(QueueValidationError::EmptyFileName);
    }
    if file_name.len() > limits.max_file_name_bytes {
        return Err(QueueValidationError::FileNameTooLong(
            limits.max_file_name_bytes,
        ));
    }
    if file_name.contains('/') || file_name.contains('\\') || file_name.contains('\0') {
        return Err(QueueValidationError::FileNameWithPath);
    }

    if selectors.is_empty() {
        return Err(QueueValidationError::NoVariantsSelected);
    }
    if selectors.len() > limits.max_variants_per_item {
        return Err(QueueValidationError::TooManyVariants(
            limits.max_variants_per_item,
        ));
    }

    let mut seen = HashSet::new();
    for selector in selectors {
        if selector.trim().is_empty() || selector.len() > 64 {
            return Err(QueueValidationError::InvalidVariantSelector(
                selector.clone(),
            ));
        }
        if !seen.insert(selector.as_str()) {
            return Err(QueueValidationError::DuplicateVariantSelectors);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ApiLimits {
        ApiLimits::default()
    }

    fn selectors(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn accepts_valid_request() {
        assert!(
            validate_queue_request("photo.jpg", &selectors(&["adobe", "shutterstock"]), &limits())
                .is_ok()
        );
    }

    #[test]
    fn rejects_empty_file_name() {
        let err = validate_queue_request("  ", &selectors(&["adobe"]), &limits()).unwrap_err();
        assert!(matches!(err, QueueValidationError::EmptyFileName));
    }

    #[test]
    fn rejects_path_separators() {
        let err =
            validate_queue_request("../etc/passwd", &selectors(&["adobe"]), &limits()).unwrap_err();
        assert!(matches!(err, QueueValidationError::FileNameWithPath));
    }

    #[test]
    fn rejects_zero_variants() {
        let err = validate_queue_request("photo.jpg", &[], &limits()).unwrap_err();
        assert!(matches!(err, QueueValidationError::NoVariantsSelected));
    }

    #[test]
    fn rejects_too_many_variants() {
        let many: Vec<String> = (0..20).map(|i| format!("m{i}")).collect();
        let err = validate_queue_request("photo.jpg", &many, &limits()).unwrap_err();
        assert!(matches!(err, QueueValidationError::TooManyVariants(_)));
    }

    #[test]
    fn rejects_duplicate_variants() {
        let err = validate_queue_request("photo.jpg", &selectors(&["adobe", "adobe"]), &limits())
            .unwrap_err();
        assert!(matches!(err, QueueValidationError::DuplicateVariantSelectors));
    }

    #[test]
    fn rejects_long_file_name() {
        let long = "a".repeat(300) + ".jpg";
        let err = validate_queue_request(&long, &selectors(&["adobe"]), &limits()).unwrap_err();
        assert!(matches!(err, QueueValidationError::FileNameTooLong(_)));
    }
}
