use inference_providers::ChatMessage;

use super::ports::{InferenceRequest, Language, Level, Modality, ValidationError};

/// Check the raw request values in a fixed order and stop at the first failure
///
/// Order: level, language, modality, messages. A value that is absent counts the
/// same as one out of range.
pub fn validate(
    level_id: Option<i64>,
    language: Option<&str>,
    modality: Option<i64>,
    messages: Vec<ChatMessage>,
) -> Result<InferenceRequest, ValidationError> {
    let level = level_id
        .and_then(Level::new)
        .ok_or(ValidationError::InvalidLevel)?;
    let language = language
        .and_then(Language::from_code)
        .ok_or(ValidationError::InvalidLanguage)?;
    let modality = modality
        .and_then(Modality::from_id)
        .ok_or(ValidationError::InvalidModality)?;

    if messages.is_empty() {
        return Err(ValidationError::EmptyMessages);
    }

    Ok(InferenceRequest {
        level,
        language,
        modality,
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_message() -> Vec<ChatMessage> {
        vec![ChatMessage::user("<activities>asked-help</activities>")]
    }

    #[test]
    fn test_valid_request() {
        let request = validate(Some(3), Some("FR"), Some(2), one_message()).unwrap();
        assert_eq!(request.level.get(), 3);
        assert_eq!(request.language, Language::Fr);
        assert_eq!(request.modality, Modality::Guided);
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn test_level_bounds() {
        for level in [1, 8] {
            assert!(validate(Some(level), Some("EN"), Some(1), one_message()).is_ok());
        }
        for level in [0, 9, -1, 256 + 3] {
            assert_eq!(
                validate(Some(level), Some("EN"), Some(1), one_message()),
                Err(ValidationError::InvalidLevel)
            );
        }
        assert_eq!(
            validate(None, Some("EN"), Some(1), one_message()),
            Err(ValidationError::InvalidLevel)
        );
    }

    #[test]
    fn test_language_is_case_sensitive() {
        for language in [None, Some("en"), Some("DE"), Some("")] {
            assert_eq!(
                validate(Some(1), language, Some(1), one_message()),
                Err(ValidationError::InvalidLanguage)
            );
        }
    }

    #[test]
    fn test_modality_values() {
        for modality in [None, Some(0), Some(3)] {
            assert_eq!(
                validate(Some(1), Some("EN"), modality, one_message()),
                Err(ValidationError::InvalidModality)
            );
        }
    }

    #[test]
    fn test_empty_messages() {
        assert_eq!(
            validate(Some(1), Some("EN"), Some(1), vec![]),
            Err(ValidationError::EmptyMessages)
        );
    }

    #[test]
    fn test_first_failure_wins() {
        assert_eq!(
            validate(Some(99), Some("XX"), Some(7), vec![]),
            Err(ValidationError::InvalidLevel)
        );
        assert_eq!(
            validate(Some(2), Some("XX"), Some(7), vec![]),
            Err(ValidationError::InvalidLanguage)
        );
        assert_eq!(
            validate(Some(2), Some("EN"), Some(7), vec![]),
            Err(ValidationError::InvalidModality)
        );
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(ValidationError::InvalidLevel.to_string(), "Invalid level_id");
        assert_eq!(ValidationError::InvalidLanguage.to_string(), "Invalid language");
        assert_eq!(ValidationError::InvalidModality.to_string(), "Invalid modality");
        assert_eq!(
            ValidationError::EmptyMessages.to_string(),
            "Messages array is empty"
        );
    }
}
