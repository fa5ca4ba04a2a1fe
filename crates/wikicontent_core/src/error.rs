use thiserror::Error;

use crate::model::ModelTag;

pub type ContentResult<T> = std::result::Result<T, ContentError>;

/// Failures raised by content operations.
///
/// Models that lack redirects, sections or HTML rendering do not report
/// that through this type; those are sentinel return values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("content model mismatch: expected '{expected}', found '{found}'")]
    ModelMismatch { expected: ModelTag, found: ModelTag },

    #[error("format '{format}' is not supported by content model '{model}'")]
    UnsupportedFormat { model: ModelTag, format: String },

    #[error("no content handler registered for model '{model}'")]
    UnknownModel { model: ModelTag },

    #[error("content model '{model}' renders only through parser output")]
    NoDirectHtml { model: ModelTag },

    #[error("render failed: {message}")]
    Render { message: String },

    #[error("parser cache storage failed: {message}")]
    Storage { message: String },
}

impl ContentError {
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// Fails with [`ContentError::ModelMismatch`] unless both tags are equal.
pub fn check_model(expected: &ModelTag, found: &ModelTag) -> ContentResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(ContentError::ModelMismatch {
            expected: expected.clone(),
            found: found.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_model_accepts_equal_tags() {
        check_model(&ModelTag::wikitext(), &ModelTag::wikitext()).expect("same model");
    }

    #[test]
    fn check_model_reports_both_tags() {
        let error = check_model(&ModelTag::wikitext(), &ModelTag::javascript())
            .expect_err("must mismatch");
        assert_eq!(
            error,
            ContentError::ModelMismatch {
                expected: ModelTag::wikitext(),
                found: ModelTag::javascript(),
            }
        );
        assert_eq!(
            error.to_string(),
            "content model mismatch: expected 'wikitext', found 'javascript'"
        );
    }
}
