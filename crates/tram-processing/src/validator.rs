use tram_core::{AppError, FieldErrors};

/// Upload validation errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Empty file")]
    EmptyFile,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::EmptyFile => {
                AppError::Validation(FieldErrors::single("file", "The submitted file is empty."))
            }
            ValidationError::FileTooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
        }
    }
}

/// Size limits applied to every upload before it is routed.
#[derive(Debug, Clone, Copy)]
pub struct UploadValidator {
    max_file_size: usize,
}

impl UploadValidator {
    pub fn new(max_file_size: usize) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tram_core::ErrorMetadata;

    #[test]
    fn test_validate_file_size() {
        let validator = UploadValidator::new(10);
        assert!(validator.validate_file_size(10).is_ok());
        assert_eq!(
            validator.validate_file_size(0),
            Err(ValidationError::EmptyFile)
        );
        assert_eq!(
            validator.validate_file_size(11),
            Err(ValidationError::FileTooLarge { size: 11, max: 10 })
        );
    }

    #[test]
    fn test_errors_map_to_client_errors() {
        let empty: AppError = ValidationError::EmptyFile.into();
        assert_eq!(empty.http_status_code(), 400);
        assert!(empty.field_errors().unwrap().get("file").is_some());

        let large: AppError = ValidationError::FileTooLarge { size: 2, max: 1 }.into();
        assert_eq!(large.http_status_code(), 413);
    }
}
