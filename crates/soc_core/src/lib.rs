pub mod cache;
pub mod db;
pub mod demo;
pub mod domain;
pub mod error;
pub mod repo;
pub mod service;
pub mod validate;
pub mod versions;
pub mod workflow;
pub mod workspace;

#[cfg(test)]
mod tests {
    use super::error::AppError;

    #[test]
    fn conflict_errors_are_marked_retryable() {
        let err = AppError::conflict("version race");
        assert_eq!(err.code, "CONFLICT");
        assert!(err.retryable);

        let err = AppError::not_found("missing");
        assert_eq!(err.code, "NOT_FOUND");
        assert!(!err.retryable);
    }
}
