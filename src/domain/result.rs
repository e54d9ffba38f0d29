//! Result type alias for Marketflow

use super::errors::MarketflowError;

/// Result type alias for Marketflow operations
///
/// # Examples
///
/// ```
/// use marketflow::domain::result::Result;
/// use marketflow::domain::errors::MarketflowError;
///
/// fn failing_function() -> Result<()> {
///     Err(MarketflowError::Validation("Invalid input".to_string()))
/// }
///
/// assert!(failing_function().is_err());
/// ```
pub type Result<T> = std::result::Result<T, MarketflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
