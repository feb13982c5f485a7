//! Configuration validation support.

use crate::error::ValidationError;

/// Trait for configuration validation.
///
/// Implemented by every configuration type that is persisted or loaded from
/// the environment. A value failing validation is never applied: the store
/// keeps serving the previous one.
///
/// # Examples
///
/// ```rust
/// use stockwatch::core::Validate;
/// use stockwatch::error::ValidationError;
///
/// struct Poll {
///     minutes: u64,
/// }
///
/// impl Validate for Poll {
///     fn validate(&self) -> Result<(), ValidationError> {
///         if self.minutes == 0 {
///             return Err(ValidationError::invalid_field(
///                 "minutes",
///                 "must be greater than 0",
///             ));
///         }
///         Ok(())
///     }
/// }
///
/// assert!(Poll { minutes: 0 }.validate().is_err());
/// ```
pub trait Validate {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Should return a `ValidationError` describing what validation failed.
    fn validate(&self) -> Result<(), ValidationError>;
}
