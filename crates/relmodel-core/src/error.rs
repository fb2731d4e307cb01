//! Error types for relmodel operations.

use std::fmt;

/// The primary error type for all relmodel operations.
///
/// Metadata and validation errors are raised at the call that introduced the
/// bad input; persistence errors (`FailedToInsert`, `FailedToUpdate`,
/// `FailedToDelete`) are raised by `flush()` and abort the remaining phases.
#[derive(Debug)]
pub enum Error {
    /// A property name does not exist on the model's declared columns.
    PropertyDoesNotExist {
        property: String,
        model: &'static str,
    },
    /// A column declared a type outside the supported whitelist.
    UnknownColumnType {
        declared: String,
        model: &'static str,
    },
    /// A required table-level declaration is missing.
    RequiredAnnotationMissing {
        annotation: &'static str,
        model: &'static str,
    },
    /// A declared repository or model name has no registration.
    RepositoryClassNotDefined { name: String, model: String },
    /// A declared index is missing its name or column list.
    IncompleteIndex { model: &'static str },
    /// A many-to-one declaration is missing its target model or property.
    IncompleteManyToOne {
        model: &'static str,
        property: &'static str,
    },
    /// A comparison, connective, or sort direction outside the fixed sets.
    InvalidOperator { operator: String },
    /// The property is not declared as a many-to-one reference.
    NotManyToOneProperty { property: String },
    /// A related object is not an instance of the declared target model.
    NotInstanceOfExpectedClass {
        expected: String,
        actual: &'static str,
    },
    /// The table refuses schema updates.
    AllowSchemaUpdateIsFalse { model: &'static str },
    /// The table refuses being dropped.
    AllowDropIsFalse { model: &'static str },
    /// A batched insert affected an unexpected number of rows.
    FailedToInsert { table: String },
    /// A batched update affected zero rows.
    FailedToUpdate { table: String },
    /// A batched delete affected zero rows.
    FailedToDelete { table: String },
    /// A result accessor was called before `build_query()`.
    NoQueryBuilt,
    /// A value could not be converted to the field's Rust type.
    Conversion {
        expected: &'static str,
        actual: String,
    },
    /// Failure surfaced by the database adapter.
    Adapter { message: String },
}

impl Error {
    /// Shorthand for an adapter-layer failure.
    pub fn adapter(message: impl Into<String>) -> Self {
        Error::Adapter {
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PropertyDoesNotExist { property, model } => {
                write!(f, "property '{}' does not exist on model {}", property, model)
            }
            Error::UnknownColumnType { declared, model } => {
                write!(f, "unknown column type '{}' on model {}", declared, model)
            }
            Error::RequiredAnnotationMissing { annotation, model } => {
                write!(
                    f,
                    "required table declaration '{}' missing on model {}",
                    annotation, model
                )
            }
            Error::RepositoryClassNotDefined { name, model } => {
                write!(f, "repository '{}' is not defined (model {})", name, model)
            }
            Error::IncompleteIndex { model } => {
                write!(f, "index on model {} is missing a name or column list", model)
            }
            Error::IncompleteManyToOne { model, property } => {
                write!(
                    f,
                    "many-to-one on {}.{} is missing its target model or property",
                    model, property
                )
            }
            Error::InvalidOperator { operator } => {
                write!(f, "invalid operator '{}'", operator)
            }
            Error::NotManyToOneProperty { property } => {
                write!(f, "property '{}' is not a many-to-one reference", property)
            }
            Error::NotInstanceOfExpectedClass { expected, actual } => {
                write!(f, "expected an instance of {}, got {}", expected, actual)
            }
            Error::AllowSchemaUpdateIsFalse { model } => {
                write!(f, "schema updates are not allowed for model {}", model)
            }
            Error::AllowDropIsFalse { model } => {
                write!(f, "dropping the table is not allowed for model {}", model)
            }
            Error::FailedToInsert { table } => {
                write!(f, "failed to insert rows into {}", table)
            }
            Error::FailedToUpdate { table } => {
                write!(f, "failed to update rows in {}", table)
            }
            Error::FailedToDelete { table } => {
                write!(f, "failed to delete rows from {}", table)
            }
            Error::NoQueryBuilt => write!(f, "no query built; call build_query() first"),
            Error::Conversion { expected, actual } => {
                write!(f, "cannot convert {} to {}", actual, expected)
            }
            Error::Adapter { message } => write!(f, "adapter error: {}", message),
        }
    }
}

impl std::error::Error for Error {}

/// Result type alias for relmodel operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = Error::PropertyDoesNotExist {
            property: "nickname".to_string(),
            model: "Hero",
        };
        assert_eq!(
            err.to_string(),
            "property 'nickname' does not exist on model Hero"
        );

        let err = Error::RequiredAnnotationMissing {
            annotation: "allow_schema_update",
            model: "Baz",
        };
        assert!(err.to_string().contains("allow_schema_update"));
    }

    #[test]
    fn adapter_shorthand() {
        let err = Error::adapter("connection refused");
        assert_eq!(err.to_string(), "adapter error: connection refused");
    }
}
