//! JSON Schema validation for configuration files.
//!
//! The source registry can be supplied as a JSON file at start-up. It is
//! checked against an embedded JSON Schema (Draft 7) before deserialization,
//! so operators get every violation at once instead of the first serde error.
//!
//! # Embedded Schemas
//!
//! Schemas are embedded at compile time from the `schemas/` directory:
//! - `source-registry.json`
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use showstats::validation::validate_source_registry;
//!
//! let registry = json!({
//!     "2023": {
//!         "source_id": "17_GLEJvCUgUiFIAltzSIGDpXULFTCPih9kca5SGywd4",
//!         "sub_selector": "581575423",
//!         "program_column_hint": "Program Name"
//!     }
//! });
//! assert!(validate_source_registry(&registry).is_ok());
//! ```

use serde_json::Value;

const SOURCE_REGISTRY_SCHEMA: &str = include_str!("../../schemas/source-registry.json");

/// Validate a JSON value against a JSON schema.
///
/// # Returns
/// * `Ok(())` when valid
/// * `Err(Vec<String>)` with every violation otherwise
///
/// # Example
/// ```ignore
/// use serde_json::json;
/// use showstats::validation::validate;
///
/// let schema = json!({
///     "type": "object",
///     "required": ["name"],
///     "properties": {
///         "name": { "type": "string" }
///     }
/// });
///
/// assert!(validate(&schema, &json!({ "name": "test" })).is_ok());
/// assert!(validate(&schema, &json!({ "age": 42 })).is_err());
/// ```
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a source registry document.
pub fn validate_source_registry(data: &Value) -> Result<(), Vec<String>> {
    let schema: Value = serde_json::from_str(SOURCE_REGISTRY_SCHEMA)
        .map_err(|e| vec![format!("Invalid embedded registry schema: {}", e)])?;
    validate(&schema, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_registry() {
        let registry = json!({
            "2022": {
                "source_id": "sheet-a",
                "sub_selector": "1807168814",
                "program_column_hint": "Section Name"
            },
            "2023": {
                "source_id": "sheet-b",
                "sub_selector": "Listeners 2023",
                "program_column_hint": "Program Name"
            }
        });
        assert!(validate_source_registry(&registry).is_ok());
    }

    #[test]
    fn test_empty_registry_is_valid() {
        assert!(validate_source_registry(&json!({})).is_ok());
    }

    #[test]
    fn test_blank_hint_rejected() {
        let registry = json!({
            "2023": { "source_id": "s", "sub_selector": "1", "program_column_hint": "   " }
        });
        let errors = validate_source_registry(&registry).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_non_year_key_rejected() {
        let registry = json!({
            "latest": { "source_id": "s", "sub_selector": "1", "program_column_hint": "Program Name" }
        });
        assert!(validate_source_registry(&registry).is_err());
    }

    #[test]
    fn test_missing_field_reported() {
        let registry = json!({ "2024": { "source_id": "s" } });
        let errors = validate_source_registry(&registry).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("sub_selector")));
    }

    #[test]
    fn test_generic_validate() {
        let schema = json!({ "type": "object", "required": ["name"] });
        assert!(validate(&schema, &json!({ "name": "x" })).is_ok());
        assert_eq!(validate(&schema, &json!({})).unwrap_err().len(), 1);
    }
}
