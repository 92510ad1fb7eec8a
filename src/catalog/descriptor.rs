//! Macro descriptors
//!
//! A descriptor is the parsed, cached metadata record for one macro:
//! name, ordered parameters with their declared types, return type, kind.
//! Descriptors are immutable once built and replaced wholesale on cache
//! refresh.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kind of macro: single value or row set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroKind {
    Scalar,
    Table,
}

impl MacroKind {
    /// String tag used in responses and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            MacroKind::Scalar => "scalar",
            MacroKind::Table => "table",
        }
    }
}

/// Identifier pattern for macro names. This is the sole injection-safety
/// boundary for the name itself; values are always driver-bound.
pub fn is_valid_identifier(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    });
    !name.is_empty() && name.len() <= 100 && pattern.is_match(name)
}

/// Metadata for one discovered macro
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroDescriptor {
    /// Macro name, matches `^[A-Za-z][A-Za-z0-9_]*$`
    pub name: String,

    /// Ordered parameter names
    pub parameters: Vec<String>,

    /// Declared type tags, index-aligned with `parameters`
    pub parameter_types: Vec<String>,

    /// Declared return type as reported by the catalog
    pub return_type: String,

    /// Scalar or table
    pub kind: MacroKind,
}

impl MacroDescriptor {
    /// Build a descriptor from one catalog row. `parameter_types` is padded
    /// with UNKNOWN so it is always index-aligned with `parameters`.
    ///
    /// Classification: the catalog's own function_type wins; for plain
    /// macros the definition text is sniffed for TABLE/SELECT tokens. The
    /// sniffing is a heuristic, not a parse -- a scalar body containing the
    /// word SELECT in a string literal is misclassified (known limitation).
    pub fn from_catalog_row(
        name: String,
        parameters: Vec<String>,
        mut parameter_types: Vec<String>,
        return_type: Option<String>,
        definition: Option<String>,
        function_type: Option<String>,
    ) -> Self {
        let return_type = return_type.unwrap_or_else(|| "UNKNOWN".to_string());
        let definition = definition.unwrap_or_default();

        parameter_types.resize(parameters.len(), "UNKNOWN".to_string());
        parameter_types.truncate(parameters.len());

        let kind = if function_type.as_deref() == Some("table_macro") {
            MacroKind::Table
        } else {
            let definition_upper = definition.to_uppercase();
            let looks_tabular = definition_upper.contains("TABLE")
                || return_type.to_uppercase().starts_with("TABLE")
                || definition_upper.contains("SELECT");
            if looks_tabular {
                MacroKind::Table
            } else {
                MacroKind::Scalar
            }
        };

        Self {
            name,
            parameters,
            parameter_types,
            return_type,
            kind,
        }
    }

    /// Declared parameter count
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Declared type tag for a parameter name, if declared
    pub fn type_of(&self, parameter: &str) -> Option<&str> {
        self.parameters
            .iter()
            .position(|p| p == parameter)
            .map(|i| self.parameter_types[i].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_pattern() {
        assert!(is_valid_identifier("greet"));
        assert!(is_valid_identifier("employees_by_department"));
        assert!(is_valid_identifier("Macro2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("_hidden"));
        assert!(!is_valid_identifier("drop table; --"));
        assert!(!is_valid_identifier("greet(1)"));
        assert!(!is_valid_identifier(&"a".repeat(101)));
    }

    #[test]
    fn test_table_macro_classified_by_function_type() {
        let desc = MacroDescriptor::from_catalog_row(
            "emps".to_string(),
            vec!["dept".to_string()],
            vec!["VARCHAR".to_string()],
            None,
            Some("x + 1".to_string()),
            Some("table_macro".to_string()),
        );
        assert_eq!(desc.kind, MacroKind::Table);
    }

    #[test]
    fn test_scalar_macro_without_keywords() {
        let desc = MacroDescriptor::from_catalog_row(
            "add_one".to_string(),
            vec!["x".to_string()],
            vec!["INTEGER".to_string()],
            Some("INTEGER".to_string()),
            Some("x + 1".to_string()),
            Some("macro".to_string()),
        );
        assert_eq!(desc.kind, MacroKind::Scalar);
    }

    #[test]
    fn test_definition_sniffing_fallback() {
        let desc = MacroDescriptor::from_catalog_row(
            "top_rows".to_string(),
            vec![],
            vec![],
            None,
            Some("select * from t limit 3".to_string()),
            Some("macro".to_string()),
        );
        assert_eq!(desc.kind, MacroKind::Table);
    }

    #[test]
    fn test_missing_types_padded_with_unknown() {
        let desc = MacroDescriptor::from_catalog_row(
            "m".to_string(),
            vec!["a".to_string(), "b".to_string()],
            vec!["INTEGER".to_string()],
            None,
            None,
            Some("macro".to_string()),
        );
        assert_eq!(desc.parameter_types, vec!["INTEGER", "UNKNOWN"]);
        assert_eq!(desc.type_of("b"), Some("UNKNOWN"));
    }
}
