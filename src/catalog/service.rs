//! Macro catalog service
//!
//! Discovers macros through `duckdb_functions()` and keeps a name-keyed
//! cache. The cache is an `Arc` snapshot swapped whole under an `RwLock`,
//! so concurrent readers never observe a half-built map; concurrent
//! refreshes race and the last completed discovery wins (macro definitions
//! are assumed nearly static).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use duckdb::types::Value;

use crate::connection::ConnectionManager;
use crate::errors::{MacroError, MacroResult};
use crate::observability::Logger;

use super::descriptor::{is_valid_identifier, MacroDescriptor};

/// Number of sample names attached to NotFound diagnostics
const SAMPLE_NAMES: usize = 10;

const DISCOVERY_QUERY: &str = "\
SELECT
    function_name,
    parameters,
    parameter_types,
    return_type,
    macro_definition,
    function_type
FROM duckdb_functions()
WHERE function_type IN ('macro', 'table_macro')
  AND internal = false
ORDER BY function_name";

type Cache = Arc<HashMap<String, Arc<MacroDescriptor>>>;

/// Discovery service with a wholesale-replaced descriptor cache
pub struct MacroCatalog {
    manager: Arc<ConnectionManager>,
    cache: RwLock<Cache>,
}

impl MacroCatalog {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            cache: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Run one discovery query and replace the cache with its result.
    /// Returns descriptors ordered by name.
    pub fn discover(&self) -> MacroResult<Vec<Arc<MacroDescriptor>>> {
        let cursor = self.manager.acquire()?;

        let mut stmt = cursor
            .prepare(DISCOVERY_QUERY)
            .map_err(|e| MacroError::Execution {
                name: "duckdb_functions".to_string(),
                message: e.to_string(),
            })?;
        let mut rows = stmt.query([]).map_err(|e| MacroError::Execution {
            name: "duckdb_functions".to_string(),
            message: e.to_string(),
        })?;

        let mut macros = Vec::new();
        while let Some(row) = rows.next().map_err(|e| MacroError::Execution {
            name: "duckdb_functions".to_string(),
            message: e.to_string(),
        })? {
            let name: String = row.get(0).map_err(|e| MacroError::Execution {
                name: "duckdb_functions".to_string(),
                message: e.to_string(),
            })?;
            if !is_valid_identifier(&name) {
                Logger::warn("MACRO_NAME_SKIPPED", &[("name", name.as_str())]);
                continue;
            }

            let parameters = list_of_strings(row.get(1).unwrap_or(Value::Null));
            let parameter_types = list_of_strings(row.get(2).unwrap_or(Value::Null));
            let return_type: Option<String> = row.get(3).unwrap_or(None);
            let definition: Option<String> = row.get(4).unwrap_or(None);
            let function_type: Option<String> = row.get(5).unwrap_or(None);

            macros.push(Arc::new(MacroDescriptor::from_catalog_row(
                name,
                parameters,
                parameter_types,
                return_type,
                definition,
                function_type,
            )));
        }

        let fresh: HashMap<String, Arc<MacroDescriptor>> = macros
            .iter()
            .map(|m| (m.name.clone(), Arc::clone(m)))
            .collect();
        if let Ok(mut cache) = self.cache.write() {
            *cache = Arc::new(fresh);
        }

        Logger::info(
            "MACROS_DISCOVERED",
            &[("count", macros.len().to_string().as_str())],
        );
        Ok(macros)
    }

    /// Cache hit returns immediately; a miss triggers one full re-discovery
    /// (not a point lookup) before reporting NotFound.
    pub fn get_by_name(&self, name: &str) -> MacroResult<Arc<MacroDescriptor>> {
        if let Some(descriptor) = self.lookup(name) {
            return Ok(descriptor);
        }

        self.discover()?;

        self.lookup(name).ok_or_else(|| MacroError::NotFound {
            name: name.to_string(),
            available: self.sample_names(),
        })
    }

    /// Pre-load the cache, typically at service warm-up
    pub fn prime_cache(&self) -> MacroResult<()> {
        self.discover()?;
        Logger::info("MACRO_CACHE_PRIMED", &[]);
        Ok(())
    }

    /// Sorted names currently cached
    pub fn cached_names(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        let mut names: Vec<String> = snapshot.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of macros currently cached
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// True when nothing has been discovered yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to 10 cached names for NotFound diagnostics
    pub fn sample_names(&self) -> Vec<String> {
        let mut names = self.cached_names();
        names.truncate(SAMPLE_NAMES);
        names
    }

    fn lookup(&self, name: &str) -> Option<Arc<MacroDescriptor>> {
        self.snapshot().get(name).cloned()
    }

    fn snapshot(&self) -> Cache {
        self.cache
            .read()
            .map(|cache| Arc::clone(&cache))
            .unwrap_or_default()
    }
}

/// Flatten a DuckDB LIST value into strings; null entries become UNKNOWN
/// rather than failing the whole discovery.
fn list_of_strings(value: Value) -> Vec<String> {
    match value {
        Value::List(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Text(s) => s,
                Value::Null => "UNKNOWN".to_string(),
                other => format!("{:?}", other),
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_catalog() -> (Arc<ConnectionManager>, MacroCatalog) {
        let manager = Arc::new(ConnectionManager::new(":memory:", false).unwrap());
        {
            let cursor = manager.acquire().unwrap();
            cursor
                .execute_batch(
                    "CREATE MACRO greet(name) AS 'Hello, ' || name || '!';
                     CREATE MACRO add_numbers(a, b) AS a + b;
                     CREATE MACRO all_greetings() AS TABLE
                         SELECT 'hi' AS word UNION ALL SELECT 'hello';",
                )
                .unwrap();
        }
        let catalog = MacroCatalog::new(Arc::clone(&manager));
        (manager, catalog)
    }

    #[test]
    fn test_discover_finds_macros_sorted() {
        let (_manager, catalog) = seeded_catalog();
        let macros = catalog.discover().unwrap();
        let names: Vec<&str> = macros.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["add_numbers", "all_greetings", "greet"]);
    }

    #[test]
    fn test_classification() {
        let (_manager, catalog) = seeded_catalog();
        catalog.prime_cache().unwrap();
        assert_eq!(
            catalog.get_by_name("greet").unwrap().kind,
            crate::catalog::MacroKind::Scalar
        );
        assert_eq!(
            catalog.get_by_name("all_greetings").unwrap().kind,
            crate::catalog::MacroKind::Table
        );
    }

    #[test]
    fn test_get_by_name_matches_discovery_ordering() {
        let (_manager, catalog) = seeded_catalog();
        for discovered in catalog.discover().unwrap() {
            let fetched = catalog.get_by_name(&discovered.name).unwrap();
            assert_eq!(fetched.parameters, discovered.parameters);
            assert_eq!(fetched.parameter_types, discovered.parameter_types);
        }
    }

    #[test]
    fn test_miss_triggers_rediscovery() {
        let (manager, catalog) = seeded_catalog();
        // Cache is empty; a macro created after construction is still found
        {
            let cursor = manager.acquire().unwrap();
            cursor
                .execute("CREATE MACRO late_arrival(x) AS x * 2", [])
                .unwrap();
        }
        assert!(catalog.get_by_name("late_arrival").is_ok());
    }

    #[test]
    fn test_unknown_name_is_not_found_with_samples() {
        let (_manager, catalog) = seeded_catalog();
        catalog.prime_cache().unwrap();
        match catalog.get_by_name("nope") {
            Err(MacroError::NotFound { name, available }) => {
                assert_eq!(name, "nope");
                assert!(available.contains(&"greet".to_string()));
                assert!(available.len() <= 10);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_cache_replaced_wholesale() {
        let (manager, catalog) = seeded_catalog();
        catalog.prime_cache().unwrap();
        assert_eq!(catalog.len(), 3);
        {
            let cursor = manager.acquire().unwrap();
            cursor.execute("DROP MACRO add_numbers", []).unwrap();
        }
        catalog.discover().unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(!catalog.cached_names().contains(&"add_numbers".to_string()));
    }

    #[test]
    fn test_list_of_strings_defaults_nulls() {
        let value = Value::List(vec![
            Value::Text("INTEGER".to_string()),
            Value::Null,
        ]);
        assert_eq!(list_of_strings(value), vec!["INTEGER", "UNKNOWN"]);
        assert!(list_of_strings(Value::Null).is_empty());
    }
}
