//! Schema-tree adapter: the boundary to the schema/validation engine.
//!
//! The engine behind [`SchemaEngine`] owns the working data tree. The rest
//! of the crate only ever talks to this trait: load schema modules, load a
//! config into the tree, export it back, validate it, delete a node by path,
//! and discover the nodes that depend on a given leaf. Engine errors are
//! opaque and wrapped into [`CfgMgmtError::Schema`]; they are never
//! interpreted.
//!
//! Node paths are slash-separated: `/TABLE`, `/TABLE/<entity>`,
//! `/TABLE/<entity>/<field>`, and `/TABLE/<entity>/<field>/<element>` for
//! one element of a list-valued field. Entity keys may contain `|` (composite
//! keys) but never `/`.
//!
//! [`JsonSchemaEngine`] is a conformant engine that reads its schema modules
//! from a directory of JSON files. A module declares, per table, the
//! mandatory fields, the leafref fields (field -> referenced table, scalar or
//! list-valued), and the composite-key components that reference another
//! table's keys.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use sonic_cfgmgmt_common::{CfgMgmtError, CfgMgmtResult, ConfigTree};

use crate::tables::CFG_PORT_TABLE_NAME;

/// Boundary trait over the schema/validation engine.
pub trait SchemaEngine: Send {
    /// Loads and parses the schema modules. Fatal if any module cannot be
    /// parsed.
    fn load_schema(&mut self) -> CfgMgmtResult<()>;

    /// Replaces the working tree with `config`, cropping it into
    /// schema-addressable form. Does not validate.
    fn load_data(&mut self, config: &ConfigTree) -> CfgMgmtResult<()>;

    /// Exports the working tree as a plain config tree.
    fn get_data(&self) -> CfgMgmtResult<ConfigTree>;

    /// Validates the working tree. `Ok(false)` is the expected outcome for
    /// an invalid tree; `Err` means the engine itself failed.
    fn validate(&mut self) -> CfgMgmtResult<bool>;

    /// Removes exactly one addressable node. Fails explicitly if the path
    /// does not exist; never a silent no-op.
    fn delete_node(&mut self, path: &str) -> CfgMgmtResult<()>;

    /// Returns the paths whose validity depends on the node at `path`,
    /// per the schema-declared references. May be empty.
    fn find_dependencies(&self, path: &str) -> CfgMgmtResult<Vec<String>>;

    /// Tables present in the last loaded config for which no schema module
    /// exists.
    fn tables_without_schema(&self) -> Vec<String>;

    /// Path addressing a port entity (used for deletion).
    fn port_path(&self, port: &str) -> String {
        format!("/{}/{}", CFG_PORT_TABLE_NAME, port)
    }

    /// Path addressing a port's key leaf (used for dependency discovery).
    fn port_leaf_path(&self, port: &str) -> String {
        format!("/{}/{}/name", CFG_PORT_TABLE_NAME, port)
    }
}

/// A composite-key component that references another table's keys.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyLeafref {
    /// Position of the component in the `|`-separated entity key.
    pub index: usize,
    /// The referenced table.
    pub table: String,
}

/// Per-table schema declaration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableSchema {
    /// Fields that must be present on every entry.
    #[serde(default)]
    pub mandatory: Vec<String>,
    /// Leafref fields: field name -> referenced table. The field value may
    /// be a scalar or a list of scalars.
    #[serde(default)]
    pub leafrefs: BTreeMap<String, String>,
    /// Composite-key components referencing another table.
    #[serde(default, rename = "key-leafrefs")]
    pub key_leafrefs: Vec<KeyLeafref>,
}

/// One schema module file.
#[derive(Debug, Clone, Deserialize)]
struct SchemaModule {
    /// Module name, e.g. "sonic-port".
    module: String,
    /// Tables declared by this module.
    tables: BTreeMap<String, TableSchema>,
}

/// Schema engine backed by JSON module files in a directory.
pub struct JsonSchemaEngine {
    schema_dir: PathBuf,
    /// table -> schema, from all loaded modules.
    tables: BTreeMap<String, TableSchema>,
    /// table -> owning module, for logging.
    modules: BTreeMap<String, String>,
    /// Schema-addressable working tree.
    data: ConfigTree,
    /// Tables set aside at load because no module declares them. Re-merged
    /// on export so snapshots diff cleanly.
    without_schema: ConfigTree,
    schema_loaded: bool,
}

impl JsonSchemaEngine {
    /// Creates an engine reading modules from `schema_dir`. Call
    /// [`SchemaEngine::load_schema`] before loading data.
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            tables: BTreeMap::new(),
            modules: BTreeMap::new(),
            data: ConfigTree::new(),
            without_schema: ConfigTree::new(),
            schema_loaded: false,
        }
    }

    fn parse_module(path: &Path) -> CfgMgmtResult<SchemaModule> {
        let file = File::open(path).map_err(|e| CfgMgmtError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            CfgMgmtError::schema(
                "load_schema",
                format!("cannot parse module {}: {}", path.display(), e),
            )
        })
    }

    /// Splits a node path into 1..=4 non-empty segments.
    fn split_path(path: &str) -> CfgMgmtResult<Vec<&str>> {
        let trimmed = path
            .strip_prefix('/')
            .ok_or_else(|| CfgMgmtError::schema("split_path", format!("path must start with '/': {path}")))?;
        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.is_empty() || segments.len() > 4 || segments.iter().any(|s| s.is_empty()) {
            return Err(CfgMgmtError::schema(
                "split_path",
                format!("malformed node path: {path}"),
            ));
        }
        Ok(segments)
    }

    fn entry_mut(&mut self, table: &str, key: &str, path: &str) -> CfgMgmtResult<&mut ConfigTree> {
        self.data
            .get_mut(table)
            .and_then(Value::as_object_mut)
            .and_then(|t| t.get_mut(key))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| CfgMgmtError::path_not_found(path))
    }

    /// Checks that `value` exists as an entity key in `table` of the
    /// working tree.
    fn key_exists(&self, table: &str, value: &str) -> bool {
        self.data
            .get(table)
            .and_then(Value::as_object)
            .is_some_and(|t| t.contains_key(value))
    }

    fn validate_entry(&self, table: &str, schema: &TableSchema, key: &str, entry: &Value) -> bool {
        let Some(fields) = entry.as_object() else {
            warn!("Validation: {}|{} is not an object", table, key);
            return false;
        };

        let mut ok = true;
        for field in &schema.mandatory {
            if !fields.contains_key(field) {
                warn!("Validation: {}|{} missing mandatory field '{}'", table, key, field);
                ok = false;
            }
        }

        for (field, target) in &schema.leafrefs {
            match fields.get(field) {
                None => {}
                Some(Value::String(v)) => {
                    if !self.key_exists(target, v) {
                        warn!(
                            "Validation: {}|{} field '{}' references missing {}|{}",
                            table, key, field, target, v
                        );
                        ok = false;
                    }
                }
                Some(Value::Array(items)) => {
                    for item in items {
                        let Some(v) = item.as_str() else {
                            warn!("Validation: {}|{} field '{}' has a non-string element", table, key, field);
                            ok = false;
                            continue;
                        };
                        if !self.key_exists(target, v) {
                            warn!(
                                "Validation: {}|{} field '{}' references missing {}|{}",
                                table, key, field, target, v
                            );
                            ok = false;
                        }
                    }
                }
                Some(other) => {
                    warn!(
                        "Validation: {}|{} leafref field '{}' must be string or list, got {}",
                        table,
                        key,
                        field,
                        sonic_cfgmgmt_common::types::type_name(other)
                    );
                    ok = false;
                }
            }
        }

        for key_ref in &schema.key_leafrefs {
            let parts: Vec<&str> = key.split('|').collect();
            match parts.get(key_ref.index) {
                Some(component) => {
                    if !self.key_exists(&key_ref.table, component) {
                        warn!(
                            "Validation: {}|{} key component '{}' references missing {} entry",
                            table, key, component, key_ref.table
                        );
                        ok = false;
                    }
                }
                None => {
                    warn!(
                        "Validation: {}|{} key has no component at index {}",
                        table, key, key_ref.index
                    );
                    ok = false;
                }
            }
        }

        ok
    }
}

impl SchemaEngine for JsonSchemaEngine {
    fn load_schema(&mut self) -> CfgMgmtResult<()> {
        let entries = std::fs::read_dir(&self.schema_dir).map_err(|e| CfgMgmtError::Io {
            path: self.schema_dir.display().to_string(),
            source: e,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in &paths {
            let module = Self::parse_module(path)?;
            for (table, schema) in module.tables {
                if let Some(prev) = self.modules.get(&table) {
                    return Err(CfgMgmtError::schema(
                        "load_schema",
                        format!("table {} declared by both {} and {}", table, prev, module.module),
                    ));
                }
                self.modules.insert(table.clone(), module.module.clone());
                self.tables.insert(table, schema);
            }
        }

        if self.tables.is_empty() {
            return Err(CfgMgmtError::schema(
                "load_schema",
                format!("no schema modules found in {}", self.schema_dir.display()),
            ));
        }

        info!(
            "Loaded {} schema modules covering {} tables",
            paths.len(),
            self.tables.len()
        );
        self.schema_loaded = true;
        Ok(())
    }

    fn load_data(&mut self, config: &ConfigTree) -> CfgMgmtResult<()> {
        if !self.schema_loaded {
            return Err(CfgMgmtError::schema("load_data", "schema not loaded"));
        }

        self.data.clear();
        self.without_schema.clear();

        for (table, value) in config {
            if self.tables.contains_key(table) {
                self.data.insert(table.clone(), value.clone());
            } else {
                debug!("Table {} has no schema module, setting aside", table);
                self.without_schema.insert(table.clone(), value.clone());
            }
        }

        Ok(())
    }

    fn get_data(&self) -> CfgMgmtResult<ConfigTree> {
        let mut out = self.data.clone();
        for (table, value) in &self.without_schema {
            out.insert(table.clone(), value.clone());
        }
        Ok(out)
    }

    fn validate(&mut self) -> CfgMgmtResult<bool> {
        let mut ok = true;
        for (table, value) in &self.data {
            // load_data only admits schema'd tables into the working tree
            let schema = &self.tables[table];
            let Some(entries) = value.as_object() else {
                warn!("Validation: table {} is not an object", table);
                ok = false;
                continue;
            };
            for (key, entry) in entries {
                if !self.validate_entry(table, schema, key, entry) {
                    ok = false;
                }
            }
        }
        Ok(ok)
    }

    fn delete_node(&mut self, path: &str) -> CfgMgmtResult<()> {
        let segments = Self::split_path(path)?;
        let not_found = || CfgMgmtError::path_not_found(path);

        match segments.as_slice() {
            [table] => {
                self.data.remove(*table).ok_or_else(not_found)?;
            }
            [table, key] => {
                let entries = self
                    .data
                    .get_mut(*table)
                    .and_then(Value::as_object_mut)
                    .ok_or_else(not_found)?;
                entries.remove(*key).ok_or_else(not_found)?;
            }
            [table, key, field] => {
                let entry = self.entry_mut(table, key, path)?;
                entry.remove(*field).ok_or_else(not_found)?;
            }
            [table, key, field, element] => {
                let entry = self.entry_mut(table, key, path)?;
                let items = entry
                    .get_mut(*field)
                    .and_then(Value::as_array_mut)
                    .ok_or_else(not_found)?;
                let pos = items
                    .iter()
                    .position(|v| v.as_str() == Some(element))
                    .ok_or_else(not_found)?;
                items.remove(pos);
                // A leaf-list with no instances disappears entirely.
                if items.is_empty() {
                    entry.remove(*field);
                }
            }
            _ => unreachable!("split_path bounds segment count"),
        }

        debug!("Deleted node {}", path);
        Ok(())
    }

    fn find_dependencies(&self, path: &str) -> CfgMgmtResult<Vec<String>> {
        let segments = Self::split_path(path)?;
        let (target_table, target_key) = match segments.as_slice() {
            [table, key] | [table, key, _] => (*table, *key),
            _ => {
                return Err(CfgMgmtError::schema(
                    "find_dependencies",
                    format!("path does not address an entity or its leaf: {path}"),
                ))
            }
        };

        let mut deps = Vec::new();
        for (table, schema) in &self.tables {
            let Some(entries) = self.data.get(table).and_then(Value::as_object) else {
                continue;
            };
            for (key, entry) in entries {
                for (field, ref_table) in &schema.leafrefs {
                    if ref_table != target_table {
                        continue;
                    }
                    match entry.get(field) {
                        Some(Value::String(v)) if v == target_key => {
                            deps.push(format!("/{table}/{key}/{field}"));
                        }
                        Some(Value::Array(items)) => {
                            if items.iter().any(|v| v.as_str() == Some(target_key)) {
                                deps.push(format!("/{table}/{key}/{field}/{target_key}"));
                            }
                        }
                        _ => {}
                    }
                }
                for key_ref in &schema.key_leafrefs {
                    if key_ref.table != target_table {
                        continue;
                    }
                    let parts: Vec<&str> = key.split('|').collect();
                    if parts.get(key_ref.index) == Some(&target_key) {
                        // The reference lives in the key itself; the whole
                        // entry has to go.
                        deps.push(format!("/{table}/{key}"));
                    }
                }
            }
        }

        debug!("Dependencies of {}: {:?}", path, deps);
        Ok(deps)
    }

    fn tables_without_schema(&self) -> Vec<String> {
        self.without_schema.keys().cloned().collect()
    }
}
