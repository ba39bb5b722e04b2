use serde_json::{Map, Value};

use crate::error::SourceMapError;

/// Map URL appended to transformed code so the host parser asks the compiler,
/// not the filesystem, for the map. Never resolved outside a compilation.
pub const SOURCE_MAP_SENTINEL: &str = "es-compiler://internal-should-not-leak/file.map";

pub(crate) const SOURCE_MAPPING_URL_PREFIX: &str = "\n//# sourceMappingURL=";

/// Shifts every mapping one line down.
///
/// Non-entry modules are wrapped in a function whose header takes a line of its
/// own, and `;` separates generated lines in `mappings`, so one extra leading
/// `;` realigns the map. Maps without `mappings` (sectioned maps) are returned
/// untouched.
pub fn increase_mappings_by_one(source_map: &[u8]) -> Result<Vec<u8>, SourceMapError> {
    let mut map: Map<String, Value> = serde_json::from_slice(source_map)?;

    match map.get_mut("mappings") {
        // TODO: shift `offset.line` of every section so sectioned maps line up too
        None => Ok(source_map.to_vec()),
        Some(Value::String(mappings)) => {
            mappings.insert(0, ';');
            Ok(serde_json::to_vec(&map)?)
        }
        Some(_) => Err(SourceMapError::InvalidMappings),
    }
}
