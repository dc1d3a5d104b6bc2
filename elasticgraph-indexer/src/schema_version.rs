//! JSON schema version resolution and validation (§4.7 steps 1-2).

use elasticgraph_schema::TypeRef;
use indexmap::IndexMap;
use serde_json::Value;

/// One type's compiled validators, keyed by the `json_schema_version` they were published under.
pub struct TypeSchemaVersions {
    versions: IndexMap<u32, jsonschema::Validator>,
}

impl TypeSchemaVersions {
    pub fn new(versions: IndexMap<u32, jsonschema::Validator>) -> Self {
        Self { versions }
    }

    fn available_versions(&self) -> Vec<u32> {
        self.versions.keys().copied().collect()
    }
}

/// Every indexed type's compiled JSON schemas, across every version published for it.
///
/// Built once at startup alongside the `SchemaRegistry` (§4.8: "process-global, immutable after
/// load") from the raw JSON schema documents in the frozen schema-artifacts bundle; compiling
/// those documents themselves is the external collaborator's job (§1), this crate only consumes
/// the resulting [`jsonschema::Validator`]s.
pub struct SchemaVersionRegistry {
    by_type: IndexMap<TypeRef, TypeSchemaVersions>,
}

impl SchemaVersionRegistry {
    pub fn new(by_type: IndexMap<TypeRef, TypeSchemaVersions>) -> Self {
        Self { by_type }
    }

    /// Select the JSON schema version for `type_ref`/`requested` (§4.7 step 1): exact match if
    /// present, else the closest available version with ties going to the higher version.
    /// Returns `None` if no schema versions are registered for `type_ref` at all.
    pub fn resolve_version(&self, type_ref: &TypeRef, requested: u32) -> Option<ResolvedVersion> {
        let versions = self.by_type.get(type_ref)?;
        let available = versions.available_versions();
        if available.is_empty() {
            return None;
        }
        if available.contains(&requested) {
            return Some(ResolvedVersion { version: requested, was_exact: true });
        }

        let mut best = available[0];
        let mut best_distance = best.abs_diff(requested);
        for &candidate in &available[1..] {
            let distance = candidate.abs_diff(requested);
            if distance < best_distance || (distance == best_distance && candidate > best) {
                best = candidate;
                best_distance = distance;
            }
        }
        Some(ResolvedVersion { version: best, was_exact: false })
    }

    pub fn validator(&self, type_ref: &TypeRef, version: u32) -> Option<&jsonschema::Validator> {
        self.by_type.get(type_ref)?.versions.get(&version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: u32,
    pub was_exact: bool,
}

/// Validate `record` against `validator`, returning the first validation error's message if
/// invalid. The caller is responsible for sanitizing this before it reaches a `FailedEventError`
/// (§7: "never includes record field values").
pub fn validate(validator: &jsonschema::Validator, record: &Value) -> Result<(), String> {
    match validator.validate(record) {
        Ok(()) => Ok(()),
        Err(error) => Err(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(nums: &[u32]) -> TypeSchemaVersions {
        let map = nums
            .iter()
            .map(|&n| (n, jsonschema::validator_for(&serde_json::json!({})).expect("trivial schema compiles")))
            .collect();
        TypeSchemaVersions::new(map)
    }

    fn registry(nums: &[u32]) -> SchemaVersionRegistry {
        let mut by_type = IndexMap::new();
        by_type.insert(TypeRef::new("Widget"), versions(nums));
        SchemaVersionRegistry::new(by_type)
    }

    #[test]
    fn exact_match_wins() {
        let registry = registry(&[1, 2, 3]);
        let resolved = registry.resolve_version(&TypeRef::new("Widget"), 2).unwrap();
        assert_eq!(resolved.version, 2);
        assert!(resolved.was_exact);
    }

    #[test]
    fn closest_version_is_chosen_when_not_exact() {
        let registry = registry(&[1, 5]);
        let resolved = registry.resolve_version(&TypeRef::new("Widget"), 4).unwrap();
        assert_eq!(resolved.version, 5);
        assert!(!resolved.was_exact);
    }

    #[test]
    fn ties_go_to_the_higher_version() {
        let registry = registry(&[3, 7]);
        // requested = 5 is equidistant from 3 and 7.
        let resolved = registry.resolve_version(&TypeRef::new("Widget"), 5).unwrap();
        assert_eq!(resolved.version, 7);
    }

    #[test]
    fn unknown_type_resolves_to_none() {
        let registry = registry(&[1]);
        assert!(registry.resolve_version(&TypeRef::new("Gadget"), 1).is_none());
    }
}
