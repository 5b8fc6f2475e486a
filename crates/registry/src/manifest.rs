//! Capability manifest export
//!
//! A serializable snapshot of the registry for editors and documentation
//! generators. The compiler never reads it back.

use crate::registry::Registry;
use gridscript_core::{Dialect, ScriptType, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub name: String,
    pub provider: String,
    pub params: Vec<ScriptType>,
    pub returns: Option<ScriptType>,
    pub dialects: Vec<Dialect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub energy: f64,
    pub delay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantEntry {
    pub name: String,
    pub ty: ScriptType,
    pub value: Value,
    pub dialects: Vec<Dialect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    pub name: String,
    pub params: Vec<ScriptType>,
    pub dialects: Vec<Dialect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Every visible capability, sorted by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityManifest {
    pub functions: Vec<FunctionEntry>,
    pub constants: Vec<ConstantEntry>,
    pub events: Vec<EventEntry>,
}

impl CapabilityManifest {
    pub fn from_registry(registry: &Registry) -> Self {
        let mut functions: Vec<FunctionEntry> = registry
            .functions()
            .iter()
            .map(|f| FunctionEntry {
                name: f.name.clone(),
                provider: f.provider.clone(),
                params: f.params.clone(),
                returns: f.returns,
                dialects: f.dialects.iter().collect(),
                group: f.group.clone(),
                description: f.description.clone(),
                energy: f.meta.energy,
                delay: f.meta.delay,
            })
            .collect();
        functions.sort_by(|a, b| a.name.cmp(&b.name));

        let mut constants: Vec<ConstantEntry> = registry
            .constants()
            .map(|c| ConstantEntry {
                name: c.name.clone(),
                ty: c.ty,
                value: c.value.clone(),
                dialects: c.dialects.iter().collect(),
                group: c.group.clone(),
                description: c.description.clone(),
            })
            .collect();
        constants.sort_by(|a, b| a.name.cmp(&b.name));

        let events = registry
            .events()
            .into_iter()
            .map(|e| EventEntry {
                name: e.name.clone(),
                params: e.params.clone(),
                dialects: e.dialects.iter().collect(),
                group: e.group.clone(),
                description: e.description.clone(),
            })
            .collect();

        Self { functions, constants, events }
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    pub fn function(&self, name: &str) -> impl Iterator<Item = &FunctionEntry> {
        let name = name.to_string();
        self.functions.iter().filter(move |f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_lists_standard_members() {
        let registry = Registry::standard();
        let manifest = registry.manifest();

        let say: Vec<&FunctionEntry> = manifest.function("llSay").collect();
        assert_eq!(say.len(), 1);
        assert_eq!(say[0].params, vec![ScriptType::Integer, ScriptType::String]);
        assert_eq!(say[0].returns, None);
        assert_eq!(say[0].energy, 10.0);

        assert!(manifest.constants.iter().any(|c| c.name == "PI"));
        assert!(manifest.events.iter().any(|e| e.name == "state_entry"));
    }

    #[test]
    fn test_manifest_json() {
        let manifest = Registry::standard().manifest();
        let json = manifest.to_json(false).unwrap();
        let back: CapabilityManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.functions.len(), manifest.functions.len());
        assert!(json.contains("\"llStringLength\""));
    }
}
