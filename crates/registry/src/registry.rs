//! Registry construction and lookup
//!
//! [`RegistryBuilder`] admits members from every installed provider,
//! rejecting (and logging) the ones scripts cannot use. [`Registry`] is the
//! frozen result consulted by the compiler.

use crate::descriptor::{
    ApiFn, ConstantDescriptor, EventDescriptor, ExecutionMeta, FunctionDescriptor, HostType,
};
use crate::manifest::CapabilityManifest;
use gridscript_core::{Dialect, Dialects, ScriptType, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

/// A unit of host capabilities installed at startup
pub trait CapabilityProvider {
    /// Provider name used in logs and the manifest
    fn name(&self) -> &str;

    /// Register every member this provider offers
    fn register(&self, registry: &mut RegistryBuilder);
}

/// Stable index of a function overload inside a [`Registry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub usize);

/// An admitted function overload
#[derive(Debug, Clone)]
pub struct ApiFunction {
    pub id: FunctionId,
    pub name: String,
    pub member: &'static str,
    pub provider: String,
    pub params: Vec<ScriptType>,
    pub returns: Option<ScriptType>,
    pub dialects: Dialects,
    pub group: Option<String>,
    pub meta: ExecutionMeta,
    pub description: Option<String>,
    pub implementation: ApiFn,
}

impl ApiFunction {
    /// Render as `name(integer, float) -> string`
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.keyword()).collect();
        match self.returns {
            Some(ret) => format!("{}({}) -> {}", self.name, params.join(", "), ret),
            None => format!("{}({})", self.name, params.join(", ")),
        }
    }
}

/// An admitted constant
#[derive(Debug, Clone)]
pub struct ApiConstant {
    pub name: String,
    pub provider: String,
    pub ty: ScriptType,
    pub value: Value,
    pub dialects: Dialects,
    pub group: Option<String>,
    pub description: Option<String>,
}

/// An admitted event
#[derive(Debug, Clone)]
pub struct ApiEvent {
    pub name: String,
    pub provider: String,
    pub params: Vec<ScriptType>,
    pub dialects: Dialects,
    pub group: Option<String>,
    pub description: Option<String>,
}

/// Kind of registry member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Function,
    Constant,
    Event,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MemberKind::Function => "function",
            MemberKind::Constant => "constant",
            MemberKind::Event => "event",
        })
    }
}

/// Why a member was not admitted
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectReason {
    #[error("{position} has unsupported type '{ty}'")]
    UnsupportedType { position: String, ty: String },

    #[error("missing leading execution context parameter")]
    MissingContext,

    #[error("events must return void")]
    NonVoidEvent,

    #[error("constant is not read-only")]
    Writable,

    #[error("declared type {declared} does not match value of type {actual}")]
    ValueMismatch { declared: ScriptType, actual: ScriptType },

    #[error("no dialect applies")]
    NoDialect,

    #[error("duplicates an existing {0} with overlapping dialects")]
    Duplicate(MemberKind),
}

/// A member skipped during the registry build
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub provider: String,
    pub kind: MemberKind,
    pub member: String,
    pub reason: RejectReason,
}

/// Which dialects and extension groups a compilation may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    pub dialects: Dialects,
    pub groups: BTreeSet<String>,
}

impl Visibility {
    pub fn new(dialects: impl Into<Dialects>) -> Self {
        Self {
            dialects: dialects.into(),
            groups: BTreeSet::new(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialects = self.dialects.with(dialect);
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    /// Whether an entry with these flags is visible
    pub fn permits(&self, dialects: Dialects, group: Option<&str>) -> bool {
        dialects.intersects(self.dialects) && group.map_or(true, |g| self.groups.contains(g))
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::new(Dialects::LSL)
    }
}

/// Names of the members that fall into one dialect or extension group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bucket {
    pub functions: Vec<FunctionId>,
    pub constants: Vec<String>,
    pub events: Vec<String>,
}

/// Mutable registry used while providers are being installed
pub struct RegistryBuilder {
    allow_long: bool,
    provider: String,
    functions: Vec<ApiFunction>,
    constants: Vec<ApiConstant>,
    events: Vec<ApiEvent>,
    rejected: Vec<Rejection>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            allow_long: false,
            provider: "<host>".into(),
            functions: Vec::new(),
            constants: Vec::new(),
            events: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Admit 64-bit integers as a script-representable type
    pub fn allow_long_integers(mut self, allow: bool) -> Self {
        self.allow_long = allow;
        self
    }

    /// Install a provider, attributing its members to it
    pub fn install(&mut self, provider: &dyn CapabilityProvider) -> &mut Self {
        self.provider = provider.name().to_string();
        let before = (self.functions.len(), self.constants.len(), self.events.len());
        provider.register(self);
        debug!(
            provider = %self.provider,
            functions = self.functions.len() - before.0,
            constants = self.constants.len() - before.1,
            events = self.events.len() - before.2,
            "Installed capability provider"
        );
        self.provider = "<host>".into();
        self
    }

    /// Register a function overload; returns whether it was admitted
    pub fn register_function(&mut self, desc: FunctionDescriptor) -> bool {
        let name = desc.visible_name().to_string();
        match self.check_function(&desc) {
            Ok((params, returns)) => {
                let id = FunctionId(self.functions.len());
                self.functions.push(ApiFunction {
                    id,
                    name,
                    member: desc.member,
                    provider: self.provider.clone(),
                    params,
                    returns,
                    dialects: desc.dialects,
                    group: desc.group,
                    meta: desc.meta,
                    description: desc.description,
                    implementation: desc.implementation,
                });
                true
            }
            Err(reason) => self.reject(MemberKind::Function, name, reason),
        }
    }

    /// Register a constant; returns whether it was admitted
    pub fn register_constant(&mut self, desc: ConstantDescriptor) -> bool {
        let name = desc.name.to_string();
        match self.check_constant(&desc) {
            Ok(ty) => {
                self.constants.push(ApiConstant {
                    name,
                    provider: self.provider.clone(),
                    ty,
                    value: desc.value,
                    dialects: desc.dialects,
                    group: desc.group,
                    description: desc.description,
                });
                true
            }
            Err(reason) => self.reject(MemberKind::Constant, name, reason),
        }
    }

    /// Register an event; returns whether it was admitted
    pub fn register_event(&mut self, desc: EventDescriptor) -> bool {
        let name = desc.name.to_string();
        match self.check_event(&desc) {
            Ok(params) => {
                self.events.push(ApiEvent {
                    name,
                    provider: self.provider.clone(),
                    params,
                    dialects: desc.dialects,
                    group: desc.group,
                    description: desc.description,
                });
                true
            }
            Err(reason) => self.reject(MemberKind::Event, name, reason),
        }
    }

    fn reject(&mut self, kind: MemberKind, member: String, reason: RejectReason) -> bool {
        warn!(provider = %self.provider, %kind, %member, %reason, "Rejected capability");
        self.rejected.push(Rejection {
            provider: self.provider.clone(),
            kind,
            member,
            reason,
        });
        false
    }

    fn script_type(&self, ty: HostType, position: impl Fn() -> String) -> Result<ScriptType, RejectReason> {
        match ty {
            HostType::Script(ScriptType::Long) if !self.allow_long => Err(RejectReason::UnsupportedType {
                position: position(),
                ty: "long".into(),
            }),
            HostType::Script(ty) => Ok(ty),
            other => Err(RejectReason::UnsupportedType {
                position: position(),
                ty: other.to_string(),
            }),
        }
    }

    fn script_params(&self, params: &[HostType], offset: usize) -> Result<Vec<ScriptType>, RejectReason> {
        params
            .iter()
            .enumerate()
            .map(|(i, ty)| self.script_type(*ty, || format!("parameter {}", i + offset)))
            .collect()
    }

    fn check_function(
        &self,
        desc: &FunctionDescriptor,
    ) -> Result<(Vec<ScriptType>, Option<ScriptType>), RejectReason> {
        if desc.params.first() != Some(&HostType::Context) {
            return Err(RejectReason::MissingContext);
        }
        if desc.dialects.is_empty() {
            return Err(RejectReason::NoDialect);
        }
        let params = self.script_params(&desc.params[1..], 1)?;
        let returns = desc
            .returns
            .map(|ty| self.script_type(ty, || "return value".into()))
            .transpose()?;

        let name = desc.visible_name();
        let duplicate = self.functions.iter().any(|f| {
            f.name == name && f.params == params && f.dialects.intersects(desc.dialects) && f.group == desc.group
        });
        if duplicate {
            return Err(RejectReason::Duplicate(MemberKind::Function));
        }
        Ok((params, returns))
    }

    fn check_constant(&self, desc: &ConstantDescriptor) -> Result<ScriptType, RejectReason> {
        if !desc.read_only {
            return Err(RejectReason::Writable);
        }
        if desc.dialects.is_empty() {
            return Err(RejectReason::NoDialect);
        }
        let ty = self.script_type(desc.ty, || "value".into())?;
        let actual = desc.value.script_type();
        if actual != ty {
            return Err(RejectReason::ValueMismatch { declared: ty, actual });
        }
        if self
            .constants
            .iter()
            .any(|c| c.name == desc.name && c.dialects.intersects(desc.dialects))
        {
            return Err(RejectReason::Duplicate(MemberKind::Constant));
        }
        Ok(ty)
    }

    fn check_event(&self, desc: &EventDescriptor) -> Result<Vec<ScriptType>, RejectReason> {
        if desc.returns.is_some() {
            return Err(RejectReason::NonVoidEvent);
        }
        if desc.dialects.is_empty() {
            return Err(RejectReason::NoDialect);
        }
        let params = self.script_params(&desc.params, 0)?;
        if self
            .events
            .iter()
            .any(|e| e.name == desc.name && e.dialects.intersects(desc.dialects))
        {
            return Err(RejectReason::Duplicate(MemberKind::Event));
        }
        Ok(params)
    }

    /// Freeze the admitted members into an immutable registry
    pub fn build(self) -> Registry {
        let mut overloads: HashMap<String, Vec<FunctionId>> = HashMap::new();
        let mut dialect_buckets: HashMap<Dialect, Bucket> = HashMap::new();
        let mut group_buckets: BTreeMap<String, Bucket> = BTreeMap::new();

        for function in &self.functions {
            overloads.entry(function.name.clone()).or_default().push(function.id);
            for dialect in function.dialects.iter() {
                dialect_buckets.entry(dialect).or_default().functions.push(function.id);
            }
            if let Some(group) = &function.group {
                group_buckets.entry(group.clone()).or_default().functions.push(function.id);
            }
        }

        let mut constants: HashMap<String, Vec<ApiConstant>> = HashMap::new();
        for constant in self.constants {
            for dialect in constant.dialects.iter() {
                dialect_buckets.entry(dialect).or_default().constants.push(constant.name.clone());
            }
            if let Some(group) = &constant.group {
                group_buckets.entry(group.clone()).or_default().constants.push(constant.name.clone());
            }
            constants.entry(constant.name.clone()).or_default().push(constant);
        }

        let mut events: HashMap<Dialect, HashMap<String, ApiEvent>> = HashMap::new();
        for event in self.events {
            for dialect in event.dialects.iter() {
                dialect_buckets.entry(dialect).or_default().events.push(event.name.clone());
                events.entry(dialect).or_default().insert(event.name.clone(), event.clone());
            }
            if let Some(group) = &event.group {
                group_buckets.entry(group.clone()).or_default().events.push(event.name.clone());
            }
        }

        info!(
            functions = self.functions.len(),
            names = overloads.len(),
            constants = constants.values().map(Vec::len).sum::<usize>(),
            events = events.values().map(HashMap::len).sum::<usize>(),
            rejected = self.rejected.len(),
            "Capability registry built"
        );

        Registry {
            functions: self.functions,
            overloads,
            constants,
            events,
            dialect_buckets,
            group_buckets,
            rejected: self.rejected,
            long_integers: self.allow_long,
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable, shareable table of host capabilities
#[derive(Debug)]
pub struct Registry {
    functions: Vec<ApiFunction>,
    overloads: HashMap<String, Vec<FunctionId>>,
    constants: HashMap<String, Vec<ApiConstant>>,
    events: HashMap<Dialect, HashMap<String, ApiEvent>>,
    dialect_buckets: HashMap<Dialect, Bucket>,
    group_buckets: BTreeMap<String, Bucket>,
    rejected: Vec<Rejection>,
    /// Built with [`RegistryBuilder::allow_long_integers`]
    long_integers: bool,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry with every built-in provider installed
    pub fn standard() -> Registry {
        let mut builder = RegistryBuilder::new();
        for provider in crate::providers::standard_providers() {
            builder.install(provider.as_ref());
        }
        builder.build()
    }

    /// Look up an overload by id
    pub fn function(&self, id: FunctionId) -> &ApiFunction {
        &self.functions[id.0]
    }

    /// Every admitted overload
    pub fn functions(&self) -> &[ApiFunction] {
        &self.functions
    }

    /// Visible overloads sharing a script-visible name
    pub fn overloads<'a>(&'a self, name: &str, vis: &'a Visibility) -> impl Iterator<Item = &'a ApiFunction> + 'a {
        self.overloads
            .get(name)
            .into_iter()
            .flatten()
            .map(move |id| &self.functions[id.0])
            .filter(move |f| vis.permits(f.dialects, f.group.as_deref()))
    }

    pub fn has_function(&self, name: &str, vis: &Visibility) -> bool {
        self.overloads(name, vis).next().is_some()
    }

    /// Visible constant by name
    pub fn constant(&self, name: &str, vis: &Visibility) -> Option<&ApiConstant> {
        self.constants
            .get(name)?
            .iter()
            .find(|c| vis.permits(c.dialects, c.group.as_deref()))
    }

    pub fn constants(&self) -> impl Iterator<Item = &ApiConstant> {
        self.constants.values().flatten()
    }

    /// Visible event by name, searched through the enabled dialects' tables
    pub fn event(&self, name: &str, vis: &Visibility) -> Option<&ApiEvent> {
        vis.dialects
            .iter()
            .filter_map(|d| self.events.get(&d)?.get(name))
            .find(|e| vis.permits(e.dialects, e.group.as_deref()))
    }

    /// Every admitted event (one entry per event, not per dialect)
    pub fn events(&self) -> Vec<&ApiEvent> {
        let mut seen = BTreeMap::new();
        for table in self.events.values() {
            for event in table.values() {
                seen.entry((event.name.as_str(), event.dialects.to_string())).or_insert(event);
            }
        }
        seen.into_values().collect()
    }

    /// Members applicable under a dialect
    pub fn dialect_bucket(&self, dialect: Dialect) -> Option<&Bucket> {
        self.dialect_buckets.get(&dialect)
    }

    /// Members of a named extension group
    pub fn group_bucket(&self, group: &str) -> Option<&Bucket> {
        self.group_buckets.get(group)
    }

    /// Names of every extension group
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.group_buckets.keys().map(String::as_str)
    }

    /// Whether 64-bit integers are part of the script type set
    pub fn long_integers(&self) -> bool {
        self.long_integers
    }

    /// Members skipped while building
    pub fn rejections(&self) -> &[Rejection] {
        &self.rejected
    }

    /// Export a tooling manifest derived from the registry
    pub fn manifest(&self) -> CapabilityManifest {
        CapabilityManifest::from_registry(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ScriptContext;
    use crate::error::Result;

    fn noop(_ctx: &mut ScriptContext, _args: &[Value]) -> Result<Option<Value>> {
        Ok(None)
    }

    struct TestProvider;

    impl CapabilityProvider for TestProvider {
        fn name(&self) -> &str {
            "test"
        }

        fn register(&self, registry: &mut RegistryBuilder) {
            registry.register_function(
                FunctionDescriptor::method("tMax", noop)
                    .param(ScriptType::Integer)
                    .param(ScriptType::Integer)
                    .returns(ScriptType::Integer),
            );
            registry.register_function(
                FunctionDescriptor::method("tMax", noop)
                    .param(ScriptType::Float)
                    .param(ScriptType::Float)
                    .returns(ScriptType::Float),
            );
            registry.register_function(FunctionDescriptor::free("tStatic", noop));
            registry.register_function(
                FunctionDescriptor::method("tDict", noop).returns(HostType::Foreign("Dictionary<string, object>")),
            );
            registry.register_function(
                FunctionDescriptor::method("tExt", noop)
                    .dialects(Dialect::Ossl)
                    .energy(2.5)
                    .delay(1.0),
            );
            registry.register_constant(ConstantDescriptor::new("T_ONE", Value::Integer(1)));
            registry.register_constant(ConstantDescriptor::new("T_ONE", Value::Integer(2)));
            registry.register_constant(ConstantDescriptor::new("T_MUT", Value::Integer(1)).writable());
            registry.register_constant(
                ConstantDescriptor::new("T_BAD", Value::Integer(1)).typed(HostType::Script(ScriptType::Float)),
            );
            registry.register_constant(ConstantDescriptor::new("T_JSON", Value::String("x".into())).group("json"));
            registry.register_event(EventDescriptor::new("t_event").param(ScriptType::Integer));
            registry.register_event(EventDescriptor::new("t_bad_event").returns(ScriptType::Integer));
            registry.register_event(EventDescriptor::new("t_long_event").param(ScriptType::Long));
        }
    }

    fn build() -> Registry {
        let mut builder = RegistryBuilder::new();
        builder.install(&TestProvider);
        builder.build()
    }

    #[test]
    fn test_overloads_share_name() {
        let registry = build();
        let vis = Visibility::default();
        let sigs: Vec<String> = registry.overloads("tMax", &vis).map(|f| f.signature()).collect();
        assert_eq!(sigs, vec!["tMax(integer, integer) -> integer", "tMax(float, float) -> float"]);
    }

    #[test]
    fn test_rejections_do_not_abort() {
        let registry = build();
        let reasons: Vec<(&str, &RejectReason)> = registry
            .rejections()
            .iter()
            .map(|r| (r.member.as_str(), &r.reason))
            .collect();

        assert!(reasons.contains(&("tStatic", &RejectReason::MissingContext)));
        assert!(reasons.contains(&("T_ONE", &RejectReason::Duplicate(MemberKind::Constant))));
        assert!(reasons.contains(&("T_MUT", &RejectReason::Writable)));
        assert!(reasons.contains(&("t_bad_event", &RejectReason::NonVoidEvent)));
        assert!(reasons.iter().any(|(m, _)| *m == "tDict"));
        assert!(reasons.iter().any(|(m, _)| *m == "T_BAD"));
        assert!(reasons.iter().any(|(m, _)| *m == "t_long_event"));
        assert_eq!(registry.rejections().len(), 7);

        assert!(registry.has_function("tMax", &Visibility::default()));
        assert!(registry.rejections().iter().all(|r| r.provider == "test"));
    }

    #[test]
    fn test_long_integers_opt_in() {
        let mut builder = RegistryBuilder::new().allow_long_integers(true);
        builder.install(&TestProvider);
        let registry = builder.build();
        assert!(registry.long_integers());
        assert!(registry.event("t_long_event", &Visibility::default()).is_some());
        assert!(!build().long_integers());
    }

    #[test]
    fn test_dialect_filtering() {
        let registry = build();
        assert!(!registry.has_function("tExt", &Visibility::default()));

        let ossl = Visibility::default().with_dialect(Dialect::Ossl);
        let ext = registry.overloads("tExt", &ossl).next().unwrap();
        assert_eq!(ext.meta, ExecutionMeta { energy: 2.5, delay: 1.0 });

        let bucket = registry.dialect_bucket(Dialect::Ossl).unwrap();
        assert!(bucket.functions.contains(&ext.id));
    }

    #[test]
    fn test_extension_groups() {
        let registry = build();
        assert!(registry.constant("T_JSON", &Visibility::default()).is_none());
        let vis = Visibility::default().with_group("json");
        assert_eq!(registry.constant("T_JSON", &vis).unwrap().value, Value::String("x".into()));
        assert_eq!(registry.groups().collect::<Vec<_>>(), vec!["json"]);
        assert_eq!(registry.group_bucket("json").unwrap().constants, vec!["T_JSON".to_string()]);
    }

    #[test]
    fn test_event_lookup() {
        let registry = build();
        let event = registry.event("t_event", &Visibility::default()).unwrap();
        assert_eq!(event.params, vec![ScriptType::Integer]);
        assert!(registry.event("t_bad_event", &Visibility::default()).is_none());
    }

    #[test]
    fn test_registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Registry>();
    }
}
