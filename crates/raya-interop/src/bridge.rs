//! Interop bridge facade
//!
//! Entry point for script engines. A request names a target, a member, an
//! argument list and an access context; the bridge tries each dispatch
//! strategy in order until one serves it:
//!
//! | Order | Strategy  | Applies when                                   |
//! |-------|-----------|------------------------------------------------|
//! | 1     | Catalog   | target has a registered host type              |
//! | 2     | Dynamic   | target implements `DynamicObject`              |
//! | 3     | Variant   | target exposes `DispatchEx`                    |
//!
//! Resolution misses (`MissingMember`, `AmbiguousMatch`, unbound dynamic
//! operations) fall through to the next strategy. Failures raised by the
//! invoked member itself propagate immediately.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use raya_interop_sdk::{
    Arg, CallShape, DefaultHooks, DynamicBinding, DynamicObject, DynamicOperation, EngineHooks, InteropError,
    InteropResult, ScriptMemberFlags, ScriptObject, TypeHandle, Value,
};

use crate::access::{AccessModel, PolicyResolver, ScriptAccessPolicy};
use crate::binder::ArgumentBinder;
use crate::catalog::{BindingMode, CandidateSet, MemberCatalog};
use crate::config::BridgeConfig;
use crate::dynamic::{dynamic_of, DynamicBridge};
use crate::identity::{MemberHandle, MemberHandles, SyntheticKind};
use crate::invocability::{Invocability, InvocabilityCache};
use crate::types::{MemberBody, MemberDescriptor, MemberKind, TypeRegistry, CONSTRUCTOR_NAME, DELEGATE_INVOKE_NAME};
use crate::variant::{index_of, DispatchAdapter};

/// Member name used for the default member of a target
pub const DEFAULT_MEMBER_NAME: &str = "";

/// Kind of member access requested by the script engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    /// Read a field or property; the arguments are index values
    GetProperty,
    /// Assign a field or property; the arguments end with the value
    SetProperty,
    /// Call a named method
    InvokeMethod,
    /// Call the target itself
    Invoke,
    /// Construct through the target
    Construct,
    /// Remove a member; yields `Bool(removed)`
    DeleteProperty,
}

// ============================================================================
// Bound method and event values
// ============================================================================

/// Method group read as a property value, bound to its target.
///
/// Invoking it calls the method on the original target.
pub struct HostMethod {
    target: Value,
    handle: Arc<MemberHandle>,
}

impl HostMethod {
    /// Bound target
    pub fn target(&self) -> &Value {
        &self.target
    }

    /// Method name
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Interned method identity
    pub fn handle(&self) -> &Arc<MemberHandle> {
        &self.handle
    }
}

impl ScriptObject for HostMethod {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        format!("[method {}]", self.handle.name())
    }
}

/// Event read as a property value. Scripts subscribe through its
/// `connect(handler)` and `disconnect(handler)` methods.
pub struct EventSource {
    registry: Arc<TypeRegistry>,
    hooks: Arc<dyn EngineHooks>,
    target: Value,
    member: Arc<MemberDescriptor>,
}

impl EventSource {
    /// Event name
    pub fn name(&self) -> &str {
        &self.member.name
    }
}

impl ScriptObject for EventSource {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_dynamic(&self) -> Option<&dyn DynamicObject> {
        Some(self)
    }

    fn describe(&self) -> String {
        format!("[event {}]", self.member.name)
    }
}

impl DynamicObject for EventSource {
    fn bind(&self, operation: &DynamicOperation, _shape: &CallShape) -> DynamicBinding {
        let add = match operation.member_name() {
            Some("connect") if matches!(operation, DynamicOperation::InvokeMember { .. }) => true,
            Some("disconnect") if matches!(operation, DynamicOperation::InvokeMember { .. }) => false,
            _ => return DynamicBinding::NotHandled,
        };
        let registry = self.registry.clone();
        let hooks = self.hooks.clone();
        let target = self.target.clone();
        let member = self.member.clone();
        DynamicBinding::bound(move |args: &mut [Value]| {
            let [handler] = args else {
                return Err(InteropError::ArgumentCount {
                    member: member.name.clone(),
                    expected: 1,
                    got: args.len(),
                });
            };
            ArgumentBinder::new(&registry, hooks.as_ref()).update_event(&target, &member, handler.clone(), add)?;
            Ok(Value::Void)
        })
    }

    fn dynamic_member_names(&self) -> Vec<String> {
        vec!["connect".to_string(), "disconnect".to_string()]
    }
}

// ============================================================================
// InteropBridge
// ============================================================================

/// Shared interop state: registry, policy chain, caches and engine hooks
pub struct InteropBridge {
    registry: Arc<TypeRegistry>,
    policies: PolicyResolver,
    invocability: InvocabilityCache,
    handles: MemberHandles,
    hooks: Arc<dyn EngineHooks>,
    config: BridgeConfig,
}

impl InteropBridge {
    /// Create a bridge with default configuration and pass-through hooks
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(registry, BridgeConfig::default(), Arc::new(DefaultHooks))
    }

    /// Create a bridge with explicit configuration and engine hooks
    pub fn with_config(registry: Arc<TypeRegistry>, config: BridgeConfig, hooks: Arc<dyn EngineHooks>) -> Self {
        Self {
            policies: PolicyResolver::with_assembly_rules(config.assembly_rules()),
            invocability: InvocabilityCache::new(),
            handles: MemberHandles::new(config.compaction_policy()),
            registry,
            hooks,
            config,
        }
    }

    /// Create a bridge configured from a TOML file
    pub fn load(registry: Arc<TypeRegistry>, path: &Path, hooks: Arc<dyn EngineHooks>) -> InteropResult<Self> {
        let config = BridgeConfig::load(path)?;
        Ok(Self::with_config(registry, config, hooks))
    }

    /// Type registry
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Accessibility model over the registry and policy chain
    pub fn access(&self) -> AccessModel<'_> {
        AccessModel::new(&self.registry, &self.policies)
    }

    /// Member catalog
    pub fn catalog(&self) -> MemberCatalog<'_> {
        MemberCatalog::new(self.access(), &self.invocability)
    }

    /// Interned member handle
    pub fn member_handle(&self, kind: SyntheticKind, name: &str) -> Arc<MemberHandle> {
        self.handles.get_or_create(kind, name)
    }

    /// Identity cache tables
    pub fn member_handles(&self) -> &MemberHandles {
        &self.handles
    }

    /// Wrap a value as a call argument
    pub fn marshal_argument(&self, value: Value, by_ref: bool) -> Arg {
        if by_ref {
            Arg::by_ref(value)
        } else {
            Arg::Plain(value)
        }
    }

    fn binder(&self) -> ArgumentBinder<'_> {
        ArgumentBinder::new(&self.registry, self.hooks.as_ref())
    }

    fn default_access(&self) -> ScriptAccessPolicy {
        self.config.default_access
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    /// Resolve `name` on `target` and perform `kind`.
    ///
    /// By-reference arguments receive their post-call values when the call
    /// succeeds.
    pub fn resolve_and_invoke(
        &self,
        target: &Value,
        name: &str,
        args: &mut [Arg],
        context: Option<TypeHandle>,
        kind: InvokeKind,
    ) -> InteropResult<Value> {
        if let Some(method) = target.downcast_ref::<HostMethod>() {
            if kind == InvokeKind::Invoke {
                return self.resolve_and_invoke(&method.target, method.name(), args, context, InvokeKind::InvokeMethod);
            }
        }

        let mut miss = None;
        let outcome = self.through_catalog(target, name, args, context, kind);
        if let Some(done) = settle("catalog", name, outcome, &mut miss) {
            return done;
        }
        if self.config.dynamic_fallback {
            let outcome = self.through_dynamic(target, name, args, kind);
            if let Some(done) = settle("dynamic", name, outcome, &mut miss) {
                return done.map(|v| self.prepare(v));
            }
        }
        if self.config.variant_fallback {
            let outcome = self.through_variant(target, name, args, kind);
            if let Some(done) = settle("variant", name, outcome, &mut miss) {
                return done.map(|v| self.prepare(v));
            }
        }

        if kind == InvokeKind::DeleteProperty {
            return Ok(Value::Bool(false));
        }
        Err(miss.unwrap_or_else(|| InteropError::missing(name)))
    }

    /// Names scripts can see on `target`, across every strategy that applies
    pub fn member_names(&self, target: &Value, context: Option<TypeHandle>) -> InteropResult<Vec<String>> {
        let mut names = Vec::new();
        if let Some((ty, mode)) = self.host_type_of(target) {
            names = self.catalog().member_names(ty, mode, context, self.default_access());
        }
        let bridge = DynamicBridge::new(&self.registry, self.hooks.as_ref());
        let mut extend = |more: Vec<String>| {
            for name in more {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        };
        extend(bridge.dynamic_member_names(target));
        if let Some(dispatch) = target.as_object().and_then(|o| o.as_dispatch()) {
            extend(DispatchAdapter::new(dispatch).named_members()?);
        }
        Ok(names)
    }

    fn prepare(&self, value: Value) -> Value {
        self.hooks.prepare_result(value, TypeHandle::OBJECT, ScriptMemberFlags::NONE)
    }

    fn flags_for(&self, member: &MemberDescriptor, context: Option<TypeHandle>) -> ScriptMemberFlags {
        match self.access().policy(member, context, self.default_access()) {
            ScriptAccessPolicy::ReadOnly => ScriptMemberFlags::READ_ONLY,
            _ => ScriptMemberFlags::NONE,
        }
    }

    /// Registered host type and binding mode of a target
    fn host_type_of(&self, target: &Value) -> Option<(TypeHandle, BindingMode)> {
        match target {
            Value::Type(ty) => Some((*ty, BindingMode::Static)),
            Value::Object(obj) => obj.type_handle().map(|ty| (ty, BindingMode::Instance)),
            other => self.registry.type_of(other).map(|ty| (ty, BindingMode::Instance)),
        }
    }

    // ------------------------------------------------------------------------
    // Strategy 1: catalog
    // ------------------------------------------------------------------------

    fn through_catalog(
        &self,
        target: &Value,
        name: &str,
        args: &mut [Arg],
        context: Option<TypeHandle>,
        kind: InvokeKind,
    ) -> InteropResult<Option<Value>> {
        let Some((ty, mode)) = self.host_type_of(target) else {
            return Ok(None);
        };
        match kind {
            InvokeKind::GetProperty => self.get_member(target, ty, mode, name, args, context).map(Some),
            InvokeKind::SetProperty => self
                .set_member(target, ty, mode, name, args, context)
                .map(|()| Some(Value::Void)),
            InvokeKind::InvokeMethod => self.call_member(target, ty, mode, name, args, context).map(Some),
            InvokeKind::Invoke if mode == BindingMode::Static => self.construct(ty, args, context).map(Some),
            InvokeKind::Invoke => self.invoke_target(target, ty, mode, args, context),
            InvokeKind::Construct if mode == BindingMode::Static => self.construct(ty, args, context).map(Some),
            InvokeKind::Construct | InvokeKind::DeleteProperty => Ok(None),
        }
    }

    fn get_member(
        &self,
        target: &Value,
        ty: TypeHandle,
        mode: BindingMode,
        name: &str,
        args: &mut [Arg],
        context: Option<TypeHandle>,
    ) -> InteropResult<Value> {
        let catalog = self.catalog();
        let members = catalog.members_named(ty, mode, name, context, self.default_access());
        if members.is_empty() {
            if let Some(index) = index_of(name) {
                return self.with_index(index, name, args, |indexed| {
                    let member = self.default_property(ty, mode, name, indexed, context)?;
                    self.read(target, &member, indexed, context)
                });
            }
            return Err(InteropError::missing(name));
        }

        let data = members.filter(|m| matches!(m.kind, MemberKind::Field | MemberKind::Property));
        if let Some(field) = data.of_kind(MemberKind::Field).first() {
            return self.read(target, field, args, context);
        }
        if !data.is_empty() {
            let values = arg_values(args);
            let member = catalog.select_property(&data, name, &values)?;
            return self.read(target, &member, args, context);
        }

        let Some(first) = members.first() else {
            return Err(InteropError::missing(name));
        };
        match &first.body {
            MemberBody::Method(_) => {
                let handle = self.handles.get_or_create(SyntheticKind::Method, name);
                tracing::trace!(name, "method group read as value");
                Ok(Value::object(HostMethod {
                    target: target.clone(),
                    handle,
                }))
            }
            MemberBody::Event { .. } => Ok(Value::object(EventSource {
                registry: self.registry.clone(),
                hooks: self.hooks.clone(),
                target: target.clone(),
                member: first.clone(),
            })),
            MemberBody::NestedType(nested) => Ok(Value::Type(*nested)),
            _ => Err(InteropError::missing(name)),
        }
    }

    fn read(
        &self,
        target: &Value,
        member: &MemberDescriptor,
        args: &mut [Arg],
        context: Option<TypeHandle>,
    ) -> InteropResult<Value> {
        if !self.access().is_readable(member, context) {
            return Err(InteropError::AccessDenied(format!("{} cannot be read", member.name)));
        }
        self.binder().get_value(target, member, args, self.flags_for(member, context))
    }

    fn set_member(
        &self,
        target: &Value,
        ty: TypeHandle,
        mode: BindingMode,
        name: &str,
        args: &mut [Arg],
        context: Option<TypeHandle>,
    ) -> InteropResult<()> {
        let Some((_, indices)) = args.split_last() else {
            return Err(InteropError::argument(
                crate::binder::SETTER_VALUE_PARAM,
                "Property assignment requires a value",
            ));
        };
        let indices = arg_values(indices);

        let data = self
            .catalog()
            .members_named(ty, mode, name, context, self.default_access())
            .filter(|m| matches!(m.kind, MemberKind::Field | MemberKind::Property));
        if data.is_empty() {
            if let Some(index) = index_of(name) {
                return self.with_index(index, name, args, |indexed| {
                    let member = self.default_property(ty, mode, name, &indexed[..indexed.len() - 1], context)?;
                    self.write(target, &member, indexed, context)
                });
            }
            return Err(InteropError::missing(name));
        }

        let member = match data.of_kind(MemberKind::Field).first() {
            Some(field) => field.clone(),
            None => self.catalog().select_property(&data, name, &indices)?,
        };
        self.write(target, &member, args, context)
    }

    fn write(
        &self,
        target: &Value,
        member: &MemberDescriptor,
        args: &mut [Arg],
        context: Option<TypeHandle>,
    ) -> InteropResult<()> {
        if !self.access().is_writable(member, context, self.default_access()) {
            return Err(InteropError::ReadOnly {
                name: member.name.clone(),
            });
        }
        self.binder().set_value(target, member, args)
    }

    /// Default property selected for the given index arguments
    fn default_property(
        &self,
        ty: TypeHandle,
        mode: BindingMode,
        name: &str,
        indices: &[Arg],
        context: Option<TypeHandle>,
    ) -> InteropResult<Arc<MemberDescriptor>> {
        let catalog = self.catalog();
        let candidates = catalog.scriptable_default_properties(ty, mode, context, self.default_access());
        if candidates.is_empty() {
            return Err(InteropError::missing(name));
        }
        catalog.select_property(&candidates, name, &arg_values(indices))
    }

    /// Run `f` with the integer index prepended to `args`, copying the
    /// post-call argument values back
    fn with_index<T>(
        &self,
        index: u32,
        name: &str,
        args: &mut [Arg],
        f: impl FnOnce(&mut [Arg]) -> InteropResult<T>,
    ) -> InteropResult<T> {
        let index = i32::try_from(index).map_err(|_| InteropError::missing(name))?;
        let mut indexed = Vec::with_capacity(args.len() + 1);
        indexed.push(Arg::Plain(Value::I32(index)));
        indexed.extend(args.iter().cloned());
        let result = f(&mut indexed)?;
        for (arg, updated) in args.iter_mut().zip(indexed.into_iter().skip(1)) {
            *arg = updated;
        }
        Ok(result)
    }

    fn call_member(
        &self,
        target: &Value,
        ty: TypeHandle,
        mode: BindingMode,
        name: &str,
        args: &mut [Arg],
        context: Option<TypeHandle>,
    ) -> InteropResult<Value> {
        let catalog = self.catalog();
        let members = catalog.members_named(ty, mode, name, context, self.default_access());
        let methods = members.of_kind(MemberKind::Method);
        if !methods.is_empty() {
            return self.call_method(target, &methods, name, args, context);
        }

        // a field or property holding something callable
        let holder = members
            .iter()
            .find(|m| matches!(m.kind, MemberKind::Field | MemberKind::Property) && m.parameters.is_empty())
            .cloned();
        match holder {
            Some(member) => {
                let callee = self.read(target, &member, &mut [], context)?;
                self.resolve_and_invoke(&callee, DEFAULT_MEMBER_NAME, args, context, InvokeKind::Invoke)
            }
            None => Err(InteropError::missing(name)),
        }
    }

    fn call_method(
        &self,
        target: &Value,
        methods: &CandidateSet,
        name: &str,
        args: &mut [Arg],
        context: Option<TypeHandle>,
    ) -> InteropResult<Value> {
        let member = self.catalog().select_method(methods, name, &arg_values(args))?;
        tracing::trace!(name, declaring = %member.declaring_type, "overload selected");
        self.binder()
            .invoke_method(target, &member, args, self.flags_for(&member, context))
    }

    fn invoke_target(
        &self,
        target: &Value,
        ty: TypeHandle,
        mode: BindingMode,
        args: &mut [Arg],
        context: Option<TypeHandle>,
    ) -> InteropResult<Option<Value>> {
        let catalog = self.catalog();
        let default = self.default_access();
        match catalog.invocability(ty, mode, context, default, self.config.ignore_dynamic) {
            Invocability::Delegate => {
                let methods = catalog
                    .members_named(ty, mode, DELEGATE_INVOKE_NAME, context, default)
                    .of_kind(MemberKind::Method);
                self.call_method(target, &methods, DELEGATE_INVOKE_NAME, args, context)
                    .map(Some)
            }
            Invocability::DefaultProperty => {
                let member = self.default_property(ty, mode, DEFAULT_MEMBER_NAME, args, context)?;
                self.read(target, &member, args, context).map(Some)
            }
            Invocability::Dynamic => Ok(None),
            Invocability::None => Err(InteropError::missing(DEFAULT_MEMBER_NAME)),
        }
    }

    fn construct(&self, ty: TypeHandle, args: &mut [Arg], context: Option<TypeHandle>) -> InteropResult<Value> {
        let catalog = self.catalog();
        let constructors = catalog.scriptable_constructors(ty, context, self.default_access());
        if constructors.is_empty() {
            return Err(InteropError::missing(CONSTRUCTOR_NAME));
        }
        let member = catalog.select_method(&constructors, CONSTRUCTOR_NAME, &arg_values(args))?;
        self.binder().invoke_constructor(&member, args)
    }

    // ------------------------------------------------------------------------
    // Strategy 2: dynamic bridge
    // ------------------------------------------------------------------------

    fn through_dynamic(
        &self,
        target: &Value,
        name: &str,
        args: &mut [Arg],
        kind: InvokeKind,
    ) -> InteropResult<Option<Value>> {
        if dynamic_of(target).is_none() {
            return Ok(None);
        }
        let bridge = DynamicBridge::new(&self.registry, self.hooks.as_ref());
        let index = index_of(name).map(|i| Value::I64(i64::from(i)));

        match kind {
            InvokeKind::GetProperty if name == DEFAULT_MEMBER_NAME => bridge.try_invoke(target, args, true),
            InvokeKind::GetProperty => match index {
                Some(index) if args.is_empty() => bridge.try_get_index(target, &mut [Arg::Plain(index)]),
                _ if args.is_empty() => bridge.try_get_member(target, name),
                _ => match bridge.try_get_member(target, name)? {
                    Some(member) => bridge.try_get_index(&member, args),
                    None => Ok(None),
                },
            },
            InvokeKind::SetProperty => {
                let Some((value, indices)) = args.split_last() else {
                    return Err(InteropError::argument(
                        crate::binder::SETTER_VALUE_PARAM,
                        "Property assignment requires a value",
                    ));
                };
                let value = value.value();
                let indices = arg_values(indices);
                let handled = match index {
                    Some(index) if indices.is_empty() => bridge.try_set_index(target, &[index], value)?,
                    _ if indices.is_empty() => bridge.try_set_member(target, name, value)?,
                    _ => match bridge.try_get_member(target, name)? {
                        Some(member) => bridge.try_set_index(&member, &indices, value)?,
                        None => false,
                    },
                };
                Ok(handled.then_some(Value::Void))
            }
            InvokeKind::InvokeMethod => bridge.try_invoke_member(target, name, args),
            InvokeKind::Invoke => bridge.try_invoke(target, args, false),
            InvokeKind::Construct => bridge.try_create_instance(target, args),
            InvokeKind::DeleteProperty => {
                let outcome = match index {
                    Some(index) => bridge.try_delete_index(target, &[index])?,
                    None => bridge.try_delete_member(target, name)?,
                };
                Ok(outcome.map(Value::Bool))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Strategy 3: variant adapter
    // ------------------------------------------------------------------------

    fn through_variant(
        &self,
        target: &Value,
        name: &str,
        args: &mut [Arg],
        kind: InvokeKind,
    ) -> InteropResult<Option<Value>> {
        let Some(dispatch) = target.as_object().and_then(|o| o.as_dispatch()) else {
            return Ok(None);
        };
        let adapter = DispatchAdapter::new(dispatch);
        let value = match kind {
            InvokeKind::GetProperty => adapter.get_property(name, args)?,
            InvokeKind::SetProperty => {
                adapter.set_property(name, &arg_values(args))?;
                Value::Void
            }
            InvokeKind::InvokeMethod => adapter.invoke_method(name, args)?,
            InvokeKind::Invoke => adapter.invoke(false, args)?,
            InvokeKind::Construct => adapter.invoke(true, args)?,
            InvokeKind::DeleteProperty => Value::Bool(adapter.delete_property(name)?),
        };
        Ok(Some(value))
    }
}

/// Fold one strategy's outcome: `Some` ends resolution, `None` moves on
fn settle(
    strategy: &'static str,
    name: &str,
    outcome: InteropResult<Option<Value>>,
    miss: &mut Option<InteropError>,
) -> Option<InteropResult<Value>> {
    match outcome {
        Ok(Some(value)) => Some(Ok(value)),
        Ok(None) => None,
        Err(e) if e.is_recoverable() => {
            tracing::debug!(strategy, name, error = %e, "dispatch strategy missed");
            *miss = Some(e);
            None
        }
        Err(e) => Some(Err(e)),
    }
}

fn arg_values(args: &[Arg]) -> Vec<Value> {
    args.iter().map(Arg::value).collect()
}
