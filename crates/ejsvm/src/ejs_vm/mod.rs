// VM heap context
// Owns the record arena, type pools, type registry, collector and the root
// set. One heap per VM instance; all calls come from the mutator thread.

mod alloc_report;
mod call_frame;
mod ejs_error;
pub mod ejs_limits;
mod heap_option;
mod property_api;

pub use alloc_report::{AllocReport, PoolReport};
pub use call_frame::{CallFrame, ModuleInit};
pub use ejs_error::{EjsError, EjsResult};
pub use heap_option::{HeapOption, TuneProfile};

use smol_str::SmolStr;
use tracing::{info, warn};

use crate::ejs_value::{
    EjsObject, EjsType, NativeVar, TYPE_BOOLEAN, TYPE_NUMBER, TYPE_OBJECT, TYPE_STRING, TypeDef,
    TypeRegistry,
};
use crate::gc::{
    CollectInfo, CollectMode, EjsTypeId, GC, GEN_ETERNAL, GcPool, GcStats, GcVar, GenerationStats,
    Mark, Marker, Slot, TypePoolStats, TypePools, VarBody, VarId, VarKind,
};

pub struct EjsHeap {
    pub(crate) vars: GcPool,
    pub(crate) pools: TypePools,
    pub(crate) types: TypeRegistry,
    pub(crate) gc: GC,
    pub(crate) option: HeapOption,

    // Roots
    global: VarId,
    frames: Vec<CallFrame>,
    result: Slot,
    exception: Slot,
    initializers: Vec<ModuleInit>,

    /// Namespaces `lookup_single` may resolve into without qualification
    standard_spaces: Vec<SmolStr>,
    /// Set when memory stayed above the hard limit after a collection
    degraded: bool,
    /// Message describing the last error returned by a mutating call
    pub error_message: String,
}

impl EjsHeap {
    pub fn new(option: HeapOption) -> Self {
        let types = TypeRegistry::with_builtins();
        let mut pools = TypePools::new(option.max_types);
        let mut vars = GcPool::new();
        let mut gc = GC::new(&option);

        // The global object is eternal and permanent
        let global = {
            let ty = &types[TYPE_OBJECT];
            let body = VarBody::Object(EjsObject::new(true));
            let alloc = pools.alloc_var(&mut vars, ty, 0, body);
            gc.alloc_generation = GEN_ETERNAL;
            gc.add_var(&mut vars, alloc.id);
            gc.alloc_generation = crate::gc::GEN_NEW;
            gc.track_size(alloc.delta);
            if let Some(header) = vars.header_mut(alloc.id) {
                header.permanent = true;
            }
            alloc.id
        };
        // Bootstrap allocations are not collector work
        gc.work_done = 0;
        gc.required = false;

        EjsHeap {
            vars,
            pools,
            types,
            gc,
            option,
            global,
            frames: Vec::new(),
            result: None,
            exception: None,
            initializers: Vec::new(),
            standard_spaces: vec![SmolStr::default()],
            degraded: false,
            error_message: String::new(),
        }
    }

    /// Record a message for `kind` and hand the error back for returning
    pub(crate) fn fail(&mut self, kind: EjsError, msg: impl Into<String>) -> EjsError {
        self.error_message = msg.into();
        kind
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn option(&self) -> &HeapOption {
        &self.option
    }

    // ============ Types ============

    pub fn define_type(&mut self, def: TypeDef) -> EjsTypeId {
        self.types.define(def)
    }

    pub fn get_type(&self, type_id: EjsTypeId) -> Option<&EjsType> {
        self.types.get(type_id)
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Type of a live record
    pub fn type_of(&self, id: VarId) -> Option<&EjsType> {
        self.vars.get_live(id).and_then(|var| self.types.get(var.type_id))
    }

    /// Namespaces accepted by `lookup_single`. The public namespace is always present.
    pub fn add_standard_space(&mut self, space: impl Into<SmolStr>) {
        let space = space.into();
        if !self.standard_spaces.contains(&space) {
            self.standard_spaces.push(space);
        }
    }

    // ============ Allocation ============

    /// Allocate a record of `type_id` with `extra_bytes` of inline storage.
    /// The body starts in the default state for the type's kind.
    pub fn allocate(&mut self, type_id: EjsTypeId, extra_bytes: usize) -> EjsResult<VarId> {
        let kind = match self.types.get(type_id) {
            Some(ty) => ty.kind,
            None => return Err(self.fail(EjsError::TypeError, format!("unknown type {}", type_id.0))),
        };
        let mut body = VarBody::default_for(kind);
        if let (VarBody::Object(obj), Some(ty)) = (&mut body, self.types.get(type_id)) {
            obj.set_dynamic(ty.dynamic_instance);
        }
        self.alloc_var(type_id, extra_bytes, body)
    }

    pub(crate) fn alloc_var(
        &mut self,
        type_id: EjsTypeId,
        extra_bytes: usize,
        body: VarBody,
    ) -> EjsResult<VarId> {
        let Some(ty) = self.types.get(type_id) else {
            return Err(self.fail(EjsError::TypeError, format!("unknown type {}", type_id.0)));
        };
        let size = ty.instance_size + extra_bytes + body.storage_bytes();
        if !self.pools.has_free(type_id) {
            let used = self.gc.used_memory();
            let over_limit = used.saturating_add(size) > self.option.max_memory;
            let throttled = self.degraded && used >= self.option.redline_memory;
            if over_limit || throttled {
                self.error_message = format!("cannot allocate {size} bytes for {}", ty.qname);
                return Err(EjsError::OutOfMemory);
            }
        }

        let alloc = self.pools.alloc_var(&mut self.vars, ty, extra_bytes, body);
        self.gc.track_size(alloc.delta);
        self.gc.add_var(&mut self.vars, alloc.id);
        Ok(alloc.id)
    }

    /// New instance of an object type, laid out after the type's template
    pub fn create_object(&mut self, type_id: EjsTypeId, extra_slots: usize) -> EjsResult<VarId> {
        let obj = match self.types.get(type_id) {
            Some(ty) if ty.kind == VarKind::Object => EjsObject::from_template(
                ty.instance_template(),
                ty.instance_slot_count(),
                extra_slots,
                ty.dynamic_instance,
                ty.separate_instance_slots,
            ),
            _ => {
                return Err(self.fail(
                    EjsError::TypeError,
                    format!("type {} is not an object type", type_id.0),
                ));
            }
        };
        self.alloc_var(type_id, 0, VarBody::Object(obj))
    }

    /// New empty dynamic object
    pub fn create_plain_object(&mut self) -> EjsResult<VarId> {
        self.create_object(TYPE_OBJECT, 0)
    }

    pub fn create_string(&mut self, value: &str) -> EjsResult<VarId> {
        self.alloc_var(TYPE_STRING, 0, VarBody::String(SmolStr::new(value)))
    }

    pub fn create_number(&mut self, value: f64) -> EjsResult<VarId> {
        self.alloc_var(TYPE_NUMBER, 0, VarBody::Number(value))
    }

    pub fn create_boolean(&mut self, value: bool) -> EjsResult<VarId> {
        self.alloc_var(TYPE_BOOLEAN, 0, VarBody::Boolean(value))
    }

    /// New native record carrying `payload`
    pub fn create_native(
        &mut self,
        type_id: EjsTypeId,
        payload: Box<dyn NativeVar>,
    ) -> EjsResult<VarId> {
        if self.types.get(type_id).map(|ty| ty.kind) != Some(VarKind::Native) {
            return Err(self.fail(
                EjsError::TypeError,
                format!("type {} is not a native type", type_id.0),
            ));
        }
        let id = self.alloc_var(type_id, 0, VarBody::Native(payload))?;
        self.record_native_refs(id);
        Ok(id)
    }

    /// Install the payload of a native record allocated with `allocate`
    pub fn set_native(&mut self, id: VarId, payload: Box<dyn NativeVar>) -> EjsResult<()> {
        let Some(var) = self
            .vars
            .get_live_mut(id)
            .filter(|var| matches!(var.body, VarBody::Empty | VarBody::Native(_)))
        else {
            return Err(self.fail(EjsError::TypeError, format!("{id:?} is not a native record")));
        };
        var.body = VarBody::Native(payload);
        self.record_native_refs(id);
        Ok(())
    }

    /// Mutate a native payload. Every reference it holds afterwards goes
    /// through the write barrier.
    pub fn with_native_mut<T: NativeVar, R>(
        &mut self,
        id: VarId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let result = match &mut self.vars.get_live_mut(id)?.body {
            VarBody::Native(native) => f(native.as_any_mut().downcast_mut::<T>()?),
            _ => return None,
        };
        self.record_native_refs(id);
        Some(result)
    }

    fn record_native_refs(&mut self, id: VarId) {
        let mut marker = Marker::new();
        if let Some(var) = self.vars.get_live(id) {
            var.body.mark_refs(&mut marker);
        }
        for child in marker.drain() {
            self.gc.record_reference(&mut self.vars, id, Some(child));
        }
    }

    // ============ Record access ============

    #[inline]
    pub fn var(&self, id: VarId) -> Option<&GcVar> {
        self.vars.get_live(id)
    }

    #[inline]
    pub fn is_live(&self, id: VarId) -> bool {
        self.vars.is_live(id)
    }

    pub fn object(&self, id: VarId) -> EjsResult<&EjsObject> {
        match self.vars.get_live(id) {
            Some(var) => var.body.as_object().ok_or(EjsError::TypeError),
            None => Err(EjsError::ReferenceError),
        }
    }

    pub fn string(&self, id: VarId) -> Option<&str> {
        match &self.vars.get_live(id)?.body {
            VarBody::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn number(&self, id: VarId) -> Option<f64> {
        match self.vars.get_live(id)?.body {
            VarBody::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn boolean(&self, id: VarId) -> Option<bool> {
        match self.vars.get_live(id)?.body {
            VarBody::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn native<T: NativeVar>(&self, id: VarId) -> Option<&T> {
        match &self.vars.get_live(id)?.body {
            VarBody::Native(native) => native.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Generation tag of a live record
    pub fn generation_of(&self, id: VarId) -> Option<u8> {
        self.vars.header(id).map(|header| header.generation)
    }

    // ============ Roots ============

    #[inline]
    pub fn global(&self) -> VarId {
        self.global
    }

    pub fn push_frame(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<CallFrame> {
        self.frames.pop()
    }

    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut CallFrame> {
        self.frames.last_mut()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn set_result(&mut self, value: Slot) {
        self.result = value;
    }

    pub fn result(&self) -> Slot {
        self.result
    }

    pub fn set_exception(&mut self, value: Slot) {
        self.exception = value;
    }

    pub fn exception(&self) -> Slot {
        self.exception
    }

    pub fn take_exception(&mut self) -> Slot {
        self.exception.take()
    }

    /// Keep a module initializer alive until it has run
    pub fn add_initializer(&mut self, function: VarId) {
        self.initializers.push(ModuleInit {
            function,
            initialized: false,
        });
    }

    pub fn mark_initialized(&mut self, function: VarId) {
        for init in &mut self.initializers {
            if init.function == function {
                init.initialized = true;
            }
        }
        self.initializers.retain(|init| !init.initialized);
    }

    /// Everything the mark phase starts from, cross-generation roots aside
    fn gather_roots(&self) -> Vec<VarId> {
        let mut marker = Marker::new();
        marker.visit(self.global);
        if let Ok(global) = self.object(self.global) {
            for id in global.references() {
                marker.visit(id);
            }
        }
        self.frames.mark(&mut marker);
        self.result.mark(&mut marker);
        self.exception.mark(&mut marker);
        for init in self.initializers.iter().filter(|init| !init.initialized) {
            init.mark(&mut marker);
        }
        marker.drain().collect()
    }

    // ============ Collector control ============

    /// Run a collection, then apply the memory pressure policy. Returns
    /// `OutOfMemory` when the heap is still over the hard limit.
    pub fn collect(&mut self, mode: CollectMode) -> EjsResult<CollectInfo> {
        let roots = self.gather_roots();
        let info = self
            .gc
            .collect(mode, &roots, &mut self.vars, &mut self.pools, &self.types);
        self.check_memory()?;
        Ok(info)
    }

    /// Demand collection safepoint: runs a smart collection once the
    /// allocation work quota has been reached
    pub fn collect_if_required(&mut self) -> EjsResult<Option<CollectInfo>> {
        if !self.gc.is_required() || !self.option.enable_demand_collect {
            return Ok(None);
        }
        self.collect(CollectMode::Smart).map(Some)
    }

    pub fn is_time_for_gc(&self, time_till_next_event: u64) -> bool {
        self.gc.is_time_for_gc(time_till_next_event, &self.option)
    }

    /// Turn the collector on or off; returns the previous setting
    pub fn enable_gc(&mut self, enabled: bool) -> bool {
        std::mem::replace(&mut self.gc.enabled, enabled)
    }

    /// Generation new records are linked into; returns the previous one
    pub fn set_allocation_generation(&mut self, generation: u8) -> u8 {
        std::mem::replace(&mut self.gc.alloc_generation, generation.min(GEN_ETERNAL))
    }

    pub fn allocation_generation(&self) -> u8 {
        self.gc.alloc_generation
    }

    pub fn make_permanent(&mut self, id: VarId) -> EjsResult<()> {
        match self.vars.header_mut(id) {
            Some(header) => {
                header.permanent = true;
                Ok(())
            }
            None => Err(self.fail(EjsError::ReferenceError, format!("{id:?} is not live"))),
        }
    }

    /// Make a record collectable again. References to it were never
    /// recorded by the barrier, so the next collection is a full one.
    pub fn make_transient(&mut self, id: VarId) -> EjsResult<()> {
        match self.vars.header_mut(id) {
            Some(header) => {
                if header.permanent {
                    header.permanent = false;
                    self.gc.pending_full = true;
                }
                Ok(())
            }
            None => Err(self.fail(EjsError::ReferenceError, format!("{id:?} is not live"))),
        }
    }

    fn check_memory(&mut self) -> EjsResult<()> {
        let redline = self.option.redline_memory;
        if self.gc.used_memory() >= redline {
            let released = self.pools.prune(&mut self.vars);
            self.gc.track_size(-(released as isize));
            self.gc.note_redline();
            info!(
                released,
                used_memory = self.gc.used_memory(),
                redline,
                "memory redline reached, type pools pruned"
            );
        }

        let used = self.gc.used_memory();
        if used >= self.option.max_memory {
            if !self.degraded {
                warn!(used, max_memory = self.option.max_memory, "heap exhausted, degrading");
            }
            self.degraded = true;
            return Err(self.fail(
                EjsError::OutOfMemory,
                format!("memory limit of {} bytes exceeded", self.option.max_memory),
            ));
        }
        if self.degraded && used < redline {
            info!(used, "memory pressure relieved, leaving degraded mode");
            self.degraded = false;
        }
        Ok(())
    }

    #[inline]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    // ============ Statistics ============

    pub fn gc_stats(&self) -> &GcStats {
        self.gc.stats()
    }

    pub fn used_memory(&self) -> usize {
        self.gc.used_memory()
    }

    pub fn is_gc_required(&self) -> bool {
        self.gc.is_required()
    }

    pub fn is_root_overflow(&self) -> bool {
        self.gc.is_overflowed()
    }

    pub fn generation_stats(&self, generation: u8) -> GenerationStats {
        self.gc.generation(generation.min(GEN_ETERNAL)).stats()
    }

    /// Root holders registered for `generation`
    pub fn generation_roots(&self, generation: u8) -> &[VarId] {
        self.gc.generation(generation.min(GEN_ETERNAL)).roots()
    }

    pub fn pool_stats(&self, type_id: EjsTypeId) -> Option<TypePoolStats> {
        self.pools.stats(type_id)
    }

    /// Records parked on type free lists
    pub fn pooled_count(&self) -> usize {
        self.pools.pooled_count()
    }
}
