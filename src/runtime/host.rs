//! The host-imports boundary (§6 "Host imports interface (consumed by
//! core)"), realized as a trait so the external collaborators the spec
//! names -- runtime linking of imports, the WASI environment, signal-
//! handler-based memory-trap plumbing -- stay swappable without touching
//! the interpreter core.
//!
//! Grounded in the teacher's `exec::wasi` (`fd_write_`, a
//! `fn(&mut InstanceRef) -> ExecutionResult`), generalized from one
//! hardcoded WASI function to the documented five-entry-point interface;
//! and in the distilled spec's §5 "Shared-resource policy" for the
//! protected-segment registry, built on [`crate::sync::RwSpinLock`].

use crate::runtime::trap::Trap;
use crate::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostFnHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportDescKind {
    Function,
    Table,
    Memory,
    Global,
}

/// What a successful [`HostImports::lookup_import`] resolves to, one arm
/// per [`ImportDescKind`]. Imported globals resolve to a concrete [`Value`]
/// rather than a handle: Wasm 1.0 has no API to observe an imported
/// global's value change after instantiation, so a one-time snapshot at
/// link time is observably complete for this crate's scope.
#[derive(Debug, Clone, Copy)]
pub enum ResolvedImport {
    Function(HostFnHandle),
    Table(TableHandle),
    Memory(MemoryHandle),
    Global(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfMemory;

/// The host-side collaborator the interpreter core consumes, matching §6's
/// five entry points verbatim. `&mut self` throughout: unlike the parser/
/// validator/generator (purely functional over immutable input), a host
/// import set is inherently stateful (it owns open file descriptors,
/// sockets, the actual backing memory).
pub trait HostImports {
    fn lookup_import(&mut self, module: &str, field: &str, kind: ImportDescKind) -> Option<ResolvedImport>;

    fn invoke_host_function(
        &mut self,
        handle: HostFnHandle,
        args: &[Value],
        results: &mut [Value],
    ) -> Result<(), Trap>;

    fn allocate_linear_memory(&mut self, min_pages: u32, max_pages: Option<u32>) -> Result<MemoryHandle, OutOfMemory>;

    /// Returns the previous page count, or `None` on the spec's `-1`
    /// ("cannot grow") sentinel.
    fn grow_linear_memory(&mut self, handle: MemoryHandle, delta_pages: u32) -> Option<u32>;

    fn free_linear_memory(&mut self, handle: MemoryHandle);
}

/// A `HostImports` with no imports at all: every lookup fails. Useful for
/// modules that declare no imports, and as the default in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImports;

impl HostImports for NoImports {
    fn lookup_import(&mut self, _module: &str, _field: &str, _kind: ImportDescKind) -> Option<ResolvedImport> {
        None
    }

    fn invoke_host_function(&mut self, handle: HostFnHandle, _args: &[Value], _results: &mut [Value]) -> Result<(), Trap> {
        unreachable!("NoImports never resolves a lookup_import call, so handle {handle:?} cannot exist")
    }

    fn allocate_linear_memory(&mut self, _min_pages: u32, _max_pages: Option<u32>) -> Result<MemoryHandle, OutOfMemory> {
        Err(OutOfMemory)
    }

    fn grow_linear_memory(&mut self, _handle: MemoryHandle, _delta_pages: u32) -> Option<u32> {
        None
    }

    fn free_linear_memory(&mut self, _handle: MemoryHandle) {}
}

pub mod segment_registry {
    //! The process-wide table of memory-protected segments (§5, §6
    //! `register_protected_segment`/`unregister_protected_segment`): read
    //! from signal context by the SIGSEGV/SIGBUS shim this crate treats as
    //! an external collaborator, written from instantiation/teardown. The
    //! registry itself -- the thing the RW-lock discipline in §5 actually
    //! protects -- is in scope; installing the signal handler is not.

    use crate::sync::RwSpinLock;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ProtectedSegment {
        pub begin: usize,
        pub end: usize,
        pub memory_index: u32,
        pub static_offset: usize,
    }

    static SEGMENTS: RwSpinLock<Vec<ProtectedSegment>> = RwSpinLock::new(Vec::new());

    /// Idempotent: registering the same `(begin, end)` range twice updates
    /// the existing entry rather than duplicating it.
    pub fn register(segment: ProtectedSegment) {
        let mut guard = SEGMENTS.write();
        if let Some(existing) = guard.iter_mut().find(|s| s.begin == segment.begin && s.end == segment.end) {
            *existing = segment;
        } else {
            guard.push(segment);
        }
    }

    pub fn unregister(begin: usize, end: usize) {
        let mut guard = SEGMENTS.write();
        guard.retain(|s| !(s.begin == begin && s.end == end));
    }

    /// Lock-free on the read path per §5: readers only add/subtract a
    /// reader unit, never block, which is the constraint signal-context
    /// callers impose.
    pub fn find_containing(addr: usize) -> Option<ProtectedSegment> {
        let guard = SEGMENTS.read();
        guard.iter().find(|s| addr >= s.begin && addr < s.end).copied()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn register_then_find_round_trips() {
            let segment = ProtectedSegment { begin: 0x1000, end: 0x2000, memory_index: 0, static_offset: 0 };
            register(segment);
            assert_eq!(find_containing(0x1500), Some(segment));
            unregister(0x1000, 0x2000);
            assert_eq!(find_containing(0x1500), None);
        }
    }
}
