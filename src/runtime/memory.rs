//! Linear memory: a growable byte buffer in page-sized increments.
//!
//! Grounded in the teacher's `exec::memory::Memory` / `exec::memory::mod`
//! (`data: Vec<u8>`, a page-limit range, `grow`/`page_size`), generalized
//! from the teacher's single always-present memory to `Option<Memory>` (a
//! module need not define one) and corrected for the teacher's page-size
//! bug: the teacher hardcodes `MEMORY_PAGE_SIZE = 4096`, but the Wasm
//! binary format's `memory.size`/`memory.grow` and the limits section both
//! count 64 KiB pages (<https://webassembly.github.io/spec/core/exec/runtime.html#page-size>);
//! this crate uses the spec's constant instead.

use crate::types::Limits;

pub const PAGE_SIZE: usize = 65536;

#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
    limits: Limits,
}

impl Memory {
    pub fn new(limits: Limits) -> Self {
        let mut memory = Memory { data: Vec::new(), limits };
        memory.data.resize(limits.min as usize * PAGE_SIZE, 0);
        memory
    }

    pub fn page_count(&self) -> u32 {
        (self.data.len() / PAGE_SIZE) as u32
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Grows the memory by `delta` pages, returning the previous page
    /// count, or `None` if growing would exceed the declared maximum (the
    /// spec's "-1" sentinel, modeled as `Option` rather than a signed
    /// return so callers cannot forget to check it).
    pub fn grow(&mut self, delta: u32) -> Option<u32> {
        let current = self.page_count();
        let target = current.checked_add(delta)?;
        if let Some(max) = self.limits.max {
            if target > max {
                return None;
            }
        }
        self.data.resize(target as usize * PAGE_SIZE, 0);
        Some(current)
    }

    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> bool {
        match self.data.get_mut(offset..offset + bytes.len()) {
            Some(slice) => {
                slice.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    pub fn read_bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.data.get(offset..offset + len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_memory_is_zeroed_to_min_pages() {
        let mem = Memory::new(Limits::new(2, None).unwrap());
        assert_eq!(mem.data().len(), 2 * PAGE_SIZE);
        assert!(mem.data().iter().all(|b| *b == 0));
    }

    #[test]
    fn grow_respects_declared_maximum() {
        let mut mem = Memory::new(Limits::new(1, Some(2)).unwrap());
        assert_eq!(mem.grow(1), Some(1));
        assert_eq!(mem.page_count(), 2);
        assert_eq!(mem.grow(1), None);
        assert_eq!(mem.page_count(), 2);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut mem = Memory::new(Limits::new(1, None).unwrap());
        assert!(mem.write_bytes(10, &[1, 2, 3, 4]));
        assert_eq!(mem.read_bytes(10, 4), Some(&[1, 2, 3, 4][..]));
    }

    #[test]
    fn out_of_bounds_access_is_rejected() {
        let mut mem = Memory::new(Limits::new(1, None).unwrap());
        assert!(!mem.write_bytes(PAGE_SIZE - 2, &[1, 2, 3, 4]));
        assert!(mem.read_bytes(PAGE_SIZE - 2, 4).is_none());
    }
}
