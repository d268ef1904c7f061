use std::collections::BTreeMap;

/// Granularity of mapped addresses.
pub const PAGE_SIZE: u64 = 4096;

/// First address handed out by the alloc syscall.
pub const BASE_ADDRESS: u64 = 0x1000_0000;

/// Protection bits accepted by alloc and protect.
pub mod protection {
    pub const READ: i64 = 1;
    pub const WRITE: i64 = 2;
    pub const EXEC: i64 = 4;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Region {
    length: u64,
    protection: i64,
}

/// Address space bookkeeping for the memory syscalls.
///
/// Programs cannot load or store through these addresses; they are opaque
/// handles. Only the accounting against the memory limit is real.
pub(super) struct MappedMemory {
    /// Regions keyed by base address.
    regions: BTreeMap<u64, Region>,
    next_address: u64,
    mapped_bytes: u64,
    limit: u64,
}

fn page_span(length: u64) -> u64 {
    length.div_ceil(PAGE_SIZE).saturating_mul(PAGE_SIZE)
}

impl MappedMemory {
    pub(super) fn new(limit: u64) -> Self {
        Self {
            regions: BTreeMap::new(),
            next_address: BASE_ADDRESS,
            mapped_bytes: 0,
            limit,
        }
    }

    pub(super) fn mapped_bytes(&self) -> u64 {
        self.mapped_bytes
    }

    fn is_free(&self, address: u64, length: u64) -> bool {
        let end = address.saturating_add(page_span(length));
        // Only the nearest region below can reach into the range.
        let below = self
            .regions
            .range(..end)
            .next_back()
            .is_some_and(|(&base, region)| base.saturating_add(page_span(region.length)) > address);
        !below
    }

    /// Maps `length` bytes, preferring `hint` when it is a free page-aligned address.
    pub(super) fn map(&mut self, hint: u64, length: u64, protection: i64) -> Option<u64> {
        if length == 0 || self.mapped_bytes.checked_add(length)? > self.limit {
            return None;
        }

        let address = if hint >= BASE_ADDRESS && hint % PAGE_SIZE == 0 && self.is_free(hint, length) {
            hint
        } else {
            let mut candidate = self.next_address;
            while !self.is_free(candidate, length) {
                candidate = candidate.checked_add(PAGE_SIZE)?;
            }
            candidate
        };

        self.next_address = self
            .next_address
            .max(address.checked_add(page_span(length))?);
        self.regions.insert(address, Region { length, protection });
        self.mapped_bytes += length;
        Some(address)
    }

    /// Unmaps the region based at `address`. Fails unless `length` fits inside it.
    pub(super) fn unmap(&mut self, address: u64, length: u64) -> bool {
        match self.regions.get(&address) {
            Some(region) if length > 0 && length <= region.length => {
                self.mapped_bytes -= region.length;
                self.regions.remove(&address);
                true
            }
            _ => false,
        }
    }

    /// Changes a region's protection, returning the previous bits.
    pub(super) fn protect(&mut self, address: u64, length: u64, protection: i64) -> Option<i64> {
        let region = self.regions.get_mut(&address)?;
        if length == 0 || length > region.length {
            return None;
        }
        Some(std::mem::replace(&mut region.protection, protection))
    }
}

#[cfg(test)]
mod tests {
    use super::protection::{READ, WRITE};
    use super::*;

    #[test]
    fn map_returns_page_aligned_addresses() {
        let mut memory = MappedMemory::new(1 << 20);
        let a = memory.map(0, 10, READ).unwrap();
        let b = memory.map(0, PAGE_SIZE + 1, READ).unwrap();
        let c = memory.map(0, 1, READ).unwrap();
        assert_eq!(a, BASE_ADDRESS);
        assert_eq!(b, BASE_ADDRESS + PAGE_SIZE);
        assert_eq!(c, BASE_ADDRESS + 3 * PAGE_SIZE);
        assert_eq!(memory.mapped_bytes(), 10 + PAGE_SIZE + 1 + 1);
    }

    #[test]
    fn map_rejects_zero_and_over_limit() {
        let mut memory = MappedMemory::new(256);
        assert_eq!(memory.map(0, 0, READ), None);
        assert_eq!(memory.map(0, 257, READ), None);
        assert!(memory.map(0, 200, READ).is_some());
        assert_eq!(memory.map(0, 100, READ), None);
    }

    #[test]
    fn map_honors_free_hint() {
        let mut memory = MappedMemory::new(1 << 20);
        let hint = BASE_ADDRESS + 8 * PAGE_SIZE;
        assert_eq!(memory.map(hint, 16, READ), Some(hint));
        // Taken hint falls back to the next free address.
        assert_eq!(memory.map(hint, 16, READ), Some(hint + PAGE_SIZE));
        // Unaligned hint is ignored.
        assert_eq!(memory.map(hint + 3, 16, READ), Some(hint + 2 * PAGE_SIZE));
    }

    #[test]
    fn unmap_releases_accounting() {
        let mut memory = MappedMemory::new(256);
        let address = memory.map(0, 200, READ).unwrap();
        assert!(!memory.unmap(address, 201));
        assert!(!memory.unmap(address + 1, 10));
        assert!(memory.unmap(address, 200));
        assert_eq!(memory.mapped_bytes(), 0);
        assert!(!memory.unmap(address, 200));
        assert!(memory.map(0, 200, READ).is_some());
    }

    #[test]
    fn protect_swaps_bits() {
        let mut memory = MappedMemory::new(1 << 20);
        let address = memory.map(0, 64, READ).unwrap();
        assert_eq!(memory.protect(address, 64, READ | WRITE), Some(READ));
        assert_eq!(memory.protect(address, 64, READ), Some(READ | WRITE));
        assert_eq!(memory.protect(address, 65, READ), None);
        assert_eq!(memory.protect(address + PAGE_SIZE, 1, READ), None);
    }
}
