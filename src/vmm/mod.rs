//! Virtual Memory Manager: page-indexed translation, demand paging, LRU
//! eviction, and swap coordination.
//!
//! [`VirtualMemoryManager`] owns the one `VirtualRAM` region's page table, a
//! [`crate::pmm::PhysicalMemoryManager`] for frame storage, and a
//! [`crate::swap::SwapDevice`] for evicted content. Non-`VirtualRAM` regions
//! are exposed read/write by address without going through this table at
//! all (see `read_byte`/`write_byte`); [`VirtualMemoryManager::attach_region`]
//! additionally lets a caller address them by page id, using ids drawn from
//! a range disjoint from the paging ids `[0, N_v)` so the two families never
//! collide.

mod lru;
mod pageset;

use std::collections::HashMap;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::memmap::{MemoryMap, SegmentType};
use crate::page::{split_addr, PAGE_SIZE};
use crate::pmm::PhysicalMemoryManager;
use crate::swap::SwapDevice;
use lru::Lru;
use pageset::{FifoPageSet, LifoPageSet};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct PageFlags: u8 {
        const ACTIVE  = 0b0001;
        const ON_DISK = 0b0010;
        const LOCKED  = 0b0100;
        const DIRTY   = 0b1000;
    }
}

#[derive(Debug, Clone, Copy)]
struct VirtualPageEntry {
    flags: PageFlags,
    physical: Option<u64>,
    owner_uid: u32,
    owner_gid: u32,
    /// 12-bit word: bits 0-3 user, 4-7 group, 8-11 world. Each nibble is a
    /// `Read|Write|Execute|System` mask tested the same way regardless of
    /// which nibble was selected.
    protection: u16,
}

impl VirtualPageEntry {
    fn inactive() -> Self {
        VirtualPageEntry {
            flags: PageFlags::empty(),
            physical: None,
            owner_uid: 0,
            owner_gid: 0,
            protection: 0,
        }
    }
}

/// Default target for [`VirtualMemoryManager::reclaim_to_low_water_mark`].
pub const DEFAULT_LOW_WATER_MARK: u64 = 8;
/// Default number of pages [`VirtualMemoryManager`] evicts in one batch.
pub const DEFAULT_BATCH_SIZE: u64 = 4;

/// Page-indexed translation table over one `VirtualRAM` region, plus demand
/// paging and LRU-driven eviction into a [`SwapDevice`].
pub struct VirtualMemoryManager {
    table: Vec<VirtualPageEntry>,
    n_v: u64,
    virtual_ram_start_page: u64,
    free_virtual: FifoPageSet,
    free_physical: LifoPageSet,
    lru: Lru,
    device_pages: HashMap<u64, u64>,
    region_device_ids: HashMap<u32, Vec<u64>>,
    virtual_ram_key: u32,
    pmm: PhysicalMemoryManager,
    swap: Box<dyn SwapDevice>,
    sink: Box<dyn EventSink>,
    low_water_mark: u64,
    batch_size: u64,
    poisoned: bool,
}

impl VirtualMemoryManager {
    /// Builds the page table for `map`'s unique `VirtualRAM` region, backed
    /// by exactly `num_pages(VirtualRAM)` physical frames — no overcommit.
    /// Equivalent to `with_physical_frames(map, None, swap, sink)`.
    pub fn new(
        map: &MemoryMap,
        swap: Box<dyn SwapDevice>,
        sink: Box<dyn EventSink>,
    ) -> Result<Self> {
        Self::with_physical_frames(map, None, swap, sink)
    }

    /// Builds the page table for `map`'s unique `VirtualRAM` region, wiring
    /// in `swap` as the eviction target and pre-marking every other
    /// region's frames `Active | Locked` under identity page ids.
    ///
    /// `physical_frames` sizes the backing frame pool independently from the
    /// virtual page count `N_v = num_pages(VirtualRAM)`: `None` uses all
    /// `N_v` frames (one virtual page per frame, no overcommit — the
    /// distilled contract's literal reading); `Some(m)` with `m < N_v`
    /// reserves only the first `m` of the region's frames for paging,
    /// letting more virtual pages be allocated than there are frames to
    /// back them all at once, which is what makes demand paging meaningful.
    /// Mirrors the reference implementation's independent
    /// `NumVirtualPages`/`NumPhysicalPages` configuration. Fails
    /// `InvalidMap` if `physical_frames` is `Some(0)` or exceeds `N_v`.
    pub fn with_physical_frames(
        map: &MemoryMap,
        physical_frames: Option<u64>,
        swap: Box<dyn SwapDevice>,
        sink: Box<dyn EventSink>,
    ) -> Result<Self> {
        let virtual_ram = map.virtual_ram();
        let n_v = virtual_ram.num_pages();
        let virtual_ram_start_page = virtual_ram.start_page();
        let virtual_ram_key = virtual_ram.key;

        let frame_count = physical_frames.unwrap_or(n_v);
        if frame_count == 0 || frame_count > n_v {
            return Err(Error::InvalidMap(format!(
                "physical frame count {frame_count} out of range for {n_v} virtual pages"
            )));
        }

        let pmm = PhysicalMemoryManager::new(map, sink.as_ref());

        let mut device_pages = HashMap::new();
        let mut region_device_ids = HashMap::new();
        let mut next_device_id = n_v;
        for region in map.regions() {
            if region.segment_type == SegmentType::VirtualRAM {
                continue;
            }
            let mut ids = Vec::with_capacity(region.num_pages() as usize);
            for i in 0..region.num_pages() {
                let id = next_device_id;
                next_device_id += 1;
                device_pages.insert(id, region.start_page() + i);
                ids.push(id);
            }
            region_device_ids.insert(region.key, ids);
        }

        sink.info(
            "vmm",
            &format!("constructed page table with {n_v} virtual pages over {frame_count} frames"),
        );

        Ok(VirtualMemoryManager {
            table: vec![VirtualPageEntry::inactive(); n_v as usize],
            n_v,
            virtual_ram_start_page,
            free_virtual: FifoPageSet::new(0..n_v),
            free_physical: LifoPageSet::new(
                virtual_ram_start_page..virtual_ram_start_page + frame_count,
            ),
            lru: Lru::new(),
            device_pages,
            region_device_ids,
            virtual_ram_key,
            pmm,
            swap,
            sink,
            low_water_mark: DEFAULT_LOW_WATER_MARK,
            batch_size: DEFAULT_BATCH_SIZE,
            poisoned: false,
        })
    }

    fn check_alive(&self) -> Result<()> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        Ok(())
    }

    fn poison<T>(&mut self, err: Error) -> Result<T> {
        self.poisoned = true;
        self.sink.error("vmm", "invariant violation, poisoning");
        Err(err)
    }

    fn free_virtual_to_used(&mut self) -> Option<u64> {
        self.free_virtual.move_free_to_used()
    }

    fn free_physical_to_used(&mut self) -> Option<u64> {
        self.free_physical.move_free_to_used()
    }

    fn virtual_to_free(&mut self, page: u64) -> Result<()> {
        if self.free_virtual.move_used_to_free(page).is_err() {
            return self.poison(Error::Poisoned);
        }
        Ok(())
    }

    fn physical_to_free(&mut self, frame: u64) -> Result<()> {
        if self.free_physical.move_used_to_free(frame).is_err() {
            return self.poison(Error::Poisoned);
        }
        Ok(())
    }

    /// `n ∈ [1, N_v]` virtual pages, freshly Resident with zeroed frames.
    /// Either all `n` are allocated or none are. Raising `FreePhysical` to
    /// `n` may itself evict several pages before the free-list lengths are
    /// satisfied; if a later step of that process fails, or the lengths
    /// still come up short, every eviction performed during this call is
    /// rolled back (the evicted pages are paged back in) before the error
    /// is returned, so a failed `allocate` leaves no observable trace.
    pub fn allocate(&mut self, n: u64) -> Result<Vec<u64>> {
        self.check_alive()?;
        if n == 0 || n > self.n_v {
            return Err(Error::Exhausted);
        }
        if (self.free_virtual.free_len() as u64) < n {
            return Err(Error::Exhausted);
        }
        let mut evicted_this_call = Vec::new();
        while (self.free_physical.free_len() as u64) < n {
            match self.swap_old_pages_tracked(&mut evicted_this_call) {
                Ok(()) => {}
                Err(Error::NoVictims) => break,
                Err(e) => {
                    self.rollback_evictions(evicted_this_call);
                    return Err(e);
                }
            }
        }
        if (self.free_physical.free_len() as u64) < n {
            self.rollback_evictions(evicted_this_call);
            return Err(Error::Exhausted);
        }

        let zeros = vec![0u8; PAGE_SIZE as usize];
        let mut allocated = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let vp = self.free_virtual_to_used().expect("length checked above");
            let frame = self.free_physical_to_used().expect("length checked above");
            self.pmm.write_page(frame, &zeros)?;
            self.table[vp as usize] = VirtualPageEntry {
                flags: PageFlags::ACTIVE,
                physical: Some(frame),
                owner_uid: 0,
                owner_gid: 0,
                protection: 0,
            };
            self.lru.push_front(vp);
            allocated.push(vp);
        }
        Ok(allocated)
    }

    /// Returns each page to `Inactive`. Fails `NotActive` on any page
    /// already inactive; pages returned before the failing one remain freed.
    pub fn free(&mut self, pages: &[u64]) -> Result<()> {
        self.check_alive()?;
        for &page in pages {
            self.return_one(page)?;
        }
        Ok(())
    }

    fn return_one(&mut self, page: u64) -> Result<()> {
        if page >= self.n_v {
            return Err(Error::WrongRegion);
        }
        let entry = self.table[page as usize];
        if !entry.flags.contains(PageFlags::ACTIVE) {
            return Err(Error::NotActive);
        }
        if !entry.flags.contains(PageFlags::ON_DISK) {
            let frame = entry.physical.expect("resident page must have a frame");
            self.physical_to_free(frame)?;
            self.lru.remove(page);
        }
        self.virtual_to_free(page)?;
        self.table[page as usize] = VirtualPageEntry::inactive();
        Ok(())
    }

    /// Resolves `page_id` (paging id or device id) to the absolute physical
    /// page to access, performing demand-paging and LRU bookkeeping for
    /// paging ids. Device ids bypass both: they are always resident.
    fn prepare_access(&mut self, page_id: u64, for_write: bool) -> Result<u64> {
        self.check_alive()?;
        if page_id < self.n_v {
            let idx = page_id as usize;
            if !self.table[idx].flags.contains(PageFlags::ACTIVE) {
                return Err(Error::NotActive);
            }
            if self.table[idx].flags.contains(PageFlags::ON_DISK) {
                self.swap_in_page(page_id)?;
            }
            self.lru.touch(page_id);
            if for_write {
                self.table[idx].flags.insert(PageFlags::DIRTY);
            }
            Ok(self.table[idx].physical.expect("resident page must have a frame"))
        } else {
            self.device_pages.get(&page_id).copied().ok_or(Error::Unmapped)
        }
    }

    /// Read-only view of one page's backing frame, demand-paging it in first.
    pub fn read_page(&mut self, page_id: u64) -> Result<&[u8]> {
        let physical = self.prepare_access(page_id, false)?;
        self.pmm.read_page(physical)
    }

    /// Overwrites one page's backing frame, demand-paging it in first.
    pub fn write_page(&mut self, page_id: u64, buf: &[u8]) -> Result<()> {
        if buf.len() as u64 != PAGE_SIZE {
            return Err(Error::WrongSize);
        }
        let physical = self.prepare_access(page_id, true)?;
        self.pmm.write_page(physical, buf)
    }

    fn in_virtual_ram(&self, page: u64) -> bool {
        page >= self.virtual_ram_start_page && page < self.virtual_ram_start_page + self.n_v
    }

    pub fn read_byte(&mut self, addr: u64) -> Result<u8> {
        self.check_alive()?;
        let (page, offset) = split_addr(addr);
        if self.in_virtual_ram(page) {
            let local = page - self.virtual_ram_start_page;
            let physical = self.prepare_access(local, false)?;
            self.pmm.read_byte(physical * PAGE_SIZE + offset)
        } else {
            self.pmm.read_byte(addr)
        }
    }

    pub fn write_byte(&mut self, addr: u64, value: u8) -> Result<()> {
        self.check_alive()?;
        let (page, offset) = split_addr(addr);
        if self.in_virtual_ram(page) {
            let local = page - self.virtual_ram_start_page;
            let physical = self.prepare_access(local, true)?;
            self.pmm.write_byte(physical * PAGE_SIZE + offset, value)
        } else {
            self.pmm.write_byte(addr, value)
        }
    }

    /// Sets `page_id`'s owner, group, and protection word. Require `Active`
    /// — ownership is meaningless on an unallocated page.
    pub fn set_protection(
        &mut self,
        page_id: u64,
        owner_uid: u32,
        owner_gid: u32,
        protection: u16,
    ) -> Result<()> {
        self.check_alive()?;
        let idx = page_id as usize;
        let entry = self.table.get_mut(idx).ok_or(Error::WrongRegion)?;
        if !entry.flags.contains(PageFlags::ACTIVE) {
            return Err(Error::NotActive);
        }
        entry.owner_uid = owner_uid;
        entry.owner_gid = owner_gid;
        entry.protection = protection;
        Ok(())
    }

    /// Whether `mode` is granted to `(caller_uid, caller_gid)` on `page_id`'s
    /// protection word. Always `false` for a page outside the paging table
    /// (device pages carry no ownership metadata in this model).
    pub fn permission_ok(&self, caller_uid: u32, caller_gid: u32, mode: u8, page_id: u64) -> bool {
        let Some(entry) = self.table.get(page_id as usize) else {
            return false;
        };
        let mask = if caller_uid == entry.owner_uid {
            entry.protection & 0xF
        } else if caller_gid == entry.owner_gid {
            (entry.protection >> 4) & 0xF
        } else {
            (entry.protection >> 8) & 0xF
        };
        (mode as u16) & mask == mode as u16
    }

    /// The page ids under which `region_key`'s frames are addressable
    /// through [`VirtualMemoryManager::read_page`]/`write_page`. Stable
    /// across calls; the mapping was built at construction.
    pub fn attach_region(&self, region_key: u32) -> Result<Vec<u64>> {
        self.check_alive()?;
        if region_key == self.virtual_ram_key {
            return Err(Error::WrongRegion);
        }
        self.region_device_ids
            .get(&region_key)
            .cloned()
            .ok_or(Error::Unmapped)
    }

    /// Evicts a batch (or, failing that, one page) of the least-recently-used
    /// Resident pages to raise `|FreePhysical|`. Equivalent to
    /// `swap_old_pages_tracked` with the evicted ids discarded — for callers
    /// that don't need to roll the eviction back on a later failure.
    fn swap_old_pages(&mut self) -> Result<()> {
        self.swap_old_pages_tracked(&mut Vec::new())
    }

    /// Like [`Self::swap_old_pages`], but appends each page's id to
    /// `evicted` as soon as its eviction commits, so the caller can undo
    /// exactly the evictions this call performed if something later fails.
    fn swap_old_pages_tracked(&mut self, evicted: &mut Vec<u64>) -> Result<()> {
        let used_virtual = self.free_virtual.used_len() as u64;
        let lru_len = self.lru.len() as u64;
        let to_evict = if lru_len > self.batch_size && used_virtual > self.batch_size {
            self.batch_size
        } else if lru_len >= 1 {
            1
        } else {
            return Err(Error::NoVictims);
        };
        for _ in 0..to_evict {
            let victim = self.lru.pop_back().ok_or(Error::NoVictims)?;
            if let Err(e) = self.swap_out_page(victim) {
                // The victim is still Resident; restore it at the tail so
                // P5 keeps holding and the next eviction reconsiders it.
                self.lru.push_back(victim);
                return Err(e);
            }
            evicted.push(victim);
        }
        Ok(())
    }

    /// Pages back in every victim of a failed [`Self::allocate`] attempt, in
    /// the order they were evicted, restoring each to the LRU tail it was
    /// evicted from. A page that fails to page back in (a second, unrelated
    /// fault on top of the one that triggered the rollback) poisons the VMM:
    /// there is no further-fallback path that preserves the state machine's
    /// invariants.
    fn rollback_evictions(&mut self, evicted: Vec<u64>) {
        for victim in evicted {
            if let Err(e) = self.swap_in_page(victim) {
                let _ = self.poison::<()>(e);
                return;
            }
            self.lru.push_back(victim);
        }
    }

    /// Raises `|FreePhysical|` to [`Self::low_water_mark`](Self) by evicting,
    /// stopping early if eviction runs out of candidates. Idle housekeeping;
    /// not on the path of any single demand-paging operation.
    pub fn reclaim_to_low_water_mark(&mut self) -> Result<()> {
        self.check_alive()?;
        while (self.free_physical.free_len() as u64) < self.low_water_mark {
            match self.swap_old_pages() {
                Ok(()) => {}
                Err(Error::NoVictims) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn swap_out_page(&mut self, page: u64) -> Result<()> {
        let idx = page as usize;
        let entry = self.table[idx];
        if !entry.flags.contains(PageFlags::ACTIVE) || entry.flags.contains(PageFlags::ON_DISK) {
            return self.poison(Error::Poisoned);
        }
        let physical = entry.physical.expect("resident page must have a frame");
        let content = self.pmm.read_page(physical)?.to_vec();
        self.swap.swap_out(page, &content)?;

        self.physical_to_free(physical)?;
        self.lru.remove(page);
        let e = &mut self.table[idx];
        e.physical = None;
        e.flags.remove(PageFlags::DIRTY);
        e.flags.insert(PageFlags::ON_DISK);
        Ok(())
    }

    fn swap_in_page(&mut self, page: u64) -> Result<()> {
        if self.free_physical.free_len() == 0 {
            match self.swap_old_pages() {
                Ok(()) => {}
                Err(Error::NoVictims) => {}
                Err(e) => return Err(e),
            }
            if self.free_physical.free_len() == 0 {
                return Err(Error::Exhausted);
            }
        }
        let physical = self.free_physical_to_used().expect("checked above");
        let mut buf = vec![0u8; PAGE_SIZE as usize];
        if let Err(e) = self.swap.swap_in(page, &mut buf) {
            self.physical_to_free(physical)?;
            return Err(e);
        }
        self.pmm.write_page(physical, &buf)?;
        let idx = page as usize;
        self.table[idx].physical = Some(physical);
        self.table[idx].flags.remove(PageFlags::ON_DISK);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::memmap::{PageMode, Region};
    use crate::swap::InMemorySwap;

    fn region(key: u32, start: u64, end: u64, ty: SegmentType) -> Region {
        Region {
            key,
            tag: format!("r{key}"),
            comment: String::new(),
            start,
            end,
            permissions: PageMode::READ | PageMode::WRITE,
            segment_type: ty,
        }
    }

    fn vmm_with_frames(frames: u64) -> VirtualMemoryManager {
        let map = MemoryMap::new(vec![region(
            1,
            0,
            frames * PAGE_SIZE - 1,
            SegmentType::VirtualRAM,
        )])
        .unwrap();
        VirtualMemoryManager::new(&map, Box::new(InMemorySwap::new()), Box::new(NullSink)).unwrap()
    }

    /// `n_v` virtual pages backed by only `frames` physical frames
    /// (`frames < n_v`), so allocating more pages than there are frames
    /// forces eviction rather than failing for want of a free virtual id.
    fn vmm_overcommitted(n_v: u64, frames: u64) -> VirtualMemoryManager {
        let map =
            MemoryMap::new(vec![region(1, 0, n_v * PAGE_SIZE - 1, SegmentType::VirtualRAM)])
                .unwrap();
        VirtualMemoryManager::with_physical_frames(
            &map,
            Some(frames),
            Box::new(InMemorySwap::new()),
            Box::new(NullSink),
        )
        .unwrap()
    }

    #[test]
    fn allocate_rejects_zero_and_too_many() {
        let mut vmm = vmm_with_frames(4);
        assert!(matches!(vmm.allocate(0), Err(Error::Exhausted)));
        assert!(matches!(vmm.allocate(5), Err(Error::Exhausted)));
    }

    #[test]
    fn write_then_read_page_round_trips() {
        let mut vmm = vmm_with_frames(4);
        let pages = vmm.allocate(4).unwrap();
        assert_eq!(pages, vec![0, 1, 2, 3]);
        let mut pattern = vec![0u8; PAGE_SIZE as usize];
        pattern[0] = 0xAB;
        vmm.write_page(0, &pattern).unwrap();
        assert_eq!(vmm.read_page(0).unwrap(), pattern.as_slice());
    }

    #[test]
    fn free_then_allocate_reuses_same_free_virtual_count() {
        let mut vmm = vmm_with_frames(4);
        let pages = vmm.allocate(4).unwrap();
        assert_eq!(vmm.free_virtual.free_len(), 0);
        vmm.free(&pages).unwrap();
        assert_eq!(vmm.free_virtual.free_len(), 4);
        let pages_again = vmm.allocate(4).unwrap();
        assert_eq!(pages_again, vec![0, 1, 2, 3]);
    }

    #[test]
    fn freeing_an_inactive_page_is_an_error() {
        let mut vmm = vmm_with_frames(2);
        assert!(matches!(vmm.free(&[0]), Err(Error::NotActive)));
    }

    #[test]
    fn demand_paging_round_trip_via_eviction() {
        let mut vmm = vmm_overcommitted(5, 4);
        let pages = vmm.allocate(4).unwrap();
        let mut pattern_a = vec![0u8; PAGE_SIZE as usize];
        pattern_a[0] = 0xAA;
        vmm.write_page(pages[0], &pattern_a).unwrap();
        for (i, &p) in pages.iter().enumerate().skip(1) {
            let mut pattern = vec![0u8; PAGE_SIZE as usize];
            pattern[0] = i as u8;
            vmm.write_page(p, &pattern).unwrap();
        }

        // All four frames are in use; one more allocation must evict page 0
        // (the coldest, since it was written first and never touched again).
        vmm.allocate(1).unwrap();
        assert_eq!(vmm.read_page(pages[0]).unwrap(), pattern_a.as_slice());
    }

    #[test]
    fn eviction_order_is_oldest_touch_first() {
        let mut vmm = vmm_overcommitted(3, 2);
        let pages = vmm.allocate(2).unwrap();
        vmm.read_page(pages[0]).unwrap();
        vmm.read_page(pages[1]).unwrap();
        vmm.allocate(1).unwrap();
        assert!(vmm.table[pages[0] as usize].flags.contains(PageFlags::ON_DISK));
        assert!(!vmm.table[pages[1] as usize].flags.contains(PageFlags::ON_DISK));
    }

    #[test]
    fn free_after_swap_restores_all_free_counts() {
        let mut vmm = vmm_with_frames(1);
        let pages = vmm.allocate(1).unwrap();
        vmm.read_page(pages[0]).unwrap();
        vmm.swap_out_page(pages[0]).unwrap();
        assert_eq!(vmm.free_physical.free_len(), 1);
        vmm.free(&pages).unwrap();
        assert_eq!(vmm.free_physical.free_len(), 1);
        assert_eq!(vmm.free_virtual.free_len(), 1);
    }

    #[test]
    fn byte_write_then_read_at_same_address() {
        let mut vmm = vmm_with_frames(1);
        vmm.allocate(1).unwrap();
        vmm.write_byte(0, 0x7E).unwrap();
        assert_eq!(vmm.read_byte(0).unwrap(), 0x7E);
    }

    #[test]
    fn last_byte_of_page_does_not_bleed_into_next_page() {
        let mut vmm = vmm_with_frames(2);
        vmm.allocate(2).unwrap();
        vmm.write_byte(PAGE_SIZE - 1, 0xFF).unwrap();
        assert_eq!(vmm.read_byte(PAGE_SIZE).unwrap(), 0);
    }

    #[test]
    fn unmapped_address_fails() {
        let mut vmm = vmm_with_frames(1);
        assert!(matches!(vmm.read_byte(0xDEAD_BEEF), Err(Error::Unmapped)));
    }

    #[test]
    fn attach_region_exposes_identity_mapped_pages() {
        let map = MemoryMap::new(vec![
            region(1, 0, 4095, SegmentType::VirtualRAM),
            region(2, 4096, 8191, SegmentType::PhysicalROM),
        ])
        .unwrap();
        let mut vmm =
            VirtualMemoryManager::new(&map, Box::new(InMemorySwap::new()), Box::new(NullSink))
                .unwrap();
        let ids = vmm.attach_region(2).unwrap();
        assert_eq!(ids.len(), 1);
        assert!(ids[0] >= vmm.n_v);
        assert!(matches!(vmm.read_page(ids[0]), Ok(_)));
        assert!(matches!(vmm.attach_region(1), Err(Error::WrongRegion)));
    }

    #[test]
    fn permission_ok_denies_nonzero_mode_on_a_fresh_page() {
        let mut vmm = vmm_with_frames(1);
        let pages = vmm.allocate(1).unwrap();
        assert!(vmm.permission_ok(0, 0, 0, pages[0]));
        assert!(!vmm.permission_ok(0, 0, 1, pages[0]));
    }

    #[test]
    fn set_protection_grants_mode_to_the_matching_nibble() {
        let mut vmm = vmm_with_frames(1);
        let pages = vmm.allocate(1).unwrap();
        // user=Read|Write, group=Read, world=none; owned by uid=7, gid=9.
        vmm.set_protection(pages[0], 7, 9, 0x3 | (0x1 << 4)).unwrap();

        assert!(vmm.permission_ok(7, 9, 0x3, pages[0]));
        assert!(!vmm.permission_ok(7, 9, 0x4, pages[0]));
        assert!(vmm.permission_ok(1, 9, 0x1, pages[0]));
        assert!(!vmm.permission_ok(1, 9, 0x2, pages[0]));
        assert!(!vmm.permission_ok(1, 1, 0x1, pages[0]));
    }

    #[test]
    fn set_protection_rejects_an_inactive_page() {
        let mut vmm = vmm_with_frames(1);
        assert!(matches!(vmm.set_protection(0, 1, 1, 0xF), Err(Error::NotActive)));
    }

    #[test]
    fn swap_out_io_failure_leaves_page_resident() {
        let map = MemoryMap::new(vec![region(1, 0, 4095, SegmentType::VirtualRAM)]).unwrap();
        let mut swap = InMemorySwap::new();
        swap.fail_next_out = true;
        let mut vmm =
            VirtualMemoryManager::new(&map, Box::new(swap), Box::new(NullSink)).unwrap();
        let pages = vmm.allocate(1).unwrap();
        assert!(matches!(vmm.swap_out_page(pages[0]), Err(Error::Io(_))));
        assert!(vmm.table[pages[0] as usize].flags.contains(PageFlags::ACTIVE));
        assert!(!vmm.table[pages[0] as usize].flags.contains(PageFlags::ON_DISK));
        assert_eq!(vmm.free_physical.free_len(), 0);
    }

    #[test]
    fn failed_allocation_rolls_back_every_eviction_it_performed() {
        let mut vmm = vmm_overcommitted(5, 2);
        let pages = vmm.allocate(2).unwrap();

        // Only 2 frames exist and both are in use; raising FreePhysical to 3
        // is unreachable (there are only 2 Resident pages to evict from), so
        // this must fail Exhausted after evicting both pages in the attempt.
        assert!(matches!(vmm.allocate(3), Err(Error::Exhausted)));

        // Every eviction performed while chasing the impossible target must
        // have been undone: both pages are Resident again, both frames are
        // back in use, and neither virtual id was ever touched.
        for &p in &pages {
            let entry = vmm.table[p as usize];
            assert!(entry.flags.contains(PageFlags::ACTIVE));
            assert!(!entry.flags.contains(PageFlags::ON_DISK));
            assert!(entry.physical.is_some());
        }
        assert_eq!(vmm.free_physical.free_len(), 0);
        assert_eq!(vmm.free_virtual.free_len(), 3);
        assert_eq!(vmm.lru.len(), 2);
    }
}
