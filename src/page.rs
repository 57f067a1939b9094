//! Page-granular addressing shared by the PMM and VMM.

/// Fixed page size for the whole simulated machine.
pub const PAGE_SIZE: u64 = 4096;

/// Splits an absolute byte address into `(page_index, offset_in_page)`.
#[inline]
pub const fn split_addr(addr: u64) -> (u64, u64) {
    (addr / PAGE_SIZE, addr % PAGE_SIZE)
}

/// `true` if `len` is an exact multiple of the page size.
#[inline]
pub const fn is_page_multiple(len: u64) -> bool {
    len % PAGE_SIZE == 0
}
