//! Memory-mapped archive reader (spec §4.1 `memory_map`, §5 "Memory-mapped
//! files: reference-counted; last holder unmaps").
//!
//! Ported to the `memmap2` crate's safe(-ish) `Mmap` wrapper rather than
//! hand-rolling `mmap`/`CreateFileMapping` FFI the way the original does
//! (no example repo in the pack hand-rolls raw mmap FFI, so this pulls the
//! ecosystem's standard crate for the concern).

use crate::foundation::error::{ToucanError, ToucanResult};
use memmap2::Mmap;
use std::sync::Arc;

/// A scoped, read-only mapping of a whole file, released when the last
/// [`Arc`] clone drops.
#[derive(Clone)]
pub struct MemoryMap {
    inner: Arc<Mmap>,
}

impl MemoryMap {
    /// Map `path` read-only.
    pub fn open(path: &str) -> ToucanResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToucanError::not_found(path)
            } else {
                ToucanError::read_failed(path, e.to_string())
            }
        })?;
        // Safety: the mapped file is treated as read-only and the mapping's
        // lifetime is tied to this `MemoryMap`'s `Arc`; callers must not
        // rely on the backing file being stable if mutated out-of-band,
        // which is the same caveat `memmap2` documents for all mappings.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ToucanError::read_failed(path, e.to_string()))?;
        Ok(Self { inner: Arc::new(mmap) })
    }

    /// The mapping's base address and byte length, as the `(base_ptr,
    /// len)` pair spec §4.1 describes.
    pub fn base_and_len(&self) -> (*const u8, usize) {
        (self.inner.as_ptr(), self.inner.len())
    }

    /// Borrow the whole mapping as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Borrow `[address, address + length)` of the mapping.
    pub fn slice(&self, address: usize, length: usize) -> Option<&[u8]> {
        self.inner.get(address..address.checked_add(length)?)
    }
}

/// Look up a byte range in a process-wide mmap registry by raw address.
/// The core's `Memory` media reference carries only `(address, length)`
/// (spec §3); real hosts resolve this against the mapping they created via
/// [`MemoryMap::open`]. This default registry is a thin, explicit
/// substitute so `media_io::resolve` has something to call in tests and
/// single-mapping setups; multi-archive hosts should resolve addresses
/// themselves rather than rely on this global.
static REGISTRY: std::sync::OnceLock<std::sync::Mutex<Vec<MemoryMap>>> = std::sync::OnceLock::new();

fn registry() -> &'static std::sync::Mutex<Vec<MemoryMap>> {
    REGISTRY.get_or_init(|| std::sync::Mutex::new(Vec::new()))
}

/// Register a mapping so its bytes are reachable by `(address, length)`
/// through [`slice_for`]. Returns the `address` to use in a `Memory` media
/// reference.
pub fn register(map: MemoryMap) -> usize {
    let mut guard = registry().lock().expect("mmap registry poisoned");
    let address = guard.len();
    guard.push(map);
    address
}

/// Resolve a `(address, length)` pair registered via [`register`] to a byte
/// slice. `address` here is the registry index `register` returned, not a
/// raw pointer value (pointers are not `'static` addressable keys in safe
/// Rust); hosts that already own raw mmap addresses should implement
/// [`crate::media_io::MediaIo::read_memory`] directly instead of going
/// through this registry.
pub fn slice_for(address: usize, length: usize) -> Option<&'static [u8]> {
    let guard = registry().lock().expect("mmap registry poisoned");
    let map = guard.get(address)?;
    // Safety: mappings in the registry live for the process (pushed, never
    // removed), so handing out a `'static` slice mirrors that lifetime;
    // the byte range itself is still bounds-checked against the mapping.
    let slice = map.slice(0, map.as_slice().len())?;
    if length > slice.len() {
        return None;
    }
    Some(unsafe { std::slice::from_raw_parts(slice.as_ptr(), length.min(slice.len())) })
}
