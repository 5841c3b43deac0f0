//! Bound simulation handle
//!
//! Loads a built library, checks its exported layout tables against the
//! [`Layout`] the unit was generated from, and then reads and writes net
//! storage directly. The handle holds raw pointers into the library, so it is
//! neither `Send` nor `Sync`; callers serialize pokes and clocks.
//!
//! Net storage lives in library globals, and the loader hands back the
//! already-loaded image for a path it has seen. Every handle therefore loads
//! its own private copy of the artifact, removed again when the handle drops.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::codegen::CYCLE_SYMBOL;
use crate::error::{Error, Result};
use crate::layout::{Layout, Location, NET_TABLE_SYMBOL};
use crate::translate::TRACE_SYMBOL;
use crate::types::CType;

type CycleFn = unsafe extern "C" fn();

pub struct BoundSimulation {
    name: String,
    layout: Layout,
    /// Current storage of each net
    current: Vec<*mut u8>,
    /// Shadow ("next") storage of each net
    next: Vec<*mut u8>,
    trace: *mut i32,
    cycle_fn: CycleFn,
    cycles: u64,
    path: PathBuf,
    /// Private copy actually loaded
    private: PathBuf,
    // Every pointer above points into it; taken on drop before `private` is removed
    library: Option<libloading::Library>,
}

/// Copy `path` next to itself under a name unique within this process
fn private_copy(path: &Path) -> Result<PathBuf> {
    static BIND_COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = BIND_COUNTER.fetch_add(1, Ordering::Relaxed);
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default();
    let copy = path.with_file_name(format!("{}.{}.{}.{}", stem, std::process::id(), seq, ext));
    fs::copy(path, &copy)?;
    Ok(copy)
}

fn symbol_name(name: &str) -> Vec<u8> {
    let mut bytes = name.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

fn lookup<T: Copy>(library: &libloading::Library, path: &Path, name: &str) -> Result<T> {
    unsafe {
        library
            .get::<T>(&symbol_name(name))
            .map(|symbol| *symbol)
            .map_err(|source| Error::Load { path: path.to_path_buf(), source })
    }
}

/// Compare an exported `unsigned long long` table against the expected contents
fn verify_table(library: &libloading::Library, path: &Path, symbol: &str, expected: &[u64]) -> Result<()> {
    let table: *const u64 = lookup(library, path, symbol)?;
    // First entry of every table is a count or a size; check it before reading on
    let first = unsafe { table.read() };
    if first != expected[0] {
        return Err(Error::LayoutMismatch { symbol: symbol.to_string(), declared: expected[0], native: first });
    }
    for (i, &want) in expected.iter().enumerate().skip(1) {
        let got = unsafe { table.add(i).read() };
        if got != want {
            return Err(Error::LayoutMismatch { symbol: format!("{}[{}]", symbol, i), declared: want, native: got });
        }
    }
    Ok(())
}

impl BoundSimulation {
    /// Load a private copy of `path` and map the nets described by `layout`
    pub fn bind(name: &str, path: &Path, layout: Layout) -> Result<Self> {
        let private = private_copy(path)?;
        let bound = Self::bind_private(name, path, private.clone(), layout);
        if bound.is_err() {
            let _ = fs::remove_file(&private);
        }
        bound
    }

    fn bind_private(name: &str, path: &Path, private: PathBuf, layout: Layout) -> Result<Self> {
        let library = unsafe { libloading::Library::new(&private) }
            .map_err(|source| Error::Load { path: private.clone(), source })?;
        tracing::debug!("Loaded {} from {}", name, private.display());

        verify_table(&library, &private, NET_TABLE_SYMBOL, &layout.net_table())?;
        for record in layout.records.values() {
            verify_table(&library, &private, &record.table_symbol(), &record.table())?;
        }

        let mut current = Vec::with_capacity(layout.nets.len());
        let mut next = Vec::with_capacity(layout.nets.len());
        for net in &layout.nets {
            current.push(lookup::<*mut u8>(&library, &private, &net.symbol())?);
            next.push(lookup::<*mut u8>(&library, &private, &net.shadow_symbol())?);
        }
        let trace: *mut i32 = lookup(&library, &private, TRACE_SYMBOL)?;
        let cycle_fn: CycleFn = lookup(&library, &private, CYCLE_SYMBOL)?;

        Ok(Self {
            name: name.to_string(),
            layout,
            current,
            next,
            trace,
            cycle_fn,
            cycles: 0,
            path: path.to_path_buf(),
            private,
            library: Some(library),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn library_path(&self) -> &Path {
        &self.path
    }

    /// Switch the per-block execution trace on or off
    pub fn set_trace(&mut self, on: bool) {
        unsafe { self.trace.write(on as i32) };
    }

    pub fn trace(&self) -> bool {
        unsafe { self.trace.read() != 0 }
    }

    /// Number of clock cycles run since binding
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn scalar(&self, name: &str) -> Result<Location> {
        let location = self.layout.locate(name).ok_or_else(|| Error::UnknownSignal(name.to_string()))?;
        if location.ctype.is_record() {
            return Err(Error::UnknownSignal(format!("{} is a record; address one of its fields", name)));
        }
        Ok(location)
    }

    /// Read the current value of a signal or record field
    pub fn peek(&self, name: &str) -> Result<u64> {
        let location = self.scalar(name)?;
        let ptr = unsafe { self.current[location.net].add(location.offset) };
        Ok(unsafe { read_scalar(ptr, &location.ctype) })
    }

    /// Write a value into both the current and the next storage of a net
    pub fn poke(&mut self, name: &str, value: u64) -> Result<()> {
        let location = self.scalar(name)?;
        let value = location.ctype.store_mask().map_or(value, |mask| value & mask);
        unsafe {
            write_scalar(self.current[location.net].add(location.offset), &location.ctype, value);
            write_scalar(self.next[location.net].add(location.offset), &location.ctype, value);
        }
        Ok(())
    }

    /// Run every block once, then commit every net
    pub fn cycle(&mut self) {
        unsafe { (self.cycle_fn)() };
        self.cycles += 1;
    }
}

impl Drop for BoundSimulation {
    fn drop(&mut self) {
        tracing::debug!("Unloading {} after {} cycles", self.name, self.cycles);
        drop(self.library.take());
        let _ = fs::remove_file(&self.private);
    }
}

unsafe fn read_scalar(ptr: *const u8, ctype: &CType) -> u64 {
    match ctype.scalar_size() {
        Some(1) => ptr.read() as u64,
        Some(2) => (ptr as *const u16).read_unaligned() as u64,
        Some(4) => (ptr as *const u32).read_unaligned() as u64,
        _ => (ptr as *const u64).read_unaligned(),
    }
}

unsafe fn write_scalar(ptr: *mut u8, ctype: &CType, value: u64) {
    match ctype.scalar_size() {
        Some(1) => ptr.write(value as u8),
        Some(2) => (ptr as *mut u16).write_unaligned(value as u16),
        Some(4) => (ptr as *mut u32).write_unaligned(value as u32),
        _ => (ptr as *mut u64).write_unaligned(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_access_widths() {
        let mut buf = [0u8; 16];
        let ptr = buf.as_mut_ptr();
        unsafe {
            write_scalar(ptr, &CType::Bits { width: 16 }, 0x1_2345);
            assert_eq!(read_scalar(ptr, &CType::Bits { width: 16 }), 0x2345);
            write_scalar(ptr.add(8), &CType::Int, (-2i64) as u64);
            assert_eq!(read_scalar(ptr.add(8), &CType::Int) as i64, -2);
            write_scalar(ptr, &CType::Bits { width: 3 }, 0xFF);
            assert_eq!(read_scalar(ptr, &CType::Bits { width: 3 }), 0xFF);
        }
    }

    #[test]
    fn test_bind_missing_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.so");
        let err = BoundSimulation::bind("Top", &path, Layout::new("Top")).err().unwrap();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unloadable_copy_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("Top_0.{}", crate::compiler::dylib_ext()));
        fs::write(&path, b"not a library").unwrap();
        let err = BoundSimulation::bind("Top", &path, Layout::new("Top")).err().unwrap();
        assert!(matches!(err, Error::Load { .. }));
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().path()).collect();
        assert_eq!(names, vec![path]);
    }

    #[test]
    fn test_private_copies_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Top_0.so");
        fs::write(&path, b"x").unwrap();
        let a = private_copy(&path).unwrap();
        let b = private_copy(&path).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, path);
        assert_eq!(a.extension().unwrap(), "so");
        assert_eq!(fs::read(&b).unwrap(), b"x");
    }

    #[test]
    fn test_symbol_name_is_nul_terminated() {
        assert_eq!(symbol_name("cycle"), b"cycle\0".to_vec());
    }
}
