//! Name-based symbol lookup in the process's loaded binary images.
//!
//! This module defines the [`SymbolResolver`] trait, the narrow seam through
//! which the private API bridge turns symbol names into addresses. The
//! production implementation, [`DlsymResolver`], asks the dynamic linker;
//! [`SymbolMap`] serves addresses from memory so consumers can be exercised
//! without real framework images.
//!
//! # Example
//!
//! ```no_run
//! use xcagent_core::symbols::{CachedResolver, DlsymResolver, ImageScope, SymbolResolver};
//!
//! let resolver = CachedResolver::new(DlsymResolver::new(ImageScope::Image(
//!     "/Developer/Library/Frameworks/XCTest.framework/XCTest".into(),
//! )));
//!
//! match resolver.resolve("XCDebugLogger") {
//!     Ok(address) => println!("found at {:?}", address.as_ptr()),
//!     Err(e) => println!("lookup failed: {e}"),
//! }
//! ```

use std::collections::HashMap;
use std::ffi::{c_void, CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, trace};

/// Errors that can occur while resolving a symbol by name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No searched image exports the symbol.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The image the lookup was scoped to is not loaded in this process.
    #[error("Image not loaded: {}", .0.display())]
    ImageNotLoaded(PathBuf),

    /// The name cannot be handed to the dynamic linker.
    #[error("Invalid symbol name {0:?}: contains a NUL byte")]
    InvalidName(String),
}

/// The non-null address of a resolved symbol.
///
/// Stored as an integer so the value can be shared freely between threads;
/// interpreting it as a function or data pointer is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolAddress(usize);

impl SymbolAddress {
    /// Wraps a raw pointer, returning `None` for null.
    pub fn from_ptr(ptr: *const c_void) -> Option<Self> {
        if ptr.is_null() {
            None
        } else {
            Some(Self(ptr as usize))
        }
    }

    /// The address as a raw pointer.
    pub fn as_ptr(self) -> *const c_void {
        self.0 as *const c_void
    }
}

/// Looks up symbols by name.
///
/// Lookups must be idempotent: resolving the same name twice yields the same
/// result for as long as the process keeps the owning image loaded.
///
/// # Safety
///
/// Implementations must only return addresses that are valid for the named
/// symbol, i.e. a function entry point for function symbols and readable
/// storage for data symbols. The private API bridge reads data and calls
/// functions through these addresses without further validation.
pub unsafe trait SymbolResolver: Send + Sync {
    /// Resolve `name` to an address.
    fn resolve(&self, name: &str) -> Result<SymbolAddress, ResolveError>;
}

/// Which loaded images a [`DlsymResolver`] searches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageScope {
    /// Every image loaded into the process, in load order.
    #[default]
    AllLoaded,
    /// A single image, which must already be loaded.
    Image(PathBuf),
}

/// Resolves symbols through the dynamic linker (`dlsym`).
#[derive(Debug, Clone)]
pub struct DlsymResolver {
    scope: ImageScope,
    fallback_to_global: bool,
}

impl DlsymResolver {
    /// Create a resolver searching the given scope.
    ///
    /// Image-scoped lookups fall back to all loaded images when the image is
    /// missing or does not export the name; see [`with_fallback`](Self::with_fallback).
    pub fn new(scope: ImageScope) -> Self {
        Self {
            scope,
            fallback_to_global: true,
        }
    }

    /// Create a resolver searching every loaded image.
    pub fn all_loaded() -> Self {
        Self::new(ImageScope::AllLoaded)
    }

    /// Enable or disable the fallback to all loaded images.
    pub fn with_fallback(mut self, fallback_to_global: bool) -> Self {
        self.fallback_to_global = fallback_to_global;
        self
    }

    /// The scope this resolver searches first.
    pub fn scope(&self) -> &ImageScope {
        &self.scope
    }
}

impl Default for DlsymResolver {
    fn default() -> Self {
        Self::all_loaded()
    }
}

// SAFETY: the dynamic linker only returns addresses of symbols actually
// exported by a loaded image under the requested name.
unsafe impl SymbolResolver for DlsymResolver {
    fn resolve(&self, name: &str) -> Result<SymbolAddress, ResolveError> {
        let c_name =
            CString::new(name).map_err(|_| ResolveError::InvalidName(name.to_string()))?;

        match &self.scope {
            ImageScope::AllLoaded => lookup_global(&c_name, name),
            ImageScope::Image(path) => match lookup_in_image(path, &c_name, name) {
                Ok(address) => Ok(address),
                Err(e) if self.fallback_to_global => {
                    debug!(symbol = name, error = %e, "image lookup failed, searching all loaded images");
                    lookup_global(&c_name, name)
                }
                Err(e) => Err(e),
            },
        }
    }
}

fn lookup_global(c_name: &CStr, name: &str) -> Result<SymbolAddress, ResolveError> {
    // SAFETY: `c_name` is NUL-terminated and outlives the call.
    let ptr = unsafe { libc::dlsym(libc::RTLD_DEFAULT, c_name.as_ptr()) };
    trace!(symbol = name, found = !ptr.is_null(), "global dlsym");
    SymbolAddress::from_ptr(ptr).ok_or_else(|| ResolveError::SymbolNotFound(name.to_string()))
}

fn lookup_in_image(path: &Path, c_name: &CStr, name: &str) -> Result<SymbolAddress, ResolveError> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| ResolveError::ImageNotLoaded(path.to_path_buf()))?;

    // RTLD_NOLOAD only hands out a handle for an image that is already
    // loaded; it never maps a new one.
    // SAFETY: `c_path` is NUL-terminated and outlives the call.
    let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_LAZY | libc::RTLD_NOLOAD) };
    if handle.is_null() {
        return Err(ResolveError::ImageNotLoaded(path.to_path_buf()));
    }

    // SAFETY: `handle` came from a successful dlopen above.
    let ptr = unsafe { libc::dlsym(handle, c_name.as_ptr()) };
    // Balances the dlopen; the image itself stays loaded.
    // SAFETY: `handle` is valid and closed exactly once.
    unsafe { libc::dlclose(handle) };

    trace!(symbol = name, image = %path.display(), found = !ptr.is_null(), "image dlsym");
    SymbolAddress::from_ptr(ptr).ok_or_else(|| ResolveError::SymbolNotFound(name.to_string()))
}

/// Memoizes successful lookups of an inner resolver.
///
/// Misses are not cached, so an image loaded after a failed lookup is still
/// found on the next attempt.
#[derive(Debug)]
pub struct CachedResolver<R> {
    inner: R,
    cache: Mutex<HashMap<String, SymbolAddress>>,
}

impl<R: SymbolResolver> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The wrapped resolver.
    pub fn inner(&self) -> &R {
        &self.inner
    }
}

// SAFETY: every address handed out was produced by `inner`.
unsafe impl<R: SymbolResolver> SymbolResolver for CachedResolver<R> {
    fn resolve(&self, name: &str) -> Result<SymbolAddress, ResolveError> {
        if let Some(address) = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return Ok(*address);
        }

        let address = self.inner.resolve(name)?;
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), address);
        Ok(address)
    }
}

/// An in-memory name → address table.
///
/// Useful for substituting known addresses (for example, functions and
/// statics of the current binary) in place of a real framework image.
#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    symbols: HashMap<String, SymbolAddress>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `address` under `name`, replacing any previous entry.
    ///
    /// # Safety
    ///
    /// `address` must be valid for whatever the symbol `name` is expected to
    /// be by consumers of this resolver, for the lifetime of the map.
    pub unsafe fn insert(&mut self, name: impl Into<String>, address: SymbolAddress) {
        self.symbols.insert(name.into(), address);
    }

    /// Remove an entry, returning its address if it was present.
    pub fn remove(&mut self, name: &str) -> Option<SymbolAddress> {
        self.symbols.remove(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

// SAFETY: entries can only be added through the unsafe `insert`, whose
// caller vouches for each address.
unsafe impl SymbolResolver for SymbolMap {
    fn resolve(&self, name: &str) -> Result<SymbolAddress, ResolveError> {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| ResolveError::SymbolNotFound(name.to_string()))
    }
}
