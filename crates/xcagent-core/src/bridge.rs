//! Bridge to the private symbols of the host accessibility-testing framework.
//!
//! The framework keeps a handful of constants and functions out of its public
//! interface. [`ResolvedSymbolTable::load`] looks each of them up through a
//! [`SymbolResolver`] and produces an immutable table:
//!
//! - the "is visible" and "is element" accessibility attributes, which are
//!   mandatory: without them attribute queries are meaningless, so loading
//!   fails with [`BridgeError::MandatorySymbolMissing`];
//! - the debug-logger getter/setter and the string-attribute mapper, which are
//!   optional: a missing function is replaced by a no-op stand-in, so callers
//!   never see a null function pointer.
//!
//! Most consumers go through the process-wide entry points instead:
//! [`initialize`] publishes a table exactly once, and [`table`] reads it.
//!
//! # Example
//!
//! ```no_run
//! use xcagent_core::bridge;
//!
//! // During process bootstrap, before any consumer runs:
//! let table = bridge::initialize_default().expect("private symbols unavailable");
//! println!("is-visible attribute id: {}", table.is_visible_attribute().id);
//!
//! // Anywhere later:
//! if let Some(table) = bridge::table() {
//!     table.set_debug_logger(std::ptr::null_mut());
//! }
//! ```

use std::collections::BTreeMap;
use std::ffi::{c_char, c_void, CString};
use std::fmt;

use once_cell::sync::OnceCell;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, SymbolConfig, SymbolRole};
use crate::symbols::{CachedResolver, SymbolAddress, SymbolResolver};

/// Returns the framework's current debug logger (an opaque object pointer).
pub type DebugLoggerGetterFn = unsafe extern "C" fn() -> *mut c_void;

/// Installs a debug logger (an opaque object pointer).
pub type DebugLoggerSetterFn = unsafe extern "C" fn(logger: *mut c_void);

/// Maps `count` NUL-terminated attribute names to accessibility attribute
/// ids, writing up to `count` ids to `out_ids` and returning how many it wrote.
///
/// This is a C-level signature, not the framework's own: the framework's
/// `XCAXAccessibilityAttributesForStringAttributes` takes an array object of
/// string attributes and returns an array object of numbers. Binding the
/// framework export directly to this type is only sound through a shim with
/// this signature. [`ResolvedSymbolTable::load`] therefore calls the mapper
/// only when [`SymbolConfig::map_attribute_ids`] is set, and attribute names
/// passed to it are the external symbol names the attributes resolved under.
pub type AttributesForStringAttributesFn =
    unsafe extern "C" fn(names: *const *const c_char, count: usize, out_ids: *mut i64) -> usize;

/// Errors that can occur while building the symbol table.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// None of the names configured for a mandatory role resolved.
    #[error("Mandatory symbol for {role} not found (tried: {})", .candidates.join(", "))]
    MandatorySymbolMissing {
        role: SymbolRole,
        candidates: Vec<String>,
    },

    /// The configuration has no entry for a role.
    #[error("No symbol names configured for {0}")]
    Unconfigured(SymbolRole),

    /// The configuration failed validation.
    #[error("Invalid symbol configuration: {0}")]
    Config(#[from] ConfigError),

    /// An attribute name cannot be passed to the mapper.
    #[error("Invalid attribute name {0:?}: contains a NUL byte")]
    InvalidAttributeName(String),
}

/// A queryable accessibility property, identified by number and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AccessibilityAttribute {
    pub id: i64,
    pub name: String,
}

/// Where a role's value in the table came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSource {
    /// Found under `name` at `address`.
    Resolved { name: String, address: SymbolAddress },
    /// Not found; a no-op stand-in is installed.
    StandIn,
}

extern "C" fn stand_in_debug_logger() -> *mut c_void {
    std::ptr::null_mut()
}

extern "C" fn stand_in_set_debug_logger(_logger: *mut c_void) {}

extern "C" fn stand_in_attributes_for_string_attributes(
    _names: *const *const c_char,
    _count: usize,
    _out_ids: *mut i64,
) -> usize {
    0
}

/// The resolved private symbols. Immutable once built.
pub struct ResolvedSymbolTable {
    is_visible: AccessibilityAttribute,
    is_element: AccessibilityAttribute,
    debug_logger: DebugLoggerGetterFn,
    set_debug_logger: DebugLoggerSetterFn,
    attributes_for_string_attributes: AttributesForStringAttributesFn,
    sources: BTreeMap<SymbolRole, SymbolSource>,
}

impl ResolvedSymbolTable {
    /// Resolve every configured role and build a table.
    ///
    /// Does not touch process-wide state; see [`initialize`] for that.
    pub fn load(
        resolver: &dyn SymbolResolver,
        config: &SymbolConfig,
    ) -> Result<Self, BridgeError> {
        config.validate()?;

        let mut sources = BTreeMap::new();
        let mut resolve = |role: SymbolRole| -> Result<Option<(String, SymbolAddress)>, BridgeError> {
            let found = resolve_role(resolver, config, role)?;
            let source = match &found {
                Some((name, address)) => SymbolSource::Resolved {
                    name: name.clone(),
                    address: *address,
                },
                None => SymbolSource::StandIn,
            };
            sources.insert(role, source);
            Ok(found)
        };

        let visible = resolve(SymbolRole::IsVisibleAttribute)?;
        let element = resolve(SymbolRole::IsElementAttribute)?;
        let getter = resolve(SymbolRole::DebugLoggerGetter)?;
        let setter = resolve(SymbolRole::DebugLoggerSetter)?;
        let mapper = resolve(SymbolRole::AttributesForStringAttributes)?;

        // SAFETY (all conversions below): the resolver contract guarantees
        // each address is valid for the symbol it was resolved under.
        let debug_logger: DebugLoggerGetterFn = match getter {
            Some((_, address)) => unsafe {
                std::mem::transmute::<*const c_void, DebugLoggerGetterFn>(address.as_ptr())
            },
            None => stand_in_debug_logger,
        };
        let set_debug_logger: DebugLoggerSetterFn = match setter {
            Some((_, address)) => unsafe {
                std::mem::transmute::<*const c_void, DebugLoggerSetterFn>(address.as_ptr())
            },
            None => stand_in_set_debug_logger,
        };
        let attributes_for_string_attributes: AttributesForStringAttributesFn = match mapper {
            Some((_, address)) => unsafe {
                std::mem::transmute::<*const c_void, AttributesForStringAttributesFn>(
                    address.as_ptr(),
                )
            },
            None => stand_in_attributes_for_string_attributes,
        };

        let mut table = Self {
            is_visible: read_attribute(visible, SymbolRole::IsVisibleAttribute, config)?,
            is_element: read_attribute(element, SymbolRole::IsElementAttribute, config)?,
            debug_logger,
            set_debug_logger,
            attributes_for_string_attributes,
            sources,
        };

        // The mapper knows the ids attribute queries expect. Prefer those when
        // it is present and has the C signature.
        if config.map_attribute_ids && !table.is_stand_in(SymbolRole::AttributesForStringAttributes) {
            let names = [table.is_visible.name.clone(), table.is_element.name.clone()];
            let ids = table.attributes_for_names(&[names[0].as_str(), names[1].as_str()])?;
            if let [visible_id, element_id] = ids[..] {
                debug!(visible_id, element_id, "attribute ids mapped");
                table.is_visible.id = visible_id;
                table.is_element.id = element_id;
            } else {
                warn!(mapped = ids.len(), "attribute mapper returned partial result, keeping raw ids");
            }
        }

        Ok(table)
    }

    /// The "is visible" accessibility attribute.
    pub fn is_visible_attribute(&self) -> &AccessibilityAttribute {
        &self.is_visible
    }

    /// The "is element" accessibility attribute.
    pub fn is_element_attribute(&self) -> &AccessibilityAttribute {
        &self.is_element
    }

    /// The framework's current debug logger, or null when none is set or
    /// the getter is a stand-in.
    pub fn debug_logger(&self) -> *mut c_void {
        // SAFETY: either the resolved getter or the stand-in; both take no
        // arguments.
        unsafe { (self.debug_logger)() }
    }

    /// Install a debug logger. Discarded when the setter is a stand-in.
    pub fn set_debug_logger(&self, logger: *mut c_void) {
        // SAFETY: the framework accepts any logger object pointer, including null.
        unsafe { (self.set_debug_logger)(logger) }
    }

    /// Map attribute names to accessibility attribute ids.
    ///
    /// Returns at most `names.len()` ids, in order; empty when the mapper is a
    /// stand-in.
    pub fn attributes_for_names(&self, names: &[&str]) -> Result<Vec<i64>, BridgeError> {
        let c_names = names
            .iter()
            .map(|name| {
                CString::new(*name).map_err(|_| BridgeError::InvalidAttributeName(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let ptrs: Vec<*const c_char> = c_names.iter().map(|name| name.as_ptr()).collect();
        let mut ids = vec![0i64; names.len()];

        // SAFETY: `ptrs` and `ids` both hold `names.len()` elements and the
        // strings outlive the call.
        let written = unsafe {
            (self.attributes_for_string_attributes)(ptrs.as_ptr(), ptrs.len(), ids.as_mut_ptr())
        };
        ids.truncate(written.min(names.len()));
        Ok(ids)
    }

    /// Where the value for `role` came from.
    pub fn source(&self, role: SymbolRole) -> Option<&SymbolSource> {
        self.sources.get(&role)
    }

    /// Whether `role` is served by a no-op stand-in.
    pub fn is_stand_in(&self, role: SymbolRole) -> bool {
        matches!(self.sources.get(&role), Some(SymbolSource::StandIn))
    }

    /// The external name and address `role` resolved to, if any.
    pub fn resolved(&self, role: SymbolRole) -> Option<(&str, SymbolAddress)> {
        match self.sources.get(&role) {
            Some(SymbolSource::Resolved { name, address }) => Some((name.as_str(), *address)),
            _ => None,
        }
    }
}

impl fmt::Debug for ResolvedSymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSymbolTable")
            .field("is_visible", &self.is_visible)
            .field("is_element", &self.is_element)
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

/// Try each candidate name for `role` in order.
///
/// Returns `Ok(None)` for an optional role that did not resolve.
fn resolve_role(
    resolver: &dyn SymbolResolver,
    config: &SymbolConfig,
    role: SymbolRole,
) -> Result<Option<(String, SymbolAddress)>, BridgeError> {
    let entry = config.entry(role).ok_or(BridgeError::Unconfigured(role))?;

    for name in &entry.candidates {
        match resolver.resolve(name) {
            Ok(address) => {
                debug!(%role, symbol = %name, address = ?address.as_ptr(), "symbol resolved");
                return Ok(Some((name.clone(), address)));
            }
            Err(e) => debug!(%role, symbol = %name, error = %e, "candidate not resolved"),
        }
    }

    if config.is_mandatory(role) {
        error!(%role, candidates = ?entry.candidates, "mandatory symbol missing");
        return Err(BridgeError::MandatorySymbolMissing {
            role,
            candidates: entry.candidates.clone(),
        });
    }
    warn!(%role, candidates = ?entry.candidates, "optional symbol missing, installing stand-in");
    Ok(None)
}

fn read_attribute(
    found: Option<(String, SymbolAddress)>,
    role: SymbolRole,
    config: &SymbolConfig,
) -> Result<AccessibilityAttribute, BridgeError> {
    let (name, address) = found.ok_or_else(|| BridgeError::MandatorySymbolMissing {
        role,
        candidates: config
            .entry(role)
            .map(|entry| entry.candidates.clone())
            .unwrap_or_default(),
    })?;
    // SAFETY: attribute constants are exported as 64-bit ids; the resolver
    // vouches the address is readable.
    let id = unsafe { std::ptr::read_unaligned(address.as_ptr() as *const i64) };
    Ok(AccessibilityAttribute { id, name })
}

static TABLE: OnceCell<ResolvedSymbolTable> = OnceCell::new();

/// Build and publish the process-wide table.
///
/// Idempotent: once a table is published, later calls return it and ignore
/// their arguments. If loading fails nothing is published and the error is
/// returned; a later call may try again. Concurrent callers block until the
/// first one finishes, and every reader observes the fully built table.
pub fn initialize(
    resolver: &dyn SymbolResolver,
    config: &SymbolConfig,
) -> Result<&'static ResolvedSymbolTable, BridgeError> {
    TABLE.get_or_try_init(|| {
        let table = ResolvedSymbolTable::load(resolver, config)?;
        let stand_ins: Vec<SymbolRole> = SymbolRole::ALL
            .into_iter()
            .filter(|role| table.is_stand_in(*role))
            .collect();
        info!(
            is_visible = table.is_visible.id,
            is_element = table.is_element.id,
            ?stand_ins,
            "private symbol table published"
        );
        Ok(table)
    })
}

/// [`initialize`] with the configuration from [`SymbolConfig::load`] and a
/// memoizing dynamic-linker resolver.
pub fn initialize_default() -> Result<&'static ResolvedSymbolTable, BridgeError> {
    if let Some(table) = TABLE.get() {
        return Ok(table);
    }
    let config = SymbolConfig::load();
    let resolver = CachedResolver::new(config.resolver());
    initialize(&resolver, &config)
}

/// The published table, or `None` before [`initialize`] has succeeded.
pub fn table() -> Option<&'static ResolvedSymbolTable> {
    TABLE.get()
}
