//! Shared test helpers for xcagent-core integration tests.
//!
//! Provides a fake private framework: statics and `extern "C"` functions of
//! the test binary registered in a [`SymbolMap`] under the names the real
//! framework exports.

#![allow(dead_code)]

use std::ffi::{c_char, c_void, CStr};
use std::sync::atomic::{AtomicUsize, Ordering};

use xcagent_core::config::SymbolConfig;
use xcagent_core::symbols::{SymbolAddress, SymbolMap};

pub const VISIBLE_NAME: &str = "XC_kAXXCAttributeIsVisible";
pub const ELEMENT_NAME: &str = "XC_kAXXCAttributeIsElement";
pub const LOGGER_GETTER_NAME: &str = "XCDebugLogger";
pub const LOGGER_SETTER_NAME: &str = "XCSetDebugLogger";
pub const MAPPER_NAME: &str = "XCAXAccessibilityAttributesForStringAttributes";

pub static VISIBLE_ID: i64 = 5003;
pub static ELEMENT_ID: i64 = 5004;

/// Ids the fake mapper assigns.
pub const MAPPED_VISIBLE_ID: i64 = 2_000;
pub const MAPPED_ELEMENT_ID: i64 = 2_001;

static LOGGER: AtomicUsize = AtomicUsize::new(0);

extern "C" fn fake_debug_logger() -> *mut c_void {
    LOGGER.load(Ordering::SeqCst) as *mut c_void
}

extern "C" fn fake_set_debug_logger(logger: *mut c_void) {
    LOGGER.store(logger as usize, Ordering::SeqCst);
}

extern "C" fn fake_attributes_for_string_attributes(
    names: *const *const c_char,
    count: usize,
    out_ids: *mut i64,
) -> usize {
    let mut written = 0;
    for i in 0..count {
        let name = unsafe { CStr::from_ptr(*names.add(i)) };
        let id = match name.to_str() {
            Ok(VISIBLE_NAME) => MAPPED_VISIBLE_ID,
            Ok(ELEMENT_NAME) => MAPPED_ELEMENT_ID,
            _ => break,
        };
        unsafe { *out_ids.add(i) = id };
        written += 1;
    }
    written
}

fn address<T>(ptr: *const T) -> SymbolAddress {
    SymbolAddress::from_ptr(ptr as *const c_void).unwrap()
}

/// A framework exporting only the mandatory attribute constants.
pub fn mandatory_only() -> SymbolMap {
    let mut map = SymbolMap::new();
    unsafe {
        map.insert(VISIBLE_NAME, address(&VISIBLE_ID as *const i64));
        map.insert(ELEMENT_NAME, address(&ELEMENT_ID as *const i64));
    }
    map
}

/// A framework exporting every symbol the bridge knows about.
pub fn full_framework() -> SymbolMap {
    let mut map = mandatory_only();
    unsafe {
        map.insert(LOGGER_GETTER_NAME, address(fake_debug_logger as *const ()));
        map.insert(LOGGER_SETTER_NAME, address(fake_set_debug_logger as *const ()));
        map.insert(MAPPER_NAME, address(fake_attributes_for_string_attributes as *const ()));
    }
    map
}

/// Route `tracing` output through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Default symbol names, with the fake mapper's C signature trusted for
/// attribute ids.
pub fn mapping_config() -> SymbolConfig {
    SymbolConfig {
        map_attribute_ids: true,
        ..SymbolConfig::default()
    }
}
