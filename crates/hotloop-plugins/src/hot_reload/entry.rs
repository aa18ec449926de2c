//! Entry point protocol
//!
//! A plugin module exports two C-ABI symbols:
//!
//! - `Run`: `extern "C" fn(detail: *mut u8, capacity: usize) -> i32`. Returns
//!   `0` on success. A positive return is a failure whose UTF-8 detail is the
//!   first `min(n, capacity)` bytes written to `detail`; a negative return is
//!   a failure without detail.
//! - `Run_signature`: `extern "C" fn() -> *const c_char` returning the
//!   NUL-terminated declaration of `Run`, which must equal [`ENTRY_SIGNATURE`].
//!
//! Native symbols carry no type information, so the declaration is what the
//! loader checks before calling `Run`.

use std::os::raw::c_char;

/// Reserved name of the entry symbol
pub const ENTRY_SYMBOL: &str = "Run";

/// Companion symbol declaring the entry point's call shape
pub const SIGNATURE_SYMBOL: &str = "Run_signature";

/// The only accepted declaration of `Run`
pub const ENTRY_SIGNATURE: &str = "extern \"C\" fn(*mut u8, usize) -> i32";

/// Size of the failure detail buffer handed to `Run`
pub const DETAIL_CAPACITY: usize = 4096;

/// Raw type of the entry symbol
pub type EntryFn = unsafe extern "C" fn(detail: *mut u8, capacity: usize) -> i32;

/// Raw type of the signature symbol
pub type SignatureFn = unsafe extern "C" fn() -> *const c_char;

/// Symbol names as NUL-terminated bytes for `dlsym`
pub(crate) const ENTRY_SYMBOL_C: &[u8] = b"Run\0";
pub(crate) const SIGNATURE_SYMBOL_C: &[u8] = b"Run_signature\0";

/// Decode what `Run` returned into an outcome.
pub(crate) fn decode_outcome(code: i32, detail: &[u8]) -> Result<(), String> {
    match usize::try_from(code) {
        Ok(0) => Ok(()),
        Ok(len) => {
            let len = len.min(detail.len());
            Err(String::from_utf8_lossy(&detail[..len]).into_owned())
        }
        Err(_) => Err(format!("exit code {code}")),
    }
}

/// Source of a minimal plugin satisfying the protocol.
///
/// `{name}` is replaced with the plugin name by [`render_template`].
pub const PLUGIN_TEMPLATE: &str = r#"//! {name} plugin

use std::os::raw::c_char;

fn run() -> Result<(), String> {
    println!("hello from {name}");
    Ok(())
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn Run_signature() -> *const c_char {
    c"extern \"C\" fn(*mut u8, usize) -> i32".as_ptr()
}

#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn Run(detail: *mut u8, capacity: usize) -> i32 {
    match run() {
        Ok(()) => 0,
        Err(message) => {
            let len = message.len().min(capacity).min(i32::MAX as usize);
            if len == 0 {
                return -1;
            }
            std::ptr::copy_nonoverlapping(message.as_ptr(), detail, len);
            len as i32
        }
    }
}
"#;

/// Fill in [`PLUGIN_TEMPLATE`] for a plugin name.
pub fn render_template(name: &str) -> String {
    PLUGIN_TEMPLATE.replace("{name}", name)
}
