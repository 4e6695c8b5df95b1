// llama-rs/src/ffi.rs
//
// Backend lifecycle helpers. llama.cpp's global init/free must run at
// most once per process, regardless of how many sessions come and go.

use std::sync::OnceLock;

use llama_cpp_sys_2::{llama_backend_free, llama_backend_init};

static INIT_CALLED: OnceLock<()> = OnceLock::new();
static DEINIT_CALLED: OnceLock<()> = OnceLock::new();

#[inline]
pub(crate) fn trace(msg: &str) {
    #[cfg(feature = "ffi-trace")]
    println!("{msg}");
    #[cfg(not(feature = "ffi-trace"))]
    let _ = msg;
}

/// Initialize the native backend. Later calls are ignored.
pub fn init_backend() {
    if INIT_CALLED.set(()).is_ok() {
        trace("[FFI] llama_backend_init()");
        unsafe { llama_backend_init() };
    } else {
        trace("[FFI] init_backend() called again, ignored");
    }
}

/// Optional: call once on clean shutdown.
pub fn deinit_backend() {
    if DEINIT_CALLED.set(()).is_ok() {
        trace("[FFI] llama_backend_free()");
        unsafe { llama_backend_free() };
    } else {
        trace("[FFI] deinit_backend() called again, ignored");
    }
}
