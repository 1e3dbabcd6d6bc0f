//! Dynamic loader for the Oodle decompression library.
//!
//! The library is not embedded; callers point this at an `oo2core` shared
//! library on disk. Only `OodleLZ_Decompress` is bound. Tests use fake
//! [`Decompress`] implementations instead.

#![allow(unsafe_code)]

use crate::compress::Decompress;
use crate::error::{Error, Result};
use std::io;
use std::path::Path;

#[allow(non_camel_case_types)]
type OodleLZ_Decompress = unsafe extern "system" fn(
    src_buf: *const u8,
    src_len: i64,
    dst_buf: *mut u8,
    dst_size: u64,
    fuzz_safe: i32,
    check_crc: i32,
    verbosity: i32,
    dst_base: *mut u8,
    dst_base_size: usize,
    fp_callback: *mut core::ffi::c_void,
    callback_user_data: *mut core::ffi::c_void,
    decoder_memory: *mut core::ffi::c_void,
    decoder_memory_size: usize,
    thread_phase: i32,
) -> i32;

/// An Oodle library loaded from disk.
///
/// The function pointer stays valid for as long as the library handle is
/// held, so both live together here.
pub struct Oodle {
    _lib: libloading::Library,
    decompress: OodleLZ_Decompress,
}

impl Oodle {
    /// Loads an `oo2core` shared library and binds `OodleLZ_Decompress`.
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        unsafe {
            let lib = libloading::Library::new(path).map_err(|e| {
                io::Error::other(format!("failed to load oodle from {}: {e}", path.display()))
            })?;
            let sym: libloading::Symbol<OodleLZ_Decompress> =
                lib.get(b"OodleLZ_Decompress\0").map_err(|e| {
                    io::Error::other(format!("OodleLZ_Decompress not found: {e}"))
                })?;
            let decompress = *sym;
            Ok(Self {
                _lib: lib,
                decompress,
            })
        }
    }
}

impl Decompress for Oodle {
    fn decompress(&self, src: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let mut dst = vec![0u8; expected_len];
        let result = unsafe {
            (self.decompress)(
                src.as_ptr(),
                src.len() as i64,
                dst.as_mut_ptr(),
                expected_len as u64,
                0,
                0,
                0,
                core::ptr::null_mut(),
                0,
                core::ptr::null_mut(),
                core::ptr::null_mut(),
                core::ptr::null_mut(),
                0,
                0,
            )
        };
        if result <= 0 {
            return Err(Error::CorruptBlock {
                pos: 0,
                reason: format!("oodle decompression failed (status {result})"),
            });
        }
        if result as usize != expected_len {
            return Err(Error::CorruptBlock {
                pos: 0,
                reason: format!(
                    "oodle returned 0x{result:X} bytes, expected 0x{expected_len:X}"
                ),
            });
        }
        Ok(dst)
    }
}
