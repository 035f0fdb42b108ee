//! `moshlink_client_create` before any connector is installed.

use std::ffi::{CStr, CString, c_char, c_void};
use std::ptr;

use moshlink_client::ffi::{connector_installed, moshlink_client_create};

unsafe extern "C" fn discard_output(_bytes: *const u8, _len: usize, _ctx: *mut c_void) {}

#[test]
fn create_without_connector_fails() {
    let ip = CString::new("192.0.2.7").unwrap();
    let port = CString::new("60001").unwrap();
    let key = CString::new("4NeCCgvZFe2RnPgrcU1PQw").unwrap();
    let mut errbuf = [0 as c_char; 64];

    assert!(!connector_installed());
    let client = unsafe {
        moshlink_client_create(
            ip.as_ptr(),
            port.as_ptr(),
            key.as_ptr(),
            80,
            24,
            Some(discard_output),
            ptr::null_mut(),
            None,
            ptr::null_mut(),
            errbuf.as_mut_ptr(),
            errbuf.len(),
        )
    };

    assert!(client.is_null());
    let message = unsafe { CStr::from_ptr(errbuf.as_ptr()) };
    assert_eq!(message.to_str().unwrap(), "No transport connector installed");
}

#[test]
fn validation_precedes_connector_lookup() {
    let ip = CString::new("192.0.2.7").unwrap();
    let port = CString::new("60001").unwrap();
    let key = CString::new("4NeCCgvZFe2RnPgrcU1PQw").unwrap();
    let mut errbuf = [0 as c_char; 64];

    let client = unsafe {
        moshlink_client_create(
            ip.as_ptr(),
            port.as_ptr(),
            key.as_ptr(),
            80,
            24,
            None,
            ptr::null_mut(),
            None,
            ptr::null_mut(),
            errbuf.as_mut_ptr(),
            errbuf.len(),
        )
    };

    assert!(client.is_null());
    let message = unsafe { CStr::from_ptr(errbuf.as_ptr()) };
    assert_eq!(message.to_str().unwrap(), "Missing output callback");
}
