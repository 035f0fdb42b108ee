//! C ABI.
//!
//! Exposes [`Session`] to non-Rust hosts as an opaque `MoshlinkClient`
//! pointer. The transport comes from a process-wide connector that the
//! host's glue installs once with [`install_connector`] before the first
//! `moshlink_client_create`.
//!
//! Callbacks run on the driver thread. They must not call
//! `moshlink_client_destroy` on their own client.

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::ptr;
use std::sync::OnceLock;

use moshlink_core::constants::MSG_MISSING_OUTPUT;
use moshlink_core::{
    ConnectParams, Error, EventKind, EventSink, OutputSink, Result, SessionEvent, TerminalState,
    Transport,
};
use tracing::{debug, error, warn};

use crate::config::SessionConfig;
use crate::session::Session;

/// Transport type behind every C ABI session.
pub type FfiTransport = Box<dyn Transport<Snapshot = TerminalState>>;

type FfiConnector = Box<dyn Fn(&ConnectParams<'_>) -> Result<FfiTransport> + Send + Sync>;

static CONNECTOR: OnceLock<FfiConnector> = OnceLock::new();

/// Install the connector used by `moshlink_client_create`.
///
/// Only the first installation takes effect.
pub fn install_connector<F, T>(connector: F) -> Result<()>
where
    F: Fn(&ConnectParams<'_>) -> Result<T> + Send + Sync + 'static,
    T: Transport<Snapshot = TerminalState>,
{
    let boxed: FfiConnector =
        Box::new(move |params: &ConnectParams<'_>| {
            connector(params).map(|t| Box::new(t) as FfiTransport)
        });
    CONNECTOR
        .set(boxed)
        .map_err(|_| Error::transport("Transport connector already installed"))
}

/// True once a connector has been installed.
pub fn connector_installed() -> bool {
    CONNECTOR.get().is_some()
}

// =============================================================================
// C Types
// =============================================================================

/// Opaque session handle.
pub struct MoshlinkClient {
    session: Session<FfiTransport>,
}

/// Event kinds delivered to the event callback.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoshlinkEventKind {
    Connected = 1,
    NetworkError = 2,
    CryptoError = 3,
    Exit = 4,
}

impl From<EventKind> for MoshlinkEventKind {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Connected => MoshlinkEventKind::Connected,
            EventKind::NetworkError => MoshlinkEventKind::NetworkError,
            EventKind::CryptoError => MoshlinkEventKind::CryptoError,
            EventKind::Exit => MoshlinkEventKind::Exit,
        }
    }
}

/// `(bytes, len, ctx)`; `bytes` is valid only for the duration of the call.
pub type MoshlinkOutputCallback =
    Option<unsafe extern "C" fn(bytes: *const u8, len: usize, ctx: *mut c_void)>;

/// `(kind, message, ctx)`; `message` is NULL or a NUL-terminated string valid
/// only for the duration of the call.
pub type MoshlinkEventCallback =
    Option<unsafe extern "C" fn(kind: MoshlinkEventKind, message: *const c_char, ctx: *mut c_void)>;

/// Host context pointer carried to the driver thread.
struct HostContext(*mut c_void);

// SAFETY: the host promises the context may be used from the driver thread
// for as long as the client exists.
unsafe impl Send for HostContext {}

struct CallbackOutput {
    callback: unsafe extern "C" fn(*const u8, usize, *mut c_void),
    ctx: HostContext,
}

impl OutputSink for CallbackOutput {
    fn on_output(&mut self, bytes: &[u8]) {
        // SAFETY: the pointer and length describe a live slice; the callback
        // contract is the host's.
        unsafe { (self.callback)(bytes.as_ptr(), bytes.len(), self.ctx.0) }
    }
}

struct CallbackEvents {
    callback: Option<unsafe extern "C" fn(MoshlinkEventKind, *const c_char, *mut c_void)>,
    ctx: HostContext,
}

impl EventSink for CallbackEvents {
    fn on_event(&mut self, event: SessionEvent) {
        let Some(callback) = self.callback else {
            return;
        };
        let message = event.message.map(to_c_string);
        let message_ptr = message.as_ref().map_or(ptr::null(), |m| m.as_ptr());
        // SAFETY: message_ptr is NULL or points into `message`, which
        // outlives the call.
        unsafe { callback(event.kind.into(), message_ptr, self.ctx.0) }
    }
}

fn to_c_string(message: String) -> CString {
    CString::new(message.replace('\0', "")).unwrap_or_default()
}

// =============================================================================
// Helpers
// =============================================================================

/// Copy `message` into `errbuf`, truncated to fit and NUL-terminated.
///
/// # Safety
///
/// `errbuf` must be NULL or valid for writes of `errbuf_len` bytes.
unsafe fn write_error(errbuf: *mut c_char, errbuf_len: usize, message: &str) {
    if errbuf.is_null() || errbuf_len == 0 {
        return;
    }
    let len = message.len().min(errbuf_len - 1);
    // SAFETY: `len + 1 <= errbuf_len` bytes are written.
    unsafe {
        ptr::copy_nonoverlapping(message.as_ptr(), errbuf.cast::<u8>(), len);
        *errbuf.add(len) = 0;
    }
}

/// Borrow a C string. NULL reads as empty.
///
/// # Safety
///
/// `s` must be NULL or a valid NUL-terminated string.
unsafe fn c_str<'a>(s: *const c_char) -> Result<&'a str> {
    if s.is_null() {
        return Ok("");
    }
    // SAFETY: non-NULL and NUL-terminated per the caller.
    unsafe { CStr::from_ptr(s) }
        .to_str()
        .map_err(|_| Error::validation("ip/port/key must be valid UTF-8"))
}

/// A C dimension as u16. Anything outside `1..=u16::MAX` maps to 0.
fn dimension(value: c_int) -> u16 {
    u16::try_from(value).unwrap_or(0)
}

/// # Safety
///
/// `client` must be NULL or a pointer returned by `moshlink_client_create`
/// that has not been destroyed.
unsafe fn client_ref<'a>(client: *const MoshlinkClient) -> Option<&'a MoshlinkClient> {
    // SAFETY: see the function contract.
    unsafe { client.as_ref() }
}

#[allow(clippy::too_many_arguments)]
unsafe fn create_client(
    ip: *const c_char,
    port: *const c_char,
    key: *const c_char,
    cols: c_int,
    rows: c_int,
    output_cb: MoshlinkOutputCallback,
    output_ctx: *mut c_void,
    event_cb: MoshlinkEventCallback,
    event_ctx: *mut c_void,
) -> Result<MoshlinkClient> {
    // SAFETY: pointer validity is the caller's contract.
    let (ip, port, key) = unsafe { (c_str(ip)?, c_str(port)?, c_str(key)?) };
    let config = SessionConfig::new(ip, port, key, dimension(cols), dimension(rows));
    config.validate()?;

    let Some(output_cb) = output_cb else {
        return Err(Error::validation(MSG_MISSING_OUTPUT));
    };
    let Some(connector) = CONNECTOR.get() else {
        return Err(Error::transport("No transport connector installed"));
    };

    let output = CallbackOutput {
        callback: output_cb,
        ctx: HostContext(output_ctx),
    };
    let events = CallbackEvents {
        callback: event_cb,
        ctx: HostContext(event_ctx),
    };
    let session = Session::create(config, connector, output, events)?;
    Ok(MoshlinkClient { session })
}

// =============================================================================
// Exported Functions
// =============================================================================

/// Create a stopped client.
///
/// Returns NULL on failure and writes the reason into `errbuf`.
///
/// # Safety
///
/// String arguments must be NULL or NUL-terminated. `errbuf` must be NULL or
/// writable for `errbuf_len` bytes. The contexts must stay valid until the
/// client is destroyed.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn moshlink_client_create(
    ip: *const c_char,
    port: *const c_char,
    key: *const c_char,
    cols: c_int,
    rows: c_int,
    output_cb: MoshlinkOutputCallback,
    output_ctx: *mut c_void,
    event_cb: MoshlinkEventCallback,
    event_ctx: *mut c_void,
    errbuf: *mut c_char,
    errbuf_len: usize,
) -> *mut MoshlinkClient {
    // SAFETY: forwarded caller contract.
    let created = unsafe {
        create_client(
            ip, port, key, cols, rows, output_cb, output_ctx, event_cb, event_ctx,
        )
    };
    match created {
        Ok(client) => {
            debug!("client created");
            Box::into_raw(Box::new(client))
        }
        Err(e) => {
            warn!(error = %e, "client creation failed");
            // SAFETY: forwarded caller contract.
            unsafe { write_error(errbuf, errbuf_len, &e.to_string()) };
            ptr::null_mut()
        }
    }
}

/// Start the driver thread. No-op if running or `client` is NULL.
///
/// # Safety
///
/// `client` must be NULL or a live client.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn moshlink_client_start(client: *mut MoshlinkClient) {
    // SAFETY: forwarded caller contract.
    if let Some(client) = unsafe { client_ref(client) }
        && let Err(e) = client.session.start()
    {
        error!(error = %e, "failed to start client");
    }
}

/// Stop the driver thread and wait for it. No-op if stopped or NULL.
///
/// # Safety
///
/// `client` must be NULL or a live client.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn moshlink_client_stop(client: *mut MoshlinkClient) {
    // SAFETY: forwarded caller contract.
    if let Some(client) = unsafe { client_ref(client) } {
        client.session.stop();
    }
}

/// Stop and free the client. No-op for NULL.
///
/// # Safety
///
/// `client` must be NULL or a live client, and is dangling afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn moshlink_client_destroy(client: *mut MoshlinkClient) {
    if client.is_null() {
        return;
    }
    // SAFETY: the pointer came from Box::into_raw in moshlink_client_create.
    let client = unsafe { Box::from_raw(client) };
    client.session.destroy();
}

/// Enable (non-zero) or disable (zero) frame output.
///
/// # Safety
///
/// `client` must be NULL or a live client.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn moshlink_client_set_output_enabled(
    client: *mut MoshlinkClient,
    enabled: c_int,
) {
    // SAFETY: forwarded caller contract.
    if let Some(client) = unsafe { client_ref(client) } {
        client.session.set_output_enabled(enabled != 0);
    }
}

/// Queue `len` keystroke bytes. NULL or empty input is ignored.
///
/// # Safety
///
/// `client` must be NULL or a live client; `bytes` must be NULL or readable
/// for `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn moshlink_client_send_input(
    client: *mut MoshlinkClient,
    bytes: *const u8,
    len: usize,
) {
    if bytes.is_null() || len == 0 {
        return;
    }
    // SAFETY: forwarded caller contract.
    if let Some(client) = unsafe { client_ref(client) } {
        // SAFETY: non-NULL and readable for `len` bytes per the caller.
        let input = unsafe { std::slice::from_raw_parts(bytes, len) };
        client.session.send_input(input);
    }
}

/// Queue a resize. Non-positive or oversized dimensions are ignored.
///
/// # Safety
///
/// `client` must be NULL or a live client.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn moshlink_client_send_resize(
    client: *mut MoshlinkClient,
    cols: c_int,
    rows: c_int,
) {
    // SAFETY: forwarded caller contract.
    if let Some(client) = unsafe { client_ref(client) } {
        client.session.send_resize(dimension(cols), dimension(rows));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errbuf_truncates_and_terminates() {
        let mut buf = [0x7f as c_char; 8];
        unsafe { write_error(buf.as_mut_ptr(), buf.len(), "Missing ip/port/key") };
        let written = unsafe { CStr::from_ptr(buf.as_ptr()) };
        assert_eq!(written.to_str().unwrap(), "Missing");
    }

    #[test]
    fn errbuf_fits_whole_message() {
        let mut buf = [0x7f as c_char; 32];
        unsafe { write_error(buf.as_mut_ptr(), buf.len(), "Invalid cols/rows") };
        let written = unsafe { CStr::from_ptr(buf.as_ptr()) };
        assert_eq!(written.to_str().unwrap(), "Invalid cols/rows");
        assert_eq!(buf[17], 0);
        assert_eq!(buf[18], 0x7f as c_char);
    }

    #[test]
    fn errbuf_null_or_empty_is_ignored() {
        unsafe { write_error(ptr::null_mut(), 64, "ignored") };

        let mut buf = [0x7f as c_char; 1];
        unsafe { write_error(buf.as_mut_ptr(), 0, "ignored") };
        assert_eq!(buf[0], 0x7f as c_char);

        unsafe { write_error(buf.as_mut_ptr(), 1, "ignored") };
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn dimensions() {
        assert_eq!(dimension(80), 80);
        assert_eq!(dimension(0), 0);
        assert_eq!(dimension(-24), 0);
        assert_eq!(dimension(70_000), 0);
        assert_eq!(dimension(65_535), 65_535);
    }

    #[test]
    fn c_strings() {
        let ip = CString::new("192.0.2.7").unwrap();
        assert_eq!(unsafe { c_str(ip.as_ptr()) }.unwrap(), "192.0.2.7");
        assert_eq!(unsafe { c_str(ptr::null()) }.unwrap(), "");

        let bad = CString::new(vec![0xff, 0xfe]).unwrap();
        assert!(unsafe { c_str(bad.as_ptr()) }.is_err());
    }

    #[test]
    fn interior_nul_stripped_from_messages() {
        assert_eq!(to_c_string("a\0b".into()).to_str().unwrap(), "ab");
    }

    #[test]
    fn event_kind_values() {
        assert_eq!(MoshlinkEventKind::from(EventKind::Connected) as c_int, 1);
        assert_eq!(MoshlinkEventKind::from(EventKind::Exit) as c_int, 4);
    }
}
