//! The exported `moshlink_client_*` functions, driven the way a C host would.

use std::collections::HashMap;
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::ptr;
use std::sync::{Mutex, Once, OnceLock};
use std::time::Duration;

use moshlink_client::ffi::{
    MoshlinkClient, MoshlinkEventKind, install_connector, moshlink_client_create,
    moshlink_client_destroy, moshlink_client_send_input, moshlink_client_send_resize,
    moshlink_client_set_output_enabled, moshlink_client_start, moshlink_client_stop,
};
use moshlink_core::ConnectParams;
use moshlink_test_utils::{MockHandle, MockTransport, wait_until};

const WAIT: Duration = Duration::from_secs(3);

/// Handles of every transport built so far, keyed by session key.
fn handles() -> &'static Mutex<HashMap<String, MockHandle>> {
    static HANDLES: OnceLock<Mutex<HashMap<String, MockHandle>>> = OnceLock::new();
    HANDLES.get_or_init(|| Mutex::new(HashMap::new()))
}

fn install_mock_connector() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        install_connector(|params: &ConnectParams<'_>| {
            let (transport, handle) = MockTransport::new(params.cols, params.rows);
            handles()
                .lock()
                .unwrap()
                .insert(params.key.to_string(), handle);
            Ok(transport)
        })
        .unwrap();
    });
}

/// What the C callbacks saw.
#[derive(Default)]
struct Captured {
    output: Mutex<Vec<u8>>,
    events: Mutex<Vec<(MoshlinkEventKind, Option<String>)>>,
}

impl Captured {
    fn events(&self) -> Vec<(MoshlinkEventKind, Option<String>)> {
        self.events.lock().unwrap().clone()
    }
}

unsafe extern "C" fn on_output(bytes: *const u8, len: usize, ctx: *mut c_void) {
    let captured = unsafe { &*(ctx as *const Captured) };
    let frame = unsafe { std::slice::from_raw_parts(bytes, len) };
    captured.output.lock().unwrap().extend_from_slice(frame);
}

unsafe extern "C" fn on_event(kind: MoshlinkEventKind, message: *const c_char, ctx: *mut c_void) {
    let captured = unsafe { &*(ctx as *const Captured) };
    let message = (!message.is_null())
        .then(|| unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned());
    captured.events.lock().unwrap().push((kind, message));
}

struct Created {
    client: *mut MoshlinkClient,
    error: String,
}

fn create(
    ip: &str,
    port: &str,
    key: &str,
    cols: c_int,
    rows: c_int,
    with_output: bool,
    captured: &Captured,
) -> Created {
    install_mock_connector();
    let ip = CString::new(ip).unwrap();
    let port = CString::new(port).unwrap();
    let key = CString::new(key).unwrap();
    let ctx = captured as *const Captured as *mut c_void;
    let mut errbuf = [0 as c_char; 128];

    let client = unsafe {
        moshlink_client_create(
            ip.as_ptr(),
            port.as_ptr(),
            key.as_ptr(),
            cols,
            rows,
            with_output.then_some(on_output as unsafe extern "C" fn(_, _, _)),
            ctx,
            Some(on_event),
            ctx,
            errbuf.as_mut_ptr(),
            errbuf.len(),
        )
    };
    let error = unsafe { CStr::from_ptr(errbuf.as_ptr()) }
        .to_string_lossy()
        .into_owned();
    Created { client, error }
}

fn handle_for(key: &str) -> MockHandle {
    handles().lock().unwrap().get(key).cloned().unwrap()
}

#[test]
fn missing_endpoint_rejected() {
    let captured = Captured::default();
    let created = create("", "", "", 80, 24, true, &captured);

    assert!(created.client.is_null());
    assert_eq!(created.error, "Missing ip/port/key");
}

#[test]
fn zero_dimensions_rejected() {
    let captured = Captured::default();

    let created = create("192.0.2.7", "60001", "zero-cols", 0, 24, true, &captured);
    assert!(created.client.is_null());
    assert_eq!(created.error, "Invalid cols/rows");

    let created = create("192.0.2.7", "60001", "zero-rows", 80, 0, true, &captured);
    assert!(created.client.is_null());
    assert!(!created.error.is_empty());

    let created = create("192.0.2.7", "60001", "negative", -80, 24, true, &captured);
    assert!(created.client.is_null());
    assert_eq!(created.error, "Invalid cols/rows");
}

#[test]
fn missing_output_callback_rejected() {
    let captured = Captured::default();
    let created = create("192.0.2.7", "60001", "no-output", 80, 24, false, &captured);

    assert!(created.client.is_null());
    assert!(created.error.contains("callback"));
    assert!(!handles().lock().unwrap().contains_key("no-output"));
}

#[test]
fn null_arguments_are_safe() {
    unsafe {
        moshlink_client_start(ptr::null_mut());
        moshlink_client_stop(ptr::null_mut());
        moshlink_client_set_output_enabled(ptr::null_mut(), 1);
        moshlink_client_send_input(ptr::null_mut(), b"x".as_ptr(), 1);
        moshlink_client_send_resize(ptr::null_mut(), 80, 24);
        moshlink_client_destroy(ptr::null_mut());
    }

    let client = unsafe {
        moshlink_client_create(
            ptr::null(),
            ptr::null(),
            ptr::null(),
            80,
            24,
            None,
            ptr::null_mut(),
            None,
            ptr::null_mut(),
            ptr::null_mut(),
            0,
        )
    };
    assert!(client.is_null());
}

#[test]
fn full_lifecycle() {
    let captured = Captured::default();
    let created = create("192.0.2.7", "60001", "lifecycle", 80, 24, true, &captured);
    assert!(!created.client.is_null());
    let client = created.client;
    let handle = handle_for("lifecycle");
    assert_eq!(handle.resizes(), vec![(80, 24)]);

    unsafe {
        moshlink_client_send_input(client, b"hi".as_ptr(), 2);
        moshlink_client_send_input(client, ptr::null(), 5);
        moshlink_client_send_resize(client, 0, 24);
        moshlink_client_send_resize(client, 132, 43);
        moshlink_client_start(client);
        moshlink_client_start(client);
    }

    assert!(handle.wait_for_user_bytes(2, WAIT));
    assert!(wait_until(WAIT, || !captured.output.lock().unwrap().is_empty()));

    unsafe { moshlink_client_stop(client) };
    assert_eq!(captured.events(), vec![(MoshlinkEventKind::Exit, None)]);
    assert_eq!(handle.user_bytes(), b"hi");
    assert_eq!(handle.resizes(), vec![(80, 24), (132, 43)]);

    unsafe { moshlink_client_destroy(client) };
    assert_eq!(captured.events().len(), 1);
}

#[test]
fn events_carry_messages() {
    let captured = Captured::default();
    let created = create("192.0.2.7", "60001", "messages", 80, 24, true, &captured);
    let client = created.client;
    let handle = handle_for("messages");
    handle.set_send_error("connection refused");

    unsafe { moshlink_client_start(client) };
    assert!(wait_until(WAIT, || !captured.events().is_empty()));
    unsafe { moshlink_client_destroy(client) };

    assert_eq!(
        captured.events(),
        vec![
            (
                MoshlinkEventKind::NetworkError,
                Some("connection refused".to_string())
            ),
            (MoshlinkEventKind::Exit, None),
        ]
    );
}

#[test]
fn output_toggle() {
    let captured = Captured::default();
    let created = create("192.0.2.7", "60001", "toggle", 80, 24, true, &captured);
    let client = created.client;
    let handle = handle_for("toggle");

    unsafe {
        moshlink_client_set_output_enabled(client, 0);
        moshlink_client_start(client);
    }
    assert!(handle.wait_for_ticks(3, WAIT));
    assert!(captured.output.lock().unwrap().is_empty());

    unsafe { moshlink_client_set_output_enabled(client, 1) };
    assert!(wait_until(WAIT, || !captured.output.lock().unwrap().is_empty()));
    unsafe { moshlink_client_destroy(client) };

    let output = captured.output.lock().unwrap().clone();
    assert!(output.starts_with(b"\x1b[r\x1b[0m\x1b[H\x1b[2J"));
}
