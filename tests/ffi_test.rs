//! Integration tests for the C ABI
//!
//! The ABI drives a single process-wide instance, so the whole flow runs in
//! one test.

use quago_sdk::ffi::{
    beginSegment, bindKey, dispatchKeyEvent, dispatchMotionEvent, endSegment, getSessionId,
    initializeWithSettings, onApplicationFocus, setAdditionalId, setKeyValues, setUserId,
    updateDisplay,
};
use quago_sdk::{sdk, DataSegment, Flavor, Headers, LogLevel, INIT_SEGMENT_NAME};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

static SEGMENTS: Mutex<Vec<(String, String)>> = Mutex::new(Vec::new());

extern "C" fn on_segment(headers: *const c_char, payload: *const c_char) {
    let headers = unsafe { CStr::from_ptr(headers) }.to_string_lossy().into_owned();
    let payload = unsafe { CStr::from_ptr(payload) }.to_string_lossy().into_owned();
    SEGMENTS.lock().unwrap().push((headers, payload));
}

fn wait_for_segments(count: usize) -> Vec<(Headers, DataSegment)> {
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        let segments = SEGMENTS.lock().unwrap().clone();
        if segments.len() >= count || Instant::now() > deadline {
            return segments
                .iter()
                .map(|(h, p)| {
                    (
                        serde_json::from_str(h).unwrap(),
                        serde_json::from_str(p).unwrap(),
                    )
                })
                .collect();
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn c(value: &str) -> CString {
    CString::new(value).unwrap()
}

#[test]
fn test_abi_flow() {
    // Calls before initialization are ignored.
    endSegment();
    let early = unsafe { CStr::from_ptr(getSessionId()) }
        .to_str()
        .unwrap()
        .to_string();
    assert!(sdk::instance().is_none());

    // NULL token is rejected.
    unsafe {
        initializeWithSettings(
            ptr::null(),
            Flavor::Development.code(),
            LogLevel::Debug.code(),
            -1,
            0,
            ptr::null(),
            true,
            true,
            Some(on_segment),
            None,
        );
    }
    assert!(sdk::instance().is_none());

    let token = c("abi-token");
    let version = c("2022.3.1");
    unsafe {
        initializeWithSettings(
            token.as_ptr(),
            Flavor::Production.code(),
            LogLevel::Debug.code(),
            -1,
            1,
            version.as_ptr(),
            true,
            true,
            Some(on_segment),
            None,
        );
    }
    let instance = sdk::instance().expect("initialized");
    assert_eq!(instance.session_id(), early);
    assert_eq!(instance.settings().max_segments(), None);

    // A second initialization keeps the first instance.
    let other = c("other-token");
    unsafe {
        initializeWithSettings(
            other.as_ptr(),
            99,
            99,
            3,
            0,
            ptr::null(),
            false,
            false,
            Some(on_segment),
            None,
        );
    }
    assert_eq!(sdk::instance().unwrap().settings().app_token(), "abi-token");

    updateDisplay(1920, 1080, 1600, 900, 0, 0, 60, 96.0, true);
    onApplicationFocus(true);

    let name = c("boss-fight");
    let jump = c("jump");
    let (key, value) = (c("weapon"), c("sword"));
    let (user, extra) = (c("player-1"), c("guild-9"));
    unsafe {
        bindKey(jump.as_ptr(), 32);
        beginSegment(name.as_ptr());
        beginSegment(ptr::null());
        thread::sleep(Duration::from_millis(30));
        setKeyValues(key.as_ptr(), value.as_ptr());
        setKeyValues(key.as_ptr(), ptr::null());
        setUserId(user.as_ptr());
        setAdditionalId(extra.as_ptr());
    }
    dispatchMotionEvent(1, 10.0, 10.0, 1);
    dispatchMotionEvent(5, 12.0, 12.0, 1);
    dispatchMotionEvent(999, 0.0, 0.0, 0);
    dispatchKeyEvent(1, 32);
    dispatchKeyEvent(2, 32);
    thread::sleep(Duration::from_millis(30));
    endSegment();

    let segments = wait_for_segments(2);
    assert_eq!(segments.len(), 2);

    let (init_headers, _) = &segments[0];
    assert_eq!(init_headers.seg_name.as_deref(), Some(INIT_SEGMENT_NAME));

    let (headers, data) = &segments[1];
    assert_eq!(headers.seg_name.as_deref(), Some("boss-fight"));
    assert_eq!(headers.user_id.as_deref(), Some("player-1"));
    assert_eq!(headers.additional_id.as_deref(), Some("guild-9"));
    assert_eq!(data.app_token, "abi-token");
    assert_eq!(data.flavor, Flavor::Production.code());
    assert_eq!(data.wrapper, 1);
    assert_eq!(data.wrapper_version.as_deref(), Some("2022.3.1"));
    assert_eq!(data.session_id, early);
    assert_eq!(
        data.key_values,
        vec![["weapon".to_string(), "sword".to_string()]]
    );
    assert_eq!(data.key_bindings, vec![["jump".to_string(), "32".to_string()]]);
    assert_eq!(data.seq_mouse.len(), 2);
    assert_eq!(data.seq_key.len(), 2);
    assert_eq!(data.screen_width, 1920);
    assert!(data.resolution_unity_desktop.is_full_screen);
}
