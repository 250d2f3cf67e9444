//! C ABI for engine bindings.
//!
//! Every entry point drives the process-wide SDK instance in [`crate::sdk`].
//!
//! Memory Safety:
//! - String arguments must be null-terminated UTF-8; they are copied before
//!   the call returns
//! - The pointer returned by `getSessionId()` is owned by the library and
//!   must not be freed
//! - NULL checks are performed on all inputs
//!
//! Thread Safety:
//! - All functions may be called from any thread. Callbacks are invoked on
//!   SDK threads.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::sync::OnceLock;

use crate::collector::{BiometricType, DisplayInfo};
use crate::config::{Flavor, LogLevel, RuntimeConfig, Settings};
use crate::sdk;

/// Receives `(headers_json, payload_json)` for each ended segment.
pub type OnJsonCallback = extern "C" fn(headers: *const c_char, payload: *const c_char);

/// Receives `(priority, tag, message)` for each log line.
pub type OnLogMessage = extern "C" fn(priority: c_int, tag: *const c_char, message: *const c_char);

// ============================================================================
// ARGUMENT HELPERS
// ============================================================================

/// Borrow a required string argument. Logs and returns `None` when it is
/// NULL or not UTF-8.
unsafe fn required_str<'a>(value: *const c_char, method: &str) -> Option<&'a str> {
    if value.is_null() {
        tracing::warn!(method, "NULL string argument, ignoring call");
        return None;
    }
    match CStr::from_ptr(value).to_str() {
        Ok(s) => Some(s),
        Err(_) => {
            tracing::warn!(method, "String argument is not valid UTF-8, ignoring call");
            None
        }
    }
}

/// Borrow a nullable string argument. `Err` means the call must be ignored.
unsafe fn optional_str<'a>(value: *const c_char, method: &str) -> Result<Option<&'a str>, ()> {
    if value.is_null() {
        return Ok(None);
    }
    required_str(value, method).map(Some).ok_or(())
}

fn to_c_string(value: &str) -> Option<CString> {
    CString::new(value).ok()
}

fn json_bridge(callback: OnJsonCallback) -> impl Fn(&str, &str) + Send + Sync + 'static {
    move |headers: &str, payload: &str| match (to_c_string(headers), to_c_string(payload)) {
        (Some(headers), Some(payload)) => callback(headers.as_ptr(), payload.as_ptr()),
        _ => tracing::error!("Segment JSON contains a NUL byte, not passed to host"),
    }
}

fn log_bridge(callback: OnLogMessage) -> impl Fn(LogLevel, &str, &str) + Send + Sync + 'static {
    move |level: LogLevel, tag: &str, message: &str| {
        if let (Some(tag), Some(message)) = (to_c_string(tag), to_c_string(message)) {
            callback(level.code(), tag.as_ptr(), message.as_ptr());
        }
    }
}

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Initialize the process-wide SDK.
///
/// `flavor` and `logLevel` take the integer codes of [`Flavor`] and
/// [`LogLevel`]; unknown codes fall back to `Development` and `Info`. A
/// negative `maxSegments` means unlimited. `version` is the wrapper version
/// and may be NULL. Network and tracking overrides are read from the runtime
/// config file.
///
/// # Safety
/// - `appToken` must be a valid null-terminated C string.
/// - `version` must be NULL or a valid null-terminated C string.
#[no_mangle]
#[allow(non_snake_case, clippy::too_many_arguments)]
pub unsafe extern "C" fn initializeWithSettings(
    appToken: *const c_char,
    flavor: c_int,
    logLevel: c_int,
    maxSegments: c_int,
    wrapper: c_int,
    version: *const c_char,
    enableManualMotionDispatcher: bool,
    enableManualKeysDispatcher: bool,
    callback: Option<OnJsonCallback>,
    logger: Option<OnLogMessage>,
) {
    const METHOD: &str = "initializeWithSettings";

    let Some(app_token) = required_str(appToken, METHOD) else {
        return;
    };
    let Ok(wrapper_version) = optional_str(version, METHOD) else {
        return;
    };

    let flavor = Flavor::try_from(flavor).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to Development flavor");
        Flavor::Development
    });
    let log_level = LogLevel::try_from(logLevel).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to Info log level");
        LogLevel::Info
    });
    let max_segments = u32::try_from(maxSegments).ok();

    let runtime = RuntimeConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Runtime config unreadable, using defaults");
        RuntimeConfig::default()
    });

    let mut builder = Settings::builder(app_token, flavor)
        .log_level(log_level)
        .max_segments(max_segments)
        .wrapper(wrapper, wrapper_version.map(str::to_string))
        .manual_motion_dispatcher(enableManualMotionDispatcher)
        .manual_keys_dispatcher(enableManualKeysDispatcher)
        .network(runtime.network)
        .tracking(runtime.tracking);
    if let Some(callback) = callback {
        builder = builder.callback(json_bridge(callback));
    }
    if let Some(logger) = logger {
        builder = builder.logger(log_bridge(logger));
    }

    let result = builder
        .build()
        .map_err(sdk::SdkError::from)
        .and_then(sdk::initialize);
    if let Err(e) = result {
        tracing::error!(error = %e, "SDK initialization failed");
    }
}

/// Session id of the process-wide SDK.
///
/// The returned pointer stays valid for the life of the process and must
/// not be freed.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn getSessionId() -> *const c_char {
    static SESSION_ID: OnceLock<Option<CString>> = OnceLock::new();
    SESSION_ID
        .get_or_init(|| to_c_string(sdk::session_id()))
        .as_ref()
        .map_or(ptr::null(), |id| id.as_ptr())
}

// ============================================================================
// SEGMENTS
// ============================================================================

/// # Safety
/// `name` must be a valid null-terminated C string.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn beginSegment(name: *const c_char) {
    if let Some(name) = required_str(name, "beginSegment") {
        sdk::begin_segment(name);
    }
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn endSegment() {
    sdk::end_segment();
}

/// # Safety
/// `userId` must be NULL or a valid null-terminated C string.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn beginTracking(userId: *const c_char) {
    if let Ok(user_id) = optional_str(userId, "beginTracking") {
        sdk::begin_tracking(user_id);
    }
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn endTracking() {
    sdk::end_tracking();
}

/// # Safety
/// `userId` must be a valid null-terminated C string.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn setUserId(userId: *const c_char) {
    if let Some(user_id) = required_str(userId, "setUserId") {
        sdk::set_user_id(user_id);
    }
}

/// # Safety
/// `additionalId` must be a valid null-terminated C string.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn setAdditionalId(additionalId: *const c_char) {
    if let Some(additional_id) = required_str(additionalId, "setAdditionalId") {
        sdk::set_additional_id(additional_id);
    }
}

/// Attach a key/value pair to the active segments. The key comes first.
///
/// # Safety
/// Both arguments must be valid null-terminated C strings.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn setKeyValues(key: *const c_char, value: *const c_char) {
    let (Some(key), Some(value)) = (
        required_str(key, "setKeyValues"),
        required_str(value, "setKeyValues"),
    ) else {
        return;
    };
    sdk::set_key_value(key, value);
}

// ============================================================================
// INPUT AND LIFECYCLE
// ============================================================================

/// Record a motion event. `type` takes a [`BiometricType`] code.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn dispatchMotionEvent(r#type: c_int, x: f32, y: f32, button: c_int) {
    match BiometricType::from_code(r#type) {
        Some(kind) => sdk::dispatch_motion(kind, x, y, button),
        None => tracing::warn!(code = r#type, "Unknown motion type, ignoring event"),
    }
}

/// Record a key event. `action` is 1 for down and 2 for up.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn dispatchKeyEvent(action: c_int, keyCode: c_int) {
    sdk::dispatch_key(action, keyCode);
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn onApplicationFocus(hasFocus: bool) {
    sdk::on_focus(hasFocus);
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn onApplicationStop() {
    sdk::on_stop();
}

#[no_mangle]
#[allow(non_snake_case, clippy::too_many_arguments)]
pub extern "C" fn updateDisplay(
    screenWidth: c_int,
    screenHeight: c_int,
    appWidth: c_int,
    appHeight: c_int,
    windowX: c_int,
    windowY: c_int,
    refreshRate: c_int,
    dpi: f32,
    fullScreen: bool,
) {
    sdk::update_display(DisplayInfo {
        screen_width: screenWidth,
        screen_height: screenHeight,
        app_width: appWidth,
        app_height: appHeight,
        window_x: windowX,
        window_y: windowY,
        refresh_rate: refreshRate,
        dpi,
        full_screen: fullScreen,
    });
}

/// Bind `keyCode` to `name`. A NULL name removes the binding of the key.
///
/// # Safety
/// `name` must be NULL or a valid null-terminated C string.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn bindKey(name: *const c_char, keyCode: c_int) {
    if let Ok(name) = optional_str(name, "bindKey") {
        sdk::bind_key(name, keyCode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_str() {
        let value = CString::new("level-1").unwrap();
        unsafe {
            assert_eq!(required_str(value.as_ptr(), "test"), Some("level-1"));
            assert_eq!(required_str(ptr::null(), "test"), None);
        }
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let bytes = [0xffu8, 0xfe, 0x00];
        let value = bytes.as_ptr() as *const c_char;
        unsafe {
            assert_eq!(required_str(value, "test"), None);
            assert_eq!(optional_str(value, "test"), Err(()));
            assert_eq!(optional_str(ptr::null(), "test"), Ok(None));
        }
    }

    #[test]
    fn test_session_id_pointer_is_stable() {
        let first = getSessionId();
        let second = getSessionId();
        assert_eq!(first, second);
        let id = unsafe { CStr::from_ptr(first) }.to_str().unwrap();
        assert_eq!(id, sdk::session_id());
    }
}
