//! Integration tests for segment delivery through the JSON callback

use crossbeam_channel::{unbounded, Receiver};
use quago_sdk::{
    key_action, mouse_button, BiometricType, DataSegment, DisplayInfo, Flavor, Headers, Mode,
    Prompt, Sdk, Settings, SettingsBuilder, TrackingConfig, INIT_SEGMENT_NAME,
};
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(3);

fn builder() -> SettingsBuilder {
    Settings::builder("lifecycle-token", Flavor::Development)
        .manual_motion_dispatcher(true)
        .manual_keys_dispatcher(true)
}

fn start(builder: SettingsBuilder) -> (Sdk, Receiver<(Headers, DataSegment)>) {
    let (tx, rx) = unbounded();
    let settings = builder
        .callback(move |headers: &str, payload: &str| {
            let headers: Headers = serde_json::from_str(headers).expect("headers JSON");
            let payload: DataSegment = serde_json::from_str(payload).expect("payload JSON");
            let _ = tx.send((headers, payload));
        })
        .build()
        .expect("valid settings");
    (Sdk::new(settings).expect("SDK started"), rx)
}

fn next(rx: &Receiver<(Headers, DataSegment)>) -> (Headers, DataSegment) {
    rx.recv_timeout(WAIT).expect("segment delivered")
}

/// Let the manager thread stamp the segment start before input arrives.
fn settle() {
    thread::sleep(Duration::from_millis(30));
}

#[test]
fn test_init_segment_comes_first() {
    let (sdk, rx) = start(builder());

    let (headers, data) = next(&rx);
    assert_eq!(headers.seg_name.as_deref(), Some(INIT_SEGMENT_NAME));
    assert_eq!(headers.seg_count, 1);
    assert_eq!(headers.app_token, "lifecycle-token");
    assert_eq!(data.session_id, sdk.session_id());
    assert_eq!(data.mode, Mode::Manual.code());
    assert_eq!(data.prompt, Prompt::Developer.code());
    assert_eq!(data.flavor, Flavor::Development.code());
}

#[test]
fn test_manual_segment_carries_input() {
    let (sdk, rx) = start(builder().disable_init_segment(true));

    sdk.update_display(DisplayInfo {
        screen_width: 2560,
        screen_height: 1440,
        app_width: 1280,
        app_height: 720,
        refresh_rate: 144,
        dpi: 110.0,
        ..DisplayInfo::default()
    });
    sdk.bind_key(Some("jump"), 32);

    sdk.begin_segment("level-1");
    settle();
    sdk.set_key_value("difficulty", "easy");
    sdk.set_key_value("difficulty", "hard");
    sdk.set_user_id("player-7");
    sdk.dispatch_motion(BiometricType::MotionDown, 100.0, 200.0, mouse_button::LEFT);
    sdk.dispatch_motion(BiometricType::MotionMove, 110.0, 210.0, mouse_button::LEFT);
    sdk.dispatch_motion(BiometricType::MotionUp, 120.0, 220.0, mouse_button::LEFT);
    sdk.dispatch_key(key_action::DOWN, 32);
    sdk.dispatch_key(key_action::UP, 32);
    settle();
    sdk.end_segment();

    let (headers, data) = next(&rx);
    assert_eq!(headers.seg_name.as_deref(), Some("level-1"));
    assert_eq!(headers.user_id.as_deref(), Some("player-7"));
    assert_eq!(data.seg_count, 1);
    assert_eq!(
        data.key_values,
        vec![["difficulty".to_string(), "hard".to_string()]]
    );
    assert_eq!(data.key_bindings, vec![["jump".to_string(), "32".to_string()]]);
    assert_eq!(data.seq_mouse.len(), 3);
    assert_eq!(data.seq_key.len(), 2);
    assert_eq!(data.screen_width, 2560);
    assert_eq!(data.app_height, 720);
    assert!(data.times.ts_end >= data.times.ts_start);
    assert!(data.times.uptime_end >= data.times.uptime_start);

    // Rows are chronological and relative to the segment start.
    let first = &data.seq_mouse[0];
    let last = &data.seq_mouse[2];
    assert!(first[0] >= 0.0);
    assert!(last[0] >= first[0]);
}

#[test]
fn test_begin_ends_previous_segment() {
    let (sdk, rx) = start(builder().disable_init_segment(true));

    sdk.begin_segment("menu");
    sdk.begin_segment("game");
    sdk.end_segment();

    let (first, _) = next(&rx);
    let (second, _) = next(&rx);
    assert_eq!(first.seg_name.as_deref(), Some("menu"));
    assert_eq!(first.seg_count, 1);
    assert_eq!(second.seg_name.as_deref(), Some("game"));
    assert_eq!(second.seg_count, 2);
}

#[test]
fn test_max_segments_stops_delivery() {
    let (sdk, rx) = start(builder().max_segments(Some(2)));

    let (init, _) = next(&rx);
    assert_eq!(init.seg_name.as_deref(), Some(INIT_SEGMENT_NAME));

    sdk.begin_segment("only");
    sdk.end_segment();
    let (_, data) = next(&rx);
    assert_eq!(data.seg_name.as_deref(), Some("only"));
    assert_eq!(data.prompt, Prompt::MaxSegmentsReached.code());

    sdk.begin_segment("ignored");
    sdk.end_segment();
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    assert_eq!(sdk.stats().snapshot().segments_to_callback, 2);
}

#[test]
fn test_tracking_rolls_over_on_motion_amount() {
    let tracking = TrackingConfig {
        motion_amount: 5,
        max_duration: Duration::from_secs(600),
        check_interval: Duration::from_millis(50),
    };
    let (sdk, rx) = start(builder().disable_init_segment(true).tracking(tracking));

    sdk.begin_tracking(Some("user-1"));
    settle();
    for i in 0..10 {
        sdk.dispatch_motion(BiometricType::MotionMove, i as f32, i as f32, mouse_button::LEFT);
    }

    let (headers, data) = next(&rx);
    assert_eq!(headers.user_id.as_deref(), Some("user-1"));
    assert_eq!(headers.mode, Mode::Auto.code());
    assert_eq!(data.prompt, Prompt::TrackingAmount.code());
    assert!(data.seg_name.is_none());

    sdk.end_tracking();
    let (successor, data) = next(&rx);
    assert_eq!(successor.user_id.as_deref(), Some("user-1"));
    assert_eq!(successor.seg_count, 2);
    assert_eq!(data.prompt, Prompt::Developer.code());
}

#[test]
fn test_tracking_rolls_over_on_duration() {
    let tracking = TrackingConfig {
        motion_amount: 1_000,
        max_duration: Duration::from_millis(100),
        check_interval: Duration::from_millis(40),
    };
    let (sdk, rx) = start(builder().disable_init_segment(true).tracking(tracking));

    sdk.begin_tracking(None);
    let (_, data) = next(&rx);
    assert_eq!(data.prompt, Prompt::TrackingDuration.code());
    assert!(data.user_id.is_none());

    sdk.end_tracking();
    sdk.release();
}

#[test]
fn test_key_value_without_segment_is_ignored() {
    let (sdk, rx) = start(builder().disable_init_segment(true));

    sdk.set_key_value("orphan", "1");
    sdk.begin_segment("after");
    sdk.end_segment();

    let (_, data) = next(&rx);
    assert!(data.key_values.is_empty());
}
