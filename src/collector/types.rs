//! Data point types recorded by the SDK.
//!
//! Every point carries an `event_time` in milliseconds of SDK uptime and
//! exports itself as a flat numeric row for the payload.

use serde::{Deserialize, Serialize};

/// Event classification codes shared with the collection backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiometricType {
    Null = 0,
    MotionDown = 1,
    MotionPointerDown = 2,
    MotionMove = 3,
    MotionPointerUp = 4,
    MotionUp = 5,
    KeyDown = 10,
    KeyUp = 11,
    MouseWheel = 20,
    OnResume = 40,
    OnPause = 41,
    OnStop = 42,
    Text = 50,
    Custom = 200,
}

impl BiometricType {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => BiometricType::Null,
            1 => BiometricType::MotionDown,
            2 => BiometricType::MotionPointerDown,
            3 => BiometricType::MotionMove,
            4 => BiometricType::MotionPointerUp,
            5 => BiometricType::MotionUp,
            10 => BiometricType::KeyDown,
            11 => BiometricType::KeyUp,
            20 => BiometricType::MouseWheel,
            40 => BiometricType::OnResume,
            41 => BiometricType::OnPause,
            42 => BiometricType::OnStop,
            50 => BiometricType::Text,
            200 => BiometricType::Custom,
            _ => return None,
        })
    }
}

/// Mouse button codes carried by motion points.
pub mod mouse_button {
    pub const WHEEL: i32 = 0;
    pub const LEFT: i32 = 1;
    pub const RIGHT: i32 = 2;
    pub const MIDDLE: i32 = 3;
    pub const FORWARD: i32 = 4;
    pub const BACKWARD: i32 = 5;
}

/// Common behavior of recorded points.
pub trait DataPoint: Clone + Send + 'static {
    fn event_time(&self) -> i64;

    fn export_values(&self) -> Vec<f64>;

    /// Whether `other` carries the same information apart from timing.
    fn is_similar(&self, other: &Self) -> bool;
}

/// A mouse or touch event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionPoint {
    pub event_time: i64,
    pub kind: BiometricType,
    pub x: f32,
    pub y: f32,
    pub button: i32,
}

impl DataPoint for MotionPoint {
    fn event_time(&self) -> i64 {
        self.event_time
    }

    fn export_values(&self) -> Vec<f64> {
        vec![
            self.event_time as f64,
            self.kind.code() as f64,
            self.x as f64,
            self.y as f64,
            self.button as f64,
        ]
    }

    fn is_similar(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.x == other.x
            && self.y == other.y
            && self.button == other.button
    }
}

/// Key transition codes.
pub mod key_action {
    pub const DOWN: i32 = 1;
    pub const UP: i32 = 2;
}

/// A key press or release. Only bound keys are ever recorded by capture hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub event_time: i64,
    pub action: i32,
    pub key_code: i32,
}

impl DataPoint for KeyPoint {
    fn event_time(&self) -> i64 {
        self.event_time
    }

    fn export_values(&self) -> Vec<f64> {
        vec![
            self.event_time as f64,
            self.action as f64,
            self.key_code as f64,
        ]
    }

    fn is_similar(&self, other: &Self) -> bool {
        self.action == other.action && self.key_code == other.key_code
    }
}

/// Application lifecycle state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Resume = 1,
    Pause = 2,
    Stop = 3,
}

impl LifecycleState {
    pub fn from_type(kind: BiometricType) -> Option<Self> {
        match kind {
            BiometricType::OnResume => Some(LifecycleState::Resume),
            BiometricType::OnPause => Some(LifecycleState::Pause),
            BiometricType::OnStop => Some(LifecycleState::Stop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePoint {
    pub event_time: i64,
    pub state: LifecycleState,
}

impl DataPoint for LifecyclePoint {
    fn event_time(&self) -> i64 {
        self.event_time
    }

    fn export_values(&self) -> Vec<f64> {
        vec![self.event_time as f64, self.state as i32 as f64]
    }

    fn is_similar(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

/// Display state reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub screen_width: i32,
    pub screen_height: i32,
    pub app_width: i32,
    pub app_height: i32,
    pub window_x: i32,
    pub window_y: i32,
    pub refresh_rate: i32,
    pub dpi: f32,
    pub full_screen: bool,
}

/// A display state captured at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionPoint {
    pub event_time: i64,
    pub display: DisplayInfo,
}

impl ResolutionPoint {
    pub fn new(event_time: i64, display: DisplayInfo) -> Self {
        Self {
            event_time,
            display,
        }
    }
}

impl DataPoint for ResolutionPoint {
    fn event_time(&self) -> i64 {
        self.event_time
    }

    fn export_values(&self) -> Vec<f64> {
        let d = &self.display;
        vec![
            self.event_time as f64,
            d.screen_width as f64,
            d.screen_height as f64,
            d.app_width as f64,
            d.app_height as f64,
            d.window_x as f64,
            d.window_y as f64,
            d.refresh_rate as f64,
            d.dpi as f64,
            if d.full_screen { 1.0 } else { 0.0 },
        ]
    }

    /// Timing and the full-screen flag are ignored.
    fn is_similar(&self, other: &Self) -> bool {
        let (a, b) = (&self.display, &other.display);
        a.screen_width == b.screen_width
            && a.screen_height == b.screen_height
            && a.app_width == b.app_width
            && a.app_height == b.app_height
            && a.window_x == b.window_x
            && a.window_y == b.window_y
            && a.refresh_rate == b.refresh_rate
            && a.dpi == b.dpi
    }
}

/// Input pushed by automatic capture hooks, stamped on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SensorEvent {
    Motion {
        kind: BiometricType,
        x: f32,
        y: f32,
        button: i32,
    },
    Key {
        action: i32,
        key_code: i32,
    },
}
