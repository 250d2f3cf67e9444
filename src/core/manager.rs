//! Segment state machine.
//!
//! Runs on the manager worker thread. Holds at most one manual segment and
//! one tracking segment at a time; each ended segment is queried, turned into
//! a [`DataSegment`] and handed to the JSON callback or the network module.

use crate::clock::Clock;
use crate::collector::store::DataStore;
use crate::collector::types::DisplayInfo;
use crate::config::{Flavor, JsonCallback, QueryLimits, TrackingConfig};
use crate::core::payload::{DataSegment, Headers, PayloadBuilder, PayloadError, ServerEnvelope};
use crate::core::query::{count_motion, query_segment};
use crate::core::segment::{Mode, Prompt, Segment};
use crate::id::generate_id;
use crate::keymap::KeyBindings;
use crate::logging::Logger;
use crate::network::NetworkModule;
use crate::stats::SharedStats;
use crate::worker::{Handler, WorkerHandle};
use crate::{SDK_VERSION_CODE, SDK_VERSION_NAME};
use std::sync::Arc;

/// Messages handled by [`SegmentManager`].
#[derive(Debug)]
pub enum Command {
    Init,
    SegmentBegin(Segment),
    SegmentEnd,
    TrackingBegin(Segment),
    TrackingCheck,
    TrackingEnd,
    SetKeyValue(String, String),
    SetUserId(String),
    SetAdditionalId(String),
    Release,
}

/// Where ended segments go.
pub enum Delivery {
    Callback(JsonCallback),
    Network(NetworkModule),
}

impl Delivery {
    fn release(&mut self) {
        if let Delivery::Network(network) = self {
            network.release();
        }
    }
}

/// Everything the state machine needs besides its own state.
pub struct ManagerContext {
    pub store: Arc<DataStore>,
    pub bindings: Arc<KeyBindings>,
    pub clock: Clock,
    pub payload: PayloadBuilder,
    pub delivery: Delivery,
    pub max_segments: Option<u32>,
    pub tracking: TrackingConfig,
    pub query_limits: QueryLimits,
    pub stats: SharedStats,
    pub logger: Logger,
}

/// The last known display, used to stamp new segments.
pub fn current_display(store: &DataStore) -> Option<DisplayInfo> {
    store.resolution().last().map(|point| point.display)
}

pub struct SegmentManager {
    ctx: ManagerContext,
    handle: WorkerHandle<Command>,
    current: Option<Segment>,
    tracking: Option<Segment>,
    counter: u32,
    max_segments_reached: bool,
    max_tracking_reached: bool,
    released: bool,
}

impl SegmentManager {
    pub fn new(ctx: ManagerContext, handle: WorkerHandle<Command>) -> Self {
        Self {
            ctx: ManagerContext {
                logger: ctx.logger.for_component("SegmentManager"),
                ..ctx
            },
            handle,
            current: None,
            tracking: None,
            counter: 0,
            max_segments_reached: false,
            max_tracking_reached: false,
            released: false,
        }
    }

    fn now(&self) -> (i64, i64) {
        (self.ctx.clock.timestamp_millis(), self.ctx.clock.uptime_millis())
    }

    fn counter_exceeds_max(&self) -> bool {
        matches!(self.ctx.max_segments, Some(max) if max < self.counter)
    }

    fn end_prompt(&self, segment: &Segment) -> Prompt {
        match self.ctx.max_segments {
            Some(max) if max <= segment.counter => Prompt::MaxSegmentsReached,
            _ => Prompt::Developer,
        }
    }

    fn progress(&self) -> String {
        match self.ctx.max_segments {
            Some(max) => format!("[{}/{}]", self.counter, max),
            None => format!("[{}]", self.counter),
        }
    }

    // ------------------------------------------------------------------------
    // Manual segments
    // ------------------------------------------------------------------------

    fn segment_begin(&mut self, mut next: Segment) {
        if self.max_segments_reached {
            self.ctx
                .logger
                .info("segment_begin", "Max segments reached, ignoring");
            return;
        }

        let (time, uptime) = self.now();
        self.counter += 1;

        if self.counter_exceeds_max() {
            if let Some(segment) = self.current.take() {
                self.ctx.logger.info("segment_begin", "Ending last segment");
                self.deliver(segment, time, uptime, Prompt::MaxSegmentsReached, Mode::Manual);
            }
            self.ctx.logger.info(
                "segment_begin",
                format_args!("Max segments of {:?} reached", self.ctx.max_segments),
            );
            self.max_segments_reached = true;
            return;
        }

        self.ctx.logger.info(
            "segment_begin",
            format_args!("Name = {} {}", next.display_name(), self.progress()),
        );

        if let Some(segment) = self.current.take() {
            self.deliver(segment, time, uptime, Prompt::Developer, Mode::Manual);
        }

        next.start(time, uptime, self.counter);
        self.current = Some(next);
    }

    fn segment_end(&mut self) {
        let Some(segment) = self.current.take() else {
            self.ctx
                .logger
                .info("segment_end", "Called without an active segment");
            return;
        };

        let prompt = self.end_prompt(&segment);
        self.ctx
            .logger
            .info("segment_end", format_args!("Segment {} ended", segment.display_name()));
        let (time, uptime) = self.now();
        self.deliver(segment, time, uptime, prompt, Mode::Manual);
    }

    // ------------------------------------------------------------------------
    // Tracking segments
    // ------------------------------------------------------------------------

    fn tracking_begin(&mut self, mut next: Segment) {
        if self.max_tracking_reached {
            self.ctx
                .logger
                .info("tracking_begin", "Max tracking segments reached, ignoring");
            return;
        }
        if self.tracking.is_some() {
            self.ctx
                .logger
                .warn("tracking_begin", "Already tracking, ignoring call");
            return;
        }

        let (time, uptime) = self.now();
        self.counter += 1;

        if self.counter_exceeds_max() {
            self.ctx.logger.info(
                "tracking_begin",
                format_args!("Max segments of {:?} reached", self.ctx.max_segments),
            );
            self.max_tracking_reached = true;
            return;
        }

        match &next.user_id {
            Some(user_id) => self.ctx.logger.info(
                "tracking_begin",
                format_args!("Begin tracking userId = {user_id} {}", self.progress()),
            ),
            None => self.ctx.logger.info(
                "tracking_begin",
                format_args!("Begin tracking {}", self.progress()),
            ),
        }

        next.start(time, uptime, self.counter);
        self.tracking = Some(next);
        self.schedule_check();
    }

    fn schedule_check(&self) {
        self.handle.send_delayed(
            Command::TrackingCheck,
            self.ctx.tracking.effective_check_interval(),
        );
    }

    fn tracking_check(&mut self) {
        self.ctx.logger.verbose("tracking_check", "Checking");
        let Some(segment) = &self.tracking else {
            return;
        };

        let (time, uptime) = self.now();
        let amount = self.ctx.tracking.motion_amount as usize;
        let elapsed = uptime - segment.uptime_start;

        let prompt = if elapsed >= self.ctx.tracking.max_duration.as_millis() as i64 {
            Some(Prompt::TrackingDuration)
        } else if count_motion(self.ctx.store.motion(), segment.uptime_start, uptime, amount)
            >= amount
        {
            Some(Prompt::TrackingAmount)
        } else {
            None
        };

        if let Some(prompt) = prompt {
            self.ctx
                .logger
                .debug("tracking_check", format_args!("Condition met = {prompt:?}"));
            self.counter += 1;
            let mut successor =
                segment.successor(generate_id(), current_display(&self.ctx.store));
            successor.start(time, uptime, self.counter);

            if let Some(finished) = self.tracking.replace(successor) {
                self.deliver(finished, time, uptime, prompt, Mode::Auto);
            }
        }

        self.schedule_check();
    }

    fn tracking_end(&mut self) {
        let Some(segment) = self.tracking.take() else {
            self.ctx
                .logger
                .warn("tracking_end", "Called without an active tracking segment");
            return;
        };
        self.handle.remove_messages(&Command::TrackingCheck);

        let prompt = self.end_prompt(&segment);
        self.ctx.logger.info("tracking_end", "Tracking segment ended");
        let (time, uptime) = self.now();
        self.deliver(segment, time, uptime, prompt, Mode::Auto);
    }

    // ------------------------------------------------------------------------
    // Segment attributes
    // ------------------------------------------------------------------------

    /// Apply `update` to every active segment. Returns false when none is active.
    fn update_active(&mut self, method: &str, mut update: impl FnMut(&mut Segment)) -> bool {
        if self.current.is_none() && self.tracking.is_none() {
            self.ctx
                .logger
                .error(method, "Ignored, there is no active segment");
            return false;
        }
        for segment in [self.current.as_mut(), self.tracking.as_mut()]
            .into_iter()
            .flatten()
        {
            update(segment);
        }
        true
    }

    fn set_key_value(&mut self, key: String, value: String) {
        if self.update_active("set_key_value", |s| s.set_key_value(key.clone(), value.clone())) {
            self.ctx
                .logger
                .info("set_key_value", format_args!("[{key},{value}]"));
        }
    }

    fn set_user_id(&mut self, user_id: String) {
        if self.update_active("set_user_id", |s| s.user_id = Some(user_id.clone())) {
            self.ctx
                .logger
                .info("set_user_id", format_args!("UserId = {user_id}"));
        }
    }

    fn set_additional_id(&mut self, additional_id: String) {
        if self.update_active("set_additional_id", |s| {
            s.additional_id = Some(additional_id.clone())
        }) {
            self.ctx
                .logger
                .info("set_additional_id", format_args!("AdditionalId = {additional_id}"));
        }
    }

    fn release(&mut self) {
        self.ctx.logger.debug("release", "Releasing");
        self.released = true;
        self.handle.remove_all();
        self.ctx.delivery.release();
    }

    // ------------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------------

    fn deliver(&mut self, mut segment: Segment, time: i64, uptime: i64, prompt: Prompt, mode: Mode) {
        segment.finish(time, uptime);

        let sequences = query_segment(
            &self.ctx.store,
            segment.uptime_start,
            segment.uptime_end,
            &self.ctx.query_limits,
        );
        let data = self.ctx.payload.build(
            &segment,
            sequences,
            prompt,
            mode,
            self.ctx.bindings.snapshot(),
        );

        let result = match &self.ctx.delivery {
            Delivery::Callback(callback) => {
                send_to_callback(callback, &data).map(|_| self.ctx.stats.record_callback_delivery())
            }
            Delivery::Network(network) => send_to_network(network, &data, self.ctx.payload.flavor)
                .map(|_| self.ctx.stats.record_network_delivery()),
        };

        if let Err(e) = result {
            self.ctx
                .logger
                .error("deliver", format_args!("Segment {} not delivered: {e}", segment.id));
        }
    }
}

fn send_to_callback(callback: &JsonCallback, data: &DataSegment) -> Result<(), PayloadError> {
    let headers = serde_json::to_string(&Headers::from(data))?;
    let payload = serde_json::to_string(data)?;
    callback(&headers, &payload);
    Ok(())
}

fn send_to_network(
    network: &NetworkModule,
    data: &DataSegment,
    flavor: Flavor,
) -> Result<(), PayloadError> {
    let envelope = ServerEnvelope::seal(data, flavor)?;
    network.send_payload(serde_json::to_string(&envelope)?);
    Ok(())
}

impl Handler<Command> for SegmentManager {
    fn handle(&mut self, command: Command) {
        if self.released {
            return;
        }

        match command {
            Command::Init => {
                self.ctx.logger.info("init", "Quago SDK initialized");
                self.ctx.logger.info(
                    "init",
                    format_args!(
                        "SDK Version = {SDK_VERSION_NAME} ({SDK_VERSION_CODE}), AppToken = {}",
                        self.ctx.payload.app_token
                    ),
                );
            }
            Command::SegmentBegin(segment) => self.segment_begin(segment),
            Command::SegmentEnd => self.segment_end(),
            Command::TrackingBegin(segment) => self.tracking_begin(segment),
            Command::TrackingCheck => self.tracking_check(),
            Command::TrackingEnd => self.tracking_end(),
            Command::SetKeyValue(key, value) => self.set_key_value(key, value),
            Command::SetUserId(user_id) => self.set_user_id(user_id),
            Command::SetAdditionalId(id) => self.set_additional_id(id),
            Command::Release => self.release(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{mouse_button, BiometricType};
    use crate::core::payload::MetaInformation;
    use crate::config::AppInfo;
    use crate::stats::SdkStats;
    use crate::worker::Worker;
    use crossbeam_channel::{unbounded, Receiver};
    use std::time::Duration;

    struct Harness {
        worker: Worker<Command>,
        deliveries: Receiver<(serde_json::Value, serde_json::Value)>,
        store: Arc<DataStore>,
        stats: SharedStats,
        clock: Clock,
    }

    impl Harness {
        fn next(&self) -> (serde_json::Value, serde_json::Value) {
            self.deliveries
                .recv_timeout(Duration::from_secs(2))
                .expect("segment delivery")
        }

        fn nothing_delivered(&self) -> bool {
            self.deliveries
                .recv_timeout(Duration::from_millis(100))
                .is_err()
        }
    }

    fn harness(max_segments: Option<u32>, tracking: TrackingConfig) -> Harness {
        let (tx, rx) = unbounded();
        let callback: JsonCallback = Arc::new(move |headers: &str, payload: &str| {
            let _ = tx.send((
                serde_json::from_str(headers).unwrap(),
                serde_json::from_str(payload).unwrap(),
            ));
        });
        let stats: SharedStats = Arc::new(SdkStats::new());
        let logger = Logger::tracing_only();
        let store = Arc::new(DataStore::new(stats.clone(), &logger));
        let clock = Clock::start();
        let ctx = ManagerContext {
            store: store.clone(),
            bindings: Arc::new(KeyBindings::new()),
            clock,
            payload: PayloadBuilder {
                app_token: "token".into(),
                session_id: "session".into(),
                flavor: Flavor::Development,
                wrapper: 0,
                wrapper_version: None,
                meta: MetaInformation::collect(&AppInfo::default()),
                sdk_init_time: 0,
                sdk_init_uptime: 0,
            },
            delivery: Delivery::Callback(callback),
            max_segments,
            tracking,
            query_limits: QueryLimits::default(),
            stats: stats.clone(),
            logger: logger.clone(),
        };
        let worker = Worker::spawn("test-manager", logger, |handle| {
            SegmentManager::new(ctx, handle)
        })
        .unwrap();

        Harness {
            worker,
            deliveries: rx,
            store,
            stats,
            clock,
        }
    }

    fn named(name: &str) -> Segment {
        Segment::named(name, generate_id(), None)
    }

    #[test]
    fn test_begin_ends_previous_segment() {
        let h = harness(None, TrackingConfig::default());
        h.worker.send(Command::SegmentBegin(named("a")));
        h.worker.send(Command::SetKeyValue("k".into(), "v".into()));
        h.worker.send(Command::SegmentBegin(named("b")));
        h.worker.send(Command::SegmentEnd);

        let (headers, payload) = h.next();
        assert_eq!(headers["seg_name"], "a");
        assert_eq!(headers["seg_count"], 1);
        assert_eq!(payload["prompt"], Prompt::Developer.code());
        assert_eq!(payload["mode"], Mode::Manual.code());
        assert_eq!(payload["key_values"][0][0], "k");

        let (headers, payload) = h.next();
        assert_eq!(headers["seg_name"], "b");
        assert_eq!(payload["seg_count"], 2);
        assert!(payload["key_values"].as_array().unwrap().is_empty());
        assert_eq!(h.stats.snapshot().segments_to_callback, 2);
    }

    #[test]
    fn test_end_without_segment_is_ignored() {
        let h = harness(None, TrackingConfig::default());
        h.worker.send(Command::SegmentEnd);
        h.worker.send(Command::SetUserId("user".into()));
        assert!(h.nothing_delivered());
    }

    #[test]
    fn test_max_segments() {
        let h = harness(Some(2), TrackingConfig::default());
        h.worker.send(Command::SegmentBegin(named("a")));
        h.worker.send(Command::SegmentBegin(named("b")));
        h.worker.send(Command::SegmentBegin(named("c")));
        h.worker.send(Command::SegmentBegin(named("d")));
        h.worker.send(Command::SegmentEnd);

        let (_, first) = h.next();
        assert_eq!(first["seg_name"], "a");
        assert_eq!(first["prompt"], Prompt::Developer.code());

        let (_, second) = h.next();
        assert_eq!(second["seg_name"], "b");
        assert_eq!(second["prompt"], Prompt::MaxSegmentsReached.code());

        assert!(h.nothing_delivered());
    }

    #[test]
    fn test_last_allowed_segment_ends_with_max_prompt() {
        let h = harness(Some(1), TrackingConfig::default());
        h.worker.send(Command::SegmentBegin(named("only")));
        h.worker.send(Command::SegmentEnd);

        let (_, payload) = h.next();
        assert_eq!(payload["prompt"], Prompt::MaxSegmentsReached.code());
    }

    #[test]
    fn test_tracking_rolls_over_on_motion_amount() {
        let tracking = TrackingConfig {
            motion_amount: 3,
            max_duration: Duration::from_secs(600),
            check_interval: Duration::from_millis(50),
        };
        let h = harness(None, tracking);
        h.worker.send(Command::TrackingBegin(Segment::tracking(
            Some("user-1".into()),
            generate_id(),
            None,
        )));
        h.worker.send(Command::SetAdditionalId("extra".into()));

        // Keep moving until a check sees enough motion inside the segment.
        let mut delivered = None;
        for _ in 0..50 {
            let now = h.clock.uptime_millis();
            for i in 0..3 {
                h.store.record_motion(
                    now,
                    BiometricType::MotionMove,
                    1.0,
                    i as f32,
                    mouse_button::WHEEL,
                );
            }
            if let Ok(delivery) = h.deliveries.recv_timeout(Duration::from_millis(60)) {
                delivered = Some(delivery);
                break;
            }
        }

        let (headers, payload) = delivered.expect("tracking rollover");
        assert_eq!(headers["user_id"], "user-1");
        assert_eq!(headers["additional_id"], "extra");
        assert!(headers["seg_name"].is_null());
        assert_eq!(payload["mode"], Mode::Auto.code());
        assert_eq!(payload["prompt"], Prompt::TrackingAmount.code());

        h.worker.send(Command::TrackingEnd);
        let (headers, payload) = h.next();
        assert_eq!(headers["user_id"], "user-1");
        assert!(headers["additional_id"].is_null());
        assert_eq!(payload["prompt"], Prompt::Developer.code());
        assert_eq!(payload["seg_count"], 2);
    }

    #[test]
    fn test_tracking_rolls_over_on_duration() {
        let tracking = TrackingConfig {
            motion_amount: 1000,
            max_duration: Duration::from_millis(30),
            check_interval: Duration::from_millis(40),
        };
        let h = harness(None, tracking);
        h.worker
            .send(Command::TrackingBegin(Segment::tracking(None, generate_id(), None)));

        let (_, payload) = h.next();
        assert_eq!(payload["prompt"], Prompt::TrackingDuration.code());
        h.worker.send(Command::TrackingEnd);
        let _ = h.next();
    }

    #[test]
    fn test_second_tracking_begin_is_ignored() {
        let h = harness(None, TrackingConfig::default());
        for user in ["a", "b"] {
            h.worker.send(Command::TrackingBegin(Segment::tracking(
                Some(user.into()),
                generate_id(),
                None,
            )));
        }
        h.worker.send(Command::TrackingEnd);
        h.worker.send(Command::TrackingEnd);

        let (headers, _) = h.next();
        assert_eq!(headers["user_id"], "a");
        assert_eq!(headers["seg_count"], 1);
        assert!(h.nothing_delivered());
    }

    #[test]
    fn test_tracking_max_segments() {
        let h = harness(Some(1), TrackingConfig::default());
        h.worker
            .send(Command::TrackingBegin(Segment::tracking(None, generate_id(), None)));
        h.worker.send(Command::TrackingEnd);

        let (headers, payload) = h.next();
        assert_eq!(headers["seg_count"], 1);
        assert_eq!(payload["mode"], Mode::Auto.code());
        assert_eq!(payload["prompt"], Prompt::MaxSegmentsReached.code());

        for _ in 0..2 {
            h.worker.send(Command::TrackingBegin(Segment::tracking(
                Some("late".into()),
                generate_id(),
                None,
            )));
            h.worker.send(Command::TrackingEnd);
        }
        assert!(h.nothing_delivered());
        assert_eq!(h.stats.snapshot().segments_to_callback, 1);
    }

    #[test]
    fn test_zero_check_interval_still_rolls_over() {
        let tracking = TrackingConfig {
            motion_amount: 1000,
            max_duration: Duration::from_millis(30),
            check_interval: Duration::ZERO,
        };
        let h = harness(None, tracking);
        h.worker
            .send(Command::TrackingBegin(Segment::tracking(None, generate_id(), None)));

        let (_, payload) = h.next();
        assert_eq!(payload["prompt"], Prompt::TrackingDuration.code());

        // Rollovers already queued may land before the end.
        h.worker.send(Command::TrackingEnd);
        let ended = (0..20).any(|_| h.next().1["prompt"] == Prompt::Developer.code());
        assert!(ended);
    }

    #[test]
    fn test_release_ignores_later_commands() {
        let h = harness(None, TrackingConfig::default());
        h.worker.send(Command::Release);
        h.worker.send(Command::SegmentBegin(named("late")));
        h.worker.send(Command::SegmentEnd);
        assert!(h.nothing_delivered());
    }
}
