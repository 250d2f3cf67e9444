//! Single-flight delivery queue.
//!
//! Requests are sent one at a time in arrival order on a dedicated worker
//! thread. The head of the queue is retried with exponential backoff until it
//! gets a definitive answer or outlives the deadline.

use crate::logging::Logger;
use crate::network::request::RETRY_HEADER;
use crate::network::transport::{Transport, NO_RESPONSE};
use crate::network::{NetworkSettings, Request};
use crate::stats::SharedStats;
use crate::worker::{Handler, Worker, WorkerHandle};
use std::collections::VecDeque;

#[derive(Debug)]
enum NetMsg {
    Add(Request),
    Send,
}

/// Statuses that leave the request at the head of the queue for another try.
fn is_retryable(status: u16) -> bool {
    matches!(status, NO_RESPONSE | 502 | 503 | 504)
}

struct NetworkHandler {
    settings: NetworkSettings,
    transport: Box<dyn Transport>,
    queue: VecDeque<Request>,
    sending: bool,
    stats: SharedStats,
    logger: Logger,
    handle: WorkerHandle<NetMsg>,
}

impl NetworkHandler {
    fn add(&mut self, request: Request) {
        if self.queue.len() >= self.settings.max_cached_messages {
            self.logger.warn(
                "add",
                format_args!(
                    "Queue is full ({} requests), dropping payload",
                    self.queue.len()
                ),
            );
            self.stats.record_payload_dropped();
            return;
        }

        self.queue.push_back(request);
        if !self.sending {
            self.send_head();
        }
    }

    fn send_head(&mut self) {
        let Some(request) = self.queue.front_mut() else {
            self.sending = false;
            return;
        };
        self.sending = true;

        if request.retries() == 0 {
            request.start_timer();
        } else {
            request.set_header(RETRY_HEADER, request.retries().to_string());
        }

        let status = self.transport.post(request);
        self.logger.debug(
            "send",
            format_args!("status = {status}, retries = {}", request.retries()),
        );

        if !is_retryable(status) {
            self.queue.pop_front();
            self.stats.record_payload_sent();
            self.send_head();
            return;
        }

        if request.is_past_deadline(&self.settings) {
            self.logger.warn(
                "send",
                format_args!(
                    "Giving up after {} retries, last status = {status}",
                    request.retries()
                ),
            );
            self.queue.pop_front();
            self.stats.record_payload_dropped();
            self.send_head();
            return;
        }

        request.prepare_retry(&self.settings);
        let wait = request.randomized_interval();
        self.logger.info(
            "send",
            format_args!("status = {status}, retrying in {} ms", wait.as_millis()),
        );
        self.handle.send_delayed(NetMsg::Send, wait);
    }
}

impl Handler<NetMsg> for NetworkHandler {
    fn handle(&mut self, message: NetMsg) {
        match message {
            NetMsg::Add(request) => self.add(request),
            NetMsg::Send => self.send_head(),
        }
    }
}

/// Owns the network worker thread.
pub struct NetworkModule {
    settings: NetworkSettings,
    worker: Option<Worker<NetMsg>>,
    logger: Logger,
}

impl NetworkModule {
    pub fn new(
        settings: NetworkSettings,
        transport: Box<dyn Transport>,
        stats: SharedStats,
        logger: &Logger,
    ) -> std::io::Result<Self> {
        let logger = logger.for_component("NetworkModule");
        let handler_settings = settings.clone();
        let handler_logger = logger.clone();

        let worker = Worker::spawn("quago-network", logger.clone(), move |handle| {
            NetworkHandler {
                settings: handler_settings,
                transport,
                queue: VecDeque::new(),
                sending: false,
                stats,
                logger: handler_logger,
                handle,
            }
        })?;

        Ok(Self {
            settings,
            worker: Some(worker),
            logger,
        })
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    /// Queue a JSON body for delivery.
    pub fn send_payload(&self, json: impl Into<String>) {
        let Some(worker) = &self.worker else {
            self.logger
                .warn("send_payload", "Network module released, dropping payload");
            return;
        };
        let request = Request::json(json, &self.settings);
        if !worker.send(NetMsg::Add(request)) {
            self.logger
                .warn("send_payload", "Network worker is gone, dropping payload");
        }
    }

    /// Drop pending retries and stop the worker.
    pub fn release(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.handle().remove_all();
            worker.quit_safely();
        }
    }
}

impl Drop for NetworkModule {
    fn drop(&mut self) {
        self.release();
    }
}
