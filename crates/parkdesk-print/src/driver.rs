// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer driver facade.
//
// Owns the queue, the connection manager, the health monitor and the
// reconnect timer. `print_*` calls only render and enqueue; a single drain
// task moves jobs to the printer whenever a session is open.
//
// Locking: `state` is a std mutex and is never held across an await.
// `conn` is an async mutex that serialises every transport operation.
// When both `tasks` and `state` are needed, `tasks` is taken first.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Local;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use parkdesk_core::config::PrinterConfig;
use parkdesk_core::error::{PrinterError, Result};
use parkdesk_core::receipts::{
    EntryTicket, LostTicketReceipt, PartnerTicket, PaymentReceipt, PensionReceipt,
};
use parkdesk_core::types::{
    DriverEvent, ErrorClass, ErrorCode, ErrorReport, JobType, Locale, PrintJob, PrinterStatus,
    ProbeReport,
};

use crate::connection::{ConnectionManager, ConnectionState};
use crate::escpos::{self, EncodeOptions};
use crate::health;
use crate::queue::{FailOutcome, PrintQueue};
use crate::retry::{JOB_RETRY_PAUSE, MAX_JOB_ATTEMPTS};
use crate::templates::{self, ReceiptStyle};
use crate::transport::{SystemTransport, Transport};

/// Events buffered per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 256;

/// Mutable driver state shared by the facade and its background tasks.
pub(crate) struct State {
    pub connection: ConnectionState,
    pub status: PrinterStatus,
    pub queue: PrintQueue,
    /// A drain task is running.
    pub draining: bool,
    pub destroyed: bool,
    /// Shown on test receipts; the endpoint until a session opens.
    pub transport_label: String,
    seq: u64,
}

#[derive(Default)]
pub(crate) struct Tasks {
    pub health: Option<JoinHandle<()>>,
    pub reconnect: Option<JoinHandle<()>>,
}

pub(crate) struct Inner<T: Transport> {
    pub state: Mutex<State>,
    pub conn: tokio::sync::Mutex<ConnectionManager<T>>,
    pub tasks: Mutex<Tasks>,
    events: Mutex<Option<broadcast::Sender<DriverEvent>>>,
    locale: Locale,
    style: ReceiptStyle,
    encode: EncodeOptions,
    retry_delay: Duration,
}

fn lock<U>(mutex: &Mutex<U>) -> MutexGuard<'_, U> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl<T: Transport> Inner<T> {
    pub fn lock_state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    pub fn emit(&self, event: DriverEvent) {
        if let Some(tx) = lock(&self.events).as_ref() {
            // No subscribers is fine.
            let _ = tx.send(event);
        }
    }

    pub fn report(&self, class: ErrorClass, code: ErrorCode, cause: String) {
        self.emit(DriverEvent::Error(ErrorReport::new(
            class,
            code,
            self.locale,
            Some(cause),
        )));
    }

    /// Report `e` under the class its variant belongs to.
    fn report_error(&self, e: &PrinterError) {
        self.report(e.class(), e.code(), e.to_string());
    }

    fn subscribe(&self) -> broadcast::Receiver<DriverEvent> {
        match lock(&self.events).as_ref() {
            Some(tx) => tx.subscribe(),
            None => {
                // Destroyed: hand out a receiver that is already closed.
                let (tx, rx) = broadcast::channel(1);
                drop(tx);
                rx
            }
        }
    }

    // -- connection -------------------------------------------------------

    async fn connect(self: &Arc<Self>) -> bool {
        {
            let mut st = self.lock_state();
            if st.destroyed {
                return false;
            }
            match st.connection {
                ConnectionState::Connecting => {
                    debug!("connect already in progress");
                    return false;
                }
                ConnectionState::Connected => return true,
                ConnectionState::Disconnected | ConnectionState::Error => {
                    st.connection = ConnectionState::Connecting;
                }
            }
        }
        self.cancel_reconnect();

        let result = {
            let mut conn = self.conn.lock().await;
            let opened = conn
                .establish(|attempt, max_attempts, e| {
                    warn!(attempt, max_attempts, error = %e, "connect attempt failed, retrying");
                    self.emit(DriverEvent::Retrying {
                        attempt,
                        max_attempts,
                        cause: e.to_string(),
                    });
                })
                .await;
            opened.map(|()| conn.describe())
        };

        match result {
            Ok(transport) => {
                let status = {
                    let mut st = self.lock_state();
                    if st.destroyed || st.connection != ConnectionState::Connecting {
                        None
                    } else {
                        st.connection = ConnectionState::Connected;
                        st.transport_label = transport.clone();
                        st.status.connected = true;
                        st.status.apply_probe(&ProbeReport::alive());
                        st.status.last_error = None;
                        st.status.queue_length = st.queue.len();
                        Some(st.status.clone())
                    }
                };
                let Some(status) = status else {
                    // Disconnected or destroyed while the session was opening.
                    self.conn.lock().await.close().await;
                    return false;
                };

                info!(%transport, "printer connected");
                self.emit(DriverEvent::Connected { transport });
                self.emit(DriverEvent::StatusUpdate(status));
                self.start_draining();
                true
            }
            Err(e) => {
                let abandoned = {
                    let mut st = self.lock_state();
                    let abandoned = st.destroyed || st.connection != ConnectionState::Connecting;
                    if !abandoned {
                        st.connection = ConnectionState::Error;
                        st.status.connected = false;
                        st.status.online = false;
                        st.status.last_error = Some(e.to_string());
                        st.status.last_update = chrono::Utc::now();
                    }
                    abandoned
                };
                if abandoned {
                    return false;
                }

                warn!(error = %e, "printer connection failed");
                self.report_error(&e);
                self.schedule_reconnect();
                false
            }
        }
    }

    /// Arm the reconnect timer, replacing any pending one.
    pub fn schedule_reconnect(self: &Arc<Self>) {
        let mut tasks = lock(&self.tasks);
        if self.lock_state().destroyed {
            return;
        }
        if let Some(pending) = tasks.reconnect.take() {
            pending.abort();
        }

        let weak = Arc::downgrade(self);
        let delay = self.retry_delay;
        debug!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        tasks.reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // Detach our own handle so connect() does not abort this task.
            lock(&inner.tasks).reconnect.take();
            info!("reconnecting to printer");
            inner.connect().await;
        }));
    }

    fn cancel_reconnect(&self) {
        if let Some(pending) = lock(&self.tasks).reconnect.take() {
            pending.abort();
        }
    }

    async fn disconnect(&self) {
        self.cancel_reconnect();
        let was_connected = {
            let mut st = self.lock_state();
            let was = st.connection == ConnectionState::Connected;
            st.connection = ConnectionState::Disconnected;
            st.status.connected = false;
            st.status.online = false;
            st.status.last_update = chrono::Utc::now();
            was
        };
        self.conn.lock().await.close().await;

        if was_connected {
            info!("printer disconnected");
            self.emit(DriverEvent::Disconnected);
            let status = self.lock_state().status.clone();
            self.emit(DriverEvent::StatusUpdate(status));
        }
    }

    /// Synchronous part of shutdown. Idempotent.
    fn shutdown(&self) {
        {
            let mut st = self.lock_state();
            if st.destroyed {
                return;
            }
            st.destroyed = true;
            st.connection = ConnectionState::Disconnected;
            st.status.connected = false;
        }
        {
            let mut tasks = lock(&self.tasks);
            if let Some(task) = tasks.health.take() {
                task.abort();
            }
            if let Some(task) = tasks.reconnect.take() {
                task.abort();
            }
        }
        // Dropping the sender closes every subscriber.
        lock(&self.events).take();
    }

    // -- jobs -------------------------------------------------------------

    fn submit(self: &Arc<Self>, job_type: JobType, subject: &str, content: String) -> bool {
        let (id, result) = {
            let mut st = self.lock_state();
            if st.destroyed {
                return false;
            }
            st.seq += 1;
            let job = PrintJob::new(job_type, subject, content, st.seq);
            let id = job.id.clone();
            let result = st.queue.enqueue(job);
            st.status.queue_length = st.queue.len();
            (id, result)
        };

        match result {
            Ok(()) => {
                debug!(job_id = %id, job_type = job_type.slug(), "job queued");
                self.emit(DriverEvent::JobQueued(id));
                self.start_draining();
                true
            }
            Err(e) => {
                warn!(job_type = job_type.slug(), error = %e, "print job rejected");
                self.report_error(&e);
                false
            }
        }
    }

    /// Spawn the drain task unless one is running or there is nothing to do.
    fn start_draining(self: &Arc<Self>) {
        {
            let mut st = self.lock_state();
            if st.draining
                || st.destroyed
                || st.connection != ConnectionState::Connected
                || st.queue.is_empty()
            {
                return;
            }
            st.draining = true;
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.drain().await });
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let job = {
                let mut st = self.lock_state();
                let next = if st.destroyed || st.connection != ConnectionState::Connected {
                    None
                } else {
                    st.queue.begin_next()
                };
                match next {
                    Some(job) => job,
                    None => {
                        st.draining = false;
                        return;
                    }
                }
            };

            let bytes = escpos::encode(&job.content, &self.encode);
            let result = {
                let mut conn = self.conn.lock().await;
                // The health monitor may have closed the session while we
                // waited for the lock.
                if self.is_connected() {
                    debug!(job_id = %job.id, attempt = job.attempts, len = bytes.len(), "printing job");
                    Some(conn.execute(&bytes).await)
                } else {
                    None
                }
            };

            match result {
                Some(Ok(())) => self.job_printed(&job),
                Some(Err(PrinterError::NotConnected)) | None => {
                    self.job_interrupted(&job);
                    return;
                }
                Some(Err(e)) => {
                    if self.job_failed(&job, &e) {
                        tokio::time::sleep(JOB_RETRY_PAUSE).await;
                    }
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        let st = self.lock_state();
        !st.destroyed && st.connection == ConnectionState::Connected
    }

    /// The session went away before the job was written. Put it back
    /// untouched and stop; the next connect restarts draining.
    fn job_interrupted(&self, job: &PrintJob) {
        let mut st = self.lock_state();
        st.queue.abort(&job.id);
        st.draining = false;
        st.status.queue_length = st.queue.len();
        debug!(job_id = %job.id, "session lost before write, job kept");
    }

    fn job_printed(&self, job: &PrintJob) {
        let (done, status) = {
            let mut st = self.lock_state();
            let done = st.queue.complete(&job.id);
            if done.is_some() {
                st.status.total_print_jobs += 1;
            }
            st.status.queue_length = st.queue.len();
            (done, st.status.clone())
        };
        if let Some(done) = done {
            info!(job_id = %done.id, attempt = done.attempts, "job printed");
            self.emit(DriverEvent::JobCompleted(done));
            self.emit(DriverEvent::StatusUpdate(status));
        }
    }

    /// Record a failed write. Returns true when the job was requeued.
    fn job_failed(&self, job: &PrintJob, e: &PrinterError) -> bool {
        warn!(job_id = %job.id, attempt = job.attempts, error = %e, "job write failed");
        self.report_error(e);

        let (outcome, status) = {
            let mut st = self.lock_state();
            let outcome = st.queue.fail(&job.id, &e.to_string(), MAX_JOB_ATTEMPTS);
            if matches!(outcome, Some(FailOutcome::Exhausted(_))) {
                st.status.failed_jobs += 1;
            }
            st.status.last_error = Some(e.to_string());
            st.status.queue_length = st.queue.len();
            (outcome, st.status.clone())
        };

        match outcome {
            Some(FailOutcome::Requeued) => true,
            Some(FailOutcome::Exhausted(failed)) => {
                error!(job_id = %failed.id, attempts = failed.attempts, "job failed permanently");
                self.emit(DriverEvent::JobFailed(failed));
                self.emit(DriverEvent::StatusUpdate(status));
                false
            }
            // Cleared while printing.
            None => false,
        }
    }
}

/// Thermal receipt printer driver.
///
/// Must be created inside a Tokio runtime: construction starts the health
/// monitor, and submissions may spawn the drain task.
pub struct PrinterDriver<T: Transport = SystemTransport> {
    inner: Arc<Inner<T>>,
}

impl PrinterDriver<SystemTransport> {
    /// Driver over the real USB / TCP / spooler transports.
    pub fn new(config: PrinterConfig) -> Result<Self> {
        Self::with_transport(config, SystemTransport::new())
    }
}

impl<T: Transport> PrinterDriver<T> {
    pub fn with_transport(config: PrinterConfig, transport: T) -> Result<Self> {
        config.validate()?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = State {
            connection: ConnectionState::Disconnected,
            status: PrinterStatus::default(),
            queue: PrintQueue::new(),
            draining: false,
            destroyed: false,
            transport_label: config.endpoint().to_string(),
            seq: 0,
        };
        let inner = Arc::new(Inner {
            state: Mutex::new(state),
            locale: config.locale,
            style: ReceiptStyle::from_config(&config),
            encode: EncodeOptions {
                locale: config.locale,
                encoding: config.encoding,
            },
            retry_delay: config.retry_delay(),
            conn: tokio::sync::Mutex::new(ConnectionManager::new(transport, config)),
            tasks: Mutex::new(Tasks::default()),
            events: Mutex::new(Some(events)),
        });

        let monitor = health::spawn_monitor(&inner);
        lock(&inner.tasks).health = Some(monitor);

        info!(endpoint = %lock(&inner.state).transport_label, "printer driver created");
        Ok(Self { inner })
    }

    /// Open a session. Returns false if a connect is already in progress or
    /// the session could not be opened; in the latter case a reconnect is
    /// scheduled.
    pub async fn connect(&self) -> bool {
        self.inner.connect().await
    }

    /// Close the session and cancel any pending reconnect. Queued jobs stay.
    pub async fn disconnect(&self) {
        self.inner.disconnect().await
    }

    /// Queue an entry ticket. True means accepted into the queue, not printed.
    pub fn print_entry_ticket(&self, ticket: &EntryTicket) -> bool {
        let content = templates::entry_ticket(&self.inner.style, ticket);
        self.inner
            .submit(JobType::EntryTicket, &ticket.ticket_number, content)
    }

    /// Queue a payment receipt. True means accepted into the queue, not printed.
    pub fn print_payment_receipt(&self, receipt: &PaymentReceipt) -> bool {
        let content = templates::payment_receipt(&self.inner.style, receipt);
        self.inner
            .submit(JobType::PaymentReceipt, &receipt.ticket_number, content)
    }

    /// Queue a lost-ticket receipt. True means accepted into the queue, not printed.
    pub fn print_lost_ticket_receipt(&self, receipt: &LostTicketReceipt) -> bool {
        let content = templates::lost_ticket_receipt(&self.inner.style, receipt);
        self.inner
            .submit(JobType::LostTicketReceipt, &receipt.plate, content)
    }

    /// Queue a monthly pension receipt. True means accepted into the queue, not printed.
    pub fn print_pension_receipt(&self, receipt: &PensionReceipt) -> bool {
        let content = templates::pension_receipt(&self.inner.style, receipt);
        self.inner
            .submit(JobType::PensionReceipt, &receipt.folio, content)
    }

    /// Queue a partner ticket. True means accepted into the queue, not printed.
    pub fn print_partner_ticket(&self, ticket: &PartnerTicket) -> bool {
        let content = templates::partner_ticket(&self.inner.style, ticket);
        self.inner
            .submit(JobType::PartnerTicket, &ticket.ticket_number, content)
    }

    /// Queue a test receipt naming the current transport. Same return
    /// contract as the other `print_*` calls.
    pub fn print_test_receipt(&self) -> bool {
        let transport = self.inner.lock_state().transport_label.clone();
        let content = templates::test_receipt(
            &self.inner.style,
            Local::now().naive_local(),
            &transport,
        );
        self.inner.submit(JobType::TestReceipt, "", content)
    }

    /// Snapshot of connectivity, sensors and counters.
    pub fn status(&self) -> PrinterStatus {
        self.inner.lock_state().status.clone()
    }

    /// Queued jobs in drain order.
    pub fn queue(&self) -> Vec<PrintJob> {
        self.inner.lock_state().queue.snapshot()
    }

    /// Drop every queued job except the one being printed.
    pub fn clear_queue(&self) -> usize {
        let (removed, status) = {
            let mut st = self.inner.lock_state();
            let removed = st.queue.clear();
            st.status.queue_length = st.queue.len();
            (removed, st.status.clone())
        };
        info!(removed, "print queue cleared");
        self.inner.emit(DriverEvent::StatusUpdate(status));
        removed
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DriverEvent> {
        self.inner.subscribe()
    }

    /// Stop all timers, close subscribers and the transport. A write already
    /// in flight finishes first. The driver is unusable afterwards.
    pub async fn destroy(&self) {
        self.inner.shutdown();
        self.inner.conn.lock().await.close().await;
        info!("printer driver destroyed");
    }
}

impl<T: Transport> Drop for PrinterDriver<T> {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}
