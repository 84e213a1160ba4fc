// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Parkdesk print driver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::human_errors::humanize;

/// Unique identifier for a print job.
///
/// Built from the job type, the subject key (ticket number, plate, ...), the
/// creation time in milliseconds and a per-driver sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(job_type: JobType, subject: &str, created_at: DateTime<Utc>, seq: u64) -> Self {
        let subject: String = subject
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let subject = if subject.is_empty() { "none".into() } else { subject };
        Self(format!(
            "{}-{}-{}-{}",
            job_type.slug(),
            subject,
            created_at.timestamp_millis(),
            seq
        ))
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The six receipt kinds the driver knows how to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    EntryTicket,
    PaymentReceipt,
    LostTicketReceipt,
    PensionReceipt,
    PartnerTicket,
    TestReceipt,
}

impl JobType {
    /// Short identifier used in job ids and logs.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::EntryTicket => "entry",
            Self::PaymentReceipt => "payment",
            Self::LostTicketReceipt => "lost",
            Self::PensionReceipt => "pension",
            Self::PartnerTicket => "partner",
            Self::TestReceipt => "test",
        }
    }

    /// Queue priority a job of this type gets on submission.
    ///
    /// Entry tickets and payment receipts hold up a vehicle at the booth.
    pub fn default_priority(&self) -> JobPriority {
        match self {
            Self::EntryTicket | Self::PaymentReceipt => JobPriority::High,
            Self::LostTicketReceipt | Self::PensionReceipt | Self::PartnerTicket => {
                JobPriority::Normal
            }
            Self::TestReceipt => JobPriority::Low,
        }
    }
}

/// Priority band. Ordering is `Low < Normal < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Low,
    Normal,
    High,
}

/// Lifecycle states of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Queued, waiting for a connection (or for its retry).
    Pending,
    /// Currently being written to the printer.
    Printing,
    /// Successfully written.
    Completed,
    /// Gave up after exhausting its attempts.
    Failed,
}

/// A rendered receipt waiting in (or leaving) the print queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    pub job_type: JobType,
    /// Human-readable text, before ESC/POS encoding.
    pub content: String,
    pub priority: JobPriority,
    pub created_at: DateTime<Utc>,
    /// Execution attempts so far, including the one in progress.
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub last_error: Option<String>,
}

impl PrintJob {
    pub fn new(job_type: JobType, subject: &str, content: String, seq: u64) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(job_type, subject, now, seq),
            job_type,
            content,
            priority: job_type.default_priority(),
            created_at: now,
            attempts: 0,
            last_attempt_at: None,
            status: JobStatus::Pending,
            last_error: None,
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Physical interface kind a driver is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// USB character device (or a spooler queue standing in for one).
    Usb,
    /// Raw TCP socket, usually port 9100.
    Tcp,
    /// OS print spooler queue in raw mode.
    Spooler,
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usb" => Ok(Self::Usb),
            "tcp" | "network" => Ok(Self::Tcp),
            "spooler" | "cups" => Ok(Self::Spooler),
            other => Err(format!("unknown transport '{other}'")),
        }
    }
}

/// Language and number/date conventions used on receipts and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "es-MX")]
    EsMx,
    #[serde(rename = "en-US")]
    EnUs,
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "es-mx" | "es" => Ok(Self::EsMx),
            "en-us" | "en" => Ok(Self::EnUs),
            other => Err(format!("unsupported locale '{other}'")),
        }
    }
}

/// Text encoding the printer's code table is switched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Windows1252,
    Gbk,
}

impl std::str::FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "utf8" => Ok(Self::Utf8),
            "windows1252" | "cp1252" | "wpc1252" => Ok(Self::Windows1252),
            "gbk" => Ok(Self::Gbk),
            other => Err(format!("unsupported encoding '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperStatus {
    #[default]
    Unknown,
    Ok,
    NearEnd,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverStatus {
    #[default]
    Unknown,
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutterStatus {
    #[default]
    Unknown,
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureStatus {
    #[default]
    Unknown,
    Normal,
    High,
}

/// Result of one liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeReport {
    pub online: bool,
    pub paper: PaperStatus,
    pub cover: CoverStatus,
    pub cutter: CutterStatus,
    pub temperature: TemperatureStatus,
}

impl ProbeReport {
    /// The printer answered but reported nothing about its sensors.
    pub fn alive() -> Self {
        Self {
            online: true,
            ..Default::default()
        }
    }

    pub fn offline() -> Self {
        Self::default()
    }
}

/// Snapshot of the driver's view of the printer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterStatus {
    pub connected: bool,
    /// Result of the last successful probe or connect.
    pub online: bool,
    pub paper: PaperStatus,
    pub cover: CoverStatus,
    pub cutter: CutterStatus,
    pub temperature: TemperatureStatus,
    pub last_error: Option<String>,
    pub last_update: DateTime<Utc>,
    pub queue_length: usize,
    /// Lifetime count of completed jobs.
    pub total_print_jobs: u64,
    /// Lifetime count of jobs that exhausted their attempts.
    pub failed_jobs: u64,
}

impl Default for PrinterStatus {
    fn default() -> Self {
        Self {
            connected: false,
            online: false,
            paper: PaperStatus::Unknown,
            cover: CoverStatus::Unknown,
            cutter: CutterStatus::Unknown,
            temperature: TemperatureStatus::Unknown,
            last_error: None,
            last_update: Utc::now(),
            queue_length: 0,
            total_print_jobs: 0,
            failed_jobs: 0,
        }
    }
}

impl PrinterStatus {
    /// Copy sensor readings from a probe.
    pub fn apply_probe(&mut self, report: &ProbeReport) {
        self.online = report.online;
        self.paper = report.paper;
        self.cover = report.cover;
        self.cutter = report.cutter;
        self.temperature = report.temperature;
        self.last_update = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Errors and events
// ---------------------------------------------------------------------------

/// Recovery policy an error falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Transport unreachable or session lost; always followed by a reconnect.
    Connection,
    /// A live session failed one write; only the job is affected.
    Execution,
    /// Submission rejected because the queue is at capacity.
    Queue,
    /// Bad settings, caught before the driver starts.
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DeviceNotFound,
    ConnectionFailed,
    ConnectionLost,
    WriteFailed,
    QueueFull,
    InvalidConfig,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeviceNotFound => "DEVICE_NOT_FOUND",
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::ConnectionLost => "CONNECTION_LOST",
            Self::WriteFailed => "WRITE_FAILED",
            Self::QueueFull => "QUEUE_FULL",
            Self::InvalidConfig => "INVALID_CONFIG",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error as reported to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub class: ErrorClass,
    pub code: ErrorCode,
    /// Localized, operator-facing message.
    pub message: String,
    pub suggestion: String,
    pub timestamp: DateTime<Utc>,
    /// Technical detail of the underlying failure.
    pub cause: Option<String>,
}

impl ErrorReport {
    pub fn new(class: ErrorClass, code: ErrorCode, locale: Locale, cause: Option<String>) -> Self {
        let human = humanize(code, locale);
        Self {
            class,
            code,
            message: human.message.to_string(),
            suggestion: human.suggestion.to_string(),
            timestamp: Utc::now(),
            cause,
        }
    }
}

/// Notification delivered to driver subscribers.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    Connected { transport: String },
    Disconnected,
    /// A connect attempt failed and another one follows.
    Retrying {
        attempt: u32,
        max_attempts: u32,
        cause: String,
    },
    Error(ErrorReport),
    StatusUpdate(PrinterStatus),
    JobQueued(JobId),
    JobCompleted(PrintJob),
    JobFailed(PrintJob),
}
