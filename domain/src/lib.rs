//! Domain library for the community events submission service.
//!
//! Holds the submission model, the validation-and-sanitization gate, the
//! repository port and the error definitions. Everything in `validate`,
//! `sanitize` and `submission` is pure and silent: no IO, no logging, no
//! shared mutable state. Keep adapters and IO concerns out of this crate.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::SystemTime;

/// Input data for a new event, built from a submission that passed the gate.
///
/// Free-text fields hold sanitized text; the remaining fields hold the raw
/// values that were validated.
#[derive(Clone, Debug, PartialEq)]
pub struct NewEvent {
    pub name: String,
    pub description: Option<String>,
    pub organization: String,
    pub location: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// `HH:MM` or `HH:MM:SS`.
    pub time: String,
    pub price: Option<f64>,
    pub link: String,
    pub kids: Option<bool>,
    pub email: String,
    pub submitted_at: SystemTime,
}

/// A persisted event submission.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredEvent {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub organization: String,
    pub location: String,
    pub date: String,
    pub time: String,
    pub price: Option<f64>,
    pub link: String,
    pub kids: Option<bool>,
    pub email: String,
    pub submitted_at: SystemTime,
}

impl StoredEvent {
    /// Attach a repository-assigned id to a new event.
    pub fn from_new(id: u64, event: NewEvent) -> Self {
        Self {
            id,
            name: event.name,
            description: event.description,
            organization: event.organization,
            location: event.location,
            date: event.date,
            time: event.time,
            price: event.price,
            link: event.link,
            kids: event.kids,
            email: event.email,
            submitted_at: event.submitted_at,
        }
    }

    /// Whether this event describes the same occurrence as `other`.
    ///
    /// Two submissions with the same name, date, time and location are
    /// duplicates regardless of the remaining fields.
    pub fn same_occurrence(&self, other: &NewEvent) -> bool {
        self.name == other.name
            && self.date == other.date
            && self.time == other.time
            && self.location == other.location
    }
}

/// Time source abstraction to make code testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Repository port for persisting and loading submitted events.
pub trait EventRepository: Send + Sync {
    /// Store a new event and return it with its assigned id.
    ///
    /// Fails with `CoreError::AlreadyExists` when an event with the same
    /// name, date, time and location is already stored.
    fn insert(&self, event: NewEvent) -> Result<StoredEvent, CoreError>;
    fn get(&self, id: u64) -> Result<Option<StoredEvent>, CoreError>;
    /// List events, most recently submitted first.
    fn list(&self, limit: usize) -> Result<Vec<StoredEvent>, CoreError>;
}

/// Core domain errors (no external error crates to keep deps small).
#[derive(Debug)]
pub enum CoreError {
    /// A mandatory field was absent or empty.
    MissingField(&'static str),
    /// A present field failed its grammar or length check.
    InvalidField(&'static str),
    AlreadyExists,
    NotFound,
    Repository(String),
}

impl CoreError {
    /// True for errors caused by the submitted data rather than the system.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CoreError::MissingField(_) | CoreError::InvalidField(_) | CoreError::AlreadyExists
        )
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::MissingField(field) => write!(f, "missing required field: {}", field),
            CoreError::InvalidField(field) => write!(f, "invalid field: {}", field),
            CoreError::AlreadyExists => write!(f, "event already submitted"),
            CoreError::NotFound => write!(f, "not found"),
            CoreError::Repository(msg) => write!(f, "repository error: {}", msg),
        }
    }
}

impl Error for CoreError {}

/// Return a short about/version line for the binary to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - event submission gate", pkg, ver)
}

pub mod adapters;
pub mod sanitize;
pub mod service;
pub mod submission;
pub mod validate;
