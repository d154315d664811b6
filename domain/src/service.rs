use crate::sanitize::SanitizedText;
use crate::submission::{check_submission, missing_required_field, EventSubmission, SanitizedFields};
use crate::validate::FieldLimits;
use crate::{Clock, CoreError, EventRepository, NewEvent, StoredEvent};

/// Application service that runs submissions through the gate and persists
/// the ones that pass.
///
/// Generic over repository and clock so the gate can be exercised without
/// external dependencies. Field limits are fixed at construction.
pub struct EventService<R: EventRepository, C: Clock> {
    repo: R,
    clock: C,
    limits: FieldLimits,
}

impl<R: EventRepository, C: Clock> EventService<R, C> {
    pub fn new(repo: R, clock: C) -> Self {
        Self::with_limits(repo, clock, FieldLimits::default())
    }

    pub fn with_limits(repo: R, clock: C, limits: FieldLimits) -> Self {
        Self {
            repo,
            clock,
            limits,
        }
    }

    pub fn limits(&self) -> &FieldLimits {
        &self.limits
    }

    /// Sanitize, check and store a submission.
    ///
    /// Free-text fields are sanitized exactly once here; the stored event
    /// carries the sanitized text.
    pub fn submit(&self, submission: &EventSubmission) -> Result<StoredEvent, CoreError> {
        let sanitized = SanitizedFields::from_submission(submission);

        if let Some(field) = missing_required_field(submission) {
            return Err(CoreError::MissingField(field));
        }
        check_submission(submission, &sanitized, &self.limits)
            .map_err(|rejection| CoreError::InvalidField(rejection.field))?;

        let event = self.build_event(submission, sanitized);
        self.repo.insert(event)
    }

    fn build_event(&self, submission: &EventSubmission, sanitized: SanitizedFields) -> NewEvent {
        let raw = |key: &str| submission.text(key).unwrap_or_default().to_string();
        let clean = |text: Option<SanitizedText>| text.map(SanitizedText::into_string);
        NewEvent {
            name: clean(sanitized.name).unwrap_or_default(),
            description: clean(sanitized.description).filter(|d| !d.is_empty()),
            organization: clean(sanitized.organization).unwrap_or_default(),
            location: clean(sanitized.location).unwrap_or_default(),
            date: raw("date"),
            time: raw("time"),
            price: submission.get("price").and_then(|v| v.as_number()),
            link: raw("link"),
            kids: submission.get("kids").and_then(|v| v.as_bool()),
            email: raw("email"),
            submitted_at: self.clock.now(),
        }
    }

    /// Get a stored event by id.
    pub fn get(&self, id: u64) -> Result<StoredEvent, CoreError> {
        self.repo.get(id)?.ok_or(CoreError::NotFound)
    }

    /// List stored events up to the given limit, newest first.
    pub fn list(&self, limit: usize) -> Result<Vec<StoredEvent>, CoreError> {
        self.repo.list(limit)
    }
}
