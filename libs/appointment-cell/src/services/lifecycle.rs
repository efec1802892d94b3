use crate::models::{AppointmentError, AppointmentStatus};

/// The appointment state machine. Transitions are driven by explicit status
/// changes; cancellation is allowed from every non-terminal state.
pub struct AppointmentLifecycle;

impl AppointmentLifecycle {
    /// Statuses reachable from `status` in one step. Terminal states have
    /// no successors.
    pub fn valid_transitions(status: AppointmentStatus) -> &'static [AppointmentStatus] {
        match status {
            AppointmentStatus::Scheduled => {
                &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Confirmed => {
                &[AppointmentStatus::InProgress, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::InProgress => {
                &[AppointmentStatus::Completed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow => &[],
        }
    }

    pub fn validate_transition(
        current: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if Self::valid_transitions(current).contains(&new_status) {
            Ok(())
        } else {
            Err(AppointmentError::InvalidTransition {
                from: current,
                to: new_status,
            })
        }
    }
}
