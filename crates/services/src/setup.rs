use tracing::info;

use exam_core::model::{Level, PhaseOrdering, SessionRecord};
use remote::{ApiError, ExamApi};

/// Create a session at `level` and fix which skill pair comes first.
///
/// # Errors
///
/// Returns `ApiError` if either remote call fails. A session created before
/// the failure is left on the service without an ordering.
pub async fn start_session(
    api: &dyn ExamApi,
    level: Level,
    ordering: PhaseOrdering,
) -> Result<SessionRecord, ApiError> {
    let created = api.create_session(level).await?;
    info!(session = %created.id, %level, "session created");
    let selected = api.select_phase(created.id, ordering).await?;
    info!(session = %selected.id, %ordering, "phase ordering selected");
    Ok(selected)
}
