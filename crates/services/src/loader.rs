use std::sync::Arc;

use tracing::{debug, info};

use exam_core::model::{PhaseContent, PhaseNumber, SessionId, SessionRecord};
use remote::ExamApi;

use crate::error::LoadError;

/// Content for one phase plus the session it was read from.
#[derive(Debug, Clone)]
pub struct LoadedPhase {
    pub session: SessionRecord,
    pub content: Arc<PhaseContent>,
    /// Whether a generation request was issued to obtain the content.
    pub generated: bool,
}

/// Fetches a phase's content, generating it on the service only when the
/// session does not carry it yet.
#[derive(Clone)]
pub struct PhaseContentLoader {
    api: Arc<dyn ExamApi>,
}

impl PhaseContentLoader {
    #[must_use]
    pub fn new(api: Arc<dyn ExamApi>) -> Self {
        Self { api }
    }

    /// Load content for `phase`.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::ContentUnavailable` when the content is still
    /// missing after generation, or `LoadError::Api` for remote failures.
    pub async fn load(&self, id: SessionId, phase: PhaseNumber) -> Result<LoadedPhase, LoadError> {
        let session = self.api.get_session(id).await?;
        if let Some(content) = session.content_for(phase) {
            debug!(session = %id, %phase, "phase content already generated");
            let content = Arc::new(content.clone());
            return Ok(LoadedPhase {
                session,
                content,
                generated: false,
            });
        }

        info!(session = %id, %phase, "generating phase content");
        self.api.generate_phase(id, phase).await?;
        let session = self.api.get_session(id).await?;
        let content = session
            .content_for(phase)
            .cloned()
            .ok_or(LoadError::ContentUnavailable(phase))?;
        Ok(LoadedPhase {
            session,
            content: Arc::new(content),
            generated: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{Level, PhaseOrdering, Skill};
    use remote::{ApiOperation, InMemoryExamApi};

    async fn selected(api: &InMemoryExamApi, ordering: PhaseOrdering) -> SessionId {
        let session = api.create_session(Level::Intermediate).await.unwrap();
        api.select_phase(session.id, ordering).await.unwrap();
        session.id
    }

    #[tokio::test]
    async fn generates_once_then_reuses_stored_content() {
        let api = InMemoryExamApi::new();
        let id = selected(&api, PhaseOrdering::ReadingWriting).await;
        let loader = PhaseContentLoader::new(Arc::new(api.clone()));

        let first = loader.load(id, PhaseNumber::One).await.unwrap();
        assert!(first.generated);
        assert!(first.content.has_skill(Skill::Reading));
        assert!(first.content.has_skill(Skill::Writing));

        let second = loader.load(id, PhaseNumber::One).await.unwrap();
        assert!(!second.generated);
        assert_eq!(second.content, first.content);
        assert_eq!(api.calls(ApiOperation::Generate(PhaseNumber::One)), 1);
    }

    #[tokio::test]
    async fn missing_content_after_generation_is_unavailable() {
        let api = InMemoryExamApi::new();
        let id = selected(&api, PhaseOrdering::ListeningSpeaking).await;
        api.withhold_content(PhaseNumber::One);
        let loader = PhaseContentLoader::new(Arc::new(api.clone()));

        let err = loader.load(id, PhaseNumber::One).await.unwrap_err();
        assert!(matches!(err, LoadError::ContentUnavailable(PhaseNumber::One)));
    }

    #[tokio::test]
    async fn remote_failures_surface_as_api_errors() {
        let api = InMemoryExamApi::new();
        let id = selected(&api, PhaseOrdering::ListeningSpeaking).await;
        api.fail_next(ApiOperation::Generate(PhaseNumber::One), 1);
        let loader = PhaseContentLoader::new(Arc::new(api.clone()));

        let err = loader.load(id, PhaseNumber::One).await.unwrap_err();
        assert!(matches!(err, LoadError::Api(_)));

        // Nothing was stored, so the retry generates again.
        let loaded = loader.load(id, PhaseNumber::One).await.unwrap();
        assert!(loaded.generated);
    }
}
