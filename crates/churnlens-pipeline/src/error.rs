use churnlens_db::DbError;
use churnlens_enrich::EnrichError;
use churnlens_harvester::HarvestError;
use thiserror::Error;

use crate::state::CycleState;

/// A cycle failure. Every variant names the stage it happened in.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("review source unavailable during {stage}: {source}")]
    SourceUnavailable {
        stage: CycleState,
        #[source]
        source: HarvestError,
    },

    #[error("enrichment failed: {0}")]
    EnrichmentFailure(#[source] EnrichError),

    #[error("store failure during {stage}: {source}")]
    PersistenceFailure {
        stage: CycleState,
        #[source]
        source: DbError,
    },

    #[error("cycle cancelled during {stage}")]
    Cancelled { stage: CycleState },

    #[error("{stage} did not finish within {secs}s")]
    Timeout { stage: CycleState, secs: u64 },
}

impl PipelineError {
    #[must_use]
    pub fn stage(&self) -> CycleState {
        match self {
            Self::SourceUnavailable { stage, .. }
            | Self::PersistenceFailure { stage, .. }
            | Self::Cancelled { stage }
            | Self::Timeout { stage, .. } => *stage,
            Self::EnrichmentFailure(_) => CycleState::Enrich,
        }
    }

    pub(crate) fn harvest(stage: CycleState, err: HarvestError) -> Self {
        match err {
            HarvestError::Cancelled => Self::Cancelled { stage },
            other => Self::SourceUnavailable {
                stage,
                source: other,
            },
        }
    }

    pub(crate) fn enrich(err: EnrichError) -> Self {
        match err {
            EnrichError::Cancelled => Self::Cancelled {
                stage: CycleState::Enrich,
            },
            other => Self::EnrichmentFailure(other),
        }
    }

    pub(crate) fn store(stage: CycleState) -> impl FnOnce(DbError) -> Self {
        move |source| Self::PersistenceFailure { stage, source }
    }
}
