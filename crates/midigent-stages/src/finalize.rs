use async_trait::async_trait;
use midigent_compose::ArtifactSerializer;
use midigent_core::{PipelineContext, Stage, StageError, StageId, StageOutput};
use std::sync::Arc;
use tracing::info;

pub struct FinalizeStage {
    serializer: Arc<dyn ArtifactSerializer>,
}

impl FinalizeStage {
    pub fn new(serializer: Arc<dyn ArtifactSerializer>) -> Self {
        Self { serializer }
    }
}

#[async_trait]
impl Stage for FinalizeStage {
    fn id(&self) -> StageId {
        StageId::Finalize
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, StageError> {
        let parameters = ctx
            .parameters
            .as_ref()
            .ok_or_else(|| StageError::MissingInput("no parameters to finalize with".to_string()))?;
        if ctx.tracks.is_empty() {
            return Err(StageError::MissingInput("no tracks to serialize".to_string()));
        }

        let handle = self
            .serializer
            .serialize(&ctx.tracks, parameters.tempo.bpm, parameters.time_signature)
            .map_err(|e| StageError::ExecutionFailed(e.to_string()))?;

        info!(artifact = %handle.id, bytes = handle.byte_len, location = ?handle.location, "artifact written");
        Ok(StageOutput::Finalized(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midigent_compose::{MidiSerializer, SerializeError};
    use midigent_core::{
        ArtifactHandle, Note, ParameterSet, PipelineConfig, TimeSignature, Track, TrackKind,
    };

    struct Broken;

    impl ArtifactSerializer for Broken {
        fn serialize(&self, _: &[Track], _: u16, _: TimeSignature) -> Result<ArtifactHandle, SerializeError> {
            Err(SerializeError::Invalid("disk on fire".to_string()))
        }
    }

    fn context() -> PipelineContext {
        let mut ctx = PipelineContext::new("x", &PipelineConfig::default());
        ctx.parameters = Some(ParameterSet::default());
        ctx.tracks = vec![Track {
            name: "lead".to_string(),
            kind: TrackKind::Lead,
            instrument: "piano".to_string(),
            program: 0,
            channel: 0,
            notes: vec![Note::new(60, 0.0, 1.0, 90, 0)],
        }];
        ctx
    }

    #[tokio::test]
    async fn test_serializes_tracks() {
        let stage = FinalizeStage::new(Arc::new(MidiSerializer::in_memory()));
        match stage.run(&context()).await.unwrap() {
            StageOutput::Finalized(handle) => {
                assert!(handle.id.starts_with("blake3:"));
                assert!(handle.byte_len > 0);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failures_are_stage_errors() {
        let broken = FinalizeStage::new(Arc::new(Broken));
        let err = broken.run(&context()).await.unwrap_err();
        assert!(matches!(err, StageError::ExecutionFailed(ref m) if m.contains("disk on fire")));

        let mut empty = context();
        empty.tracks.clear();
        let stage = FinalizeStage::new(Arc::new(MidiSerializer::in_memory()));
        assert!(matches!(stage.run(&empty).await, Err(StageError::MissingInput(_))));
    }
}
