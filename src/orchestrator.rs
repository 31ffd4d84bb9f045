// orchestrator.rs - Sequences fetch -> generate -> cleanup for one request
use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::error::AppError;
use crate::fetcher::AudioFetcher;
use crate::generator::ContentGenerator;
use crate::models::{BlogPost, VideoRequest};

/// Lifecycle of a single `/generate` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Generating,
    Cleaning,
    Done,
    Failed,
}

impl Stage {
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Generating)
                | (Fetching, Failed)
                | (Generating, Cleaning)
                | (Cleaning, Done)
                | (Cleaning, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

/// Stage tracker that logs every transition and notices abandoned flows.
struct Flow {
    history: Vec<Stage>,
}

impl Flow {
    fn new() -> Self {
        Self {
            history: vec![Stage::Idle],
        }
    }

    fn current(&self) -> Stage {
        *self.history.last().unwrap_or(&Stage::Idle)
    }

    fn advance(&mut self, next: Stage) {
        let current = self.current();
        debug_assert!(
            current.can_advance_to(next),
            "illegal stage transition {:?} -> {:?}",
            current,
            next
        );
        tracing::info!(from = ?current, to = ?next, "stage transition");
        self.history.push(next);
    }

    fn into_history(mut self) -> Vec<Stage> {
        std::mem::take(&mut self.history)
    }
}

impl Drop for Flow {
    fn drop(&mut self) {
        // Empty history means the flow finished and handed its trace back.
        if let Some(stage) = self.history.last() {
            if !stage.is_terminal() {
                tracing::warn!(stage = ?stage, "request abandoned before completion");
            }
        }
    }
}

pub struct RequestOrchestrator {
    fetcher: AudioFetcher,
    generator: Arc<dyn ContentGenerator>,
}

impl RequestOrchestrator {
    pub fn new(fetcher: AudioFetcher, generator: Arc<dyn ContentGenerator>) -> Self {
        Self { fetcher, generator }
    }

    pub async fn handle(&self, request: &VideoRequest) -> Result<BlogPost, AppError> {
        self.handle_traced(request).await.0
    }

    /// Run the flow and also return the stages it went through.
    pub async fn handle_traced(
        &self,
        request: &VideoRequest,
    ) -> (Result<BlogPost, AppError>, Vec<Stage>) {
        let span = tracing::info_span!("generate", request_id = %Uuid::new_v4());
        async {
            tracing::info!("Processing URL: {}", request.url);
            let mut flow = Flow::new();

            flow.advance(Stage::Fetching);
            let artifact = match self.fetcher.fetch(&request.url).await {
                Ok(artifact) => artifact,
                Err(e) => {
                    flow.advance(Stage::Failed);
                    return (Err(e.into()), flow.into_history());
                }
            };

            flow.advance(Stage::Generating);
            let generated = self.generator.generate(artifact.path()).await;

            flow.advance(Stage::Cleaning);
            artifact.cleanup().await;

            match generated {
                Ok(post) => {
                    flow.advance(Stage::Done);
                    (Ok(post), flow.into_history())
                }
                Err(e) => {
                    flow.advance(Stage::Failed);
                    (Err(e.into()), flow.into_history())
                }
            }
        }
        .instrument(span)
        .await
    }
}
