//! crates/study_path_core/src/pipeline.rs
//!
//! The three generation stages and the page fan-out.
//!
//! Every stage takes the current `SessionState` by reference and, on success,
//! hands back a new one. Stages run strictly one after another and the
//! per-topic fan-out is sequential in plan order.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{
    Attachment, EnrichedTopic, PageRecord, SessionState, Topic, MAX_COURSES_PER_TOPIC,
};
use crate::extraction::{self, ExtractionError};
use crate::instructions;
use crate::ports::{GenerationRequest, GenerationService, PageSubmissionService, PortError};

//=========================================================================================
// Errors
//=========================================================================================

/// Names a pipeline stage in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PlanArchitect,
    CourseCurator,
    RecordBuilder,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::PlanArchitect => "plan architect",
            Stage::CourseCurator => "course curator",
            Stage::RecordBuilder => "record builder",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("The generation backend failed during the {stage} stage: {source}")]
    BackendInvocationFailure {
        stage: Stage,
        #[source]
        source: PortError,
    },
    #[error("The {stage} stage timed out after {timeout:?}")]
    GenerationTimedOut { stage: Stage, timeout: Duration },
    #[error("The {stage} stage produced no usable structured result: {source}")]
    Extraction {
        stage: Stage,
        #[source]
        source: ExtractionError,
    },
    #[error("The {stage} stage returned data with an unexpected shape: {reason}")]
    UnexpectedShape { stage: Stage, reason: String },
    #[error("The {stage} stage needs {missing}, which this session does not have yet")]
    MissingPrerequisite { stage: Stage, missing: &'static str },
    #[error("The {stage} stage produced no usable page record for any topic")]
    NoUsableRecords { stage: Stage },
}

impl PipelineError {
    /// Whether the user has to go back to the profile form. Backend failures
    /// and timeouts are reported as such instead.
    pub fn requires_restart(&self) -> bool {
        !matches!(
            self,
            Self::BackendInvocationFailure { .. } | Self::GenerationTimedOut { .. }
        )
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::BackendInvocationFailure { stage, .. }
            | Self::GenerationTimedOut { stage, .. }
            | Self::Extraction { stage, .. }
            | Self::UnexpectedShape { stage, .. }
            | Self::MissingPrerequisite { stage, .. }
            | Self::NoUsableRecords { stage } => *stage,
        }
    }
}

//=========================================================================================
// Generation-Stage Invoker
//=========================================================================================

/// Joins the fragments of a final response, each followed by a newline.
pub fn join_fragments<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fragments.into_iter().fold(String::new(), |mut acc, fragment| {
        acc.push_str(fragment.as_ref());
        acc.push('\n');
        acc
    })
}

/// Runs a single generation turn for a stage and waits for its final text.
#[derive(Clone)]
pub struct StageInvoker {
    backend: Arc<dyn GenerationService>,
    timeout: Duration,
}

impl StageInvoker {
    pub fn new(backend: Arc<dyn GenerationService>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn invoke(
        &self,
        stage: Stage,
        conversation_id: Uuid,
        instruction: &str,
        input_text: &str,
        attachment: Option<&Attachment>,
    ) -> Result<String, PipelineError> {
        let request = GenerationRequest {
            conversation_id,
            instruction,
            input_text,
            attachment,
        };

        match tokio::time::timeout(self.timeout, self.backend.generate(request)).await {
            Ok(Ok(fragments)) => Ok(join_fragments(fragments)),
            Ok(Err(source)) => {
                error!(%stage, error = %source, "Generation backend failed.");
                Err(PipelineError::BackendInvocationFailure { stage, source })
            }
            Err(_) => {
                error!(%stage, timeout = ?self.timeout, "Generation backend timed out.");
                Err(PipelineError::GenerationTimedOut {
                    stage,
                    timeout: self.timeout,
                })
            }
        }
    }
}

//=========================================================================================
// Plan Parsing
//=========================================================================================

/// Accepts either a bare list of topics or an object with a `topics` list.
fn topics_from_value<T: DeserializeOwned>(stage: Stage, value: Value) -> Result<Vec<T>, PipelineError> {
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map.remove("topics").ok_or_else(|| PipelineError::UnexpectedShape {
            stage,
            reason: "expected a list of topics or an object with a 'topics' key".to_string(),
        })?,
        other => {
            return Err(PipelineError::UnexpectedShape {
                stage,
                reason: format!("expected a list of topics, found {other}"),
            })
        }
    };
    let topics: Vec<T> = serde_json::from_value(list).map_err(|e| PipelineError::UnexpectedShape {
        stage,
        reason: format!("invalid topic list: {e}"),
    })?;
    if topics.is_empty() {
        return Err(PipelineError::UnexpectedShape {
            stage,
            reason: "the plan contains no topics".to_string(),
        });
    }
    Ok(topics)
}

/// Parses plan architect output into its topics.
pub fn parse_study_plan(raw_plan: &str) -> Result<Vec<Topic>, PipelineError> {
    let stage = Stage::PlanArchitect;
    let value = extraction::extract(raw_plan)
        .map_err(|source| PipelineError::Extraction { stage, source })?;
    topics_from_value(stage, value)
}

/// Parses course curator output into enriched topics, rejecting any topic
/// whose course list exceeds the allowed capacity. Budget and time are not
/// checked here.
pub fn parse_enriched_plan(raw: &str) -> Result<Vec<EnrichedTopic>, PipelineError> {
    let stage = Stage::CourseCurator;
    let value = extraction::extract(raw)
        .map_err(|source| PipelineError::Extraction { stage, source })?;
    let topics: Vec<EnrichedTopic> = topics_from_value(stage, value)?;

    if let Some(crowded) = topics.iter().find(|t| t.courses.len() > MAX_COURSES_PER_TOPIC) {
        return Err(PipelineError::UnexpectedShape {
            stage,
            reason: format!(
                "topic '{}' lists {} courses, more than the allowed {}",
                crowded.topic.title,
                crowded.courses.len(),
                MAX_COURSES_PER_TOPIC
            ),
        });
    }
    Ok(topics)
}

/// Parses record builder output for one topic.
pub fn parse_page_record(raw: &str) -> Result<PageRecord, PipelineError> {
    let stage = Stage::RecordBuilder;
    let value = extraction::extract(raw)
        .map_err(|source| PipelineError::Extraction { stage, source })?;
    serde_json::from_value(value).map_err(|e| PipelineError::UnexpectedShape {
        stage,
        reason: format!("expected an object with 'properties' and 'children': {e}"),
    })
}

//=========================================================================================
// Outcomes
//=========================================================================================

/// The result of running the record builder for one topic.
#[derive(Debug)]
pub struct TopicRecordAttempt {
    pub index: usize,
    pub topic_title: String,
    pub result: Result<PageRecord, PipelineError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionFailure {
    pub topic_title: String,
    pub message: String,
}

/// Aggregate result of submitting the pages of one plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionReport {
    pub submitted: Vec<String>,
    pub failed: Vec<SubmissionFailure>,
}

#[derive(Debug)]
pub struct PublishOutcome {
    pub attempts: Vec<TopicRecordAttempt>,
    pub report: SubmissionReport,
}

//=========================================================================================
// The Pipeline
//=========================================================================================

#[derive(Clone)]
pub struct Pipeline {
    invoker: StageInvoker,
    pages: Arc<dyn PageSubmissionService>,
}

impl Pipeline {
    pub fn new(invoker: StageInvoker, pages: Arc<dyn PageSubmissionService>) -> Self {
        Self { invoker, pages }
    }

    /// Stage 1: asks for a raw study plan. The output is kept as text and is
    /// not validated here.
    #[instrument(skip_all, fields(session_id = %state.id, conversation_id = %state.conversation_id))]
    pub async fn draft_plan(&self, state: &SessionState) -> Result<SessionState, PipelineError> {
        let profile = &state.profile;
        let raw_plan = self
            .invoker
            .invoke(
                Stage::PlanArchitect,
                state.conversation_id,
                &instructions::plan_architect_instruction(profile),
                &instructions::plan_architect_input(profile),
                profile.prior_experience.as_ref(),
            )
            .await?;
        info!(chars = raw_plan.len(), "Study plan drafted.");
        Ok(state.with_raw_plan(raw_plan))
    }

    /// Stage 2: enriches the drafted plan with course offers.
    #[instrument(skip_all, fields(session_id = %state.id, conversation_id = %state.conversation_id))]
    pub async fn curate_courses(&self, state: &SessionState) -> Result<SessionState, PipelineError> {
        let stage = Stage::CourseCurator;
        let raw_plan = state
            .raw_plan_text
            .as_deref()
            .ok_or(PipelineError::MissingPrerequisite {
                stage,
                missing: "a drafted study plan",
            })?;
        let profile = &state.profile;

        let raw = self
            .invoker
            .invoke(
                stage,
                state.conversation_id,
                &instructions::course_curator_instruction(&profile.budget, &profile.available_time),
                &instructions::course_curator_input(raw_plan, &profile.budget, &profile.available_time),
                None,
            )
            .await?;

        let enriched = parse_enriched_plan(&raw)?;
        info!(topics = enriched.len(), "Courses curated.");
        Ok(state.with_enriched_plan(enriched))
    }

    /// Stage 3: one record builder turn per topic, in plan order. A topic
    /// whose output cannot be used is reported in its attempt and does not
    /// affect the others; a backend failure stops the stage.
    #[instrument(skip_all, fields(conversation_id = %conversation_id, topics = topics.len()))]
    pub async fn build_page_records(
        &self,
        conversation_id: Uuid,
        topics: &[EnrichedTopic],
    ) -> Result<Vec<TopicRecordAttempt>, PipelineError> {
        let instruction = instructions::record_builder_instruction();
        let mut attempts = Vec::with_capacity(topics.len());

        for (index, topic) in topics.iter().enumerate() {
            let raw = self
                .invoker
                .invoke(
                    Stage::RecordBuilder,
                    conversation_id,
                    &instruction,
                    &instructions::record_builder_input(topic),
                    None,
                )
                .await?;

            let result = parse_page_record(&raw);
            match &result {
                Ok(record) if record.title().as_deref() != Some(topic.topic.title.as_str()) => {
                    warn!(index, topic = %topic.topic.title, "Page record title differs from topic title.");
                }
                Ok(_) => {}
                Err(e) => warn!(index, topic = %topic.topic.title, error = %e, "No usable page record for topic."),
            }
            attempts.push(TopicRecordAttempt {
                index,
                topic_title: topic.topic.title.clone(),
                result,
            });
        }

        Ok(attempts)
    }

    /// Submits each record in order. A failed submission is logged and the
    /// remaining ones still go out.
    pub async fn submit_pages(&self, attempts: &[TopicRecordAttempt]) -> SubmissionReport {
        let mut report = SubmissionReport::default();

        for attempt in attempts {
            let Ok(record) = &attempt.result else { continue };
            match self.pages.create_page(record).await {
                Ok(()) => {
                    info!(index = attempt.index, topic = %attempt.topic_title, "Page submitted.");
                    report.submitted.push(attempt.topic_title.clone());
                }
                Err(e) => {
                    error!(index = attempt.index, topic = %attempt.topic_title, error = %e, "Page submission failed.");
                    report.failed.push(SubmissionFailure {
                        topic_title: attempt.topic_title.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Stage 3 plus submission for the session's enriched plan.
    #[instrument(skip_all, fields(session_id = %state.id))]
    pub async fn publish(&self, state: &SessionState) -> Result<PublishOutcome, PipelineError> {
        let stage = Stage::RecordBuilder;
        let topics = state
            .enriched_plan
            .as_deref()
            .filter(|topics| !topics.is_empty())
            .ok_or(PipelineError::MissingPrerequisite {
                stage,
                missing: "an enriched study plan",
            })?;

        let attempts = self.build_page_records(state.conversation_id, topics).await?;
        if attempts.iter().all(|a| a.result.is_err()) {
            return Err(PipelineError::NoUsableRecords { stage });
        }

        let report = self.submit_pages(&attempts).await;
        info!(
            submitted = report.submitted.len(),
            failed = report.failed.len(),
            "Pages submitted."
        );
        Ok(PublishOutcome { attempts, report })
    }
}
