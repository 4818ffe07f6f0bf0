//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between a front end and the API server.
//! These views keep the core types free of any HTTP or schema concerns.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use study_path_core::{
    AttachmentRef, CourseOffer, EnrichedTopic, SessionState, SubmissionReport, Topic,
    TopicRecordAttempt,
};
use utoipa::ToSchema;
use uuid::Uuid;

/// Where a client must send the user when a session cannot go on.
pub const ENTRY_POINT: &str = "/";

/// Cookie naming the caller's current session.
pub const SESSION_COOKIE: &str = "study_session";

//=========================================================================================
// Error Payload
//=========================================================================================

/// Returned with every non-success status.
#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorBody {
    pub error: String,
    /// Present when the user has to start over from the profile form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

//=========================================================================================
// Plan Views
//=========================================================================================

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct TopicView {
    pub title: String,
    pub subtopics: Vec<String>,
    pub duration: String,
}

impl From<&Topic> for TopicView {
    fn from(topic: &Topic) -> Self {
        Self {
            title: topic.title.clone(),
            subtopics: topic.subtopics.iter().map(|s| s.title.clone()).collect(),
            duration: topic.duration.clone(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct CourseView {
    pub title: String,
    pub link: String,
    pub price: String,
}

impl From<&CourseOffer> for CourseView {
    fn from(course: &CourseOffer) -> Self {
        Self {
            title: course.title.clone(),
            link: course.link.clone(),
            price: course.price.clone(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct EnrichedTopicView {
    #[serde(flatten)]
    pub topic: TopicView,
    pub courses: Vec<CourseView>,
}

impl From<&EnrichedTopic> for EnrichedTopicView {
    fn from(topic: &EnrichedTopic) -> Self {
        Self {
            topic: TopicView::from(&topic.topic),
            courses: topic.courses.iter().map(CourseView::from).collect(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct AttachmentView {
    pub file_name: String,
    pub media_type: String,
    pub size_bytes: usize,
}

impl From<&AttachmentRef> for AttachmentView {
    fn from(attachment: &AttachmentRef) -> Self {
        Self {
            file_name: attachment.file_name.clone(),
            media_type: attachment.media_type.clone(),
            size_bytes: attachment.size_bytes,
        }
    }
}

//=========================================================================================
// Responses
//=========================================================================================

/// The response payload sent after a profile submission drafted a plan.
#[derive(Serialize, ToSchema, Debug)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub raw_plan: String,
    /// The drafted topics, when the raw plan already parses.
    pub plan: Option<Vec<TopicView>>,
}

/// A snapshot of everything a session holds.
#[derive(Serialize, ToSchema, Debug)]
pub struct SessionView {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub field_of_study: String,
    pub budget: String,
    pub available_time: String,
    pub emphasis_area: Option<String>,
    pub objectives: Vec<String>,
    pub attachment: Option<AttachmentView>,
    pub raw_plan: Option<String>,
    pub enriched_plan: Option<Vec<EnrichedTopicView>>,
}

impl From<&SessionState> for SessionView {
    fn from(state: &SessionState) -> Self {
        let profile = &state.profile;
        Self {
            session_id: state.id,
            created_at: state.created_at,
            field_of_study: profile.field_of_study.clone(),
            budget: profile.budget.clone(),
            available_time: profile.available_time.clone(),
            emphasis_area: profile.emphasis_area.clone(),
            objectives: profile.objectives.clone(),
            attachment: state.attachment.as_ref().map(AttachmentView::from),
            raw_plan: state.raw_plan_text.clone(),
            enriched_plan: state
                .enriched_plan
                .as_ref()
                .map(|topics| topics.iter().map(EnrichedTopicView::from).collect()),
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct CoursesResponse {
    pub session_id: Uuid,
    pub enriched_plan: Vec<EnrichedTopicView>,
}

/// The outcome of the record builder for one topic.
#[derive(Serialize, ToSchema, Debug)]
pub struct PageRecordView {
    pub index: usize,
    pub topic_title: String,
    /// The page-creation payload, when one could be extracted.
    #[schema(value_type = Option<Object>)]
    pub record: Option<Value>,
    pub error: Option<String>,
}

impl From<&TopicRecordAttempt> for PageRecordView {
    fn from(attempt: &TopicRecordAttempt) -> Self {
        let (record, error) = match &attempt.result {
            Ok(record) => (serde_json::to_value(record).ok(), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            index: attempt.index,
            topic_title: attempt.topic_title.clone(),
            record,
            error,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct SubmissionFailureView {
    pub topic_title: String,
    pub message: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct PublishResponse {
    pub parent_page_id: String,
    pub records: Vec<PageRecordView>,
    pub submitted: Vec<String>,
    pub failed: Vec<SubmissionFailureView>,
}

impl PublishResponse {
    pub fn new(parent_page_id: String, attempts: &[TopicRecordAttempt], report: SubmissionReport) -> Self {
        Self {
            parent_page_id,
            records: attempts.iter().map(PageRecordView::from).collect(),
            submitted: report.submitted,
            failed: report
                .failed
                .into_iter()
                .map(|f| SubmissionFailureView {
                    topic_title: f.topic_title,
                    message: f.message,
                })
                .collect(),
        }
    }
}
