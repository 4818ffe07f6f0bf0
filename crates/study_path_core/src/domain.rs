//! crates/study_path_core/src/domain.rs
//!
//! Defines the pure, core data structures for the study path pipeline.
//! These structs carry no knowledge of HTTP, the generation backend, or the
//! workspace page API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Upper bound on the `courses` list of a single topic.
pub const MAX_COURSES_PER_TOPIC: usize = 5;

/// Number of courses the curator is asked to recommend for every topic.
pub const RECOMMENDED_COURSES_PER_TOPIC: usize = 2;

/// Media type assumed for an uploaded prior-experience document.
pub const DEFAULT_ATTACHMENT_MEDIA_TYPE: &str = "application/pdf";

//=========================================================================================
// User Profile
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("The profile field '{0}' is required")]
    MissingField(&'static str),
}

/// A binary document uploaded alongside the profile, held fully in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: &str, media_type: Option<&str>, data: Vec<u8>) -> Self {
        let media_type = media_type
            .map(str::trim)
            .filter(|m| !m.is_empty() && *m != "application/octet-stream")
            .unwrap_or(DEFAULT_ATTACHMENT_MEDIA_TYPE)
            .to_string();
        Self {
            file_name: sanitize_file_name(file_name),
            media_type,
            data,
        }
    }

    /// A lightweight description of this attachment, safe to expose and clone.
    pub fn reference(&self) -> AttachmentRef {
        AttachmentRef {
            file_name: self.file_name.clone(),
            media_type: self.media_type.clone(),
            size_bytes: self.data.len(),
        }
    }
}

/// What the session remembers about the uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRef {
    pub file_name: String,
    pub media_type: String,
    pub size_bytes: usize,
}

/// Reduces an uploaded file name to a safe, flat name.
///
/// Directory components are dropped, whitespace becomes `_`, and anything
/// outside `[A-Za-z0-9._-]` is removed. Leading dots are stripped so the
/// result can never be a hidden or relative path.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

/// The learner's profile, created once per session and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub field_of_study: String,
    pub prior_experience: Option<Attachment>,
    pub emphasis_area: Option<String>,
    pub objectives: Vec<String>,
    pub budget: String,
    pub available_time: String,
}

impl UserProfile {
    /// Builds a profile from the three required fields.
    pub fn new(
        field_of_study: impl Into<String>,
        budget: impl Into<String>,
        available_time: impl Into<String>,
    ) -> Result<Self, ProfileError> {
        Ok(Self {
            field_of_study: required("field_of_study", field_of_study.into())?,
            prior_experience: None,
            emphasis_area: None,
            objectives: Vec::new(),
            budget: required("budget", budget.into())?,
            available_time: required("available_time", available_time.into())?,
        })
    }

    pub fn with_emphasis_area(mut self, emphasis_area: Option<String>) -> Self {
        self.emphasis_area = emphasis_area
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        self
    }

    /// Sets the objectives, dropping blank entries but keeping their order.
    pub fn with_objectives<I, S>(mut self, objectives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.objectives = objectives
            .into_iter()
            .map(|o| o.into().trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        self
    }

    pub fn with_prior_experience(mut self, attachment: Option<Attachment>) -> Self {
        self.prior_experience = attachment.filter(|a| !a.data.is_empty());
        self
    }
}

fn required(name: &'static str, value: String) -> Result<String, ProfileError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ProfileError::MissingField(name))
    } else {
        Ok(trimmed.to_string())
    }
}

//=========================================================================================
// Study Plan
//=========================================================================================

/// A subtopic entry of a study plan topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtopic {
    pub title: String,
}

/// One topic of the study plan, in study order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    #[serde(default)]
    pub subtopics: Vec<Subtopic>,
    #[serde(default)]
    pub duration: String,
}

/// A course recommended for a topic.
///
/// Prices come back from the generation backend either as strings
/// (`"R$ 49,90"`) or bare numbers; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOffer {
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default, deserialize_with = "price_as_text")]
    pub price: String,
}

/// A topic after course curation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedTopic {
    #[serde(flatten)]
    pub topic: Topic,
    #[serde(default)]
    pub courses: Vec<CourseOffer>,
}

fn price_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

//=========================================================================================
// Page Record
//=========================================================================================

/// The payload for one workspace page: a title property block and the
/// ordered content blocks. Exists only until it is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub properties: Map<String, Value>,
    pub children: Vec<Value>,
}

impl PageRecord {
    /// The plain text of the page's title property, if it has one.
    pub fn title(&self) -> Option<String> {
        let fragments = self
            .properties
            .get("title")
            .and_then(|t| t.get("title"))
            .and_then(Value::as_array)?;
        let text: String = fragments
            .iter()
            .filter_map(|f| {
                f.pointer("/text/content")
                    .or_else(|| f.get("plain_text"))
                    .and_then(Value::as_str)
            })
            .collect();
        Some(text)
    }
}

//=========================================================================================
// Session State
//=========================================================================================

/// Everything one user session has accumulated so far.
///
/// A value is never mutated in place: each pipeline stage hands back a new
/// `SessionState` built from the previous one.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: Uuid,
    /// Generation scope shared by every stage of this session.
    pub conversation_id: Uuid,
    pub profile: UserProfile,
    pub attachment: Option<AttachmentRef>,
    pub raw_plan_text: Option<String>,
    pub enriched_plan: Option<Vec<EnrichedTopic>>,
    pub created_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(profile: UserProfile) -> Self {
        let attachment = profile.prior_experience.as_ref().map(Attachment::reference);
        Self {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            profile,
            attachment,
            raw_plan_text: None,
            enriched_plan: None,
            created_at: Utc::now(),
        }
    }

    /// Returns a copy carrying a fresh raw plan. Any enrichment of an older
    /// plan no longer applies and is dropped.
    pub fn with_raw_plan(&self, raw_plan_text: String) -> Self {
        Self {
            raw_plan_text: Some(raw_plan_text),
            enriched_plan: None,
            ..self.clone()
        }
    }

    pub fn with_enriched_plan(&self, enriched_plan: Vec<EnrichedTopic>) -> Self {
        Self {
            enriched_plan: Some(enriched_plan),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_requires_non_blank_fields() {
        assert_eq!(
            UserProfile::new("  ", "R$500", "3 months"),
            Err(ProfileError::MissingField("field_of_study"))
        );
        assert_eq!(
            UserProfile::new("Data Engineering", "R$500", ""),
            Err(ProfileError::MissingField("available_time"))
        );
    }

    #[test]
    fn profile_drops_blank_objectives_and_emphasis() {
        let profile = UserProfile::new("Data Engineering", "R$500", "3 months")
            .unwrap()
            .with_objectives(["build a pipeline", "", "  ", "pass a certification"])
            .with_emphasis_area(Some("   ".to_string()));

        assert_eq!(
            profile.objectives,
            vec!["build a pipeline", "pass a certification"]
        );
        assert_eq!(profile.emphasis_area, None);
    }

    #[test]
    fn empty_upload_is_not_prior_experience() {
        let profile = UserProfile::new("Law", "100", "1 month")
            .unwrap()
            .with_prior_experience(Some(Attachment::new("cv.pdf", None, Vec::new())));
        assert!(profile.prior_experience.is_none());
    }

    #[test]
    fn file_names_are_flattened() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\My CV (final).pdf"), "My_CV_final.pdf");
        assert_eq!(sanitize_file_name(".."), "document");
    }

    #[test]
    fn attachment_defaults_to_pdf() {
        let attachment = Attachment::new("cv.pdf", Some("application/octet-stream"), vec![1, 2]);
        assert_eq!(attachment.media_type, "application/pdf");
        assert_eq!(attachment.reference().size_bytes, 2);
    }

    #[test]
    fn enriched_topic_accepts_numeric_and_text_prices() {
        let topic: EnrichedTopic = serde_json::from_value(json!({
            "title": "SQL",
            "subtopics": [{"title": "Joins"}],
            "duration": "2 weeks",
            "courses": [
                {"title": "SQL Basics", "link": "https://example.org/sql", "price": 49.9},
                {"title": "SQL Deep Dive", "link": "https://example.org/deep", "price": "R$ 120"}
            ]
        }))
        .unwrap();

        assert_eq!(topic.topic.subtopics.len(), 1);
        assert_eq!(topic.courses[0].price, "49.9");
        assert_eq!(topic.courses[1].price, "R$ 120");
    }

    #[test]
    fn page_record_title_reads_text_content() {
        let record: PageRecord = serde_json::from_value(json!({
            "properties": {"title": {"title": [{"type": "text", "text": {"content": "SQL"}}]}},
            "children": []
        }))
        .unwrap();
        assert_eq!(record.title().as_deref(), Some("SQL"));
    }

    #[test]
    fn new_raw_plan_discards_previous_enrichment() {
        let profile = UserProfile::new("Law", "100", "1 month").unwrap();
        let state = SessionState::new(profile)
            .with_raw_plan("first".into())
            .with_enriched_plan(Vec::new());
        let replanned = state.with_raw_plan("second".into());

        assert!(state.enriched_plan.is_some());
        assert!(replanned.enriched_plan.is_none());
        assert_eq!(replanned.conversation_id, state.conversation_id);
    }
}
