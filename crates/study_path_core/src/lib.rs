pub mod blocks;
pub mod domain;
pub mod extraction;
pub mod instructions;
pub mod pipeline;
pub mod ports;

pub use domain::{
    Attachment, AttachmentRef, CourseOffer, EnrichedTopic, PageRecord, ProfileError,
    SessionState, Subtopic, Topic, UserProfile,
};
pub use extraction::{emit, extract, ExtractionError};
pub use pipeline::{
    Pipeline, PipelineError, PublishOutcome, Stage, StageInvoker, SubmissionReport,
    TopicRecordAttempt,
};
pub use ports::{
    GenerationRequest, GenerationService, PageSubmissionService, PortError, PortResult,
    SessionRepository,
};
