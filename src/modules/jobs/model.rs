use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use super::payload::{JobInput, JobOutput};

/// The fixed set of media transformation job types. Each type maps to one
/// worker service endpoint and fixes the shape of the job's input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    VideoDownload,
    ClipEdit,
    FaceTransform,
    VoiceClone,
    LipSync,
    SubtitleGenerate,
    BackgroundReplace,
    Render,
}

impl JobType {
    pub const ALL: [JobType; 8] = [
        JobType::VideoDownload,
        JobType::ClipEdit,
        JobType::FaceTransform,
        JobType::VoiceClone,
        JobType::LipSync,
        JobType::SubtitleGenerate,
        JobType::BackgroundReplace,
        JobType::Render,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::VideoDownload => "video_download",
            JobType::ClipEdit => "clip_edit",
            JobType::FaceTransform => "face_transform",
            JobType::VoiceClone => "voice_clone",
            JobType::LipSync => "lip_sync",
            JobType::SubtitleGenerate => "subtitle_generate",
            JobType::BackgroundReplace => "background_replace",
            JobType::Render => "render",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// State machine for status updates. `queued` and `processing` may move
    /// to `processing`, `completed` or `failed`; terminal states accept
    /// nothing. A failed job is only ever retried as a brand-new job.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued | JobStatus::Processing, JobStatus::Processing) => true,
            (JobStatus::Queued | JobStatus::Processing, JobStatus::Completed) => true,
            (JobStatus::Queued | JobStatus::Processing, JobStatus::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(()),
        }
    }
}

/// A single unit of requested asynchronous work.
///
/// `(job_type, input)` is immutable after creation. Status, progress, output,
/// error and the derived timestamps mutate only through
/// `JobService::apply_status`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Job {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    #[schema(value_type = Object)]
    pub input: JobInput,
    #[schema(value_type = Option<Object>)]
    pub output: Option<JobOutput>,
    pub progress: i32,
    pub error: Option<String>,
    pub idempotency_key: Option<String>,
    #[serde(with = "time::serde::iso8601")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::iso8601::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::iso8601::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl Job {
    pub fn new(
        user_id: Uuid,
        project_id: Option<Uuid>,
        input: JobInput,
        idempotency_key: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            project_id,
            job_type: input.job_type(),
            status: JobStatus::Queued,
            input,
            output: None,
            progress: 0,
            error: None,
            idempotency_key,
            created_at: OffsetDateTime::now_utc(),
            started_at: None,
            completed_at: None,
        }
    }
}
