//! Typed input/output payloads, one shape per job type.
//!
//! The wire format is flat JSON with no internal tag; the job's `type` field
//! selects the variant, so parsing always goes through [`JobInput::parse`] /
//! [`JobOutput::parse`] with the type in hand. Field names are camelCase to
//! match the worker contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::JobType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDownloadInput {
    pub url: String,
    pub platform: Option<String>,
    pub quality: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crop {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipEditInput {
    pub clip_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub crop: Option<Crop>,
    pub filters: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceTransformInput {
    pub clip_id: String,
    pub video_path: String,
    pub character_id: Option<String>,
    pub frame_sampling: Option<u32>,
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCloneInput {
    pub source_audio: String,
    pub text: String,
    pub language: String,
    pub emotion: Option<String>,
    pub style: Option<String>,
    pub voice_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LipSyncInput {
    pub video_path: String,
    pub audio_path: String,
    pub clip_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleGenerateInput {
    pub clip_id: String,
    pub language: Option<String>,
    pub translate_to: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundType {
    Image,
    Video,
    Generated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundReplaceInput {
    pub clip_id: String,
    pub background_type: BackgroundType,
    pub background_source: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RenderFormat {
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderInput {
    pub project_id: String,
    /// Timeline JSON as stored on the project; resolved by the renderer.
    pub timeline: Value,
    pub format: RenderFormat,
    pub resolution: Option<String>,
    pub watermark: Option<bool>,
    pub quality: Option<String>,
}

/// Closed variant set over all job input shapes, keyed by [`JobType`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JobInput {
    VideoDownload(VideoDownloadInput),
    ClipEdit(ClipEditInput),
    FaceTransform(FaceTransformInput),
    VoiceClone(VoiceCloneInput),
    LipSync(LipSyncInput),
    SubtitleGenerate(SubtitleGenerateInput),
    BackgroundReplace(BackgroundReplaceInput),
    Render(RenderInput),
}

impl JobInput {
    /// Validate a caller-supplied payload against the shape for `job_type`.
    pub fn parse(job_type: JobType, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match job_type {
            JobType::VideoDownload => JobInput::VideoDownload(serde_json::from_value(value)?),
            JobType::ClipEdit => JobInput::ClipEdit(serde_json::from_value(value)?),
            JobType::FaceTransform => JobInput::FaceTransform(serde_json::from_value(value)?),
            JobType::VoiceClone => JobInput::VoiceClone(serde_json::from_value(value)?),
            JobType::LipSync => JobInput::LipSync(serde_json::from_value(value)?),
            JobType::SubtitleGenerate => {
                JobInput::SubtitleGenerate(serde_json::from_value(value)?)
            }
            JobType::BackgroundReplace => {
                JobInput::BackgroundReplace(serde_json::from_value(value)?)
            }
            JobType::Render => JobInput::Render(serde_json::from_value(value)?),
        })
    }

    pub fn job_type(&self) -> JobType {
        match self {
            JobInput::VideoDownload(_) => JobType::VideoDownload,
            JobInput::ClipEdit(_) => JobType::ClipEdit,
            JobInput::FaceTransform(_) => JobType::FaceTransform,
            JobInput::VoiceClone(_) => JobType::VoiceClone,
            JobInput::LipSync(_) => JobType::LipSync,
            JobInput::SubtitleGenerate(_) => JobType::SubtitleGenerate,
            JobInput::BackgroundReplace(_) => JobType::BackgroundReplace,
            JobInput::Render(_) => JobType::Render,
        }
    }

    pub fn to_value(&self) -> Value {
        // Serialization of these shapes cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDownloadOutput {
    pub file_path: String,
    pub duration: f64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub file_size: Option<i64>,
    pub thumbnail_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipEditOutput {
    pub file_path: String,
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceTransformOutput {
    pub file_path: String,
    pub faces_detected: i32,
    pub unique_tracks: i32,
    pub duration: f64,
    pub model_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCloneOutput {
    pub file_path: String,
    pub duration: f64,
    pub model_version: String,
    pub sample_rate: i32,
    pub voice_embedding: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LipSyncOutput {
    pub file_path: String,
    pub duration: f64,
    pub model_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleSegment {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleGenerateOutput {
    pub file_path: String,
    pub language: String,
    pub segments: Vec<SubtitleSegment>,
    pub model_version: String,
    pub translations: Option<std::collections::HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundReplaceOutput {
    pub file_path: String,
    pub duration: f64,
    pub model_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutput {
    pub file_path: String,
    pub thumbnail_path: String,
    pub duration: f64,
    pub file_size: i64,
    pub format: String,
    pub resolution: String,
    pub watermark: Option<bool>,
}

/// Closed variant set over all job output shapes, keyed by [`JobType`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JobOutput {
    VideoDownload(VideoDownloadOutput),
    ClipEdit(ClipEditOutput),
    FaceTransform(FaceTransformOutput),
    VoiceClone(VoiceCloneOutput),
    LipSync(LipSyncOutput),
    SubtitleGenerate(SubtitleGenerateOutput),
    BackgroundReplace(BackgroundReplaceOutput),
    Render(RenderOutput),
}

impl JobOutput {
    /// Validate a worker-supplied result payload against the shape for
    /// `job_type`.
    pub fn parse(job_type: JobType, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match job_type {
            JobType::VideoDownload => JobOutput::VideoDownload(serde_json::from_value(value)?),
            JobType::ClipEdit => JobOutput::ClipEdit(serde_json::from_value(value)?),
            JobType::FaceTransform => JobOutput::FaceTransform(serde_json::from_value(value)?),
            JobType::VoiceClone => JobOutput::VoiceClone(serde_json::from_value(value)?),
            JobType::LipSync => JobOutput::LipSync(serde_json::from_value(value)?),
            JobType::SubtitleGenerate => {
                JobOutput::SubtitleGenerate(serde_json::from_value(value)?)
            }
            JobType::BackgroundReplace => {
                JobOutput::BackgroundReplace(serde_json::from_value(value)?)
            }
            JobType::Render => JobOutput::Render(serde_json::from_value(value)?),
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
