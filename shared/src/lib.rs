use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PredictRequest {
    pub image: String,
}

/// Class labels produced by the classifier. Index 1 of the model output is
/// the healthy class; every other index is reported as adenocarcinoma.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Label {
    #[serde(rename = "Adenocarcinoma Cancer")]
    #[strum(serialize = "Adenocarcinoma Cancer")]
    AdenocarcinomaCancer,
    #[serde(rename = "Normal")]
    #[strum(serialize = "Normal")]
    Normal,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::AdenocarcinomaCancer, Label::Normal];

    pub fn from_class_index(index: usize) -> Self {
        if index == 1 {
            Label::Normal
        } else {
            Label::AdenocarcinomaCancer
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Prediction {
    pub image: Label,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrainingJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub command: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrainingJob {
    pub fn new(command: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::default(),
            command: command.into(),
            created_at: now.clone(),
            updated_at: now,
            exit_code: None,
            error: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Running)
    }

    pub fn set_status(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Utc::now().to_rfc3339();
    }

    pub fn set_finished(&mut self, exit_code: Option<i32>) {
        self.exit_code = exit_code;
        if exit_code == Some(0) {
            self.set_status(JobStatus::Completed);
        } else {
            let reason = match exit_code {
                Some(code) => format!("training process exited with status {}", code),
                None => "training process was terminated by a signal".to_string(),
            };
            self.set_error(reason);
        }
    }

    pub fn set_error(&mut self, error: String) {
        self.error = Some(error);
        self.set_status(JobStatus::Failed);
    }
}
