#[derive(Debug, thiserror::Error)]
pub enum SccError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("runAsUser {uid} and fsGroup {fs_group} uid range does not match")]
    AnnotationMismatch { uid: String, fs_group: String },

    #[error("invalid identity range annotation: {0}")]
    Format(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("failed to render template {path}: {reason}")]
    Render { path: String, reason: String },

    #[error("conflicting write on {0}; retry on next trigger")]
    Conflict(String),

    #[error("reconcile exceeded deadline of {0:?}")]
    Timeout(std::time::Duration),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),
}

impl SccError {
    /// Annotation problems need an operator edit, which itself triggers a
    /// new reconcile; everything else is worth a timed retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SccError::AnnotationMismatch { .. } | SccError::Format(_)
        )
    }
}

pub type StoreResult<T> = Result<T, SccError>;
