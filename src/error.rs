use thiserror::Error;

/// Photo rejected before any network call
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("File is too large ({size} bytes). Maximum size: {} MB", .max / (1024 * 1024))]
    FileTooLarge { size: u64, max: u64 },
    #[error("Unsupported file type `{content_type}`. Use one of: {}", .allowed.join(", "))]
    UnsupportedType {
        content_type: String,
        allowed: Vec<String>,
    },
}

/// Failures surfaced by the review directory
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to load reviews")]
    Load(#[source] anyhow::Error),
    #[error("failed to upload photo")]
    Upload(#[source] anyhow::Error),
    #[error("failed to create review")]
    Create(#[source] anyhow::Error),
    #[error("failed to like review")]
    Like(#[source] anyhow::Error),
}

impl DirectoryError {
    /// Short notice suitable for showing to the visitor
    pub fn user_message(&self) -> String {
        match self {
            DirectoryError::Validation(e) => e.to_string(),
            DirectoryError::Load(_) => {
                "Could not load reviews. Try refreshing the page.".to_string()
            }
            DirectoryError::Upload(_) => "Could not upload the photo. Try again.".to_string(),
            DirectoryError::Create(_) => "Could not add the review. Try again.".to_string(),
            DirectoryError::Like(_) => "Could not like the review. Try again.".to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DirectoryError::Validation(_))
    }
}
