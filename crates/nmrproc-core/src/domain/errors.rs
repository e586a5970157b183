use std::fmt::{Display, Formatter};

pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// Failure class of a [`ProcessingError`]; each class owns one process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingErrorCategory {
    InputValidationError,
    IndexingError,
    IoSystemError,
    PipelineError,
    InternalError,
}

impl ProcessingErrorCategory {
    pub const ALL: [Self; 5] = [
        Self::InputValidationError,
        Self::IndexingError,
        Self::IoSystemError,
        Self::PipelineError,
        Self::InternalError,
    ];

    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidationError => 2,
            Self::IndexingError => 3,
            Self::IoSystemError => 4,
            Self::PipelineError => 5,
            Self::InternalError => 6,
        }
    }

    /// Prefix shared by the placeholders of this class, e.g. `INPUT`.
    pub const fn placeholder_prefix(self) -> &'static str {
        match self {
            Self::InputValidationError => "INPUT",
            Self::IndexingError => "INDEX",
            Self::IoSystemError => "IO",
            Self::PipelineError => "RUN",
            Self::InternalError => "SYS",
        }
    }
}

impl Display for ProcessingErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InputValidationError => "input validation",
            Self::IndexingError => "indexing",
            Self::IoSystemError => "I/O",
            Self::PipelineError => "pipeline",
            Self::InternalError => "internal",
        };
        f.write_str(name)
    }
}

/// Error carried through the core. `placeholder` is a stable machine-readable
/// tag such as `INDEX.ROW_RANGE`; `message` is for humans.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{category} error [{placeholder}] {message}")]
pub struct ProcessingError {
    category: ProcessingErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl ProcessingError {
    pub fn new(
        category: ProcessingErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ProcessingErrorCategory::InputValidationError, placeholder, message)
    }

    pub fn indexing(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ProcessingErrorCategory::IndexingError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ProcessingErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn pipeline(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ProcessingErrorCategory::PipelineError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ProcessingErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> ProcessingErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    /// `ERROR: [PLACEHOLDER] message`, the first line printed on stderr.
    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}
