use thiserror::Error;

/// Reasons a suite file is rejected before anything runs.
#[derive(Error, Debug)]
pub enum SuiteError {
    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: invalid suite: {source}")]
    Yaml {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{file}: image cannot be blank")]
    BlankImage { file: String },

    #[error("{file}: suite has no tests")]
    NoTests { file: String },

    #[error("{file}: test #{index} has a blank name")]
    BlankTestName { file: String, index: usize },

    #[error("{file}: duplicate test name `{name}`")]
    DuplicateTest { file: String, name: String },

    #[error("{file}: test `{test}`: invalid command: {message}")]
    InvalidCommand {
        file: String,
        test: String,
        message: String,
    },

    #[error("{file}: test `{test}`: invalid {stream} pattern: {message}")]
    InvalidPattern {
        file: String,
        test: String,
        stream: String,
        message: String,
    },
}

impl SuiteError {
    pub fn file(&self) -> &str {
        match self {
            SuiteError::Io { file, .. }
            | SuiteError::Yaml { file, .. }
            | SuiteError::BlankImage { file }
            | SuiteError::NoTests { file }
            | SuiteError::BlankTestName { file, .. }
            | SuiteError::DuplicateTest { file, .. }
            | SuiteError::InvalidCommand { file, .. }
            | SuiteError::InvalidPattern { file, .. } => file,
        }
    }
}
