use std::path::PathBuf;
use thiserror::Error;

pub type BsaResult<T> = Result<T, BsaError>;

#[derive(Error, Debug)]
pub enum BsaError {
    #[error("Cannot find that text file: {}", path.display())]
    InputNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot load template workbook '{}': {reason}", path.display())]
    TemplateNotFound { path: PathBuf, reason: String },

    #[error("Cannot find sheet {sheet} in template workbook")]
    SheetNotFound { sheet: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Workbook archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Workbook XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Failed to save workbook: {0}")]
    Save(String),
}
