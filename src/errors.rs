#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("an error occurred with the database connection")]
    Database(#[from] diesel::result::Error),

    #[error("an error occurred getting a database connection")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("an error occurred writing a record")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("duplicate primary accession in source: {0}")]
    DuplicateAccession(String),

    #[error("refusing delta load: incoming version '{incoming}' is not newer than current version '{current}'")]
    VersionNotNewer { incoming: String, current: String },

    #[error("invalid mode: {0} (expected 'full' or 'delta')")]
    InvalidMode(String),

    #[error("invalid dataset: {0} (expected 'swissprot', 'trembl', or 'all')")]
    InvalidDataset(String),

    #[error("source file not found: {0}")]
    SourceFileMissing(std::path::PathBuf),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while parsing an entry out of the source XML. These are forwarded
/// across the worker/writer channel rather than unwound in place.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid value for field '{field}': {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("expected intermediate file not found: {0}")]
    MissingFile(std::path::PathBuf),

    #[error("malformed tsv header in {path}: {reason}")]
    BadHeader { path: std::path::PathBuf, reason: String },
}
