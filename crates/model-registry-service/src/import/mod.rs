//! Ingestion adapters
//!
//! An import request selects exactly one adapter. Each adapter turns its
//! input into one or more `Dir`s laid out per the canonical package layout,
//! staged inside a single scratch directory owned by the returned
//! [`StagedImport`]. Dropping the staged import removes every staged file.

mod file;
mod remote;
mod sheet;
mod url;

pub use self::sheet::{
    decode_csv_data_url, CsvImportAdapter, CsvSheetGenerator, SheetGenerator, SheetPaths,
    CSV_DATA_URL_PREFIX,
};
pub use self::file::{sanitize_upload_name, FileImportAdapter};
pub use self::remote::RemoteArchiveAdapter;
pub use self::url::{
    GeneratedPackage, HttpPackageGenerator, PackageGenerator, UrlImportAdapter,
    CRD_VERSION_LABEL,
};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::TempDir;
use tracing::{debug, instrument};
use ::url::Url;

use crate::error::{ServiceError, ServiceResult};
use crate::registration::Dir;

/// Content version assigned when a source does not declare one
pub const DEFAULT_MODEL_VERSION: &str = "v0.0.1";

/// Spreadsheet import: three base64 CSV data URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CsvImport {
    pub model_csv: String,
    pub component_csv: String,
    #[serde(alias = "relationshipCSV")]
    pub relationship_csv: String,
}

/// Inline model metadata of a URL import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct UrlModelMetadata {
    pub model: String,
    pub model_display_name: String,
    pub primary_color: String,
    pub secondary_color: String,
    pub category: String,
    pub registrant: String,
    pub shape: String,
    pub sub_category: String,
    pub svg_color: String,
    pub svg_white: String,
    pub svg_complete: String,
    pub is_annotation: bool,
    pub publish_to_registry: bool,
}

/// URL import: a source to scaffold a model from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UrlImport {
    pub url: String,
    #[serde(default)]
    pub model: UrlModelMetadata,
}

/// File import: an uploaded file body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileImport {
    /// Base64 encoded file content
    pub model_file: String,
    pub file_name: String,
}

/// Remote import: a downloadable archive or OCI image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoteImport {
    pub url: String,
}

/// The input shape of an import
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    Csv(CsvImport),
    Url(UrlImport),
    File(FileImport),
    UrlImport(RemoteImport),
}

impl ImportSource {
    /// Wire name of the upload type
    pub fn upload_type(&self) -> &'static str {
        match self {
            Self::Csv(_) => "csv",
            Self::Url(_) => "url",
            Self::File(_) => "file",
            Self::UrlImport(_) => "urlImport",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawImportRequest {
    upload_type: String,
    #[serde(default)]
    import_body: Value,
    #[serde(default)]
    register: bool,
}

/// A request to import one model source
///
/// The `uploadType` discriminant is decoded first, then only the body fields
/// of that variant are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawImportRequest")]
pub struct ImportRequest {
    pub register: bool,
    pub source: ImportSource,
}

impl TryFrom<RawImportRequest> for ImportRequest {
    type Error = ServiceError;

    fn try_from(raw: RawImportRequest) -> ServiceResult<Self> {
        fn body<T: serde::de::DeserializeOwned>(kind: &str, value: Value) -> ServiceResult<T> {
            serde_json::from_value(value).map_err(|e| {
                ServiceError::InvalidInput(format!("Invalid {} import body: {}", kind, e))
            })
        }

        let source = match raw.upload_type.as_str() {
            "csv" => ImportSource::Csv(body("csv", raw.import_body)?),
            "url" => {
                let parsed: UrlImport = body("url", raw.import_body)?;
                validate_source_url(&parsed.url)?;
                ImportSource::Url(parsed)
            }
            "file" => ImportSource::File(body("file", raw.import_body)?),
            "urlImport" => {
                let parsed: RemoteImport = body("urlImport", raw.import_body)?;
                validate_source_url(&parsed.url)?;
                ImportSource::UrlImport(parsed)
            }
            other => {
                return Err(ServiceError::InvalidInput(format!(
                    "Unsupported upload type: {}",
                    other
                )))
            }
        };

        Ok(Self {
            register: raw.register,
            source,
        })
    }
}

/// Only absolute `http` and `https` sources are fetched
fn validate_source_url(raw: &str) -> ServiceResult<()> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| ServiceError::InvalidInput(format!("Invalid source URL '{}': {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ServiceError::InvalidInput(format!(
            "Unsupported URL scheme: {}",
            scheme
        ))),
    }
}

impl ImportRequest {
    /// Decode a JSON request body
    pub fn from_slice(bytes: &[u8]) -> ServiceResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| ServiceError::InvalidInput(format!("Invalid request format: {}", e)))
    }
}

/// Output of an adapter
///
/// Holds the scratch directory the `dirs` live in.
#[derive(Debug)]
pub struct StagedImport {
    pub dirs: Vec<Dir>,
    /// Human-readable account of what was staged
    pub description: String,
    _scratch: TempDir,
}

impl StagedImport {
    pub(crate) fn new(dirs: Vec<Dir>, description: impl Into<String>, scratch: TempDir) -> Self {
        Self {
            dirs,
            description: description.into(),
            _scratch: scratch,
        }
    }
}

/// Decode standard base64, tolerating surrounding whitespace
pub(crate) fn decode_base64(data: &str, what: &str) -> ServiceResult<Vec<u8>> {
    STANDARD
        .decode(data.trim())
        .map_err(|e| ServiceError::InvalidInput(format!("Invalid base64 data in {}: {}", what, e)))
}

/// Dispatches an import request to its adapter
pub struct Importer {
    csv: CsvImportAdapter,
    url: UrlImportAdapter,
    file: FileImportAdapter,
    remote: RemoteArchiveAdapter,
}

impl Importer {
    pub fn new(
        csv: CsvImportAdapter,
        url: UrlImportAdapter,
        file: FileImportAdapter,
        remote: RemoteArchiveAdapter,
    ) -> Self {
        Self {
            csv,
            url,
            file,
            remote,
        }
    }

    /// Run the adapter selected by the request source
    #[instrument(skip(self, source), fields(upload_type = source.upload_type()))]
    pub async fn stage(&self, source: &ImportSource) -> ServiceResult<StagedImport> {
        let staged = match source {
            ImportSource::Csv(body) => self.csv.stage(body).await?,
            ImportSource::Url(body) => self.url.stage(body).await?,
            ImportSource::File(body) => self.file.stage(body).await?,
            ImportSource::UrlImport(body) => self.remote.stage(body).await?,
        };

        debug!(dirs = staged.dirs.len(), "Staged import");
        Ok(staged)
    }
}
