//! Archive codecs
//!
//! Tar and gzip packing of package trees, file type sniffing of downloaded
//! content, and a minimal OCI image layout writer and reader.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};

pub const OCI_LAYOUT_FILE: &str = "oci-layout";
pub const OCI_INDEX_FILE: &str = "index.json";
pub const OCI_LAYOUT_VERSION: &str = "1.0.0";

pub const MEDIA_TYPE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const MEDIA_TYPE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const MEDIA_TYPE_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
pub const MEDIA_TYPE_LAYER_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

const ANNOTATION_TITLE: &str = "org.opencontainers.image.title";
const ANNOTATION_VERSION: &str = "org.opencontainers.image.version";
const ANNOTATION_CREATED: &str = "org.opencontainers.image.created";
const ANNOTATION_REF_NAME: &str = "org.opencontainers.image.ref.name";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];
const USTAR_OFFSET: usize = 257;

/// Kind of a file handed to the registration pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    TarGz,
    Zip,
    Json,
    Yaml,
}

impl ArchiveKind {
    /// File extension including the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Tar => ".tar",
            Self::TarGz => ".tar.gz",
            Self::Zip => ".zip",
            Self::Json => ".json",
            Self::Yaml => ".yaml",
        }
    }

    /// Classify a path by its extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".json") {
            Some(Self::Json)
        } else if name.ends_with(".yaml") || name.ends_with(".yml") {
            Some(Self::Yaml)
        } else {
            None
        }
    }
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

fn is_ustar(bytes: &[u8]) -> bool {
    bytes.len() >= USTAR_OFFSET + 5 && &bytes[USTAR_OFFSET..USTAR_OFFSET + 5] == b"ustar"
}

fn is_json(bytes: &[u8]) -> bool {
    let trimmed = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|start| &bytes[start..])
        .unwrap_or_default();
    matches!(trimmed.first(), Some(b'{') | Some(b'['))
        && serde_json::from_slice::<serde_json::Value>(bytes).is_ok()
}

fn is_yaml_document(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok()
        && matches!(
            serde_yaml::from_slice::<serde_yaml::Value>(bytes),
            Ok(serde_yaml::Value::Mapping(_))
        )
}

/// Whether the bytes are a plain tar holding an OCI image layout
pub fn is_oci_artifact(bytes: &[u8]) -> bool {
    if !is_ustar(bytes) {
        return false;
    }

    let mut archive = tar::Archive::new(bytes);
    let Ok(entries) = archive.entries() else {
        return false;
    };

    entries.filter_map(Result::ok).any(|entry| {
        entry
            .path()
            .map(|p| {
                let p = p.to_string_lossy();
                let p = p.trim_start_matches("./");
                p == OCI_LAYOUT_FILE || p == OCI_INDEX_FILE
            })
            .unwrap_or(false)
    })
}

/// Classify downloaded content
///
/// OCI artifacts are tars. Otherwise the signature decides, defaulting to a
/// tar when nothing matches.
pub fn detect_file_type(bytes: &[u8]) -> ArchiveKind {
    if is_oci_artifact(bytes) {
        ArchiveKind::Tar
    } else if is_gzip(bytes) {
        ArchiveKind::TarGz
    } else if bytes.starts_with(&ZIP_MAGIC) {
        ArchiveKind::Zip
    } else if is_ustar(bytes) {
        ArchiveKind::Tar
    } else if is_json(bytes) {
        ArchiveKind::Json
    } else if is_yaml_document(bytes) {
        ArchiveKind::Yaml
    } else {
        ArchiveKind::Tar
    }
}

/// Tar the contents of `dir` with paths relative to it
pub fn pack_tar(dir: &Path) -> ServiceResult<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);
    builder.append_dir_all(".", dir)?;
    Ok(builder.into_inner()?)
}

/// Gzip a byte buffer
pub fn gzip(bytes: &[u8]) -> ServiceResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Tar and gzip the contents of `dir`
pub fn pack_tar_gz(dir: &Path) -> ServiceResult<Vec<u8>> {
    gzip(&pack_tar(dir)?)
}

/// Unpack a tar or gzip tar byte buffer into `dest`
pub fn unpack_bytes(bytes: &[u8], dest: &Path) -> ServiceResult<()> {
    fs::create_dir_all(dest)?;
    if is_gzip(bytes) {
        tar::Archive::new(GzDecoder::new(bytes)).unpack(dest)?;
    } else {
        tar::Archive::new(bytes).unpack(dest)?;
    }
    Ok(())
}

/// Unpack a tar or gzip tar file into `dest`
pub fn unpack_file(path: &Path, dest: &Path) -> ServiceResult<()> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    unpack_bytes(&bytes, dest)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Content descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciDescriptor {
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Image manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciManifest {
    pub schema_version: u32,
    pub media_type: String,
    pub config: OciDescriptor,
    pub layers: Vec<OciDescriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Image index, the entry point of a layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciIndex {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: String,
    pub manifests: Vec<OciDescriptor>,
}

/// Writes blobs into `{layout}/blobs/sha256/`
struct BlobWriter<'a> {
    layout_dir: &'a Path,
}

impl BlobWriter<'_> {
    fn write(&self, media_type: &str, bytes: &[u8]) -> ServiceResult<OciDescriptor> {
        let hex = sha256_hex(bytes);
        let dir = self.layout_dir.join("blobs").join("sha256");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(&hex), bytes)?;

        Ok(OciDescriptor {
            media_type: media_type.to_string(),
            digest: format!("sha256:{}", hex),
            size: bytes.len() as u64,
            annotations: BTreeMap::new(),
        })
    }
}

fn blob_path(layout_dir: &Path, digest: &str) -> ServiceResult<std::path::PathBuf> {
    let hex = digest
        .strip_prefix("sha256:")
        .filter(|h| !h.is_empty() && h.chars().all(|c| c.is_ascii_hexdigit()))
        .ok_or_else(|| ServiceError::InvalidInput(format!("Unsupported digest: {}", digest)))?;
    Ok(layout_dir.join("blobs").join("sha256").join(hex))
}

/// Build a single-layer OCI image layout of `package_dir` in `layout_dir`
pub fn build_oci_layout(
    package_dir: &Path,
    layout_dir: &Path,
    name: &str,
    version: &str,
) -> ServiceResult<OciManifest> {
    fs::create_dir_all(layout_dir)?;
    let blobs = BlobWriter { layout_dir };

    let layer_tar = pack_tar(package_dir)?;
    let diff_id = format!("sha256:{}", sha256_hex(&layer_tar));
    let mut layer = blobs.write(MEDIA_TYPE_LAYER_GZIP, &gzip(&layer_tar)?)?;
    layer
        .annotations
        .insert(ANNOTATION_TITLE.to_string(), name.to_string());

    let config = serde_json::json!({
        "architecture": "",
        "os": "",
        "config": {
            "Labels": {
                ANNOTATION_TITLE: name,
                ANNOTATION_VERSION: version,
            }
        },
        "rootfs": { "type": "layers", "diff_ids": [diff_id] },
    });
    let config = blobs.write(MEDIA_TYPE_CONFIG, &serde_json::to_vec(&config)?)?;

    let manifest = OciManifest {
        schema_version: 2,
        media_type: MEDIA_TYPE_MANIFEST.to_string(),
        config,
        layers: vec![layer],
        annotations: BTreeMap::from([
            (ANNOTATION_TITLE.to_string(), name.to_string()),
            (ANNOTATION_VERSION.to_string(), version.to_string()),
            (ANNOTATION_CREATED.to_string(), Utc::now().to_rfc3339()),
        ]),
    };
    let mut manifest_descriptor =
        blobs.write(MEDIA_TYPE_MANIFEST, &serde_json::to_vec(&manifest)?)?;
    manifest_descriptor
        .annotations
        .insert(ANNOTATION_REF_NAME.to_string(), version.to_string());

    let index = OciIndex {
        schema_version: 2,
        media_type: MEDIA_TYPE_INDEX.to_string(),
        manifests: vec![manifest_descriptor],
    };
    fs::write(layout_dir.join(OCI_INDEX_FILE), serde_json::to_vec_pretty(&index)?)?;
    fs::write(
        layout_dir.join(OCI_LAYOUT_FILE),
        serde_json::to_vec(&serde_json::json!({ "imageLayoutVersion": OCI_LAYOUT_VERSION }))?,
    )?;

    debug!(model = name, version = version, "Built OCI image layout");
    Ok(manifest)
}

/// Whether `dir` is the root of an OCI image layout
pub fn is_oci_layout(dir: &Path) -> bool {
    dir.join(OCI_LAYOUT_FILE).is_file() && dir.join(OCI_INDEX_FILE).is_file()
}

/// Unpack every layer of every manifest in an OCI layout into `dest`
///
/// Returns the number of layers extracted.
pub fn extract_oci_layers(layout_dir: &Path, dest: &Path) -> ServiceResult<usize> {
    let index: OciIndex = serde_json::from_slice(&fs::read(layout_dir.join(OCI_INDEX_FILE))?)
        .map_err(|e| ServiceError::InvalidInput(format!("Invalid OCI index: {}", e)))?;

    let mut extracted = 0;
    for descriptor in &index.manifests {
        let manifest: OciManifest =
            serde_json::from_slice(&fs::read(blob_path(layout_dir, &descriptor.digest)?)?)
                .map_err(|e| ServiceError::InvalidInput(format!("Invalid OCI manifest: {}", e)))?;

        for layer in &manifest.layers {
            let bytes = fs::read(blob_path(layout_dir, &layer.digest)?)?;
            unpack_bytes(&bytes, dest)?;
            extracted += 1;
        }
    }

    Ok(extracted)
}
