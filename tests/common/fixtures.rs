//! Test fixtures
//!
//! Model packages, archives and import request bodies.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use model_registry_core::layout::versioned_dir;
use model_registry_core::{
    ComponentDefinition, Entity, ModelDefinition, OutputFormat, PackagePaths,
    RelationshipDefinition,
};
use model_registry_service::archive::pack_tar_gz;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

/// Two CRDs of one group, the first served in two versions
pub const CERT_MANAGER_CRDS: &str = r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: issuers.cert-manager.io
  labels:
    app.kubernetes.io/version: v1.13.0
spec:
  group: cert-manager.io
  names:
    kind: Issuer
  versions:
    - name: v1
      served: true
      schema:
        openAPIV3Schema:
          type: object
    - name: v1alpha2
      served: false
---
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: certificates.cert-manager.io
spec:
  group: cert-manager.io
  names:
    kind: Certificate
  versions:
    - name: v1
      schema:
        openAPIV3Schema:
          type: object
---
apiVersion: v1
kind: Namespace
metadata:
  name: cert-manager
"#;

/// Write a model with two components and one relationship under `dir`
pub fn write_argo_package(dir: &Path) {
    let model = ModelDefinition::new("argo")
        .with_model_version("v3.5.0")
        .with_registrant("github");
    let header = model.stripped();

    let paths = PackagePaths::new(
        versioned_dir(dir, "argo", "v3.5.0", "v1.0.0"),
        OutputFormat::Json,
    );
    paths.create_dirs().unwrap();
    paths
        .write_entity(&Entity::Model(model), OutputFormat::Json)
        .unwrap();
    for kind in ["Workflow", "CronWorkflow"] {
        let component = ComponentDefinition::new(kind, r#"{"type":"object"}"#)
            .with_api_version("argoproj.io/v1alpha1")
            .with_model(header.clone());
        paths
            .write_entity(&Entity::Component(component), OutputFormat::Json)
            .unwrap();
    }
    let relationship = RelationshipDefinition::new("hierarchical", "parent", "inventory")
        .with_model(header);
    paths
        .write_entity(&Entity::Relationship(relationship), OutputFormat::Json)
        .unwrap();
}

/// The argo package as a gzip tarball
pub fn argo_archive() -> Vec<u8> {
    let tree = TempDir::new().unwrap();
    write_argo_package(tree.path());
    pack_tar_gz(tree.path()).unwrap()
}

pub fn csv_data_url(text: &str) -> String {
    format!("data:text/csv;base64,{}", STANDARD.encode(text))
}

pub fn file_import(register: bool) -> Value {
    json!({
        "uploadType": "file",
        "register": register,
        "importBody": {
            "modelFile": STANDARD.encode(argo_archive()),
            "fileName": "argo.tar.gz"
        }
    })
}

pub fn csv_import(register: bool) -> Value {
    let models = "model,modelDisplayName,category,registrant,version\n\
                  Istio,Istio Mesh,Cloud Native Network,github,v1.20.0\n";
    let components = "model,component,version,schema\n\
                      istio,VirtualService,networking.istio.io/v1beta1,{}\n\
                      istio,Gateway,networking.istio.io/v1beta1,{}\n";
    let relationships = "model,kind,type,subType,selectors\n";

    json!({
        "uploadType": "csv",
        "register": register,
        "importBody": {
            "modelCsv": csv_data_url(models),
            "componentCsv": csv_data_url(components),
            "relationshipCsv": csv_data_url(relationships)
        }
    })
}

pub fn url_import(url: &str, model: &str, register: bool) -> Value {
    json!({
        "uploadType": "url",
        "register": register,
        "importBody": {
            "url": url,
            "model": {
                "model": model,
                "category": "Security"
            }
        }
    })
}

pub fn remote_import(url: &str, register: bool) -> Value {
    json!({
        "uploadType": "urlImport",
        "register": register,
        "importBody": { "url": url }
    })
}
