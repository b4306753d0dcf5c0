//! Payload resolver — release manifest to (component, image) pairs
//!
//! Consumes either a local JSON file or a release URL resolved through
//! `oc adm release info`. Both the flat `{references: [{name, image}]}`
//! shape and the image-stream shape (`references.spec.tags[]`) are
//! accepted; the rest of the document is opaque to the scanner.

use crate::fetch::run_captured;
use crate::{FipscanError, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

/// One component image of a release payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRef {
    pub name: String,
    pub image: String,
}

#[derive(Debug, Deserialize)]
struct FlatPayload {
    references: Vec<FlatReference>,
}

#[derive(Debug, Deserialize)]
struct FlatReference {
    name: String,
    image: String,
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    references: StreamReferences,
}

#[derive(Debug, Deserialize)]
struct StreamReferences {
    spec: StreamSpec,
}

#[derive(Debug, Deserialize)]
struct StreamSpec {
    tags: Vec<StreamTag>,
}

#[derive(Debug, Deserialize)]
struct StreamTag {
    name: String,
    from: StreamFrom,
}

#[derive(Debug, Deserialize)]
struct StreamFrom {
    name: String,
}

fn parse(text: &str) -> Result<Vec<ComponentRef>> {
    if let Ok(flat) = serde_json::from_str::<FlatPayload>(text) {
        return Ok(flat
            .references
            .into_iter()
            .map(|r| ComponentRef {
                name: r.name,
                image: r.image,
            })
            .collect());
    }
    let stream: StreamPayload = serde_json::from_str(text)
        .map_err(|e| FipscanError::Payload(format!("unrecognized payload shape: {e}")))?;
    Ok(stream
        .references
        .spec
        .tags
        .into_iter()
        .map(|t| ComponentRef {
            name: t.name,
            image: t.from.name,
        })
        .collect())
}

pub fn from_file(path: &Path) -> Result<Vec<ComponentRef>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| FipscanError::Payload(format!("can't read {}: {e}", path.display())))?;
    parse(&text)
}

pub fn from_url(url: &str) -> Result<Vec<ComponentRef>> {
    tracing::info!(url, "resolving release payload");
    let mut cmd = Command::new("oc");
    cmd.args(["adm", "release", "info", "--output", "json", url]);
    let stdout = run_captured(cmd, "oc adm release info").map_err(FipscanError::Payload)?;
    parse(&stdout)
}
