// Copyright (c) 2025 - Cowboy AI, Inc.
//! Emitted stack template
//!
//! The finished, ordered resource graph together with its outputs. The
//! template is pure data: it serializes with serde for comparison and
//! renders to the CloudFormation document shape with
//! [`StackTemplate::to_cloudformation`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::ResourceDeclaration;
use crate::domain::{LogicalId, ResourceKind};
use crate::errors::SynthResult;

/// Template format version
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// A stack output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackOutput {
    /// Output key
    pub key: String,
    /// Value or attribute token
    pub value: Value,
    /// Cross-stack export name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_name: Option<String>,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StackOutput {
    /// Create an output without export or description
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            export_name: None,
            description: None,
        }
    }

    /// Set the export name
    pub fn exported_as(mut self, name: impl Into<String>) -> Self {
        self.export_name = Some(name.into());
        self
    }

    /// Set the description
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Finished resource graph in declaration (topological) order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackTemplate {
    pub name: String,
    pub description: String,
    pub resources: Vec<ResourceDeclaration>,
    pub outputs: Vec<StackOutput>,
}

impl StackTemplate {
    /// Look up a resource by logical id
    pub fn resource(&self, id: &LogicalId) -> Option<&ResourceDeclaration> {
        self.resources.iter().find(|r| &r.id == id)
    }

    /// Every resource of one kind, in declaration order
    pub fn resources_of(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceDeclaration> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    /// Look up an output by key
    pub fn output(&self, key: &str) -> Option<&StackOutput> {
        self.outputs.iter().find(|o| o.key == key)
    }

    /// Render the CloudFormation document
    pub fn to_cloudformation(&self) -> Value {
        let mut resources = Map::new();
        for declaration in &self.resources {
            let mut entry = Map::new();
            entry.insert("Type".to_string(), json!(declaration.kind.as_str()));
            if !is_empty_object(&declaration.properties) {
                entry.insert("Properties".to_string(), declaration.properties.clone());
            }
            if !declaration.depends_on.is_empty() {
                let mut depends_on: Vec<&str> =
                    declaration.depends_on.iter().map(LogicalId::as_str).collect();
                depends_on.sort_unstable();
                entry.insert("DependsOn".to_string(), json!(depends_on));
            }
            if let Some(policy) = declaration.removal_policy {
                entry.insert("DeletionPolicy".to_string(), json!(policy.deletion_policy()));
                entry.insert(
                    "UpdateReplacePolicy".to_string(),
                    json!(policy.deletion_policy()),
                );
            }
            resources.insert(declaration.id.to_string(), Value::Object(entry));
        }

        let mut outputs = Map::new();
        for output in &self.outputs {
            let mut entry = Map::new();
            entry.insert("Value".to_string(), output.value.clone());
            if let Some(description) = &output.description {
                entry.insert("Description".to_string(), json!(description));
            }
            if let Some(export) = &output.export_name {
                entry.insert("Export".to_string(), json!({ "Name": export }));
            }
            outputs.insert(output.key.clone(), Value::Object(entry));
        }

        let mut document = Map::new();
        document.insert(
            "AWSTemplateFormatVersion".to_string(),
            json!(TEMPLATE_FORMAT_VERSION),
        );
        document.insert("Description".to_string(), json!(self.description));
        document.insert("Resources".to_string(), Value::Object(resources));
        if !outputs.is_empty() {
            document.insert("Outputs".to_string(), Value::Object(outputs));
        }
        Value::Object(document)
    }

    /// Render the CloudFormation document as pretty-printed JSON
    pub fn to_json_pretty(&self) -> SynthResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_cloudformation())?)
    }
}

fn is_empty_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    }
}
