// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource declarations, handles and attribute tokens

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;

use crate::domain::{LogicalId, RemovalPolicy, ResourceKind};
use crate::errors::{Component, SynthError, SynthResult};

/// One resource handed across the provisioning boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDeclaration {
    /// Builder that declared the resource
    pub component: Component,
    /// Resource kind
    pub kind: ResourceKind,
    /// Stable in-template identity
    pub id: LogicalId,
    /// Provider properties, possibly containing attribute tokens
    pub properties: Value,
    /// Deletion and replacement disposition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removal_policy: Option<RemovalPolicy>,
    /// Explicit ordering edges in addition to the ones implied by tokens
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<LogicalId>,
}

impl ResourceDeclaration {
    /// Create a declaration with the given properties
    pub fn new(component: Component, kind: ResourceKind, id: LogicalId, properties: Value) -> Self {
        Self {
            component,
            kind,
            id,
            properties,
            removal_policy: None,
            depends_on: Vec::new(),
        }
    }

    /// Set the removal policy
    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }

    /// Add an explicit dependency
    pub fn depends_on(mut self, upstream: &ResourceHandle) -> Self {
        if !self.depends_on.contains(upstream.id()) {
            self.depends_on.push(upstream.id().clone());
        }
        self
    }

    /// Every logical id this declaration consumes, through tokens or
    /// explicit dependencies
    pub fn upstream_ids(&self) -> SynthResult<BTreeSet<LogicalId>> {
        let mut ids: BTreeSet<LogicalId> = self.depends_on.iter().cloned().collect();
        for token in tokens(&self.properties) {
            ids.insert(parse_id(self.component, token.target())?);
        }
        Ok(ids)
    }
}

/// Identity plus exported attributes of a declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    id: LogicalId,
    kind: ResourceKind,
}

impl ResourceHandle {
    /// Create a handle
    pub fn new(id: LogicalId, kind: ResourceKind) -> Self {
        Self { id, kind }
    }

    /// Logical id
    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    /// Resource kind
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// `{"Ref": id}`
    pub fn reference(&self) -> Value {
        json!({ "Ref": self.id.as_str() })
    }

    /// `{"Fn::GetAtt": [id, attribute]}`
    ///
    /// # Errors
    /// - `Dependency` when the kind does not export the attribute
    pub fn attribute(&self, name: &str) -> SynthResult<Value> {
        if !self.kind.exports(name) {
            return Err(SynthError::dependency(
                Component::Provisioning,
                format!("{} ({}) does not export attribute {}", self.id, self.kind, name),
            ));
        }
        Ok(json!({ "Fn::GetAtt": [self.id.as_str(), name] }))
    }
}

/// Array of `Ref` tokens
pub fn references<'a>(handles: impl IntoIterator<Item = &'a ResourceHandle>) -> Value {
    Value::Array(handles.into_iter().map(ResourceHandle::reference).collect())
}

/// `{"Fn::Join": ["", parts]}`
pub fn join(parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": ["", parts] })
}

/// Pseudo parameter reference such as `AWS::Region`
pub fn pseudo(name: &str) -> Value {
    json!({ "Ref": format!("AWS::{}", name) })
}

/// Attribute token found in a property tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Ref(&'a str),
    GetAtt(&'a str, &'a str),
}

impl<'a> Token<'a> {
    pub(crate) fn target(&self) -> &'a str {
        match self {
            Token::Ref(id) | Token::GetAtt(id, _) => *id,
        }
    }
}

/// Collect every `Ref`/`Fn::GetAtt` token, skipping pseudo parameters
pub(crate) fn tokens(value: &Value) -> Vec<Token<'_>> {
    let mut found = Vec::new();
    collect(value, &mut found);
    found
}

fn collect<'a>(value: &'a Value, found: &mut Vec<Token<'a>>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(id)) = map.get("Ref") {
                    if !id.starts_with("AWS::") {
                        found.push(Token::Ref(id));
                    }
                    return;
                }
                if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
                    if let [Value::String(id), Value::String(attr)] = parts.as_slice() {
                        found.push(Token::GetAtt(id, attr));
                        return;
                    }
                }
            }
            for nested in map.values() {
                collect(nested, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, found);
            }
        }
        _ => {}
    }
}

pub(crate) fn parse_id(component: Component, raw: &str) -> SynthResult<LogicalId> {
    LogicalId::new(raw).map_err(|_| {
        SynthError::dependency(component, format!("malformed reference to {:?}", raw))
    })
}
