//! Atom and edge types
//!
//! Core types for representing documentation atoms and the typed
//! relationships between them. The engine only ever reads these records;
//! creation and mutation belong to the ingestion path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for atoms
///
/// Identifiers are caller-supplied strings (e.g. "REQ-001") and immutable
/// once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtomId(pub String);

impl AtomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AtomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AtomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AtomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Closed set of atom types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomType {
    Requirement,
    Design,
    Procedure,
    Validation,
    Policy,
    Risk,
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Requirement => "requirement",
            Self::Design => "design",
            Self::Procedure => "procedure",
            Self::Validation => "validation",
            Self::Policy => "policy",
            Self::Risk => "risk",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AtomType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requirement" => Ok(Self::Requirement),
            "design" => Ok(Self::Design),
            "procedure" => Ok(Self::Procedure),
            "validation" => Ok(Self::Validation),
            "policy" => Ok(Self::Policy),
            "risk" => Ok(Self::Risk),
            other => Err(format!("unknown atom type: {other}")),
        }
    }
}

/// Criticality of an atom, ordered low < medium < high < critical
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Criticality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of an atom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomStatus {
    Draft,
    #[default]
    Active,
    Deprecated,
}

/// Closed set of relationship types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Requires,
    Implements,
    Validates,
    Mitigates,
    Triggers,
    References,
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Requires => "requires",
            Self::Implements => "implements",
            Self::Validates => "validates",
            Self::Mitigates => "mitigates",
            Self::Triggers => "triggers",
            Self::References => "references",
        };
        write!(f, "{s}")
    }
}

/// A directed, typed relationship between two atoms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Source atom
    pub source: AtomId,
    /// Target atom
    pub target: AtomId,
    /// Relationship type
    pub edge_type: EdgeType,
    /// Optional free-text label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<AtomId>, target: impl Into<AtomId>, edge_type: EdgeType) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            edge_type,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Free-form metadata attached to an atom, not interpreted by the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AtomMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A documentation atom
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// Unique identifier, immutable once created
    pub id: AtomId,
    /// Atom type
    pub atom_type: AtomType,
    /// Short descriptive title
    pub title: String,
    /// Criticality level
    #[serde(default)]
    pub criticality: Criticality,
    /// Lifecycle status
    #[serde(default)]
    pub status: AtomStatus,
    /// Uninterpreted metadata
    #[serde(default)]
    pub metadata: AtomMetadata,
    /// Embedding vector, if the ingestion path computed one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Atom {
    /// Create a new builder for Atom
    pub fn builder() -> AtomBuilder {
        AtomBuilder::default()
    }

    /// Whether the atom should contribute the full metadata boost in fusion
    pub fn is_high_criticality(&self) -> bool {
        self.criticality >= Criticality::High
    }
}

/// Builder for Atom with fluent API
#[derive(Debug, Default)]
pub struct AtomBuilder {
    id: Option<AtomId>,
    atom_type: Option<AtomType>,
    title: Option<String>,
    criticality: Criticality,
    status: AtomStatus,
    metadata: AtomMetadata,
    embedding: Option<Vec<f32>>,
}

impl AtomBuilder {
    /// Set the atom identifier
    pub fn id(mut self, id: impl Into<AtomId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the atom type
    pub fn atom_type(mut self, atom_type: AtomType) -> Self {
        self.atom_type = Some(atom_type);
        self
    }

    /// Set the title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the criticality
    pub fn criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    /// Set the lifecycle status
    pub fn status(mut self, status: AtomStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the owner
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.metadata.owner = Some(owner.into());
        self
    }

    /// Add a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.push(tag.into());
        self
    }

    /// Set the embedding vector
    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Build the Atom
    pub fn build(self) -> Result<Atom, AtomBuilderError> {
        let id = self.id.ok_or(AtomBuilderError::MissingId)?;
        let atom_type = self.atom_type.ok_or(AtomBuilderError::MissingType)?;
        let title = self.title.ok_or(AtomBuilderError::MissingTitle)?;

        Ok(Atom {
            id,
            atom_type,
            title,
            criticality: self.criticality,
            status: self.status,
            metadata: self.metadata,
            embedding: self.embedding,
        })
    }
}

/// Errors that can occur when building an Atom
#[derive(Debug, thiserror::Error)]
pub enum AtomBuilderError {
    #[error("Missing required field: id")]
    MissingId,
    #[error("Missing required field: atom_type")]
    MissingType,
    #[error("Missing required field: title")]
    MissingTitle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_id_display() {
        let id = AtomId::new("REQ-001");
        assert_eq!(id.to_string(), "REQ-001");
        assert_eq!(id.as_str(), "REQ-001");
    }

    #[test]
    fn test_criticality_ordering() {
        assert!(Criticality::Low < Criticality::Medium);
        assert!(Criticality::Medium < Criticality::High);
        assert!(Criticality::High < Criticality::Critical);
    }

    #[test]
    fn test_builder_complete() {
        let atom = Atom::builder()
            .id("REQ-001")
            .atom_type(AtomType::Requirement)
            .title("Users must authenticate before upload")
            .criticality(Criticality::High)
            .owner("platform-team")
            .tag("auth")
            .build()
            .unwrap();

        assert_eq!(atom.id.as_str(), "REQ-001");
        assert_eq!(atom.atom_type, AtomType::Requirement);
        assert_eq!(atom.criticality, Criticality::High);
        assert_eq!(atom.status, AtomStatus::Active);
        assert_eq!(atom.metadata.tags, vec!["auth"]);
        assert!(atom.is_high_criticality());
    }

    #[test]
    fn test_builder_missing_required() {
        let result = Atom::builder()
            .id("REQ-001")
            .title("Missing type")
            // no atom_type
            .build();

        assert!(matches!(result, Err(AtomBuilderError::MissingType)));
    }

    #[test]
    fn test_atom_type_round_trip() {
        for t in [
            AtomType::Requirement,
            AtomType::Design,
            AtomType::Procedure,
            AtomType::Validation,
            AtomType::Policy,
            AtomType::Risk,
        ] {
            let parsed: AtomType = t.to_string().parse().unwrap();
            assert_eq!(parsed, t);
        }
        assert!("widget".parse::<AtomType>().is_err());
    }

    #[test]
    fn test_edge_with_label() {
        let edge = Edge::new("REQ-001", "DES-001", EdgeType::Implements)
            .with_label("implemented by the upload service design");

        assert_eq!(edge.source.as_str(), "REQ-001");
        assert_eq!(edge.target.as_str(), "DES-001");
        assert_eq!(edge.edge_type, EdgeType::Implements);
        assert!(edge.label.is_some());
    }

    #[test]
    fn test_atom_serialization() {
        let atom = Atom::builder()
            .id("DES-001")
            .atom_type(AtomType::Design)
            .title("Upload service design")
            .build()
            .unwrap();

        let json = serde_json::to_string(&atom).unwrap();
        let deserialized: Atom = serde_json::from_str(&json).unwrap();

        assert_eq!(atom.id, deserialized.id);
        assert_eq!(atom.title, deserialized.title);
        // lowercase wire form
        assert!(json.contains("\"design\""));
    }
}
