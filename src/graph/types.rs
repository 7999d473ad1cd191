//! Work items that make up a page-load dependency graph.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Stable identifier of a node within one trace
pub type NodeId = String;

/// Child event name marking a layout (reflow) pass
pub const LAYOUT_EVENT: &str = "Layout";

/// Child event name marking script evaluation
pub const EVALUATE_SCRIPT_EVENT: &str = "EvaluateScript";

/// A single unit of network or main-thread work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkNode {
    pub id: NodeId,
    /// Nodes that must finish before this one may start
    #[serde(default)]
    pub dependencies: Vec<NodeId>,
    /// Span recorded in the original trace, relative to navigation start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<ObservedSpan>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// Network or CPU payload of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Network(NetworkRequest),
    Cpu(CpuTask),
}

/// A network request as seen by the loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
    pub url: String,
    #[serde(default)]
    pub resource_type: ResourceType,
    /// Bytes on the wire
    #[serde(default)]
    pub transfer_size: u64,
    #[serde(default)]
    pub render_blocking: bool,
    /// Request was issued by a script rather than the parser
    #[serde(default)]
    pub script_initiated: bool,
    #[serde(default)]
    pub main_document: bool,
}

/// A top-level main-thread task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuTask {
    /// Unthrottled duration in milliseconds
    pub duration_ms: f64,
    #[serde(default)]
    pub child_events: Vec<ChildEvent>,
}

/// Named sub-event recorded inside a CPU task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildEvent {
    pub name: String,
    /// Script URL for `EvaluateScript` events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ChildEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
        }
    }

    pub fn with_url(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
        }
    }
}

/// Resource classification of a network request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Document,
    Script,
    Stylesheet,
    Image,
    Font,
    Xhr,
    #[default]
    #[serde(other)]
    Other,
}

/// Start/end of a node in the original (unsimulated) trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedSpan {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl WorkNode {
    pub fn network(id: impl Into<NodeId>, request: NetworkRequest) -> Self {
        Self {
            id: id.into(),
            dependencies: Vec::new(),
            observed: None,
            kind: NodeKind::Network(request),
        }
    }

    pub fn cpu(id: impl Into<NodeId>, task: CpuTask) -> Self {
        Self {
            id: id.into(),
            dependencies: Vec::new(),
            observed: None,
            kind: NodeKind::Cpu(task),
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_observed(mut self, start_ms: f64, end_ms: f64) -> Self {
        self.observed = Some(ObservedSpan { start_ms, end_ms });
        self
    }

    pub fn is_cpu(&self) -> bool {
        matches!(self.kind, NodeKind::Cpu(_))
    }

    /// Child events of a CPU task; network nodes have none
    pub fn child_events(&self) -> &[ChildEvent] {
        match &self.kind {
            NodeKind::Cpu(task) => &task.child_events,
            NodeKind::Network(_) => &[],
        }
    }

    /// True when this task ran at least one layout pass
    pub fn did_perform_layout(&self) -> bool {
        self.child_events().iter().any(|event| event.name == LAYOUT_EVENT)
    }

    /// True when the node finished in the original trace no later than `time_ms`
    pub fn observed_end_by(&self, time_ms: f64) -> bool {
        self.observed.map_or(false, |span| span.end_ms <= time_ms)
    }

    /// Feed every field into `state`; floats are hashed by bit pattern
    pub fn hash_content<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.dependencies.hash(state);
        self.observed
            .map(|span| (span.start_ms.to_bits(), span.end_ms.to_bits()))
            .hash(state);
        match &self.kind {
            NodeKind::Network(request) => {
                0u8.hash(state);
                request.url.hash(state);
                request.resource_type.hash(state);
                request.transfer_size.hash(state);
                request.render_blocking.hash(state);
                request.script_initiated.hash(state);
                request.main_document.hash(state);
            }
            NodeKind::Cpu(task) => {
                1u8.hash(state);
                task.duration_ms.to_bits().hash(state);
                for event in &task.child_events {
                    event.name.hash(state);
                    event.url.hash(state);
                }
                task.child_events.len().hash(state);
            }
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            NodeKind::Network(_) => "network",
            NodeKind::Cpu(_) => "cpu",
        }
    }
}

impl NetworkRequest {
    pub fn new(url: impl Into<String>, resource_type: ResourceType, transfer_size: u64) -> Self {
        Self {
            url: url.into(),
            resource_type,
            transfer_size,
            render_blocking: false,
            script_initiated: false,
            main_document: false,
        }
    }
}

impl CpuTask {
    pub fn new(duration_ms: f64, child_events: Vec<ChildEvent>) -> Self {
        Self {
            duration_ms,
            child_events,
        }
    }
}
