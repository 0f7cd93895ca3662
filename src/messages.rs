//! Wire schema shared by the master and the agent.
//!
//! The deployed format must round-trip bit-exact across releases, so every
//! type here derives `Serialize`/`Deserialize` and is encoded with
//! [`encode`]/[`decode`] rather than anything that reorders or renames
//! fields implicitly.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single discriminated message carried over the transport.
///
/// Exactly one variant is ever populated per message; the tag lives in the
/// serialized form so unrelated clients and old binaries can still recognize
/// variants they don't otherwise handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Envelope {
    /// Agent to master heartbeat.
    Ping { agent: AgentInfo, tasks: Vec<TaskInfo> },
    /// Master to agent heartbeat reply.
    Pong {
        agent_id: String,
        run_task: Option<RunTaskPayload>,
    },
    /// Framework to master: "what can I run on?"
    RequestOffers { framework_id: String },
    /// Master to framework: the offer round.
    Offers {
        framework_id: String,
        offers: Vec<Offer>,
    },
    /// Framework to master: "run this task".
    RunTask { task: TaskInfo },
    /// Master to framework: submission acknowledged.
    TaskAck { task_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTaskPayload {
    pub task: TaskInfo,
}

/// An agent's full current advertisement (never a delta).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
    pub ping_rate_ms: u64,
    pub resources: Vec<Resource>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResourceKind {
    Scalar(f64),
    Ranges(Vec<(u64, u64)>),
    Set(Vec<String>),
}

impl Resource {
    pub fn cpus(value: f64) -> Self {
        Self {
            name: "cpus".to_string(),
            kind: ResourceKind::Scalar(value),
        }
    }

    pub fn mem(bytes: f64) -> Self {
        Self {
            name: "mem".to_string(),
            kind: ResourceKind::Scalar(bytes),
        }
    }

    /// Returns the scalar value if this resource is a scalar, `None` otherwise.
    pub fn scalar(&self) -> Option<f64> {
        match self.kind {
            ResourceKind::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkInfo {
    pub framework_id: String,
    pub name: String,
}

/// The seven states a task may occupy; see §3's transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Unissued,
    Issued,
    Starting,
    Running,
    Completed,
    Killed,
    Errored,
}

impl TaskState {
    /// A reported state is never empty on the wire (unlike the protobuf
    /// original, where an unset enum defaults to zero); this exists only to
    /// mirror §4.2's "non-empty state" wording when `TaskInfo.state` arrives
    /// wrapped in `Option`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Killed | TaskState::Errored
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Unissued => "UNISSUED",
            TaskState::Issued => "ISSUED",
            TaskState::Starting => "STARTING",
            TaskState::Running => "RUNNING",
            TaskState::Completed => "COMPLETED",
            TaskState::Killed => "KILLED",
            TaskState::Errored => "ERRORED",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "UNISSUED" => Ok(TaskState::Unissued),
            "ISSUED" => Ok(TaskState::Issued),
            "STARTING" => Ok(TaskState::Starting),
            "RUNNING" => Ok(TaskState::Running),
            "COMPLETED" => Ok(TaskState::Completed),
            "KILLED" => Ok(TaskState::Killed),
            "ERRORED" => Ok(TaskState::Errored),
            other => Err(format!("unknown task state: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: String,
    pub name: String,
    pub framework: FrameworkInfo,
    pub agent_id: String,
    pub resources: Vec<Resource>,
    pub container: ContainerSpec,
    pub state: TaskState,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    Docker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkMode {
    Host,
    Bridge,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: Option<String>,
    pub host_port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub kind: ContainerKind,
    pub image: String,
    pub network: NetworkMode,
    pub port_mappings: Vec<PortMapping>,
}

/// An ephemeral resource offer, produced per request and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: String,
    pub framework_id: String,
    pub agent_id: String,
    pub resources: Vec<Resource>,
    pub attributes: Vec<Attribute>,
}

/// Serializes an envelope into the stable binary wire format.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
    bincode::serialize(envelope).map_err(Error::Decode)
}

/// Decodes a wire payload back into an envelope.
///
/// Malformed or truncated buffers produce [`Error::Decode`]; callers at the
/// transport boundary log and drop rather than propagate further (§7).
pub fn decode(bytes: &[u8]) -> Result<Envelope> {
    bincode::deserialize(bytes).map_err(Error::Decode)
}
