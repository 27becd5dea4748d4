//! In-process lab backend
//!
//! Keeps projects in memory and records every call, so the orchestrator and
//! the HTTP layer can be exercised without an emulation server. Failures and
//! latency can be injected per operation.

use super::{BackendError, BackendResult, LabBackend, NodeInfo, ProjectInfo};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Backend operation, used to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListProjects,
    CreateProject,
    Duplicate,
    ListNodes,
    Start,
    Stop,
    Delete,
}

/// One recorded request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    ListProjects,
    CreateProject { name: String },
    Duplicate { source_id: String, new_name: String },
    ListNodes { project_id: String },
    Start { project_id: String },
    Stop { project_id: String },
    Delete { project_id: String },
}

impl BackendCall {
    pub fn operation(&self) -> Operation {
        match self {
            BackendCall::ListProjects => Operation::ListProjects,
            BackendCall::CreateProject { .. } => Operation::CreateProject,
            BackendCall::Duplicate { .. } => Operation::Duplicate,
            BackendCall::ListNodes { .. } => Operation::ListNodes,
            BackendCall::Start { .. } => Operation::Start,
            BackendCall::Stop { .. } => Operation::Stop,
            BackendCall::Delete { .. } => Operation::Delete,
        }
    }
}

#[derive(Debug, Clone)]
struct Project {
    name: String,
    nodes: Vec<NodeInfo>,
}

#[derive(Default)]
struct State {
    projects: BTreeMap<String, Project>,
    next_id: u64,
    calls: Vec<BackendCall>,
    failures: HashMap<Operation, BackendError>,
    latency: HashMap<Operation, Duration>,
}

impl State {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("mem-{:04}", self.next_id)
    }
}

fn not_found(project_id: &str) -> BackendError {
    BackendError::Rejected {
        status: 404,
        message: format!("Project ID {} doesn't exist", project_id),
    }
}

/// Recording in-memory [`LabBackend`]
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a project, e.g. a scenario template; returns its id
    pub fn add_project(&self, name: &str, node_names: &[&str]) -> String {
        let mut state = self.state();
        let id = state.allocate_id();
        let nodes = node_names
            .iter()
            .enumerate()
            .map(|(i, node)| NodeInfo {
                node_id: format!("{}-n{}", id, i),
                name: node.to_string(),
                node_type: Some("vpcs".to_string()),
                status: Some("stopped".to_string()),
                console: Some(5000 + i as u16),
                console_host: Some("127.0.0.1".to_string()),
                console_type: Some("telnet".to_string()),
            })
            .collect();
        state.projects.insert(
            id.clone(),
            Project {
                name: name.to_string(),
                nodes,
            },
        );
        id
    }

    /// Make every call of `op` fail with `err` until cleared
    pub fn fail(&self, op: Operation, err: BackendError) {
        self.state().failures.insert(op, err);
    }

    pub fn clear_failure(&self, op: Operation) {
        self.state().failures.remove(&op);
    }

    /// Delay every call of `op`, widening race windows in tests
    pub fn set_latency(&self, op: Operation, delay: Duration) {
        self.state().latency.insert(op, delay);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, op: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.operation() == op)
            .count()
    }

    pub fn project_ids(&self) -> Vec<String> {
        self.state().projects.keys().cloned().collect()
    }

    /// Drop a project without recording a call, as if removed out of band
    pub fn remove_project(&self, project_id: &str) -> bool {
        self.state().projects.remove(project_id).is_some()
    }

    pub fn has_project(&self, project_id: &str) -> bool {
        self.state().projects.contains_key(project_id)
    }

    pub fn project_name(&self, project_id: &str) -> Option<String> {
        self.state()
            .projects
            .get(project_id)
            .map(|project| project.name.clone())
    }

    /// Record the call, then apply latency and any injected failure
    async fn enter(&self, call: BackendCall) -> BackendResult<()> {
        let op = call.operation();
        let (delay, failure) = {
            let mut state = self.state();
            state.calls.push(call);
            (
                state.latency.get(&op).copied(),
                state.failures.get(&op).cloned(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn set_node_status(&self, project_id: &str, status: &str) -> BackendResult<()> {
        let mut state = self.state();
        let project = state
            .projects
            .get_mut(project_id)
            .ok_or_else(|| not_found(project_id))?;
        for node in &mut project.nodes {
            node.status = Some(status.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl LabBackend for MemoryBackend {
    async fn list_projects(&self) -> BackendResult<Vec<ProjectInfo>> {
        self.enter(BackendCall::ListProjects).await?;
        Ok(self
            .state()
            .projects
            .iter()
            .map(|(id, project)| ProjectInfo {
                project_id: id.clone(),
                name: project.name.clone(),
                status: Some("opened".to_string()),
            })
            .collect())
    }

    async fn create_project(&self, name: &str) -> BackendResult<ProjectInfo> {
        self.enter(BackendCall::CreateProject {
            name: name.to_string(),
        })
        .await?;
        let project_id = self.add_project(name, &[]);
        Ok(ProjectInfo {
            project_id,
            name: name.to_string(),
            status: Some("opened".to_string()),
        })
    }

    async fn duplicate_project(
        &self,
        source_id: &str,
        new_name: &str,
    ) -> BackendResult<ProjectInfo> {
        self.enter(BackendCall::Duplicate {
            source_id: source_id.to_string(),
            new_name: new_name.to_string(),
        })
        .await?;

        let mut state = self.state();
        let source = state
            .projects
            .get(source_id)
            .cloned()
            .ok_or_else(|| not_found(source_id))?;
        let project_id = state.allocate_id();
        let nodes = source
            .nodes
            .into_iter()
            .enumerate()
            .map(|(i, node)| NodeInfo {
                node_id: format!("{}-n{}", project_id, i),
                status: Some("stopped".to_string()),
                ..node
            })
            .collect();
        state.projects.insert(
            project_id.clone(),
            Project {
                name: new_name.to_string(),
                nodes,
            },
        );
        Ok(ProjectInfo {
            project_id,
            name: new_name.to_string(),
            status: Some("opened".to_string()),
        })
    }

    async fn list_nodes(&self, project_id: &str) -> BackendResult<Vec<NodeInfo>> {
        self.enter(BackendCall::ListNodes {
            project_id: project_id.to_string(),
        })
        .await?;
        self.state()
            .projects
            .get(project_id)
            .map(|project| project.nodes.clone())
            .ok_or_else(|| not_found(project_id))
    }

    async fn start_project(&self, project_id: &str) -> BackendResult<()> {
        self.enter(BackendCall::Start {
            project_id: project_id.to_string(),
        })
        .await?;
        self.set_node_status(project_id, "started")
    }

    async fn stop_project(&self, project_id: &str) -> BackendResult<()> {
        self.enter(BackendCall::Stop {
            project_id: project_id.to_string(),
        })
        .await?;
        self.set_node_status(project_id, "stopped")
    }

    async fn delete_project(&self, project_id: &str) -> BackendResult<()> {
        self.enter(BackendCall::Delete {
            project_id: project_id.to_string(),
        })
        .await?;
        self.state()
            .projects
            .remove(project_id)
            .map(|_| ())
            .ok_or_else(|| not_found(project_id))
    }

    fn web_ui_url(&self, project_id: &str) -> Option<String> {
        Some(format!("memory://projects/{}", project_id))
    }
}
