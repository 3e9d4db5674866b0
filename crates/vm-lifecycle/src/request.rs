//! Request envelope for the command-line surface.
//!
//! One request document in, one response document out:
//!
//! ```yaml
//! operation: apply
//! desired:
//!   name: w1
//!   image: img:latest
//!   memory: 2Gi
//!   cpu: 2
//!   transition: start
//! ```

use crate::error::{EngineError, Operation};
use crate::lifecycle::LifecycleEngine;
use crate::plan::ChangePlan;
use serde::{Deserialize, Serialize};
use vm_spec::{DesiredSpec, ObjectKey, VmStatus};

/// Requested engine call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestOperation {
    Apply,
    Read,
    Update,
    Delete,
    Import,
    Plan,
}

impl RequestOperation {
    fn label(self) -> Operation {
        match self {
            Self::Apply | Self::Update => Operation::Update,
            Self::Read => Operation::Read,
            Self::Delete => Operation::Delete,
            Self::Import => Operation::Import,
            Self::Plan => Operation::Plan,
        }
    }
}

/// Request document
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub operation: RequestOperation,

    /// Desired state (apply, update, plan; optional for read and delete)
    #[serde(default)]
    pub desired: Option<DesiredSpec>,

    /// Status returned by the previous call
    #[serde(default)]
    pub prior: Option<VmStatus>,

    /// `namespace/name` (import; alternative target for read and delete)
    #[serde(default)]
    pub id: Option<String>,
}

/// Response document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Status(VmStatus),
    Plan(ChangePlan),
    /// Read of an absent object; serialized as `null`
    Gone,
}

/// Dispatch one request to the engine
pub async fn handle(engine: &LifecycleEngine, request: Request) -> Result<Response, EngineError> {
    match request.operation {
        RequestOperation::Apply => {
            let desired = require_desired(&request)?;
            let prior = request.prior.as_ref().map(|p| p.state).unwrap_or_default();
            engine.apply(desired, prior).await.map(Response::Status)
        }
        RequestOperation::Update => {
            let desired = require_desired(&request)?;
            engine.update(desired, request.prior.as_ref()).await.map(Response::Status)
        }
        RequestOperation::Plan => {
            let desired = require_desired(&request)?;
            engine.plan(desired, request.prior.as_ref()).await.map(Response::Plan)
        }
        RequestOperation::Read => {
            let key = target_key(engine, &request)?;
            Ok(engine.read(&key).await?.map_or(Response::Gone, Response::Status))
        }
        RequestOperation::Delete => {
            let key = target_key(engine, &request)?;
            engine.delete(&key).await.map(Response::Status)
        }
        RequestOperation::Import => {
            let id = request.id.as_deref().ok_or_else(|| {
                EngineError::validation(Operation::Import, "", "import requires an id of the form namespace/name")
            })?;
            engine.import(id).await.map(Response::Status)
        }
    }
}

fn require_desired(request: &Request) -> Result<&DesiredSpec, EngineError> {
    request.desired.as_ref().ok_or_else(|| {
        EngineError::validation(
            request.operation.label(),
            request.id.clone().unwrap_or_default(),
            "request has no desired state",
        )
    })
}

/// Object named by the request: desired spec, then `id`, then prior status.
/// The key is checked against naming rules before any remote call.
fn target_key(engine: &LifecycleEngine, request: &Request) -> Result<ObjectKey, EngineError> {
    let operation = request.operation.label();
    let key = if let Some(desired) = &request.desired {
        desired.key(&engine.config().default_namespace)
    } else if let Some(id) = &request.id {
        ObjectKey::parse(id).map_err(|e| EngineError::validation(operation, id.as_str(), e))?
    } else {
        request
            .prior
            .as_ref()
            .map(VmStatus::key)
            .ok_or_else(|| EngineError::validation(operation, "", "request names no object"))?
    };
    key.validate().map_err(|e| EngineError::validation(operation, key.id(), e))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use kubevirt_client::mock::helpers::create_test_vm;
    use kubevirt_client::MockKubeVirtClient;
    use vm_spec::TransitionState;

    fn engine(mock: &MockKubeVirtClient) -> LifecycleEngine {
        LifecycleEngine::new(Box::new(mock.clone()), EngineConfig::default())
    }

    fn parse(yaml: &str) -> Request {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[tokio::test]
    async fn test_apply_request_starts_vm() {
        let mock = MockKubeVirtClient::new();
        let request = parse(
            "operation: apply\n\
             desired:\n  name: w1\n  namespace: ns\n  image: img:latest\n  memory: 2Gi\n  cpu: 2\n  transition: start\n",
        );

        let response = handle(&engine(&mock), request).await.unwrap();
        let Response::Status(status) = response else {
            panic!("expected a status response");
        };
        assert_eq!(status.state, TransitionState::Created);
        assert!(mock.vm(&ObjectKey::new("ns", "w1")).is_some());
    }

    #[tokio::test]
    async fn test_read_absent_serializes_as_null() {
        let mock = MockKubeVirtClient::new();
        let response = handle(&engine(&mock), parse("operation: read\nid: ns/w1\n")).await.unwrap();
        assert_eq!(response, Response::Gone);
        assert_eq!(serde_json::to_value(&response).unwrap(), serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_read_by_prior_status() {
        let mock = MockKubeVirtClient::new();
        mock.add_vm(create_test_vm(&ObjectKey::new("ns", "w1"), true));
        let request = parse("operation: read\nprior:\n  id: ns/w1\n  namespace: ns\n  name: w1\n  state: running\n  vm_status: Running\n");

        let Response::Status(status) = handle(&engine(&mock), request).await.unwrap() else {
            panic!("expected a status response");
        };
        assert_eq!(status.state, TransitionState::Running);
    }

    #[tokio::test]
    async fn test_missing_desired_is_validation_error() {
        let mock = MockKubeVirtClient::new();
        let err = handle(&engine(&mock), parse("operation: plan\n")).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_plan_response_is_tagged() {
        let mock = MockKubeVirtClient::new();
        let request = parse("operation: plan\ndesired:\n  name: w1\n  image: img:latest\n  memory: 2Gi\n  cpu: 2\n");
        let response = handle(&engine(&mock), request).await.unwrap();
        assert_eq!(serde_json::to_value(&response).unwrap()["action"], "create");
    }

    #[tokio::test]
    async fn test_invalid_target_is_validation_error() {
        let mock = MockKubeVirtClient::new();
        let engine = engine(&mock);

        let request = parse("operation: delete\ndesired:\n  name: Not_Valid\n  namespace: ns\n  image: img\n  memory: 1Gi\n  cpu: 1\n");
        let err = handle(&engine, request).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(err.operation(), Operation::Delete);

        let err = handle(&engine, parse("operation: read\nid: Bad_NS/w1\n")).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(mock.calls().is_empty());
    }
}
