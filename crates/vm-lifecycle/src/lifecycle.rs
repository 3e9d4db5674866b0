//! Lifecycle engine.
//!
//! Maps a desired spec plus the previous state onto gateway calls and
//! returns the resulting status. Every call is a single request/response
//! exchange; the engine keeps no state between calls.

use crate::config::EngineConfig;
use crate::error::{EngineError, Operation};
use crate::overflow::{SecretOutcome, ensure_overflow_secret, remove_overflow_secret};
use crate::plan::{ChangePlan, apply_owned, plan_changes};
use crate::reconciler::{observed_state, project};
use crate::timeout::bounded;
use kubevirt_client::KubeVirtClientTrait;
use tracing::{debug, error, info};
use vm_manifest::{BuiltManifest, ManifestPatch, RemoteObject, build};
use vm_spec::{DesiredSpec, ObjectKey, TransitionRequest, TransitionState, VmStatus};

/// Drives VirtualMachines through their lifecycle
pub struct LifecycleEngine {
    client: Box<dyn KubeVirtClientTrait>,
    config: EngineConfig,
}

impl LifecycleEngine {
    /// Create an engine over a gateway
    pub fn new(client: Box<dyn KubeVirtClientTrait>, config: EngineConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply the transition carried by `desired`.
    ///
    /// - `start`: create when absent, otherwise set running
    /// - `stop`: set not running; an absent VM stays absent
    /// - `delete`: remove the VM and its overflow Secret
    /// - no transition: report the remote object as it is
    ///
    /// `prior` is the state recorded by the previous call; it is logged but
    /// the remote object always decides.
    pub async fn apply(
        &self,
        desired: &DesiredSpec,
        prior: TransitionState,
    ) -> Result<VmStatus, EngineError> {
        let operation = match desired.transition {
            Some(TransitionRequest::Start) => Operation::Start,
            Some(TransitionRequest::Stop) => Operation::Stop,
            Some(TransitionRequest::Delete) => Operation::Delete,
            None => Operation::Read,
        };
        let key = self.resolve(operation, desired)?;
        debug!("Applying {} to VirtualMachine {} (previously {})", operation, key, prior);

        match desired.transition {
            Some(TransitionRequest::Start) => self.start(desired, &key).await,
            Some(TransitionRequest::Stop) => self.stop(&key).await,
            Some(TransitionRequest::Delete) => self.delete(&key).await,
            None => Ok(self
                .observe(Operation::Read, &key)
                .await?
                .unwrap_or_else(|| VmStatus::new(&key, TransitionState::Absent))),
        }
    }

    /// Current status of the remote object; `None` when it is absent
    pub async fn read(&self, key: &ObjectKey) -> Result<Option<VmStatus>, EngineError> {
        self.observe(Operation::Read, key).await
    }

    /// Adopt an existing object by its `namespace/name` identifier
    pub async fn import(&self, id: &str) -> Result<VmStatus, EngineError> {
        let key = ObjectKey::parse(id)
            .and_then(|key| key.validate().map(|()| key))
            .map_err(|e| EngineError::validation(Operation::Import, id, e))?;
        info!("Importing VirtualMachine {}/{}", key.namespace, key.name);

        self.observe(Operation::Import, &key)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                operation: Operation::Import,
                identity: key.id(),
                message: "VirtualMachine does not exist".to_string(),
            })
    }

    /// Whether the remote object exists
    pub async fn exists(&self, key: &ObjectKey) -> Result<bool, EngineError> {
        Ok(self.fetch(Operation::Read, key).await?.is_some())
    }

    /// Plan an update without performing it
    pub async fn plan(
        &self,
        desired: &DesiredSpec,
        prior: Option<&VmStatus>,
    ) -> Result<ChangePlan, EngineError> {
        let key = self.resolve(Operation::Plan, desired)?;
        let (plan, _, _) = self.plan_for(Operation::Plan, desired, &key, prior).await?;
        Ok(plan)
    }

    /// Move the remote object to `desired`.
    ///
    /// An identity change creates the new object, then deletes the previous
    /// one. Otherwise the owned fields are rewritten in place, folding in
    /// the run flag when `desired` carries a start or stop. A stop for an
    /// object that does not exist creates nothing.
    pub async fn update(
        &self,
        desired: &DesiredSpec,
        prior: Option<&VmStatus>,
    ) -> Result<VmStatus, EngineError> {
        let key = self.resolve(Operation::Update, desired)?;
        if desired.transition == Some(TransitionRequest::Delete) {
            return self.delete(&key).await;
        }

        let (plan, built, observed) = self.plan_for(Operation::Update, desired, &key, prior).await?;
        info!("Updating VirtualMachine {}/{}: {}", key.namespace, key.name, plan);

        let rewrite = matches!(plan, ChangePlan::UpdateInPlace { .. });
        let current = match plan {
            ChangePlan::Replace { previous } => {
                // The previous object stays until its replacement exists
                let status = self.create(Operation::Update, &key, &built, desired.transition).await?;
                self.delete(&previous).await?;
                return Ok(status);
            }
            ChangePlan::Create if desired.transition == Some(TransitionRequest::Stop) => {
                info!("VirtualMachine {} does not exist, nothing to stop", key);
                return Ok(project(&key, TransitionState::Stopped, desired.transition, None));
            }
            ChangePlan::Create => {
                return self.create(Operation::Update, &key, &built, desired.transition).await;
            }
            ChangePlan::UpdateInPlace { .. } | ChangePlan::NoOp => {
                observed.ok_or_else(|| EngineError::NotFound {
                    operation: Operation::Update,
                    identity: key.id(),
                    message: "VirtualMachine disappeared while planning".to_string(),
                })?
            }
        };

        let running = match desired.transition {
            Some(TransitionRequest::Start) => Some(true),
            Some(TransitionRequest::Stop) => Some(false),
            _ => None,
        };
        let patch = running.map(|running| ManifestPatch::running(running, &current));
        if !rewrite && patch.as_ref().is_none_or(|patch| patch.is_noop_for(&current)) {
            debug!("VirtualMachine {} already matches, nothing to write", key);
            return Ok(project(&key, observed_state(&current), desired.transition, Some(&current)));
        }

        let mut object = current;
        if rewrite {
            if let Some(secret) = built.overflow_secret() {
                ensure_overflow_secret(self.client.as_ref(), secret, self.config.timeouts.create)
                    .await
                    .map_err(|e| EngineError::from_gateway(Operation::Update, key.id(), e))?;
            }
            apply_owned(&built.object, &mut object);
        }
        if let Some(patch) = &patch {
            patch.apply_to(&mut object);
        }

        let updated = self.write(Operation::Update, &key, &object).await?;
        let state = match running {
            Some(true) => TransitionState::Running,
            Some(false) => TransitionState::Stopped,
            None => observed_state(&updated),
        };
        Ok(project(&key, state, desired.transition, Some(&updated)))
    }

    /// Remove the VM and, when configured, its overflow Secret.
    /// An absent VM is not an error.
    pub async fn delete(&self, key: &ObjectKey) -> Result<VmStatus, EngineError> {
        info!("Deleting VirtualMachine {}/{}", key.namespace, key.name);

        match bounded(self.config.timeouts.delete, self.client.delete_vm(key)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!("VirtualMachine {} already absent", key);
            }
            Err(e) => return Err(EngineError::from_gateway(Operation::Delete, key.id(), e)),
        }

        if self.config.cleanup_overflow_secret {
            remove_overflow_secret(
                self.client.as_ref(),
                key,
                &self.config.secret_prefix,
                self.config.timeouts.delete,
            )
            .await
            .map_err(|e| EngineError::from_gateway(Operation::Delete, key.id(), e))?;
        }

        Ok(project(key, TransitionState::Absent, Some(TransitionRequest::Delete), None))
    }

    async fn start(&self, desired: &DesiredSpec, key: &ObjectKey) -> Result<VmStatus, EngineError> {
        info!("Starting VirtualMachine {}/{}", key.namespace, key.name);

        match self.fetch(Operation::Start, key).await? {
            None => {
                let built = build(desired, key, &self.config.build_options());
                self.create(Operation::Start, key, &built, desired.transition).await
            }
            Some(current) => self.set_running(Operation::Start, key, &current, true).await,
        }
    }

    async fn stop(&self, key: &ObjectKey) -> Result<VmStatus, EngineError> {
        info!("Stopping VirtualMachine {}/{}", key.namespace, key.name);

        match self.fetch(Operation::Stop, key).await? {
            None => {
                info!("VirtualMachine {} does not exist, nothing to stop", key);
                Ok(project(key, TransitionState::Stopped, Some(TransitionRequest::Stop), None))
            }
            Some(current) => self.set_running(Operation::Stop, key, &current, false).await,
        }
    }

    /// Create the overflow Secret (if any), then the VM
    async fn create(
        &self,
        operation: Operation,
        key: &ObjectKey,
        built: &BuiltManifest,
        transition: Option<TransitionRequest>,
    ) -> Result<VmStatus, EngineError> {
        let mut written_secret = None;
        if let Some(secret) = built.overflow_secret() {
            let outcome = ensure_overflow_secret(self.client.as_ref(), secret, self.config.timeouts.create)
                .await
                .map_err(|e| EngineError::from_gateway(operation, key.id(), e))?;
            if outcome == SecretOutcome::Created {
                written_secret = Some(secret);
            }
        }

        info!("Creating VirtualMachine {}/{}", key.namespace, key.name);
        let created = match bounded(self.config.timeouts.create, self.client.create_vm(&built.object)).await {
            Ok(created) => created,
            Err(e) => {
                // Only a Secret written by this call is left behind by the failure
                return Err(match written_secret {
                    Some(secret) if !e.is_already_exists() => {
                        error!(
                            "VirtualMachine {} create failed after Secret {} was created: {}",
                            key, secret.key, e
                        );
                        EngineError::PartialCreation {
                            operation,
                            identity: key.id(),
                            secret: secret.key.id(),
                            message: e.to_string(),
                        }
                    }
                    _ => EngineError::from_gateway(operation, key.id(), e),
                });
            }
        };

        Ok(project(key, TransitionState::Created, transition, Some(&created)))
    }

    async fn set_running(
        &self,
        operation: Operation,
        key: &ObjectKey,
        current: &RemoteObject,
        running: bool,
    ) -> Result<VmStatus, EngineError> {
        let patch = ManifestPatch::running(running, current);
        debug!("Patching VirtualMachine {}: {:?}", key, patch.touched_paths());

        let updated = self.write(operation, key, &patch.applied(current)).await?;
        let (state, transition) = if running {
            (TransitionState::Running, TransitionRequest::Start)
        } else {
            (TransitionState::Stopped, TransitionRequest::Stop)
        };
        Ok(project(key, state, Some(transition), Some(&updated)))
    }

    async fn write(
        &self,
        operation: Operation,
        key: &ObjectKey,
        object: &RemoteObject,
    ) -> Result<RemoteObject, EngineError> {
        bounded(self.config.timeouts.update, self.client.update_vm(object))
            .await
            .map_err(|e| EngineError::from_gateway(operation, key.id(), e))
    }

    /// Get the VM; `None` when absent
    async fn fetch(&self, operation: Operation, key: &ObjectKey) -> Result<Option<RemoteObject>, EngineError> {
        match bounded(self.config.timeouts.read, self.client.get_vm(key)).await {
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(EngineError::from_gateway(operation, key.id(), e)),
        }
    }

    async fn observe(&self, operation: Operation, key: &ObjectKey) -> Result<Option<VmStatus>, EngineError> {
        Ok(self
            .fetch(operation, key)
            .await?
            .map(|remote| project(key, observed_state(&remote), None, Some(&remote))))
    }

    async fn plan_for(
        &self,
        operation: Operation,
        desired: &DesiredSpec,
        key: &ObjectKey,
        prior: Option<&VmStatus>,
    ) -> Result<(ChangePlan, BuiltManifest, Option<RemoteObject>), EngineError> {
        let built = build(desired, key, &self.config.build_options());
        let previous = prior.map(VmStatus::key);

        // A moved identity needs no read of the new key
        let observed = match &previous {
            Some(previous) if previous != key => None,
            _ => self.fetch(operation, key).await?,
        };
        let plan = plan_changes(previous.as_ref(), &built.object, observed.as_ref());
        Ok((plan, built, observed))
    }

    fn resolve(&self, operation: Operation, desired: &DesiredSpec) -> Result<ObjectKey, EngineError> {
        let key = desired.key(&self.config.default_namespace);
        desired
            .validate(&self.config.default_namespace)
            .map_err(|e| EngineError::validation(operation, key.id(), e))?;
        Ok(key)
    }
}
