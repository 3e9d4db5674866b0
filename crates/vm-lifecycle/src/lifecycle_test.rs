//! Unit tests for the lifecycle engine

#[cfg(test)]
mod tests {
    use crate::config::{EngineConfig, Timeouts};
    use crate::lifecycle::LifecycleEngine;
    use crate::plan::ChangePlan;
    use kubevirt_client::mock::helpers::create_test_vm;
    use kubevirt_client::{CallKind, KubeVirtError, MockKubeVirtClient};
    use std::time::Duration;
    use vm_manifest::ManifestNode;
    use vm_spec::{DesiredSpec, ObjectKey, TransitionRequest, TransitionState, VmStatus};

    fn key() -> ObjectKey {
        ObjectKey::new("ns", "w1")
    }

    fn spec() -> DesiredSpec {
        DesiredSpec::new("w1", "img:latest", "2Gi", 2).in_namespace("ns")
    }

    fn engine(mock: &MockKubeVirtClient) -> LifecycleEngine {
        LifecycleEngine::new(Box::new(mock.clone()), EngineConfig::default())
    }

    async fn created(mock: &MockKubeVirtClient) -> VmStatus {
        let status = engine(mock)
            .apply(&spec().with_transition(TransitionRequest::Start), TransitionState::Absent)
            .await
            .unwrap();
        mock.clear_calls();
        status
    }

    #[tokio::test]
    async fn test_no_transition_reads_through() {
        let mock = MockKubeVirtClient::new();
        let status = engine(&mock).apply(&spec(), TransitionState::Running).await.unwrap();
        assert_eq!(status.state, TransitionState::Absent);

        mock.add_vm(create_test_vm(&key(), false));
        let status = engine(&mock).apply(&spec(), TransitionState::Absent).await.unwrap();
        assert_eq!(status.state, TransitionState::Stopped);
        assert_eq!(status.printable_status.as_deref(), Some("Stopped"));
        assert_eq!(mock.count(CallKind::UpdateVm), 0);
    }

    #[tokio::test]
    async fn test_stop_on_absent_makes_no_writes() {
        let mock = MockKubeVirtClient::new();
        let status = engine(&mock)
            .apply(&spec().with_transition(TransitionRequest::Stop), TransitionState::Absent)
            .await
            .unwrap();
        assert_eq!(status.state, TransitionState::Stopped);
        assert_eq!(mock.call_kinds(), vec![CallKind::GetVm]);
    }

    #[tokio::test]
    async fn test_start_when_running_still_writes() {
        let mock = MockKubeVirtClient::new();
        mock.add_vm(create_test_vm(&key(), true));
        let status = engine(&mock)
            .apply(&spec().with_transition(TransitionRequest::Start), TransitionState::Running)
            .await
            .unwrap();
        assert_eq!(status.state, TransitionState::Running);
        assert_eq!(mock.call_kinds(), vec![CallKind::GetVm, CallKind::UpdateVm]);
    }

    #[tokio::test]
    async fn test_run_strategy_objects_are_halted() {
        let mock = MockKubeVirtClient::new();
        let mut vm = create_test_vm(&key(), true);
        if let Some(spec) = vm.fields.get_mut("spec") {
            spec.remove("running");
        }
        vm.set_field(&["spec", "runStrategy"], ManifestNode::from("Always"));
        mock.add_vm(vm);

        engine(&mock)
            .apply(&spec().with_transition(TransitionRequest::Stop), TransitionState::Running)
            .await
            .unwrap();
        let stored = mock.vm(&key()).unwrap();
        assert_eq!(stored.run_strategy(), Some("Halted"));
        assert_eq!(stored.running(), None);
    }

    #[tokio::test]
    async fn test_update_conflict_is_reported() {
        let mock = MockKubeVirtClient::new();
        mock.add_vm(create_test_vm(&key(), true));
        mock.fail_next(CallKind::UpdateVm, KubeVirtError::Conflict("resourceVersion is stale".into()));

        let err = engine(&mock)
            .apply(&spec().with_transition(TransitionRequest::Stop), TransitionState::Running)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
        assert_eq!(err.identity(), "ns/w1");
    }

    #[tokio::test]
    async fn test_slow_gateway_times_out() {
        let mock = MockKubeVirtClient::new();
        mock.set_latency(Duration::from_millis(500));
        let config = EngineConfig {
            timeouts: Timeouts {
                read: Duration::from_millis(20),
                ..Timeouts::default()
            },
            ..EngineConfig::default()
        };
        let engine = LifecycleEngine::new(Box::new(mock.clone()), config);

        let err = engine.read(&key()).await.unwrap_err();
        assert_eq!(err.kind(), "remote_unavailable");
        assert!(err.message().contains("timed out"));
    }

    #[tokio::test]
    async fn test_import_existing_and_missing() {
        let mock = MockKubeVirtClient::new();
        mock.add_vm(create_test_vm(&key(), true));
        let engine = engine(&mock);

        let status = engine.import("ns/w1").await.unwrap();
        assert_eq!(status.id, "ns/w1");
        assert_eq!(status.state, TransitionState::Running);
        assert!(status.creation_timestamp.is_some());

        assert_eq!(engine.import("ns/other").await.unwrap_err().kind(), "not_found");
        assert_eq!(engine.import("just-a-name").await.unwrap_err().kind(), "validation");
        assert_eq!(engine.import("a/b/c").await.unwrap_err().kind(), "validation");
        assert_eq!(engine.import("ns/Not_Valid").await.unwrap_err().kind(), "validation");
    }

    #[tokio::test]
    async fn test_exists() {
        let mock = MockKubeVirtClient::new();
        let engine = engine(&mock);
        assert!(!engine.exists(&key()).await.unwrap());
        mock.add_vm(create_test_vm(&key(), false));
        assert!(engine.exists(&key()).await.unwrap());
    }

    #[tokio::test]
    async fn test_plan_after_create_is_noop() {
        let mock = MockKubeVirtClient::new();
        let prior = created(&mock).await;

        let plan = engine(&mock).plan(&spec(), Some(&prior)).await.unwrap();
        assert_eq!(plan, ChangePlan::NoOp);
        assert_eq!(mock.call_kinds(), vec![CallKind::GetVm]);
    }

    #[tokio::test]
    async fn test_update_in_place_keeps_run_flag() {
        let mock = MockKubeVirtClient::new();
        let prior = created(&mock).await;
        let mut desired = spec();
        desired.memory = "4Gi".to_string();

        let plan = engine(&mock).plan(&desired, Some(&prior)).await.unwrap();
        assert!(matches!(plan, ChangePlan::UpdateInPlace { .. }));

        let status = engine(&mock).update(&desired, Some(&prior)).await.unwrap();
        assert_eq!(status.state, TransitionState::Running);
        let stored = mock.vm(&key()).unwrap();
        assert_eq!(stored.running(), Some(true));
        assert_eq!(
            stored
                .field(&["spec", "template", "spec", "domain", "resources", "requests", "memory"])
                .and_then(ManifestNode::as_str),
            Some("4Gi")
        );
        assert_eq!(engine(&mock).plan(&desired, Some(&status)).await.unwrap(), ChangePlan::NoOp);
    }

    #[tokio::test]
    async fn test_update_noop_with_stop_only_flips_run_flag() {
        let mock = MockKubeVirtClient::new();
        let prior = created(&mock).await;
        let before = mock.vm(&key()).unwrap();

        let status = engine(&mock)
            .update(&spec().with_transition(TransitionRequest::Stop), Some(&prior))
            .await
            .unwrap();
        assert_eq!(status.state, TransitionState::Stopped);
        assert_eq!(status.transition, Some(TransitionRequest::Stop));

        let after = mock.vm(&key()).unwrap();
        assert_eq!(after.running(), Some(false));
        assert_eq!(after.field(&["spec", "template"]), before.field(&["spec", "template"]));
    }

    #[tokio::test]
    async fn test_update_without_changes_writes_nothing() {
        let mock = MockKubeVirtClient::new();
        let prior = created(&mock).await;
        let status = engine(&mock).update(&spec(), Some(&prior)).await.unwrap();
        assert_eq!(status.state, TransitionState::Running);
        assert_eq!(mock.call_kinds(), vec![CallKind::GetVm]);
    }

    #[tokio::test]
    async fn test_rename_replaces_object() {
        let mock = MockKubeVirtClient::new();
        let prior = created(&mock).await;
        let mut renamed = spec().with_transition(TransitionRequest::Start);
        renamed.name = "w2".to_string();

        let plan = engine(&mock).plan(&renamed, Some(&prior)).await.unwrap();
        assert_eq!(plan, ChangePlan::Replace { previous: key() });
        mock.clear_calls();

        let status = engine(&mock).update(&renamed, Some(&prior)).await.unwrap();
        assert_eq!(status.id, "ns/w2");
        assert_eq!(status.state, TransitionState::Created);
        assert!(mock.vm(&key()).is_none());
        assert!(mock.vm(&ObjectKey::new("ns", "w2")).is_some());
        assert_eq!(
            mock.call_kinds(),
            vec![CallKind::CreateVm, CallKind::DeleteVm, CallKind::DeleteSecret]
        );
    }

    #[tokio::test]
    async fn test_rename_onto_taken_name_keeps_previous() {
        let mock = MockKubeVirtClient::new();
        let prior = created(&mock).await;
        mock.add_vm(create_test_vm(&ObjectKey::new("ns", "w2"), false));
        mock.clear_calls();
        let mut renamed = spec().with_transition(TransitionRequest::Start);
        renamed.name = "w2".to_string();

        let err = engine(&mock).update(&renamed, Some(&prior)).await.unwrap_err();
        assert_eq!(err.kind(), "conflict");
        assert_eq!(err.identity(), "ns/w2");
        assert!(mock.vm(&key()).is_some());
        assert_eq!(mock.count(CallKind::DeleteVm), 0);
        assert_eq!(mock.call_kinds(), vec![CallKind::CreateVm]);
    }

    #[tokio::test]
    async fn test_update_stop_on_absent_creates_nothing() {
        let mock = MockKubeVirtClient::new();
        let status = engine(&mock)
            .update(&spec().with_transition(TransitionRequest::Stop), None)
            .await
            .unwrap();
        assert_eq!(status.state, TransitionState::Stopped);
        assert_eq!(status.transition, Some(TransitionRequest::Stop));
        assert_eq!(mock.count(CallKind::CreateVm), 0);
        assert_eq!(mock.call_kinds(), vec![CallKind::GetVm]);
        assert!(mock.vm(&key()).is_none());
    }

    #[tokio::test]
    async fn test_update_start_on_running_writes_nothing() {
        let mock = MockKubeVirtClient::new();
        let prior = created(&mock).await;
        let status = engine(&mock)
            .update(&spec().with_transition(TransitionRequest::Start), Some(&prior))
            .await
            .unwrap();
        assert_eq!(status.state, TransitionState::Running);
        assert_eq!(status.transition, Some(TransitionRequest::Start));
        assert_eq!(mock.call_kinds(), vec![CallKind::GetVm]);
    }

    #[tokio::test]
    async fn test_update_with_delete_transition_deletes() {
        let mock = MockKubeVirtClient::new();
        let prior = created(&mock).await;
        let status = engine(&mock)
            .update(&spec().with_transition(TransitionRequest::Delete), Some(&prior))
            .await
            .unwrap();
        assert_eq!(status.state, TransitionState::Absent);
        assert!(mock.vm(&key()).is_none());
    }

    #[tokio::test]
    async fn test_update_growing_cloud_init_adds_secret() {
        let mock = MockKubeVirtClient::new();
        let prior = created(&mock).await;
        let mut desired = spec();
        desired.cloud_init = Some("y".repeat(4096));

        engine(&mock).update(&desired, Some(&prior)).await.unwrap();
        assert_eq!(mock.call_kinds(), vec![CallKind::GetVm, CallKind::CreateSecret, CallKind::UpdateVm]);
        assert!(mock.secret(&ObjectKey::new("ns", "coder-w1-cloudinit")).is_some());
    }

    #[tokio::test]
    async fn test_secret_kept_when_cleanup_disabled() {
        let mock = MockKubeVirtClient::new();
        let config = EngineConfig {
            cleanup_overflow_secret: false,
            ..EngineConfig::default()
        };
        let engine = LifecycleEngine::new(Box::new(mock.clone()), config);
        engine.delete(&key()).await.unwrap();
        assert_eq!(mock.call_kinds(), vec![CallKind::DeleteVm]);
    }

    #[tokio::test]
    async fn test_secret_delete_failure_is_surfaced() {
        let mock = MockKubeVirtClient::new();
        mock.add_vm(create_test_vm(&key(), false));
        mock.fail_next(CallKind::DeleteSecret, KubeVirtError::Api("forbidden".into()));

        let err = engine(&mock).delete(&key()).await.unwrap_err();
        assert_eq!(err.kind(), "remote_unavailable");
        assert!(mock.vm(&key()).is_none());
    }
}
