//! Unit tests for ordered synchronization

use tokio_util::sync::CancellationToken;

use mysql_operator::controller::events::{EventSeverity, reasons};
use mysql_operator::controller::sync::{SyncError, SyncOutcome, Synchronizer};
use mysql_operator::crd::ResourceName;

use crate::common::*;

const ORC: &str = "http://orc:3000/api";

mod ordering {
    use super::*;

    #[tokio::test]
    async fn test_every_resource_in_order() {
        let syncer = FakeSyncer::new();
        let events = RecordingEvents::new();
        let topology = FakeConnector::refusing();
        let cluster = create_test_cluster("foo", "db", 3);

        let report = Synchronizer::new(&syncer, &events, &topology)
            .synchronize(&CancellationToken::new(), &cluster)
            .await
            .unwrap();

        assert_eq!(syncer.calls(), ResourceName::ORDERED.to_vec());
        assert_eq!(report.outcomes.len(), 5);
        assert!(report.warnings.is_empty());
        assert!(events.events().is_empty());
    }

    #[tokio::test]
    async fn test_failure_stops_the_run() {
        let syncer = FakeSyncer::new().failing_on(ResourceName::NetworkEndpoint);
        let events = RecordingEvents::new();
        let topology = FakeConnector::new(FakeOrchestrator::new());
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .with_ready_nodes(3)
            .build();

        let err = Synchronizer::new(&syncer, &events, &topology)
            .synchronize(&CancellationToken::new(), &cluster)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Some(ResourceName::NetworkEndpoint));
        assert!(err.to_string().starts_with("foo-mysql sync failed: "));

        assert_eq!(syncer.call_count(ResourceName::Workload), 0);
        assert_eq!(syncer.call_count(ResourceName::BackupSchedule), 0);

        let recorded = events.events();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].severity, EventSeverity::Warning);
        assert_eq!(recorded[0].reason, reasons::SERVICE_FAILED);
        assert_eq!(recorded[0].message, err.to_string());

        // No registration after a failed run
        assert!(topology.connects().is_empty());
    }

    #[tokio::test]
    async fn test_first_resource_failure() {
        let syncer = FakeSyncer::new().failing_on(ResourceName::Secret);
        let events = RecordingEvents::new();
        let topology = FakeConnector::refusing();
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_secret_name("creds")
            .build();

        let err = Synchronizer::new(&syncer, &events, &topology)
            .synchronize(&CancellationToken::new(), &cluster)
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("creds sync failed: "));
        assert_eq!(syncer.calls(), vec![ResourceName::Secret]);
        assert_eq!(events.reasons(), vec![reasons::DB_SECRET_FAILED]);
    }
}

mod events {
    use super::*;

    #[tokio::test]
    async fn test_only_changes_emit_events() {
        let syncer = FakeSyncer::new()
            .with_outcome(ResourceName::ConfigArtifact, SyncOutcome::Updated)
            .with_outcome(ResourceName::Workload, SyncOutcome::Created)
            .with_outcome(ResourceName::BackupSchedule, SyncOutcome::Skipped);
        let events = RecordingEvents::new();
        let topology = FakeConnector::refusing();
        let cluster = create_test_cluster("foo", "db", 1);

        let report = Synchronizer::new(&syncer, &events, &topology)
            .synchronize(&CancellationToken::new(), &cluster)
            .await
            .unwrap();

        assert_eq!(
            events.reasons(),
            vec![reasons::CONFIG_MAP_UPDATED, reasons::SFS_UPDATED]
        );
        assert!(
            events
                .events()
                .iter()
                .all(|e| e.severity == EventSeverity::Normal)
        );
        assert_eq!(
            report.outcome(ResourceName::BackupSchedule),
            Some(SyncOutcome::Skipped)
        );
        assert_eq!(
            report.outcome(ResourceName::Secret),
            Some(SyncOutcome::UpToDate)
        );
    }

    #[tokio::test]
    async fn test_second_run_without_changes_is_quiet() {
        let events = RecordingEvents::new();
        let topology = FakeConnector::refusing();
        let cluster = create_test_cluster("foo", "db", 1);

        let created = FakeSyncer::new()
            .with_outcome(ResourceName::Secret, SyncOutcome::Created)
            .with_outcome(ResourceName::Workload, SyncOutcome::Created);
        Synchronizer::new(&created, &events, &topology)
            .synchronize(&CancellationToken::new(), &cluster)
            .await
            .unwrap();
        let after_first = events.events().len();

        let unchanged = FakeSyncer::new();
        Synchronizer::new(&unchanged, &events, &topology)
            .synchronize(&CancellationToken::new(), &cluster)
            .await
            .unwrap();

        assert_eq!(after_first, 2);
        assert_eq!(events.events().len(), after_first);
    }
}

mod registration {
    use super::*;

    #[tokio::test]
    async fn test_ready_members_are_registered() {
        let syncer = FakeSyncer::new();
        let events = RecordingEvents::new();
        let topology = FakeConnector::new(FakeOrchestrator::new());
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .with_ready_nodes(2)
            .build();

        let report = Synchronizer::new(&syncer, &events, &topology)
            .synchronize(&CancellationToken::new(), &cluster)
            .await
            .unwrap();

        assert!(report.warnings.is_empty());
        assert_eq!(topology.connects(), vec![ORC.to_string()]);
        assert_eq!(
            topology.client().discovered(),
            vec![
                ("foo-mysql-0.foo-mysql.db".to_string(), 3306),
                ("foo-mysql-1.foo-mysql.db".to_string(), 3306),
            ]
        );
    }

    #[tokio::test]
    async fn test_registration_is_best_effort() {
        let syncer = FakeSyncer::new();
        let events = RecordingEvents::new();
        let topology = FakeConnector::new(
            FakeOrchestrator::new().failing_discover("foo-mysql-1.foo-mysql.db"),
        );
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .with_ready_nodes(3)
            .build();

        let report = Synchronizer::new(&syncer, &events, &topology)
            .synchronize(&CancellationToken::new(), &cluster)
            .await
            .unwrap();

        // every member is attempted even after a failure
        assert_eq!(topology.client().discovered().len(), 3);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(
            report.warnings[0].host.as_deref(),
            Some("foo-mysql-1.foo-mysql.db")
        );
        assert!(events.events().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_orchestrator_is_a_warning() {
        let syncer = FakeSyncer::new();
        let events = RecordingEvents::new();
        let topology = FakeConnector::refusing();
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .with_ready_nodes(3)
            .build();

        let report = Synchronizer::new(&syncer, &events, &topology)
            .synchronize(&CancellationToken::new(), &cluster)
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 5);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].host, None);
    }

    #[tokio::test]
    async fn test_no_orchestrator_means_no_registration() {
        let syncer = FakeSyncer::new();
        let events = RecordingEvents::new();
        let topology = FakeConnector::new(FakeOrchestrator::new());
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_ready_nodes(3)
            .build();

        let report = Synchronizer::new(&syncer, &events, &topology)
            .synchronize(&CancellationToken::new(), &cluster)
            .await
            .unwrap();

        assert!(report.warnings.is_empty());
        assert!(topology.connects().is_empty());
    }

    #[tokio::test]
    async fn test_no_ready_members_registers_nothing() {
        let syncer = FakeSyncer::new();
        let events = RecordingEvents::new();
        let topology = FakeConnector::new(FakeOrchestrator::new());
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .build();

        Synchronizer::new(&syncer, &events, &topology)
            .synchronize(&CancellationToken::new(), &cluster)
            .await
            .unwrap();

        assert!(topology.client().discovered().is_empty());
    }
}

mod cancellation {
    use super::*;

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let syncer = FakeSyncer::new();
        let events = RecordingEvents::new();
        let topology = FakeConnector::refusing();
        let token = CancellationToken::new();
        token.cancel();

        let err = Synchronizer::new(&syncer, &events, &topology)
            .synchronize(&token, &create_test_cluster("foo", "db", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Cancelled));
        assert!(syncer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_between_resources() {
        let token = CancellationToken::new();
        let syncer = FakeSyncer::new().cancelling_after(ResourceName::ConfigArtifact, token.clone());
        let events = RecordingEvents::new();
        let topology = FakeConnector::refusing();

        let err = Synchronizer::new(&syncer, &events, &topology)
            .synchronize(&token, &create_test_cluster("foo", "db", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Cancelled));
        assert!(err.is_retryable());
        assert_eq!(
            syncer.calls(),
            vec![ResourceName::Secret, ResourceName::ConfigArtifact]
        );
        assert!(events.events().is_empty());
    }
}
