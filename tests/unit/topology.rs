//! Unit tests for master and replica resolution

use mysql_operator::topology::TopologyResolver;

use crate::common::*;

const ORC: &str = "http://orc:3000/api";

mod primary {
    use super::*;

    #[tokio::test]
    async fn test_without_orchestrator_uses_first_member() {
        let topology = FakeConnector::new(FakeOrchestrator::new().with_master("elsewhere"));
        let cluster = create_test_cluster("foo", "db", 3);

        let host = TopologyResolver::new(&topology).resolve_primary(&cluster).await;
        assert_eq!(host, "foo-mysql-0.foo-mysql.db");
        assert!(topology.connects().is_empty());
    }

    #[tokio::test]
    async fn test_orchestrator_answer_wins() {
        let topology = FakeConnector::new(
            FakeOrchestrator::new().with_master("foo-mysql-2.foo-mysql.db"),
        );
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .build();

        let host = TopologyResolver::new(&topology).resolve_primary(&cluster).await;
        assert_eq!(host, "foo-mysql-2.foo-mysql.db");
        assert_eq!(topology.client().aliases(), vec!["foo.db".to_string()]);
    }

    #[tokio::test]
    async fn test_query_failure_falls_back() {
        let topology = FakeConnector::new(FakeOrchestrator::new());
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .build();

        let host = TopologyResolver::new(&topology).resolve_primary(&cluster).await;
        assert_eq!(host, "foo-mysql-0.foo-mysql.db");
        assert_eq!(topology.client().master_calls(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_falls_back() {
        let topology = FakeConnector::refusing();
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .build();

        let host = TopologyResolver::new(&topology).resolve_primary(&cluster).await;
        assert_eq!(host, "foo-mysql-0.foo-mysql.db");
    }
}

mod secondary {
    use super::*;

    #[tokio::test]
    async fn test_no_ready_nodes_uses_first_member_without_querying() {
        let topology = FakeConnector::new(
            FakeOrchestrator::new().with_replicas(&[("foo-mysql-1.foo-mysql.db", Some(0))]),
        );
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .build();

        let host = TopologyResolver::new(&topology)
            .resolve_healthy_secondary(&cluster)
            .await;
        assert_eq!(host, "foo-mysql-0.foo-mysql.db");
        assert_eq!(topology.client().replica_calls(), 0);
    }

    #[tokio::test]
    async fn test_without_orchestrator_uses_last_ready_member() {
        let topology = FakeConnector::refusing();
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_ready_nodes(3)
            .build();

        let host = TopologyResolver::new(&topology)
            .resolve_healthy_secondary(&cluster)
            .await;
        assert_eq!(host, "foo-mysql-2.foo-mysql.db");
    }

    #[tokio::test]
    async fn test_lagging_replica_is_skipped() {
        let topology = FakeConnector::new(FakeOrchestrator::new().with_replicas(&[
            ("foo-mysql-1.foo-mysql.db", Some(3)),
            ("foo-mysql-2.foo-mysql.db", Some(10)),
        ]));
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .with_ready_nodes(3)
            .build();

        let host = TopologyResolver::new(&topology)
            .resolve_healthy_secondary(&cluster)
            .await;
        assert_eq!(host, "foo-mysql-1.foo-mysql.db");
    }

    #[tokio::test]
    async fn test_last_healthy_replica_wins() {
        let topology = FakeConnector::new(FakeOrchestrator::new().with_replicas(&[
            ("foo-mysql-1.foo-mysql.db", Some(3)),
            ("foo-mysql-2.foo-mysql.db", Some(2)),
        ]));
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .with_ready_nodes(3)
            .build();

        let host = TopologyResolver::new(&topology)
            .resolve_healthy_secondary(&cluster)
            .await;
        assert_eq!(host, "foo-mysql-2.foo-mysql.db");
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive_and_unknown_lag_is_unhealthy() {
        let topology = FakeConnector::new(FakeOrchestrator::new().with_replicas(&[
            ("foo-mysql-1.foo-mysql.db", Some(5)),
            ("foo-mysql-2.foo-mysql.db", None),
        ]));
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .with_ready_nodes(3)
            .build();

        let host = TopologyResolver::new(&topology)
            .resolve_healthy_secondary(&cluster)
            .await;
        assert_eq!(host, "foo-mysql-1.foo-mysql.db");
    }

    #[tokio::test]
    async fn test_no_healthy_replica_falls_back() {
        let topology = FakeConnector::new(
            FakeOrchestrator::new().with_replicas(&[("foo-mysql-1.foo-mysql.db", Some(60))]),
        );
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .with_ready_nodes(2)
            .build();

        let host = TopologyResolver::new(&topology)
            .resolve_healthy_secondary(&cluster)
            .await;
        assert_eq!(host, "foo-mysql-1.foo-mysql.db");
    }

    #[tokio::test]
    async fn test_query_failure_falls_back() {
        let topology = FakeConnector::new(FakeOrchestrator::new());
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator(ORC)
            .with_ready_nodes(3)
            .build();

        let host = TopologyResolver::new(&topology)
            .resolve_healthy_secondary(&cluster)
            .await;
        assert_eq!(host, "foo-mysql-2.foo-mysql.db");
        assert_eq!(topology.client().replica_calls(), 1);
        assert_eq!(topology.client().aliases(), vec!["foo.db".to_string()]);
    }
}
