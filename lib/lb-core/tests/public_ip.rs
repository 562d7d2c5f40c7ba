mod common;

use common::*;
use lb_api::Protocol;
use lb_core::model::{IpAllocationMethod, PublicIpAddress};
use lb_core::public_ip::PublicIpManager;
use lb_core::{CloudError, MemoryProvider, ProviderCall, ResourceKind, Verb};
use std::sync::Arc;

fn manager(provider: &MemoryProvider) -> PublicIpManager {
    PublicIpManager::new(Arc::new(test_config()), provider.public_ips.clone())
}

fn address(name: &str, ip: &str, owner: Option<&str>) -> PublicIpAddress {
    let mut pip = match owner {
        Some(owner) => PublicIpAddress::for_service(name, "westus", owner),
        None => PublicIpAddress {
            name: name.to_string(),
            location: "westus".to_string(),
            public_ip_allocation_method: Some(IpAllocationMethod::Static),
            ..Default::default()
        },
    };
    pip.ip_address = Some(ip.to_string());
    pip
}

#[tokio::test]
async fn test_exposed_service_gets_tagged_static_address() {
    let provider = test_provider();
    let svc = test_service("servicea", Protocol::Tcp, &[80]);

    let pip = manager(&provider)
        .reconcile(CLUSTER, &svc, true)
        .await
        .unwrap()
        .expect("public IP");

    assert_eq!(pip.name, "testCluster-aservicea");
    assert_eq!(pip.owner(), Some("default/servicea"));
    assert_eq!(pip.cluster(), Some(CLUSTER));
    assert_eq!(pip.public_ip_allocation_method, Some(IpAllocationMethod::Static));
    assert!(pip.ip_address.is_some());
}

#[tokio::test]
async fn test_existing_address_is_kept() {
    let provider = test_provider();
    let ips = manager(&provider);
    let svc = test_service("servicea", Protocol::Tcp, &[80]);
    let first = ips.reconcile(CLUSTER, &svc, true).await.unwrap();
    provider.journal.clear().await;

    let second = ips.reconcile(CLUSTER, &svc, true).await.unwrap();

    assert_eq!(first, second);
    assert!(provider.journal.writes().await.is_empty());
}

#[tokio::test]
async fn test_stale_rename_is_deleted() {
    let provider = test_provider();
    provider
        .public_ips
        .insert(GROUP, address("oldCluster-aservicea", "52.0.0.1", Some("default/servicea")))
        .await;
    let svc = test_service("servicea", Protocol::Tcp, &[80]);

    manager(&provider).reconcile(CLUSTER, &svc, true).await.unwrap();

    assert!(provider.public_ips.snapshot(GROUP, "oldCluster-aservicea").await.is_none());
    assert!(provider.public_ips.snapshot(GROUP, "testCluster-aservicea").await.is_some());
}

#[tokio::test]
async fn test_name_collision_is_replaced() {
    let provider = test_provider();
    provider
        .public_ips
        .insert(GROUP, address("testCluster-aservicea", "52.0.0.1", Some("other/service")))
        .await;
    let svc = test_service("servicea", Protocol::Tcp, &[80]);

    let pip = manager(&provider)
        .reconcile(CLUSTER, &svc, true)
        .await
        .unwrap()
        .expect("public IP");

    assert_eq!(pip.owner(), Some("default/servicea"));
    assert_eq!(
        provider.journal.writes().await,
        vec![
            ProviderCall::new(Verb::Delete, ResourceKind::PublicIpAddress, "testCluster-aservicea"),
            ProviderCall::new(
                Verb::CreateOrUpdate,
                ResourceKind::PublicIpAddress,
                "testCluster-aservicea"
            ),
        ]
    );
}

#[tokio::test]
async fn test_other_services_addresses_are_untouched() {
    let provider = test_provider();
    provider
        .public_ips
        .insert(GROUP, address("testCluster-aserviceb", "52.0.0.2", Some("default/serviceb")))
        .await;
    let svc = test_service("servicea", Protocol::Tcp, &[80]);
    let ips = manager(&provider);

    ips.reconcile(CLUSTER, &svc, true).await.unwrap();
    ips.reconcile(CLUSTER, &svc, false).await.unwrap();

    assert!(provider.public_ips.snapshot(GROUP, "testCluster-aserviceb").await.is_some());
    assert_eq!(provider.public_ips.len(GROUP).await, 1);
}

#[tokio::test]
async fn test_release_deletes_address() {
    let provider = test_provider();
    let ips = manager(&provider);
    let svc = test_service("servicea", Protocol::Tcp, &[80]);
    ips.reconcile(CLUSTER, &svc, true).await.unwrap();

    let released = ips.reconcile(CLUSTER, &svc, false).await.unwrap();

    assert!(released.is_none());
    assert_eq!(provider.public_ips.len(GROUP).await, 0);
}

#[tokio::test]
async fn test_release_of_absent_address_succeeds() {
    let provider = test_provider();
    let svc = test_service("servicea", Protocol::Tcp, &[80]);

    let released = manager(&provider).reconcile(CLUSTER, &svc, false).await.unwrap();

    assert!(released.is_none());
    assert_eq!(
        provider.journal.writes().await,
        vec![ProviderCall::new(
            Verb::Delete,
            ResourceKind::PublicIpAddress,
            "testCluster-aservicea"
        )]
    );
}

#[tokio::test]
async fn test_internal_service_releases_address() {
    let provider = test_provider();
    let ips = manager(&provider);
    let svc = test_service("servicea", Protocol::Tcp, &[80]);
    ips.reconcile(CLUSTER, &svc, true).await.unwrap();

    let internal = svc.clone().internal(None);
    let pip = ips.reconcile(CLUSTER, &internal, true).await.unwrap();

    assert!(pip.is_none());
    assert_eq!(provider.public_ips.len(GROUP).await, 0);
}

#[tokio::test]
async fn test_pinned_address_is_adopted() {
    let provider = test_provider();
    provider
        .public_ips
        .insert(GROUP, address("reserved", "52.0.0.9", None))
        .await;
    let mut svc = test_service("servicea", Protocol::Tcp, &[80]);
    svc.load_balancer_ip = Some("52.0.0.9".to_string());
    let ips = manager(&provider);

    assert_eq!(ips.determine_name(CLUSTER, &svc).await.unwrap(), "reserved");
    let pip = ips.reconcile(CLUSTER, &svc, true).await.unwrap().expect("public IP");

    assert_eq!(pip.name, "reserved");
    assert_eq!(pip.ip_address.as_deref(), Some("52.0.0.9"));
    assert!(provider.journal.writes().await.is_empty());
}

#[tokio::test]
async fn test_missing_pinned_address_fails() {
    let provider = test_provider();
    let mut svc = test_service("servicea", Protocol::Tcp, &[80]);
    svc.load_balancer_ip = Some("52.0.0.9".to_string());

    let err = manager(&provider).reconcile(CLUSTER, &svc, true).await.unwrap_err();

    assert!(matches!(err, CloudError::PinnedPublicIpNotFound(ip) if ip == "52.0.0.9"));
    assert!(provider.journal.writes().await.is_empty());
}

#[tokio::test]
async fn test_other_clusters_address_is_untouched() {
    let provider = test_provider();
    let foreign = address("otherCluster-aservicea", "52.0.0.3", Some("default/servicea"))
        .with_cluster("otherCluster");
    provider.public_ips.insert(GROUP, foreign).await;
    let svc = test_service("servicea", Protocol::Tcp, &[80]);
    let ips = manager(&provider);

    ips.reconcile(CLUSTER, &svc, true).await.unwrap();
    ips.reconcile(CLUSTER, &svc, false).await.unwrap();

    assert!(provider
        .public_ips
        .snapshot(GROUP, "otherCluster-aservicea")
        .await
        .is_some());
    assert_eq!(provider.public_ips.len(GROUP).await, 1);
}

#[tokio::test]
async fn test_acquire_keeps_previous_address_until_released() {
    let provider = test_provider();
    let ips = manager(&provider);
    let svc = test_service("servicea", Protocol::Tcp, &[80]);
    ips.reconcile(CLUSTER, &svc, true).await.unwrap();
    reserve_public_ip(&provider, "reserved", "52.0.0.9").await;

    let mut pinned = svc.clone();
    pinned.load_balancer_ip = Some("52.0.0.9".to_string());
    let pip = ips.acquire(CLUSTER, &pinned, true).await.unwrap();

    assert_eq!(pip.as_ref().map(|pip| pip.name.as_str()), Some("reserved"));
    assert!(provider
        .public_ips
        .snapshot(GROUP, "testCluster-aservicea")
        .await
        .is_some());

    ips.release(CLUSTER, &pinned, pip.as_ref()).await.unwrap();

    assert!(provider
        .public_ips
        .snapshot(GROUP, "testCluster-aservicea")
        .await
        .is_none());
    assert!(provider.public_ips.snapshot(GROUP, "reserved").await.is_some());
}
