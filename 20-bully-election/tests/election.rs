//! End-to-end elections between real processes over loopback TCP.

mod support;

use std::time::Duration;

use anyhow::Result;
use bully_election::Role;

use support::{TestCluster, fast_timings};

const CONVERGE: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn three_processes_agree_on_the_highest_id() -> Result<()> {
    let cluster = TestCluster::spawn(&[1, 2, 3], fast_timings()).await?;

    cluster.wait_for_consensus(3, CONVERGE).await?;
    assert_eq!(cluster.node(3).status().role, Role::Coordinator);
    assert_ne!(cluster.node(1).status().role, Role::Coordinator);
    assert_ne!(cluster.node(2).status().role, Role::Coordinator);

    cluster.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn larger_group_with_sparse_ids_converges() -> Result<()> {
    let cluster = TestCluster::spawn(&[2, 7, 11, 40, 41], fast_timings()).await?;

    cluster.wait_for_consensus(41, CONVERGE).await?;

    cluster.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn next_highest_takes_over_after_coordinator_crash() -> Result<()> {
    let mut cluster = TestCluster::spawn(&[1, 2, 3], fast_timings()).await?;
    cluster.wait_for_consensus(3, CONVERGE).await?;

    cluster.stop(3).await;

    cluster.wait_for_consensus(2, CONVERGE).await?;
    assert_eq!(cluster.node(2).status().role, Role::Coordinator);

    cluster.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sole_survivor_elects_itself() -> Result<()> {
    let mut cluster = TestCluster::spawn(&[1, 2, 3], fast_timings()).await?;
    cluster.wait_for_consensus(3, CONVERGE).await?;

    cluster.stop(3).await;
    cluster.stop(2).await;

    cluster.wait_for_consensus(1, CONVERGE).await?;
    assert_eq!(cluster.live_ids(), vec![1]);
    assert_eq!(cluster.node(1).status().role, Role::Coordinator);

    cluster.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn restarted_highest_process_reclaims_leadership() -> Result<()> {
    let mut cluster = TestCluster::spawn(&[1, 2, 3], fast_timings()).await?;
    cluster.wait_for_consensus(3, CONVERGE).await?;

    cluster.stop(3).await;
    cluster.wait_for_consensus(2, CONVERGE).await?;

    // The new incarnation knows no coordinator and has no higher peer, so its
    // first election after the settle delay makes it coordinator again.
    cluster.restart(3).await?;
    cluster.wait_for_consensus(3, CONVERGE).await?;

    cluster.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_process_group_is_its_own_coordinator() -> Result<()> {
    let cluster = TestCluster::spawn(&[9], fast_timings()).await?;

    cluster.wait_for_consensus(9, CONVERGE).await?;
    assert!(!cluster.node(9).status().in_election);

    cluster.shutdown().await;
    Ok(())
}
