//! End-to-end resize scenarios.
//!
//! Each test seeds an in-memory backend with one instance whose root
//! volume sits at a given size and modification state, then runs the
//! components or the whole pipeline against it.

use std::time::Duration;

use volgrow_core::*;
use volgrow_driver::{DriverError, Pipeline};
use volgrow_resize::{check_state, initiate};

fn growth(max_size_gib: u32) -> GrowthConfig {
    GrowthConfig {
        instance_id: Some("i-0abc".to_string()),
        root_device_name: "/dev/xvda".to_string(),
        growth_percent: 20.0,
        max_size_gib,
    }
}

async fn seeded(size: u32, modifications: Vec<Modification>) -> MemoryCloud {
    let cloud = MemoryCloud::new();
    cloud
        .put_instance(Instance {
            id: "i-0abc".to_string(),
            block_device_mappings: vec![BlockDeviceMapping {
                device_name: "/dev/xvda".to_string(),
                volume_id: Some("vol-0root".to_string()),
            }],
        })
        .await;
    cloud
        .put_volume(Volume {
            id: "vol-0root".to_string(),
            size,
            modifications,
        })
        .await;
    cloud
}

#[tokio::test]
async fn scenario_a_grows_by_percentage() {
    let cloud = seeded(100, vec![]).await;

    let outcome = initiate(&cloud, &growth(200)).await.unwrap();
    let record = outcome.resize().expect("resize initiated");
    assert_eq!(record.instance_id, "i-0abc");
    assert_eq!(record.volume_id, "vol-0root");
    assert_eq!(record.new_size, 120);

    let requests = cloud.modify_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target_size, 120);

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "initiated");
    assert_eq!(json["new_size"], 120);
    assert!(json["modification_time"].as_str().is_some());
}

#[tokio::test]
async fn scenario_b_clamps_to_ceiling() {
    let cloud = seeded(180, vec![]).await;

    let outcome = initiate(&cloud, &growth(200)).await.unwrap();
    assert_eq!(outcome.resize().unwrap().new_size, 200);
    assert_eq!(cloud.modify_requests().await[0].target_size, 200);
}

#[tokio::test]
async fn scenario_c_skips_at_ceiling() {
    let cloud = seeded(200, vec![]).await;

    let outcome = initiate(&cloud, &growth(200)).await.unwrap();
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json, serde_json::json!({"status": "skipped", "reason": "already at max size"}));
    assert!(cloud.modify_requests().await.is_empty());
}

#[tokio::test]
async fn scenario_d_conflicts_while_optimizing() {
    let cloud = seeded(
        100,
        vec![Modification::new(ModificationState::Optimizing, 100)],
    )
    .await;

    let err = initiate(&cloud, &growth(200)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let msg = err.to_string();
    assert!(msg.contains("vol-0root"), "{msg}");
    assert!(msg.contains("optimizing"), "{msg}");
    assert!(cloud.modify_requests().await.is_empty());
}

#[tokio::test]
async fn scenario_e_empty_history_reads_completed() {
    let cloud = seeded(100, vec![]).await;

    let record = check_state(&cloud, "vol-0root").await.unwrap();
    assert_eq!(record.state, ModificationState::Completed);
}

#[tokio::test]
async fn pipeline_end_to_end() {
    let cloud = seeded(100, vec![]).await;
    cloud.set_auto_progress(true).await;

    let config = VolgrowConfig {
        growth: growth(200),
        poll: PollConfig::new(Duration::from_millis(1), 20),
        retry: RetryConfig::new(Duration::from_millis(1), Duration::from_millis(1), 2),
        ..VolgrowConfig::default()
    };
    let pipeline = Pipeline::new(cloud.clone(), cloud.clone(), config);

    let ctx = pipeline.run().await.unwrap();
    assert_eq!(ctx.instance_id, "i-0abc");
    assert_eq!(ctx.volume_id(), Some("vol-0root"));
    assert_eq!(ctx.modification.unwrap().state, ModificationState::Completed);

    let expansion = ctx.expansion.unwrap();
    assert_eq!(expansion.status, "partition_expanded");

    let submitted = cloud.submitted_commands().await;
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        submitted[0].commands,
        vec![
            "sudo growpart /dev/nvme0n1 1".to_string(),
            "sudo resize2fs /dev/nvme0n1p1".to_string(),
        ]
    );
    assert_eq!(cloud.volume("vol-0root").await.unwrap().size, 120);

    // The next run grows from the freshly applied size.
    let ctx = pipeline.run().await.unwrap();
    assert_eq!(ctx.resize.unwrap().resize().unwrap().new_size, 144);
}

#[tokio::test]
async fn persisted_context_resumes() {
    let cloud = seeded(100, vec![]).await;
    cloud.set_auto_progress(true).await;

    let config = VolgrowConfig {
        growth: growth(200),
        poll: PollConfig::new(Duration::from_millis(1), 20),
        ..VolgrowConfig::default()
    };
    let pipeline = Pipeline::new(cloud.clone(), cloud.clone(), config);

    // A driver that stopped right after the initiate step.
    let mut ctx = PipelineContext::new("i-0abc");
    ctx.resize = Some(initiate(&cloud, &pipeline.config().growth).await.unwrap());
    let persisted = serde_json::to_string(&ctx).unwrap();

    let restored: PipelineContext = serde_json::from_str(&persisted).unwrap();
    let done = pipeline.resume(restored).await.unwrap();
    assert!(done.is_finished());
    assert_eq!(cloud.modify_requests().await.len(), 1);
}

#[tokio::test]
async fn pipeline_without_instance_id_is_misconfigured() {
    let cloud = seeded(100, vec![]).await;
    let config = VolgrowConfig::default();

    let err = Pipeline::new(cloud.clone(), cloud, config)
        .run()
        .await
        .unwrap_err();
    match err {
        DriverError::Step(e) => assert_eq!(e.kind(), ErrorKind::Misconfiguration),
        other => panic!("unexpected error: {other}"),
    }
}
