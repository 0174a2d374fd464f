//! End-to-end workflow scenarios against the in-memory provider.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rstest::{fixture, rstest};

use cloud_gaming_operator::test_support::{FakeCompute, test_scope};
use cloud_gaming_operator::{CreateOutcome, FixedClock, LifecycleController};

#[fixture]
fn evening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 11, 30, 5)
        .single()
        .expect("valid timestamp")
}

#[rstest]
#[tokio::test]
async fn create_from_golden_image(evening: DateTime<Utc>) {
    let fake = FakeCompute::new().with_machine_image("golden");
    let controller =
        LifecycleController::with_clock(fake.clone(), test_scope(), FixedClock(evening));
    let mut out = Vec::new();

    let outcome = controller
        .ensure_running(&mut out)
        .await
        .expect("create should succeed");

    assert_eq!(
        outcome,
        CreateOutcome::Created {
            instance: String::from("instance-2024-03-15-20-30-05"),
            image: String::from("golden"),
        }
    );
    let instances = fake.instances();
    assert_eq!(instances.len(), 1);
    assert_eq!(
        instances.first().and_then(|i| i.status.as_deref()),
        Some("RUNNING")
    );
    assert_eq!(fake.machine_image_names(), vec![String::from("golden")]);
}

#[rstest]
#[tokio::test]
async fn create_then_remove_leaves_only_the_new_backup(evening: DateTime<Utc>) {
    let fake = FakeCompute::new()
        .with_machine_image("golden")
        .with_polls_before_done(1);
    let mut out = Vec::new();

    LifecycleController::with_clock(fake.clone(), test_scope(), FixedClock(evening))
        .with_poller(cloud_gaming_operator::Poller::new(std::time::Duration::ZERO))
        .ensure_running(&mut out)
        .await
        .expect("create should succeed");

    let later = evening + ChronoDuration::hours(3);
    let summary = LifecycleController::with_clock(fake.clone(), test_scope(), FixedClock(later))
        .with_poller(cloud_gaming_operator::Poller::new(std::time::Duration::ZERO))
        .snapshot_and_terminate(&mut out)
        .await
        .expect("remove should succeed");

    assert_eq!(summary.instance, "instance-2024-03-15-20-30-05");
    assert_eq!(summary.backup_image, "backup-2024-03-15-23-30-05");
    assert_eq!(summary.deleted_images, vec![String::from("golden")]);
    assert!(fake.instances().is_empty());
    assert_eq!(
        fake.machine_image_names(),
        vec![String::from("backup-2024-03-15-23-30-05")]
    );

    let backup = fake
        .machine_images()
        .into_iter()
        .next()
        .expect("backup image");
    assert_eq!(
        backup.description.as_deref(),
        Some("Machine image created at 2024-03-15 23:30:05")
    );
    assert_eq!(
        backup.source_instance.as_deref(),
        Some("projects/gaming-project/zones/asia-northeast1-a/instances/instance-2024-03-15-20-30-05")
    );
}

#[rstest]
#[tokio::test]
async fn repeated_create_is_idempotent(evening: DateTime<Utc>) {
    let fake = FakeCompute::new().with_machine_image("golden");
    let controller =
        LifecycleController::with_clock(fake.clone(), test_scope(), FixedClock(evening));
    let mut first = Vec::new();
    let mut second = Vec::new();

    controller
        .ensure_running(&mut first)
        .await
        .expect("first create");
    let outcome = controller
        .ensure_running(&mut second)
        .await
        .expect("second create");

    assert_eq!(outcome, CreateOutcome::AlreadyRunning);
    assert_eq!(fake.instances().len(), 1);
    let text = String::from_utf8(second).expect("utf8");
    assert!(
        text.starts_with("Instance is already running.\nName: instance-2024-03-15-20-30-05"),
        "output: {text}"
    );
}
