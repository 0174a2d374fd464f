//! Unit tests for the lifecycle workflows.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rstest::{fixture, rstest};

use super::*;
use crate::clock::FixedClock;
use crate::model::MachineImage;
use crate::test_support::{ComputeCall, FailPoint, FakeCompute, FakeComputeError, test_scope};

type Controller = LifecycleController<FakeCompute, FixedClock>;

#[fixture]
fn new_year() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn controller(fake: &FakeCompute, now: DateTime<Utc>) -> Controller {
    LifecycleController::with_clock(fake.clone(), test_scope(), FixedClock(now))
}

fn rendered(buf: Vec<u8>) -> String {
    String::from_utf8(buf).expect("utf8 output")
}

#[rstest]
#[tokio::test]
async fn list_reports_empty_zone(new_year: DateTime<Utc>) {
    let fake = FakeCompute::new();
    let mut out = Vec::new();

    let instances = controller(&fake, new_year)
        .list(&mut out)
        .await
        .expect("list should succeed");

    assert!(instances.is_empty());
    assert_eq!(rendered(out), "No instances are running.\n");
}

#[rstest]
#[case(Some("2024-01-01T00:00:00.000-08:00"), "2024-01-01 17:00:00 +0900 JST")]
#[case(None, "never started")]
#[tokio::test]
async fn list_renders_last_start_in_display_zone(
    new_year: DateTime<Utc>,
    #[case] last_start: Option<&str>,
    #[case] expected: &str,
) {
    let fake = FakeCompute::new().with_instance("gaming", last_start);
    let mut out = Vec::new();

    controller(&fake, new_year)
        .list(&mut out)
        .await
        .expect("list should succeed");

    assert_eq!(rendered(out), format!("Name: gaming, LastStart: {expected}\n"));
}

#[rstest]
#[tokio::test]
async fn list_rejects_malformed_timestamp(new_year: DateTime<Utc>) {
    let fake = FakeCompute::new().with_instance("gaming", Some("yesterday"));
    let mut out = Vec::new();

    let err = controller(&fake, new_year)
        .list(&mut out)
        .await
        .expect_err("malformed timestamp");

    assert!(
        matches!(
            err,
            LifecycleError::InvalidTimestamp { ref instance, ref value }
                if instance == "gaming" && value == "yesterday"
        ),
        "unexpected error: {err}"
    );
}

#[rstest]
#[tokio::test]
async fn list_surfaces_provider_errors(new_year: DateTime<Utc>) {
    let fake = FakeCompute::new();
    fake.fail_on(FailPoint::ListInstances);
    let mut out = Vec::new();

    let err = controller(&fake, new_year)
        .list(&mut out)
        .await
        .expect_err("listing fails");

    assert!(matches!(
        err,
        LifecycleError::Provider(FakeComputeError::Injected(_))
    ));
    assert!(out.is_empty());
}

#[rstest]
#[tokio::test]
async fn ensure_running_leaves_existing_instance_alone(new_year: DateTime<Utc>) {
    let fake = FakeCompute::new()
        .with_instance("gaming", None)
        .with_machine_image("golden");
    let mut out = Vec::new();

    let outcome = controller(&fake, new_year)
        .ensure_running(&mut out)
        .await
        .expect("create should succeed");

    assert_eq!(outcome, CreateOutcome::AlreadyRunning);
    assert_eq!(
        rendered(out),
        "Instance is already running.\nName: gaming, LastStart: never started\n"
    );
    assert_eq!(fake.calls(), vec![ComputeCall::ListInstances]);
}

#[rstest]
#[tokio::test]
async fn ensure_running_restores_the_single_image(new_year: DateTime<Utc>) {
    let fake = FakeCompute::new().with_machine_image("golden");
    let mut out = Vec::new();

    let outcome = controller(&fake, new_year)
        .ensure_running(&mut out)
        .await
        .expect("create should succeed");

    let expected_name = "instance-2024-01-01-09-00-00";
    assert_eq!(
        outcome,
        CreateOutcome::Created {
            instance: String::from(expected_name),
            image: String::from("golden"),
        }
    );
    assert!(fake.calls().contains(&ComputeCall::InsertInstance {
        name: String::from(expected_name),
        source_machine_image: String::from("global/machineImages/golden"),
    }));
    let names: Vec<String> = fake.instances().into_iter().map(|i| i.name).collect();
    assert_eq!(names, vec![String::from(expected_name)]);

    let text = rendered(out);
    assert!(text.contains("\"status\": \"DONE\""), "output: {text}");
    assert!(
        text.ends_with("Instance instance-2024-01-01-09-00-00 created from machine image golden.\n"),
        "output: {text}"
    );
}

#[rstest]
#[case(&[], 0)]
#[case(&["a", "b"], 2)]
#[tokio::test]
async fn ensure_running_requires_exactly_one_image(
    new_year: DateTime<Utc>,
    #[case] images: &[&str],
    #[case] expected_count: usize,
) {
    let fake = images
        .iter()
        .fold(FakeCompute::new(), |fake, name| fake.with_machine_image(name));
    let mut out = Vec::new();

    let err = controller(&fake, new_year)
        .ensure_running(&mut out)
        .await
        .expect_err("image cardinality must be one");

    match expected_count {
        0 => assert!(matches!(err, LifecycleError::NoMachineImage)),
        count => assert!(matches!(
            err,
            LifecycleError::AmbiguousMachineImage { count: found } if found == count
        )),
    }
    assert!(fake.instances().is_empty());
}

#[rstest]
#[tokio::test]
async fn snapshot_and_terminate_keeps_only_the_backup(new_year: DateTime<Utc>) {
    let fake = FakeCompute::new()
        .with_instance("gaming", Some("2024-01-01T00:00:00Z"))
        .with_machine_image("a")
        .with_machine_image("b")
        .with_machine_image("c");
    let mut out = Vec::new();

    let summary = controller(&fake, new_year)
        .snapshot_and_terminate(&mut out)
        .await
        .expect("remove should succeed");

    let backup = "backup-2024-01-01-09-00-00";
    assert_eq!(
        summary,
        RemoveSummary {
            instance: String::from("gaming"),
            backup_image: String::from(backup),
            deleted_images: vec![String::from("a"), String::from("b"), String::from("c")],
        }
    );
    assert!(fake.instances().is_empty());
    assert_eq!(fake.machine_image_names(), vec![String::from(backup)]);

    let requested = fake
        .calls()
        .into_iter()
        .find_map(|call| match call {
            ComputeCall::InsertMachineImage(image) => Some(image),
            _ => None,
        })
        .expect("machine image insert issued");
    assert_eq!(
        requested,
        MachineImage {
            name: String::from(backup),
            description: Some(String::from("Machine image created at 2024-01-01 09:00:00")),
            source_instance: Some(String::from(
                "projects/gaming-project/zones/asia-northeast1-a/instances/gaming"
            )),
            storage_locations: vec![String::from("asia-northeast1")],
            creation_timestamp: None,
        }
    );

    let text = rendered(out);
    let milestones = [
        "Stopped instance gaming.",
        "Machine image backup-2024-01-01-09-00-00 created.",
        "Deleted machine images other than backup-2024-01-01-09-00-00.",
        "Deleted instance gaming.",
    ];
    let positions: Vec<usize> = milestones
        .iter()
        .map(|line| text.find(line).unwrap_or_else(|| panic!("missing {line}: {text}")))
        .collect();
    assert!(positions.is_sorted(), "milestones out of order: {text}");
}

#[rstest]
#[tokio::test]
async fn snapshot_and_terminate_stops_before_imaging(new_year: DateTime<Utc>) {
    let fake = FakeCompute::new().with_instance("gaming", None);
    let mut out = Vec::new();

    controller(&fake, new_year)
        .snapshot_and_terminate(&mut out)
        .await
        .expect("remove should succeed");

    let mutations: Vec<ComputeCall> = fake
        .calls()
        .into_iter()
        .filter(|call| {
            matches!(
                call,
                ComputeCall::StopInstance(_)
                    | ComputeCall::InsertMachineImage(_)
                    | ComputeCall::DeleteMachineImage(_)
                    | ComputeCall::DeleteInstance(_)
            )
        })
        .collect();
    assert!(matches!(
        mutations.as_slice(),
        [
            ComputeCall::StopInstance(_),
            ComputeCall::InsertMachineImage(_),
            ComputeCall::DeleteInstance(_)
        ]
    ));
}

#[rstest]
#[case(&[], None)]
#[case(&["one", "two"], Some(2))]
#[tokio::test]
async fn snapshot_and_terminate_requires_exactly_one_instance(
    new_year: DateTime<Utc>,
    #[case] instances: &[&str],
    #[case] expected_count: Option<usize>,
) {
    let fake = instances
        .iter()
        .fold(FakeCompute::new(), |fake, name| fake.with_instance(name, None))
        .with_machine_image("golden");
    let mut out = Vec::new();

    let err = controller(&fake, new_year)
        .snapshot_and_terminate(&mut out)
        .await
        .expect_err("instance cardinality must be one");

    match expected_count {
        None => assert!(matches!(err, LifecycleError::NoInstanceRunning)),
        Some(count) => assert!(matches!(
            err,
            LifecycleError::MultipleInstances { count: found } if found == count
        )),
    }
    assert_eq!(fake.machine_image_names(), vec![String::from("golden")]);
    assert_eq!(fake.instances().len(), instances.len());
}

#[rstest]
#[tokio::test]
async fn rejected_image_deletion_aborts_before_instance_delete(new_year: DateTime<Utc>) {
    let fake = FakeCompute::new()
        .with_instance("gaming", None)
        .with_machine_image("a")
        .with_machine_image("b")
        .with_machine_image("c");
    fake.fail_on(FailPoint::DeleteMachineImage(String::from("b")));
    let mut out = Vec::new();

    let err = controller(&fake, new_year)
        .snapshot_and_terminate(&mut out)
        .await
        .expect_err("deletion of b fails");

    assert!(matches!(err, LifecycleError::Provider(_)));
    assert_eq!(
        fake.machine_image_names(),
        vec![
            String::from("b"),
            String::from("c"),
            String::from("backup-2024-01-01-09-00-00"),
        ]
    );
    assert_eq!(fake.instances().len(), 1);
    assert!(
        !fake
            .calls()
            .iter()
            .any(|call| matches!(call, ComputeCall::DeleteInstance(_)))
    );
}

#[rstest]
#[tokio::test]
async fn failed_operation_stops_the_workflow(new_year: DateTime<Utc>) {
    let fake = FakeCompute::new().with_instance("gaming", None);
    fake.fail_operations_with("ZONE_RESOURCE_POOL_EXHAUSTED", "no capacity");
    let mut out = Vec::new();

    let err = controller(&fake, new_year)
        .snapshot_and_terminate(&mut out)
        .await
        .expect_err("stop operation fails");

    assert!(
        matches!(
            err,
            LifecycleError::Wait(WaitError::Failed { ref message, .. })
                if message == "ZONE_RESOURCE_POOL_EXHAUSTED: no capacity"
        ),
        "unexpected error: {err}"
    );
    assert!(
        !fake
            .calls()
            .iter()
            .any(|call| matches!(call, ComputeCall::InsertMachineImage(_)))
    );
}

#[rstest]
#[tokio::test]
async fn waits_poll_the_matching_operation_scope(new_year: DateTime<Utc>) {
    let fake = FakeCompute::new()
        .with_instance("gaming", None)
        .with_polls_before_done(2);
    let mut out = Vec::new();

    controller(&fake, new_year)
        .with_poller(Poller::new(Duration::ZERO))
        .snapshot_and_terminate(&mut out)
        .await
        .expect("remove should succeed");

    let calls = fake.calls();
    let zonal = calls
        .iter()
        .filter(|call| matches!(call, ComputeCall::GetZoneOperation(_)))
        .count();
    let global = calls
        .iter()
        .filter(|call| matches!(call, ComputeCall::GetGlobalOperation(_)))
        .count();
    assert_eq!(zonal, 4, "stop and delete each poll twice");
    assert_eq!(global, 2, "image insert polls twice");

    let text = rendered(out);
    assert!(text.contains("Status: RUNNING, Progress: 50"), "output: {text}");
    assert!(text.contains("Status: DONE, Progress: 100"), "output: {text}");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn operation_timeout_is_reported(new_year: DateTime<Utc>) {
    let fake = FakeCompute::new()
        .with_machine_image("golden")
        .with_polls_before_done(100);
    let mut out = Vec::new();

    let err = controller(&fake, new_year)
        .with_poller(Poller::default().with_timeout(Some(Duration::from_secs(12))))
        .ensure_running(&mut out)
        .await
        .expect_err("operation never finishes in time");

    assert!(
        matches!(
            err,
            LifecycleError::Wait(WaitError::Timeout { seconds: 12, .. })
        ),
        "unexpected error: {err}"
    );
}

type ControllerError = LifecycleError<FakeComputeError>;

const BACKUP: &str = "backup-2024-01-01-09-00-00";

fn is_provider(err: &ControllerError) -> bool {
    matches!(err, LifecycleError::Provider(FakeComputeError::Injected(_)))
}

fn is_query(err: &ControllerError) -> bool {
    matches!(
        err,
        LifecycleError::Wait(WaitError::Query {
            source: FakeComputeError::Injected(_),
            ..
        })
    )
}

#[rstest]
#[case::stop(
    FailPoint::StopInstance,
    is_provider,
    |call: &ComputeCall| matches!(call, ComputeCall::StopInstance(_)),
    &["old"]
)]
#[case::status_lookup(
    FailPoint::GetOperation,
    is_query,
    |call: &ComputeCall| matches!(call, ComputeCall::GetZoneOperation(_)),
    &["old"]
)]
#[case::image_insert(
    FailPoint::InsertMachineImage,
    is_provider,
    |call: &ComputeCall| matches!(call, ComputeCall::InsertMachineImage(_)),
    &["old"]
)]
#[case::image_list(
    FailPoint::ListMachineImages,
    is_provider,
    |call: &ComputeCall| matches!(call, ComputeCall::ListMachineImages),
    &["old", BACKUP]
)]
#[case::instance_delete(
    FailPoint::DeleteInstance,
    is_provider,
    |call: &ComputeCall| matches!(call, ComputeCall::DeleteInstance(_)),
    &[BACKUP]
)]
#[tokio::test]
async fn snapshot_and_terminate_stops_at_first_failure(
    new_year: DateTime<Utc>,
    #[case] point: FailPoint,
    #[case] expected_error: fn(&ControllerError) -> bool,
    #[case] failing_call: fn(&ComputeCall) -> bool,
    #[case] remaining_images: &[&str],
) {
    let fake = FakeCompute::new()
        .with_instance("gaming", None)
        .with_machine_image("old")
        .with_polls_before_done(1);
    fake.fail_on(point.clone());
    let mut out = Vec::new();

    let err = controller(&fake, new_year)
        .with_poller(Poller::new(Duration::ZERO))
        .snapshot_and_terminate(&mut out)
        .await
        .expect_err("injected failure aborts the workflow");

    assert!(expected_error(&err), "{point:?} produced unexpected error: {err}");
    let calls = fake.calls();
    assert!(
        calls.last().is_some_and(failing_call),
        "{point:?} should be the last call issued: {calls:?}"
    );
    assert_eq!(fake.instances().len(), 1, "the instance is never rolled back");
    let expected: Vec<String> = remaining_images.iter().map(|name| (*name).to_owned()).collect();
    assert_eq!(fake.machine_image_names(), expected);
}

#[rstest]
#[case::image_list(
    FailPoint::ListMachineImages,
    is_provider,
    |call: &ComputeCall| matches!(call, ComputeCall::ListMachineImages)
)]
#[case::instance_insert(
    FailPoint::InsertInstance,
    is_provider,
    |call: &ComputeCall| matches!(call, ComputeCall::InsertInstance { .. })
)]
#[case::status_lookup(
    FailPoint::GetOperation,
    is_query,
    |call: &ComputeCall| matches!(call, ComputeCall::GetZoneOperation(_))
)]
#[tokio::test]
async fn ensure_running_stops_at_first_failure(
    new_year: DateTime<Utc>,
    #[case] point: FailPoint,
    #[case] expected_error: fn(&ControllerError) -> bool,
    #[case] failing_call: fn(&ComputeCall) -> bool,
) {
    let fake = FakeCompute::new()
        .with_machine_image("golden")
        .with_polls_before_done(1);
    fake.fail_on(point.clone());
    let mut out = Vec::new();

    let err = controller(&fake, new_year)
        .with_poller(Poller::new(Duration::ZERO))
        .ensure_running(&mut out)
        .await
        .expect_err("injected failure aborts the workflow");

    assert!(expected_error(&err), "{point:?} produced unexpected error: {err}");
    let calls = fake.calls();
    assert!(
        calls.last().is_some_and(failing_call),
        "{point:?} should be the last call issued: {calls:?}"
    );
    let text = String::from_utf8(out).expect("utf8 output");
    assert!(!text.contains("created from machine image"), "output: {text}");
}
