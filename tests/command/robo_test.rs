//! Replays whole `solo robo` sessions against test doubles, one mode per run, with
//! the config file carrying state between runs the way it does between invocations.

use solo::{
    internal::robot::{framework::ArmRole, modes::Mode},
    utils::test::{FakePortScanner, MockFramework, StubAccounts},
};

use super::*;

#[tokio::test]
async fn test_calibrate_then_teleoperate() {
    let bench = Workbench::new(
        MockFramework::default(),
        plug_sequence("/dev/ttyACM0", "/dev/ttyACM1"),
        StubAccounts::default(),
    );

    // Skip motor setup, pick SO101, press Enter after plugging each arm.
    bench.run(Mode::Calibrate, &["n", "2", "", ""]).await;
    assert_eq!(
        bench.framework.calls(),
        [
            "calibrate so101_leader /dev/ttyACM0",
            "calibrate so101_follower /dev/ttyACM1"
        ]
    );
    let saved = bench.saved();
    assert_eq!(saved.server.as_ref().unwrap().server_type.as_deref(), Some("lerobot"));
    let arms = saved.lerobot.as_ref().unwrap().calibrated_arms().unwrap();
    assert_eq!(arms.leader_port, "/dev/ttyACM0");
    assert_eq!(arms.follower_port, "/dev/ttyACM1");

    // No cameras.
    bench.run(Mode::Teleoperate, &["n"]).await;
    assert_eq!(
        bench.framework.calls().last().unwrap(),
        "teleoperate /dev/ttyACM0 /dev/ttyACM1 cameras=0"
    );
    assert!(bench.saved().lerobot.unwrap().teleop.is_some());

    // The saved teleop settings are offered and accepted with a single answer.
    let operator = bench.run(Mode::Teleoperate, &["y"]).await;
    assert_eq!(operator.transcript.len(), 1);
    assert_eq!(bench.framework.calls().len(), 4);
}

#[tokio::test]
async fn test_failed_follower_blocks_later_modes() {
    let framework = MockFramework {
        fail_calibrate: vec![ArmRole::Follower],
        ..Default::default()
    };
    let bench = Workbench::new(
        framework,
        plug_sequence("/dev/ttyUSB0", "/dev/ttyUSB1"),
        StubAccounts::default(),
    );

    bench.run(Mode::Calibrate, &["n", "1", "", ""]).await;
    let lerobot = bench.saved().lerobot.unwrap();
    assert_eq!(lerobot.leader_calibrated, Some(true));
    assert_eq!(lerobot.follower_calibrated, Some(false));
    assert_eq!(lerobot.follower_port.as_deref(), Some("/dev/ttyUSB1"));

    for mode in [Mode::Teleoperate, Mode::Record, Mode::Inference] {
        bench.run(mode, &[]).await;
    }
    assert_eq!(bench.framework.calls().len(), 2);
}

#[tokio::test]
async fn test_full_setup_sets_up_motors_then_teleoperates() {
    let bench = Workbench::new(
        MockFramework::default(),
        plug_sequence("/dev/ttyACM0", "/dev/ttyACM1"),
        StubAccounts::default(),
    );

    // Default robot, Enter after each plug prompt, no cameras.
    bench.run(Mode::FullSetup, &["", "", "", "n"]).await;
    assert_eq!(
        bench.framework.calls(),
        [
            "setup_motors so100_leader /dev/ttyACM0",
            "calibrate so100_leader /dev/ttyACM0",
            "setup_motors so100_follower /dev/ttyACM1",
            "calibrate so100_follower /dev/ttyACM1",
            "teleoperate /dev/ttyACM0 /dev/ttyACM1 cameras=0",
        ]
    );
    let lerobot = bench.saved().lerobot.unwrap();
    assert_eq!(lerobot.leader_motors_setup, Some(true));
    assert_eq!(lerobot.follower_motors_setup, Some(true));
    assert_eq!(lerobot.cameras.map(|c| c.enabled), Some(false));

}

#[tokio::test]
async fn test_full_setup_skips_teleop_when_calibration_fails() {
    let framework = MockFramework {
        fail_calibrate: vec![ArmRole::Leader],
        ..Default::default()
    };
    let bench = Workbench::new(
        framework,
        plug_sequence("/dev/ttyACM0", "/dev/ttyACM1"),
        StubAccounts::default(),
    );

    bench.run(Mode::FullSetup, &["", "", ""]).await;
    let calls = bench.framework.calls();
    assert!(calls.iter().all(|c| !c.starts_with("teleoperate")));
    assert_eq!(bench.saved().lerobot.unwrap().leader_calibrated, Some(false));
}

#[tokio::test]
async fn test_record_train_infer_chain() {
    let bench = Workbench::new(
        MockFramework::default(),
        plug_sequence("/dev/ttyACM0", "/dev/ttyACM1"),
        StubAccounts::logged_in("alice"),
    );
    bench.run(Mode::Calibrate, &["n", "", "", ""]).await;

    // Push: yes; default repo and task; 3 episodes; default timings; no cameras.
    bench.run(Mode::Record, &["y", "", "", "3", "", "", "n"]).await;
    let recording = bench.saved().lerobot.unwrap().recording.unwrap();
    assert_eq!(recording.dataset_repo_id, "alice/so100_dataset");
    assert_eq!(recording.episodes, 3);

    // Every training prompt takes its default; the dataset defaults to the last recording.
    bench.run(Mode::Train, &[]).await;
    let training = bench.saved().lerobot.unwrap().training.unwrap();
    assert_eq!(training.policy_type, "act");
    assert_eq!(training.output_dir, "outputs/train/act_so100_dataset");
    assert_eq!(training.steps, 100_000);
    assert_eq!(training.batch_size, 8);

    // The policy defaults to the last checkpoint of that training run.
    bench.run(Mode::Inference, &["", "", "", "", "n"]).await;
    let inference = bench.saved().lerobot.unwrap().inference.unwrap();
    assert_eq!(
        inference.policy_path,
        "outputs/train/act_so100_dataset/checkpoints/last/pretrained_model"
    );
    assert_eq!(inference.eval_repo_id, "alice/eval_act_so100_dataset");

    assert_eq!(
        &bench.framework.calls()[2..],
        [
            "record alice/so100_dataset episodes=3",
            "train act alice/so100_dataset",
            "infer outputs/train/act_so100_dataset/checkpoints/last/pretrained_model",
        ]
    );
}

#[tokio::test]
async fn test_missing_framework_leaves_config_untouched() {
    let framework = MockFramework {
        available: false,
        ..Default::default()
    };
    let bench = Workbench::new(
        framework,
        FakePortScanner::new(Vec::<Vec<String>>::new()),
        StubAccounts::default(),
    );

    let operator = bench.run(Mode::FullSetup, &[]).await;
    assert!(operator.transcript.is_empty());
    assert!(!bench.store.path().exists());
}
