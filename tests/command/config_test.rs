//! Tests the session file as commands find it through `SOLO_CONFIG_DIR`.

use serde_json::json;
use serial_test::serial;
use solo::{
    command::query::{QueryArgs, client_for},
    internal::{
        config::{ConfigError, ConfigStore, JsonFileStore},
        server::ServerType,
    },
    utils::test::ConfigDirGuard,
};
use tempfile::tempdir;

use super::*;

#[test]
#[serial]
fn test_store_follows_config_dir_env() {
    let dir = tempdir().unwrap();
    let _guard = ConfigDirGuard::new(dir.path());

    let store = JsonFileStore::from_env().unwrap();
    assert_eq!(store.path(), dir.path().join("config.json"));
}

#[tokio::test]
#[serial]
async fn test_calibrated_session_points_query_at_lerobot() {
    let dir = tempdir().unwrap();
    let _guard = ConfigDirGuard::new(dir.path());

    let bench = Workbench::new(
        MockFramework::default(),
        plug_sequence("/dev/ttyACM0", "/dev/ttyACM1"),
        StubAccounts::default(),
    );
    bench.run(Mode::Calibrate, &["n", "", "", ""]).await;
    std::fs::copy(bench.store.path(), dir.path().join("config.json")).unwrap();

    let config = JsonFileStore::from_env().unwrap().load().unwrap();
    let client = client_for(&QueryArgs::default(), &config);
    assert_eq!(client.server, ServerType::Lerobot);
    assert_eq!(client.base_url, "http://localhost:5070");
}

#[test]
#[serial]
fn test_sections_written_by_other_tools_survive_a_save() {
    let dir = tempdir().unwrap();
    let _guard = ConfigDirGuard::new(dir.path());
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        json!({
            "server": {"type": "vllm", "port": 8001, "gpu_memory_utilization": 0.9},
            "dashboard": {"theme": "dark"}
        })
        .to_string(),
    )
    .unwrap();

    let store = JsonFileStore::from_env().unwrap();
    let mut config = store.load().unwrap();
    assert_eq!(config.server_type(), Some(ServerType::Vllm));
    config.server_mut().model = Some("meta-llama/Llama-3.2-1B-Instruct".into());
    store.save(&config).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["dashboard"]["theme"], "dark");
    assert_eq!(raw["server"]["gpu_memory_utilization"], 0.9);
    assert_eq!(raw["server"]["model"], "meta-llama/Llama-3.2-1B-Instruct");
}

#[test]
#[serial]
fn test_malformed_file_is_reported_not_overwritten() {
    let dir = tempdir().unwrap();
    let _guard = ConfigDirGuard::new(dir.path());
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = JsonFileStore::from_env().unwrap();
    assert!(matches!(store.load(), Err(ConfigError::Malformed { .. })));
    assert_eq!(store.load_or_default(), SessionConfig::default());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}
