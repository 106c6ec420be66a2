use rusqlite::Connection;
use socialscope_core::db::schema;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    /// Default dataset location resolved by the CLI.
    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("socialscope/database.sqlite")
    }

    fn chart_dir(&self) -> PathBuf {
        self.home.join("charts")
    }
}

fn seed_fixture_dataset(path: &PathBuf) {
    let source = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../socialscope-core/tests/fixtures/social.sql");
    let sql = fs::read_to_string(&source).expect("failed to read fixture sql");

    fs::create_dir_all(path.parent().expect("missing dataset parent"))
        .expect("failed to create dataset directory");
    let conn = Connection::open(path).expect("failed to create dataset");
    schema::install(&conn).expect("failed to install schema");
    conn.execute_batch(&sql).expect("failed to load fixture");
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("socialscope"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute socialscope: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "socialscope {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn list_needs_no_dataset() {
    let env = CliTestEnv::new();

    let args = ["list"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["overview", "growth", "virality", "lifecycle", "pairs"] {
        assert!(stdout.contains(name), "missing {name} in:\n{stdout}");
    }
}

#[test]
fn missing_dataset_exits_with_failure() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["growth", "--no-charts"]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to open datastore"),
        "unexpected stderr:\n{stderr}"
    );
}

#[test]
fn virality_report_on_default_dataset() {
    let env = CliTestEnv::new();
    seed_fixture_dataset(&env.db_path());

    let args = ["virality", "--no-charts", "--top", "2"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("#1 Post 1 by alice"), "stdout:\n{stdout}");
    assert!(stdout.contains("#2 Post 2 by bob"));
    assert!(!stdout.contains("#3 Post"));
    assert!(stdout.contains("VIRALITY SCORE:    1.0000"));
    assert!(stdout.contains("3.3x more engagement"));
    assert!(stdout.contains("\"Hello world\""));
}

#[test]
fn all_reports_in_json() {
    let env = CliTestEnv::new();
    let db = env.home.join("social.sqlite");
    seed_fixture_dataset(&db);
    let db_arg = db.to_string_lossy().into_owned();

    let args = ["--db", db_arg.as_str(), "--format", "json", "--no-charts"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    let runs = value["runs"].as_array().expect("runs array");
    assert_eq!(runs.len(), 5);
    assert!(runs.iter().all(|r| r["status"] == "success"));

    let pairs = &runs[4];
    assert_eq!(pairs["name"], "pairs");
    assert_eq!(pairs["output"]["kind"], "pairs");
    assert_eq!(pairs["output"]["data"]["pairs"][0]["combined_score"], 8);
}

#[test]
fn servers_flag_changes_capacity_plan() {
    let env = CliTestEnv::new();
    seed_fixture_dataset(&env.db_path());

    let args = ["growth", "--no-charts", "--servers", "1", "--format", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let capacity = &value["runs"][0]["output"]["data"]["capacity"];
    assert_eq!(capacity["current_servers"], 1);
    // 925.89 / 14 * 1.2 = 79.36
    assert_eq!(capacity["servers_required"], 80);
}

#[test]
fn lifecycle_reports_dropped_rows() {
    let env = CliTestEnv::new();
    seed_fixture_dataset(&env.db_path());

    let args = ["lifecycle", "--no-charts"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("CONTENT LIFECYCLE"));
    assert!(stdout.contains("Removed 1 engagements with negative time differences"));
}

#[test]
fn insufficient_data_is_not_a_failure() {
    let env = CliTestEnv::new();
    let db = env.db_path();
    fs::create_dir_all(db.parent().unwrap()).unwrap();
    schema::install(&Connection::open(&db).unwrap()).unwrap();

    let args = ["pairs", "--no-charts"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No data:"), "stdout:\n{stdout}");
}

#[test]
fn inspect_lists_tables() {
    let env = CliTestEnv::new();
    seed_fixture_dataset(&env.db_path());

    let args = ["inspect"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("users (5 rows)"));
    assert!(stdout.contains("reactions (5 rows)"));
}

#[test]
fn charts_are_written_to_requested_directory() {
    let env = CliTestEnv::new();
    seed_fixture_dataset(&env.db_path());
    let chart_dir = env.chart_dir();
    let dir_arg = chart_dir.to_string_lossy().into_owned();

    let args = ["pairs", "--charts", dir_arg.as_str(), "--chart-format", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let chart = chart_dir.join("engagement_pairs.json");
    assert!(chart.exists(), "chart should exist at {}", chart.display());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("engagement_pairs.json"));
}

#[test]
fn unknown_chart_format_is_rejected() {
    let env = CliTestEnv::new();
    seed_fixture_dataset(&env.db_path());

    let output = run_bin(&env, &["growth", "--chart-format", "png"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown chart format"), "stderr:\n{stderr}");
}
