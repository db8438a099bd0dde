//! Integration tests for ConfigOpts with real config files.
//!
//! Uses tempfile for every file and directory.

#![allow(clippy::unwrap_used, clippy::panic)]

use oslocfg_core::{
    ConfigOpts, DeprecatedOpt, Opt, OptGroup, OsloError, ParseOptions, Value,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn write_conf(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

/// Parse options with no default files or directories.
fn isolated(args: &[&str]) -> ParseOptions {
    ParseOptions::new(args.iter().copied())
        .prog("demo")
        .default_config_files(Vec::<PathBuf>::new())
        .default_config_dirs(Vec::<PathBuf>::new())
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Log sink that keeps everything written to it.
#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLog {
    type Writer = CapturedLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with a subscriber writing into the returned log.
fn capture_logs(f: impl FnOnce()) -> String {
    let log = CapturedLog::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(log.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    log.text()
}

// =============================================================================
// RESOLUTION ORDER
// =============================================================================

#[test]
fn test_file_value_beats_default() {
    let temp = create_temp_dir();
    let file = write_conf(temp.path(), "demo.conf", "[DEFAULT]\nworkers = 6\n");

    let mut conf = ConfigOpts::new();
    conf.register_opt(Opt::integer("workers").default_value(1), None)
        .unwrap();
    conf.parse(isolated(&["--config-file", path_arg(&file)]))
        .unwrap();

    assert_eq!(conf.get_int(None, "workers").unwrap(), Some(6));
}

#[test]
fn test_cli_beats_file() {
    let temp = create_temp_dir();
    let file = write_conf(temp.path(), "demo.conf", "[DEFAULT]\nworkers = 6\n");

    let mut conf = ConfigOpts::new();
    conf.register_cli_opt(Opt::integer("workers").default_value(1), None)
        .unwrap();
    conf.parse(isolated(&["--config-file", path_arg(&file), "--workers", "9"]))
        .unwrap();

    assert_eq!(conf.get_int(None, "workers").unwrap(), Some(9));
}

#[test]
fn test_later_file_wins() {
    let temp = create_temp_dir();
    let a = write_conf(temp.path(), "a.conf", "[DEFAULT]\nname = first\n");
    let b = write_conf(temp.path(), "b.conf", "[DEFAULT]\nname = second\n");

    let mut conf = ConfigOpts::new();
    conf.register_opt(Opt::string("name"), None).unwrap();
    conf.parse(isolated(&[
        "--config-file",
        path_arg(&a),
        "--config-file",
        path_arg(&b),
    ]))
    .unwrap();

    assert_eq!(conf.get_str(None, "name").unwrap().as_deref(), Some("second"));
    assert_eq!(conf.config_files(), vec![a, b]);
}

#[test]
fn test_multi_values_concatenate() {
    let temp = create_temp_dir();
    let a = write_conf(temp.path(), "a.conf", "[DEFAULT]\nplugin = x\n");
    let b = write_conf(temp.path(), "b.conf", "[DEFAULT]\nplugin = y\nplugin = z\n");

    let mut conf = ConfigOpts::new();
    conf.register_opt(Opt::multi_string("plugin"), None).unwrap();
    conf.parse(isolated(&[
        "--config-file",
        path_arg(&a),
        "--config-file",
        path_arg(&b),
    ]))
    .unwrap();

    assert_eq!(conf.get_str_list(None, "plugin").unwrap(), vec!["x", "y", "z"]);
}

#[test]
fn test_default_files_used_without_flag() {
    let temp = create_temp_dir();
    let file = write_conf(temp.path(), "demo.conf", "[DEFAULT]\nname = from-default\n");
    let other = write_conf(temp.path(), "other.conf", "[DEFAULT]\nname = from-flag\n");

    let mut conf = ConfigOpts::new();
    conf.register_opt(Opt::string("name"), None).unwrap();
    conf.parse(isolated(&[]).default_config_files([file.clone()]))
        .unwrap();
    assert_eq!(
        conf.get_str(None, "name").unwrap().as_deref(),
        Some("from-default")
    );

    conf.parse(isolated(&["--config-file", path_arg(&other)]).default_config_files([file]))
        .unwrap();
    assert_eq!(conf.get_str(None, "name").unwrap().as_deref(), Some("from-flag"));
}

// =============================================================================
// GROUPS AND LATE REGISTRATION
// =============================================================================

#[test]
fn test_group_opts_registered_after_parse() {
    let temp = create_temp_dir();
    let conf_dir = temp.path().join("demo.conf.d");
    std::fs::create_dir(&conf_dir).unwrap();
    write_conf(
        &conf_dir,
        "10-resources.conf",
        "[test]\nobjfile_resource = 3\n",
    );

    let mut conf = ConfigOpts::new();
    conf.register_cli_opt(
        Opt::string("name")
            .short('n')
            .required(true)
            .help("Resource name"),
        None,
    )
    .unwrap();
    conf.parse(
        isolated(&["-n", "pkg", "--config-dir", path_arg(&conf_dir)]).project("test"),
    )
    .unwrap();

    conf.register_group(OptGroup::new("test").with_title("group for test"));
    conf.register_opts(
        [
            Opt::integer("objfile_resource").default_value(0),
            Opt::integer("package_resource").default_value(0),
        ],
        Some("test"),
    )
    .unwrap();

    assert_eq!(conf.get_str(None, "name").unwrap().as_deref(), Some("pkg"));
    assert_eq!(conf.get_int(Some("test"), "objfile_resource").unwrap(), Some(3));
    assert_eq!(conf.get_int(Some("test"), "package_resource").unwrap(), Some(0));
    assert_eq!(conf.config_dirs().unwrap(), vec![conf_dir]);
}

#[test]
fn test_section_names_are_case_insensitive() {
    let temp = create_temp_dir();
    let file = write_conf(temp.path(), "demo.conf", "[Database]\nconnection = sqlite://\n");

    let mut conf = ConfigOpts::new();
    conf.register_opt(Opt::string("connection"), Some("database"))
        .unwrap();
    conf.parse(isolated(&["--config-file", path_arg(&file)]))
        .unwrap();

    assert_eq!(
        conf.get_str(Some("database"), "connection").unwrap().as_deref(),
        Some("sqlite://")
    );
    assert_eq!(conf.list_all_sections(), vec!["Database".to_string()]);
}

#[test]
fn test_deprecated_name_in_file() {
    let temp = create_temp_dir();
    let file = write_conf(temp.path(), "demo.conf", "[old_db]\nsql_connection = mysql://\n");

    let mut conf = ConfigOpts::new();
    conf.register_opt(
        Opt::string("connection").deprecated(DeprecatedOpt::new("old_db", "sql_connection")),
        Some("database"),
    )
    .unwrap();
    conf.parse(isolated(&["--config-file", path_arg(&file)]))
        .unwrap();

    assert_eq!(
        conf.get_str(Some("database"), "connection").unwrap().as_deref(),
        Some("mysql://")
    );
}

#[test]
fn test_typed_file_values() {
    let temp = create_temp_dir();
    let file = write_conf(
        temp.path(),
        "demo.conf",
        "[DEFAULT]\n\
         debug = yes\n\
         ratio = 0.5\n\
         hosts = a, \"b,c\", d\n\
         limits = cpu:2,mem:4\n\
         bind = 127.0.0.1\n",
    );

    let mut conf = ConfigOpts::new();
    conf.register_opts(
        [
            Opt::boolean("debug"),
            Opt::float("ratio"),
            Opt::list("hosts"),
            Opt::dict("limits"),
            Opt::ip_address("bind", None),
        ],
        None,
    )
    .unwrap();
    conf.parse(isolated(&["--config-file", path_arg(&file)]))
        .unwrap();

    assert_eq!(conf.get_bool(None, "debug").unwrap(), Some(true));
    assert_eq!(conf.get_float(None, "ratio").unwrap(), Some(0.5));
    assert_eq!(conf.get_str_list(None, "hosts").unwrap(), vec!["a", "b,c", "d"]);
    let limits = conf.get_dict(None, "limits").unwrap();
    assert_eq!(limits.get("cpu"), Some(&Value::from("2")));
    assert_eq!(conf.get_str(None, "bind").unwrap().as_deref(), Some("127.0.0.1"));
}

#[test]
fn test_template_from_file() {
    let temp = create_temp_dir();
    let file = write_conf(
        temp.path(),
        "demo.conf",
        "[DEFAULT]\nstate_path = /srv/demo\n\n[database]\nconnection = sqlite:///$state_path/demo.db\n",
    );

    let mut conf = ConfigOpts::new();
    conf.register_opt(Opt::string("state_path"), None).unwrap();
    conf.register_opt(Opt::string("connection"), Some("database"))
        .unwrap();
    conf.parse(isolated(&["--config-file", path_arg(&file)]))
        .unwrap();

    assert_eq!(
        conf.get_str(Some("database"), "connection").unwrap().as_deref(),
        Some("sqlite:////srv/demo/demo.db")
    );
}

// =============================================================================
// FILE ERRORS
// =============================================================================

#[test]
fn test_missing_config_file() {
    let mut conf = ConfigOpts::new();
    match conf.parse(isolated(&["--config-file", "/nonexistent/demo.conf"])) {
        Err(OsloError::ConfigFilesNotFound { files }) => {
            assert_eq!(files, vec![PathBuf::from("/nonexistent/demo.conf")]);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_missing_config_dir() {
    let mut conf = ConfigOpts::new();
    assert!(matches!(
        conf.parse(isolated(&["--config-dir", "/nonexistent/demo.conf.d"])),
        Err(OsloError::ConfigDirNotFound { .. })
    ));
}

#[test]
fn test_missing_default_dir_is_skipped() {
    let mut conf = ConfigOpts::new();
    conf.parse(isolated(&[]).default_config_dirs(["/nonexistent/demo.conf.d"]))
        .unwrap();
    assert!(conf.config_files().is_empty());
}

#[test]
fn test_malformed_file() {
    let temp = create_temp_dir();
    let file = write_conf(temp.path(), "bad.conf", "[DEFAULT\nkey = value\n");

    let mut conf = ConfigOpts::new();
    match conf.parse(isolated(&["--config-file", path_arg(&file)])) {
        Err(OsloError::ConfigFileParse { file: path, source }) => {
            assert_eq!(path, file);
            assert_eq!(source.line_number, 1);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_invalid_file_value_reported_on_get() {
    let temp = create_temp_dir();
    let file = write_conf(temp.path(), "demo.conf", "[DEFAULT]\nport = 99999\n");

    let mut conf = ConfigOpts::new();
    conf.register_opt(Opt::port("port"), None).unwrap();
    conf.parse(isolated(&["--config-file", path_arg(&file)]))
        .unwrap();

    assert!(matches!(
        conf.get_int(None, "port"),
        Err(OsloError::InvalidValue { .. })
    ));
}

// =============================================================================
// FIND FILE
// =============================================================================

#[test]
fn test_find_file_next_to_config() {
    let temp = create_temp_dir();
    let file = write_conf(temp.path(), "demo.conf", "[DEFAULT]\n");
    let policy = write_conf(temp.path(), "policy.json", "{}");

    let mut conf = ConfigOpts::new();
    conf.parse(isolated(&["--config-file", path_arg(&file)]))
        .unwrap();

    assert_eq!(conf.find_file("policy.json").unwrap(), Some(policy));
    assert_eq!(conf.find_file("absent-file.json").unwrap(), None);
}

// =============================================================================
// RELOAD AND MUTATE
// =============================================================================

#[test]
fn test_reload_picks_up_changes() {
    let temp = create_temp_dir();
    let file = write_conf(temp.path(), "demo.conf", "[DEFAULT]\nworkers = 2\n");

    let mut conf = ConfigOpts::new();
    conf.register_opt(Opt::integer("workers"), None).unwrap();
    conf.parse(isolated(&["--config-file", path_arg(&file)]))
        .unwrap();

    write_conf(temp.path(), "demo.conf", "[DEFAULT]\nworkers = 5\n");
    assert!(conf.reload_config_files());
    assert_eq!(conf.get_int(None, "workers").unwrap(), Some(5));

    write_conf(temp.path(), "demo.conf", "[DEFAULT\n");
    assert!(!conf.reload_config_files());
    assert_eq!(conf.get_int(None, "workers").unwrap(), Some(5));
}

#[test]
fn test_mutate_only_changes_mutable_opts() {
    let temp = create_temp_dir();
    let file = write_conf(
        temp.path(),
        "demo.conf",
        "[DEFAULT]\nlevel = info\nworkers = 2\n",
    );

    let mut conf = ConfigOpts::new();
    conf.register_opt(Opt::string("level").mutable(true), None)
        .unwrap();
    conf.register_opt(Opt::integer("workers"), None).unwrap();
    conf.parse(isolated(&["--config-file", path_arg(&file)]))
        .unwrap();

    write_conf(
        temp.path(),
        "demo.conf",
        "[DEFAULT]\nlevel = debug\nworkers = 8\n",
    );
    let changes = conf.mutate_config_files().unwrap();

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].name, "level");
    assert_eq!(changes[0].old, Some(Value::from("info")));
    assert_eq!(changes[0].new, Some(Value::from("debug")));
    assert_eq!(conf.get_str(None, "level").unwrap().as_deref(), Some("debug"));
    assert_eq!(conf.get_int(None, "workers").unwrap(), Some(2));
}

#[test]
fn test_log_opt_values_handles_every_group() {
    let mut conf = ConfigOpts::new();
    conf.register_opt(Opt::string("password").secret(true).default_value("s3cr3t"), None)
        .unwrap();
    conf.register_opt(Opt::string("bad").default_value("$missing"), Some("broken"))
        .unwrap();
    conf.register_opt(Opt::integer("workers").default_value(4), None)
        .unwrap();
    conf.parse(isolated(&[])).unwrap();

    let text = capture_logs(|| conf.log_opt_values(tracing::Level::INFO));

    assert!(text.contains("Configuration options gathered from:"));
    assert!(text.contains("****"));
    assert!(!text.contains("s3cr3t"));
    assert!(text.lines().any(|l| l.contains("workers") && l.ends_with("= 4")));
    assert!(text.lines().any(|l| l.contains("broken.bad") && l.contains("<error:")));
}
