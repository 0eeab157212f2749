// Config loading and validation tests

use fluxboard::config::AppConfig;
use std::io::Write;

const VALID_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[prometheus]
url = "http://127.0.0.1:9090"

[inventory]
url = "http://127.0.0.1:8500"

[publishing]
broadcast_capacity = 16

[monitoring]
stats_log_interval_secs = 60
"#;

#[test]
fn test_config_loads_from_str_with_defaults() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.prometheus.url, "http://127.0.0.1:9090");
    assert_eq!(config.prometheus.metric, "flux_http_total");
    assert_eq!(config.prometheus.entity_label, "individual");
    assert_eq!(config.inventory.refresh_interval_secs, 10);
    assert_eq!(config.charts.interval_secs, 15);
    assert_eq!(config.charts.window_secs, 300);
    let names: Vec<&str> = config.charts.series.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["ok", "error"]);
    assert_eq!(config.publishing.broadcast_capacity, 16);
}

#[test]
fn test_config_series_override() {
    let custom = format!(
        "{VALID_CONFIG}\n[charts]\ninterval_secs = 5\nwindow_secs = 60\n\n\
         [[charts.series]]\nname = \"redirect\"\ncodes = [\"301\", \"302\"]\n"
    );
    let config = AppConfig::load_from_str(&custom).expect("load_from_str");
    assert_eq!(config.charts.interval_secs, 5);
    assert_eq!(config.charts.window_secs, 60);
    assert_eq!(config.charts.series.len(), 1);
    assert_eq!(config.charts.series[0].name, "redirect");
    assert_eq!(config.charts.series[0].codes, vec!["301", "302"]);
}

fn rejected(bad: &str, key: &str) {
    let err = AppConfig::load_from_str(bad).unwrap_err();
    assert!(err.to_string().contains(key), "{key}: {err}");
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    rejected(&VALID_CONFIG.replace("port = 8081", "port = 0"), "server.port");
}

#[test]
fn test_config_validation_rejects_non_http_urls() {
    rejected(
        &VALID_CONFIG.replace("http://127.0.0.1:9090", "127.0.0.1:9090"),
        "prometheus.url",
    );
    rejected(
        &VALID_CONFIG.replace("http://127.0.0.1:8500", "ftp://inventory"),
        "inventory.url",
    );
}

#[test]
fn test_config_validation_rejects_empty_metric_and_label() {
    let with_prom = |extra: &str| {
        VALID_CONFIG.replace(
            "url = \"http://127.0.0.1:9090\"",
            &format!("url = \"http://127.0.0.1:9090\"\n{extra}"),
        )
    };
    rejected(&with_prom("metric = \"\""), "prometheus.metric");
    rejected(&with_prom("entity_label = \"\""), "prometheus.entity_label");
}

#[test]
fn test_config_validation_rejects_zero_refresh_interval() {
    let bad = VALID_CONFIG.replace(
        "url = \"http://127.0.0.1:8500\"",
        "url = \"http://127.0.0.1:8500\"\nrefresh_interval_secs = 0",
    );
    rejected(&bad, "inventory.refresh_interval_secs");
}

#[test]
fn test_config_validation_rejects_bad_chart_cadence() {
    rejected(
        &format!("{VALID_CONFIG}\n[charts]\ninterval_secs = 0\n"),
        "charts.interval_secs",
    );
    rejected(
        &format!("{VALID_CONFIG}\n[charts]\ninterval_secs = 30\nwindow_secs = 15\n"),
        "charts.window_secs",
    );
}

#[test]
fn test_config_validation_rejects_bad_series() {
    rejected(
        &format!("{VALID_CONFIG}\n[charts]\nseries = []\n"),
        "charts.series",
    );
    rejected(
        &format!("{VALID_CONFIG}\n[[charts.series]]\nname = \"ok\"\ncodes = []\n"),
        "charts.series",
    );
}

#[test]
fn test_config_validation_rejects_broadcast_capacity_zero() {
    rejected(
        &VALID_CONFIG.replace("broadcast_capacity = 16", "broadcast_capacity = 0"),
        "publishing.broadcast_capacity",
    );
}

#[test]
fn test_config_validation_rejects_stats_log_interval_zero() {
    rejected(
        &VALID_CONFIG.replace("stats_log_interval_secs = 60", "stats_log_interval_secs = 0"),
        "monitoring.stats_log_interval_secs",
    );
}

#[test]
fn test_config_rejects_invalid_toml() {
    assert!(AppConfig::load_from_str("[server\nport = ").is_err());
    assert!(AppConfig::load_from_str("[server]\nport = 8081\nhost = \"x\"\n").is_err());
}

#[test]
fn test_config_load_reads_config_file_env() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(VALID_CONFIG.as_bytes()).unwrap();
    // SAFETY: no other test in this binary reads or writes CONFIG_FILE
    unsafe { std::env::set_var("CONFIG_FILE", file.path()) };
    let config = AppConfig::load().expect("load");
    unsafe { std::env::remove_var("CONFIG_FILE") };
    assert_eq!(config.server.port, 8081);
}
