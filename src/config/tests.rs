use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.gateway.version = Some("3".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        cache_version: Some("4".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.gateway.version, "4");
}

#[test]
fn defaults_match_gateway_defaults() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.gateway.cache_prefix, "newsgate");
    assert_eq!(settings.gateway.api_timeout, Duration::from_secs(15));
    assert_eq!(settings.namespaces.static_assets.max_entries.get(), 100);
    assert_eq!(settings.namespaces.data.max_entries.get(), 50);
    assert_eq!(settings.namespaces.pages.max_entries.get(), 10);
    assert_eq!(
        settings.namespaces.data.max_age,
        Duration::from_secs(4 * 60 * 60)
    );
    assert_eq!(settings.storage.backend, StorageBackend::Fs);
    assert!(settings.storage.quota_bytes.is_none());
    assert_eq!(settings.upstream.base_url.as_str(), DEFAULT_UPSTREAM_URL);
    assert!(!settings.gateway.skip_waiting);
    assert_eq!(settings.gateway.passthrough_timeout, None);
}

#[test]
fn passthrough_timeout_is_optional_but_non_zero() {
    let mut raw = RawSettings::default();
    raw.gateway.passthrough_timeout_seconds = Some(120);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.gateway.passthrough_timeout,
        Some(Duration::from_secs(120))
    );

    let mut raw = RawSettings::default();
    raw.gateway.passthrough_timeout_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero timeout");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "gateway.passthrough_timeout_seconds",
            ..
        }
    ));
}

#[test]
fn zero_limits_are_rejected() {
    let mut raw = RawSettings::default();
    raw.namespaces.data.max_entries = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero entries");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "namespaces.data.max_entries",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.gateway.api_timeout_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero timeout");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "gateway.api_timeout_seconds",
            ..
        }
    ));
}

#[test]
fn empty_prefix_is_rejected() {
    let mut raw = RawSettings::default();
    raw.gateway.cache_prefix = Some("   ".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.gateway.api_prefixes = Some(Vec::new());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn unparseable_upstream_is_rejected() {
    let mut raw = RawSettings::default();
    raw.upstream.base_url = Some("not a url".to_string());
    let err = Settings::from_raw(raw).expect_err("bad url");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "upstream.base_url",
            ..
        }
    ));
}

#[test]
fn data_policy_parses_from_config() {
    let mut raw = RawSettings::default();
    raw.namespaces.data.policy = Some("stale-while-revalidate".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.namespaces.data.policy,
        DataPolicy::StaleWhileRevalidate
    );

    let mut raw = RawSettings::default();
    raw.namespaces.data.policy = Some("cache-only".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn extensions_are_normalized() {
    let mut raw = RawSettings::default();
    raw.gateway.static_extensions = Some(vec![".CSS".to_string(), "js".to_string()]);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.gateway.static_extensions, vec!["css", "js"]);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["newsgate"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "newsgate",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--upstream-url",
        "https://news.example.com",
        "--storage",
        "memory",
        "--skip-waiting",
        "true",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.upstream_url.as_deref(),
                Some("https://news.example.com")
            );
            assert_eq!(serve.overrides.storage.storage, Some(StorageBackend::Memory));
            assert_eq!(serve.overrides.skip_waiting, Some(true));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_clear_arguments() {
    let args = CliArgs::parse_from([
        "newsgate",
        "clear",
        "--storage-dir",
        "/tmp/newsgate",
        "news-data",
        "--all-versions",
    ]);

    match args.command.expect("clear command") {
        Command::Clear(clear) => {
            assert_eq!(clear.partition.as_deref(), Some("news-data"));
            assert!(clear.all_versions);
            assert_eq!(
                clear.storage.storage_dir.as_deref(),
                Some(std::path::Path::new("/tmp/newsgate"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
