use super::*;

#[test]
fn defaults_resolve_without_any_source() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr, "127.0.0.1:8000".parse().unwrap());
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(settings.database.url.is_none());
    assert_eq!(settings.database.max_connections.get(), 8);
    assert!(settings.redis.enabled);
    assert_eq!(settings.redis.url, "redis://redis:6379/0");
    assert_eq!(settings.redis.operation_timeout_seconds.get(), 5);
    assert_eq!(settings.cache.dishes_ttl_seconds.get(), 300);
    assert_eq!(settings.cache.available_tables_ttl_seconds.get(), 30);
    assert_eq!(settings.rate_limit.max_requests.get(), 10);
    assert_eq!(settings.rate_limit.window_seconds.get(), 60);
    assert_eq!(settings.rate_limit.key_prefix, "rate_limit");
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.redis.host = Some("cache.internal".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        redis: RedisOverrides {
            redis_host: Some("localhost".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.redis.url, "redis://localhost:6379/0");
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
fn explicit_redis_url_wins_over_host_and_port() {
    let mut raw = RawSettings::default();
    raw.redis.url = Some("redis://:secret@10.1.1.1:6380/2".to_string());
    raw.redis.host = Some("ignored".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.redis.url, "redis://:secret@10.1.1.1:6380/2");
}

#[test]
fn redis_port_accepts_container_link_form() {
    let mut raw = RawSettings::default();
    raw.redis.port = Some(RawPort::Text("tcp://10.0.0.3:6390".to_string()));

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.redis.url, "redis://redis:6390/0");
}

#[test]
fn redis_port_rejects_garbage() {
    let mut raw = RawSettings::default();
    raw.redis.port = Some(RawPort::Text("tcp://10.0.0.3:http".to_string()));

    let err = Settings::from_raw(raw).expect_err("invalid port");
    assert!(matches!(err, LoadError::Invalid { key: "redis.port", .. }));
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.order_ttl_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.order_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn rate_limit_prefix_cannot_shadow_cache_namespaces() {
    for prefix in ["order", "stats", "", "rate:limit"] {
        let mut raw = RawSettings::default();
        raw.rate_limit.key_prefix = Some(prefix.to_string());

        let err = Settings::from_raw(raw).expect_err("reserved prefix");
        assert!(
            matches!(
                err,
                LoadError::Invalid {
                    key: "rate_limit.key_prefix",
                    ..
                }
            ),
            "prefix `{prefix}` accepted"
        );
    }
}

#[test]
fn redis_can_be_disabled_from_the_cli() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        redis: RedisOverrides {
            redis_enabled: Some(false),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(!settings.redis.enabled);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["bistro"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "bistro",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--redis-port",
        "tcp://10.0.0.3:6379",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(
                serve.overrides.redis.redis_port.as_deref(),
                Some("tcp://10.0.0.3:6379")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_cache_subcommands() {
    let args = CliArgs::parse_from([
        "bistro",
        "cache",
        "--redis-url",
        "redis://localhost:6379/0",
        "clear",
    ]);

    match args.command.expect("cache command") {
        Command::Cache(cache) => {
            assert_eq!(cache.command, CacheCommand::Clear);
            assert_eq!(
                cache.redis.redis_url.as_deref(),
                Some("redis://localhost:6379/0")
            );
        }
        _ => panic!("wrong command parsed"),
    }

    let args = CliArgs::parse_from(["bistro", "cache", "info"]);
    assert!(matches!(
        args.command,
        Some(Command::Cache(CacheArgs {
            command: CacheCommand::Info,
            ..
        }))
    ));
}

#[test]
#[serial_test::serial]
fn environment_overrides_file_defaults() {
    // SAFETY: serialized with every other test touching the process environment.
    unsafe {
        std::env::set_var("BISTRO__REDIS__HOST", "env-cache");
        std::env::set_var("BISTRO__RATE_LIMIT__KEY_PREFIX", "throttle");
    }

    let cli = CliArgs::parse_from(["bistro"]);
    let loaded = load(&cli);

    unsafe {
        std::env::remove_var("BISTRO__REDIS__HOST");
        std::env::remove_var("BISTRO__RATE_LIMIT__KEY_PREFIX");
    }

    let settings = loaded.expect("environment settings should load");
    assert_eq!(settings.redis.url, "redis://env-cache:6379/0");
    assert_eq!(settings.rate_limit.key_prefix, "throttle");
}
