use rampart::cli::CliOverrides;
use rampart::config::AppConfig;

fn main() {
    let cli = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    let config_path = cli.config_path();
    let loaded = AppConfig::load(&config_path);
    let mut config = loaded.as_ref().cloned().unwrap_or_default();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log.filter.as_str())).init();
    if let Err(err) = &loaded {
        log::warn!(target: "app", "{err:#}. Falling back to defaults.");
    }

    let overrides = cli.into_config_overrides();
    if !overrides.is_empty() {
        log::info!(target: "app", "CLI overrides: {}", overrides.applied_fields().join(", "));
        config.apply_overrides(&overrides);
    }

    match rampart::run(&config) {
        Ok(state) => log::info!(target: "app", "Exited in state {state}"),
        Err(err) => {
            log::error!(target: "app", "Fatal: {err:#}");
            std::process::exit(1);
        }
    }
}
