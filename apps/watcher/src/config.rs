use std::env::var;
use std::time::Duration;

/// Runtime configuration, read from the environment.
///
/// Symbols may carry an activation offset: `BTCUSDT,ETHUSDT@+10` tracks
/// ETHUSDT starting ten seconds from startup.
#[derive(Clone)]
pub struct Config {
    pub symbols: Vec<SymbolSpec>,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub notify_timeout: Duration,
}

#[derive(Clone)]
pub struct SymbolSpec {
    pub symbol: String,
    pub activate_after: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Self {
        let symbols = var("WATCH_SYMBOLS")
            .expect("WATCH_SYMBOLS not set")
            .split(',')
            .filter_map(parse_symbol_spec)
            .collect();

        Self {
            symbols,
            poll_interval: secs_var("POLL_INTERVAL_SECS", 5),
            fetch_timeout: millis_var("FETCH_TIMEOUT_MS", 2000),
            notify_timeout: millis_var("NOTIFY_TIMEOUT_MS", 1000),
        }
    }
}

fn parse_symbol_spec(raw: &str) -> Option<SymbolSpec> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match raw.split_once("@+") {
        Some((symbol, offset)) => {
            let secs: u64 = offset
                .parse()
                .unwrap_or_else(|_| panic!("bad activation offset in `{raw}`"));
            Some(SymbolSpec {
                symbol: symbol.to_string(),
                activate_after: Some(Duration::from_secs(secs)),
            })
        }
        None => Some(SymbolSpec {
            symbol: raw.to_string(),
            activate_after: None,
        }),
    }
}

fn secs_var(name: &str, default: u64) -> Duration {
    let secs = var(name)
        .ok()
        .map(|v| v.parse().unwrap_or_else(|_| panic!("{name} must be an integer")))
        .unwrap_or(default);
    Duration::from_secs(secs)
}

fn millis_var(name: &str, default: u64) -> Duration {
    let ms = var(name)
        .ok()
        .map(|v| v.parse().unwrap_or_else(|_| panic!("{name} must be an integer")))
        .unwrap_or(default);
    Duration::from_millis(ms)
}
