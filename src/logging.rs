use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

/// Default filter when `RUST_LOG` is unset; actix internals stay quiet below warn.
pub const DEFAULT_FILTER: &str = "info,actix_server=warn,actix_http=warn";

/// Initialize global logging (idempotent). Each line: millis timestamp, level, file:line, message.
pub fn init_logging() {
    INIT.get_or_init(|| {
        let env = env_logger::Env::default().default_filter_or(DEFAULT_FILTER);
        let _ = env_logger::Builder::from_env(env)
            .format(|buf, record| {
                use std::io::Write;
                let ts = buf.timestamp_millis();
                let location = match (record.file(), record.line()) {
                    (Some(file), Some(line)) => format!("{file}:{line}"),
                    (Some(file), None) => file.to_string(),
                    _ => record.target().to_string(),
                };
                writeln!(
                    buf,
                    "{ts} [{:<5}] {} {}",
                    record.level(),
                    location,
                    record.args()
                )
            })
            .try_init(); // tests may have installed a logger already
    });
}
