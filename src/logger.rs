//! logger.rs
//! Inicializa env_logger. `RUST_LOG` controla el filtro; sin variable
//! usamos "info". La salida va directa a stdout/stderr (sin archivos).

pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();
}
