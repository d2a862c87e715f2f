/// Best-effort, idempotent `tracing_subscriber` init, gated on `RUST_LOG`
/// being set. Safe to call from binaries, demos, and tests alike — a
/// second call after a subscriber is already installed is a no-op.
pub fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}
