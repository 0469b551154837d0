use emekit_core::SessionId;
use rstest::fixture;
use tokio_util::sync::CancellationToken;

#[fixture]
pub fn tracing_setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::default()
                .add_directive("warn".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}

#[fixture]
pub fn debug_tracing_setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::default()
                .add_directive("emekit_session=debug".parse().expect("valid directive"))
                .add_directive("emekit_drm=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}

#[fixture]
pub fn cancel_token() -> CancellationToken {
    CancellationToken::new()
}

/// Identity the scripted platform hands out by default.
#[fixture]
pub fn session_id() -> SessionId {
    SessionId::from("abc123")
}
