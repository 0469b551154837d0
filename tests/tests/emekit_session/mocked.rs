//! Sessions driven through a mocked platform adapter.
//!
//! Expectations are verified when the session drops the adapter, so every
//! test also checks that nothing beyond the stubbed calls reached it.

use std::{sync::Arc, time::Duration};

use emekit_core::{CLEAR_KEY, SessionId, SessionState};
use emekit_session::{
    KeySession, PlatformAdapter, PlatformAdapterMock, PlatformError, PlatformFactory,
    SessionError, SessionNotifier, SessionOptions,
};
use emekit_test_utils::{CountingEngineFactory, session_id, tracing_setup};
use parking_lot::Mutex;
use rstest::rstest;
use unimock::{MockFn, Unimock, matching};

use crate::common::{INIT_DATA, LICENSE_URL, MIME_TYPE};

/// Moves a single `Unimock` into the session and keeps its notifier.
struct MockedPlatform {
    mock: Mutex<Option<Unimock>>,
    notifier: Mutex<Option<SessionNotifier>>,
}

impl MockedPlatform {
    fn new(mock: Unimock) -> Self {
        Self {
            mock: Mutex::new(Some(mock)),
            notifier: Mutex::new(None),
        }
    }

    fn notifier(&self) -> SessionNotifier {
        self.notifier.lock().clone().unwrap()
    }
}

impl PlatformFactory for MockedPlatform {
    fn create(
        &self,
        _key_system: &str,
        notifier: SessionNotifier,
    ) -> Result<Box<dyn PlatformAdapter>, PlatformError> {
        *self.notifier.lock() = Some(notifier);
        let mock = self
            .mock
            .lock()
            .take()
            .ok_or_else(|| PlatformError::new(1, "adapter already handed out"))?;
        Ok(Box::new(mock))
    }
}

fn mocked_session(mock: Unimock) -> (KeySession, SessionNotifier) {
    let platform = MockedPlatform::new(mock);
    let engines = Arc::new(CountingEngineFactory::xor(0));
    let session =
        KeySession::new(CLEAR_KEY, &platform, engines, SessionOptions::default()).unwrap();
    (session, platform.notifier())
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn license_is_forwarded_once_and_session_released(_tracing_setup: (), session_id: SessionId) {
    let mock = Unimock::new((
        PlatformAdapterMock::create_session
            .each_call(matching!(_, _))
            .returns(Ok(SessionId::from("abc123")))
            .n_times(1),
        PlatformAdapterMock::update_session
            .each_call(matching!(_, _))
            .returns(Ok(()))
            .n_times(1),
        PlatformAdapterMock::release_session
            .each_call(matching!(_))
            .returns(Ok(()))
            .n_times(1),
    ));
    let (session, notifier) = mocked_session(mock);

    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    notifier.on_message(&session_id, "REQ", LICENSE_URL).unwrap();
    session.get_key_message().unwrap();
    notifier
        .on_key_status_update(&session_id, "KeyUsable")
        .unwrap();

    assert_eq!(session.update(b"LICBYTES").unwrap(), "KeyUsable");
    assert_eq!(session.state(), SessionState::UpdateLicense);
    drop(session);
}

#[rstest]
fn refused_key_system_leaves_session_untouched(_tracing_setup: ()) {
    let mock = Unimock::new(
        PlatformAdapterMock::select_key_system
            .each_call(matching!(_))
            .returns(Err(PlatformError::new(9, "unsupported key system")))
            .n_times(1),
    );
    let (session, _notifier) = mocked_session(mock);

    let result = session.select_key_system("com.example.drm");
    assert!(matches!(result, Err(SessionError::AdapterError { code: 9, .. })));
    assert_eq!(session.key_system(), CLEAR_KEY);
    assert_eq!(session.state(), SessionState::Init);
}

#[rstest]
#[case(Ok(()), true)]
#[case(Err(PlatformError::new(1, "not supported")), false)]
fn type_support_follows_adapter(
    #[case] answer: Result<(), PlatformError>,
    #[case] expected: bool,
) {
    let mock = Unimock::new(
        PlatformAdapterMock::is_type_supported
            .each_call(matching!(_, _))
            .returns(answer),
    );
    let (session, _notifier) = mocked_session(mock);

    assert_eq!(session.is_type_supported(CLEAR_KEY, MIME_TYPE), expected);
}
