use std::time::Duration;

use emekit_core::{CLEAR_KEY, SessionId, SessionState};
use emekit_session::{OutputField, PlatformError, SessionError};
use emekit_test_utils::{
    CountingEngineFactory, Notification, PlatformCall, ScriptedPlatform, session_id, tracing_setup,
};
use rstest::rstest;

use crate::common::{INIT_DATA, LICENSE_URL, MIME_TYPE, xor_session};

fn challenge_then(status: &str) -> ScriptedPlatform {
    ScriptedPlatform::new()
        .on_create([Notification::message("LICENSE-REQUEST", LICENSE_URL)])
        .on_update([Notification::key_status(status)])
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn usable_key_completes_exchange(_tracing_setup: (), session_id: SessionId) {
    let platform = challenge_then("KeyUsable");
    let engines = CountingEngineFactory::xor(0x0f);
    let session = xor_session(&platform, &engines);

    let created = session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    assert_eq!(created, session_id);

    let message = session.get_key_message().unwrap();
    assert_eq!(&message.challenge[..], b"LICENSE-REQUEST");
    assert_eq!(message.destination_url, LICENSE_URL);
    assert_eq!(session.state(), SessionState::WaitingForLicense);

    let diagnostics = session.update(b"LICENSE").unwrap();
    assert_eq!(diagnostics, "KeyUsable");
    assert_eq!(session.state(), SessionState::UpdateLicense);

    let mut sample = [0x0f_u8, 0x0e, 0x0d];
    assert_eq!(session.decrypt(&[0; 16], &mut sample).unwrap(), 3);
    assert_eq!(sample, [0x00, 0x01, 0x02]);
    assert_eq!(engines.created(), 1);

    assert_eq!(
        platform.calls()[..2],
        [
            PlatformCall::CreateSession {
                mime_type: MIME_TYPE.into(),
                init_data: INIT_DATA.to_vec(),
            },
            PlatformCall::UpdateSession {
                session_id,
                response: b"LICENSE".to_vec(),
            },
        ]
    );
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn usable_status_before_update_still_succeeds(_tracing_setup: (), session_id: SessionId) {
    let platform = ScriptedPlatform::new().on_create([Notification::message("REQ", LICENSE_URL)]);
    let engines = CountingEngineFactory::xor(0);
    let session = xor_session(&platform, &engines);

    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    assert_eq!(INIT_DATA.len(), 16);
    session.get_key_message().unwrap();
    platform
        .notifier()
        .on_key_status_update(&session_id, "KeyUsable")
        .unwrap();
    assert_eq!(session.state(), SessionState::UpdateLicense);

    let diagnostics = session
        .update_within(b"LICBYTES", Duration::from_millis(100))
        .unwrap();
    assert_eq!(diagnostics, "KeyUsable");
    assert_eq!(session.state(), SessionState::UpdateLicense);
    assert!(platform.calls().contains(&PlatformCall::UpdateSession {
        session_id,
        response: b"LICBYTES".to_vec(),
    }));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn expired_status_before_update_is_rejected(_tracing_setup: (), session_id: SessionId) {
    let platform = ScriptedPlatform::new().on_create([Notification::message("REQ", LICENSE_URL)]);
    let engines = CountingEngineFactory::xor(0);
    let session = xor_session(&platform, &engines);

    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    session.get_key_message().unwrap();
    platform
        .notifier()
        .on_key_status_update(&session_id, "KeyExpired")
        .unwrap();

    let result = session.update(b"LICBYTES");
    assert!(matches!(
        result,
        Err(SessionError::LicenseUpdateRejected { ref status }) if status == "KeyExpired"
    ));
    assert_eq!(session.state(), SessionState::Error);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn adapter_error_before_get_key_message(_tracing_setup: (), session_id: SessionId) {
    let platform = ScriptedPlatform::new();
    let engines = CountingEngineFactory::xor(0);
    let session = xor_session(&platform, &engines);

    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    platform
        .notifier()
        .on_error(&session_id, 0x8007, "provisioning failed")
        .unwrap();

    let result = session.get_key_message();
    assert!(matches!(
        result,
        Err(SessionError::AdapterError { code: 0x8007, ref message }) if message == "provisioning failed"
    ));
    assert_eq!(session.state(), SessionState::Error);
}

#[rstest]
#[case("KeyExpired")]
#[case("KeyReleased")]
#[case("KeyOutputRestricted")]
#[case("KeyInternalError")]
#[case("status-unknown")]
#[timeout(Duration::from_secs(5))]
fn unusable_key_rejects_license(_tracing_setup: (), #[case] status: &str) {
    let platform = challenge_then(status);
    let engines = CountingEngineFactory::xor(0x0f);
    let session = xor_session(&platform, &engines);

    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    session.get_key_message().unwrap();

    let result = session.update(b"LICENSE");
    assert!(matches!(
        result,
        Err(SessionError::LicenseUpdateRejected { status: ref s }) if s == status
    ));
    assert_eq!(session.state(), SessionState::Error);
    assert_eq!(session.last_message(), status);

    let mut sample = [1_u8, 2, 3];
    assert!(matches!(
        session.decrypt(&[0; 16], &mut sample),
        Err(SessionError::EngineUnavailable { .. })
    ));
    assert_eq!(sample, [1, 2, 3]);
    assert_eq!(engines.created(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn ready_without_challenge_skips_license(_tracing_setup: ()) {
    let platform = ScriptedPlatform::new().on_create([Notification::Ready]);
    let engines = CountingEngineFactory::xor(0xff);
    let session = xor_session(&platform, &engines);

    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    let message = session.get_key_message().unwrap();
    assert!(message.is_empty());
    assert_eq!(session.state(), SessionState::Ready);

    let mut sample = [0xff_u8; 4];
    session.decrypt(&[0; 16], &mut sample).unwrap();
    assert_eq!(sample, [0; 4]);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn ready_after_usable_key(_tracing_setup: ()) {
    let platform = ScriptedPlatform::new()
        .on_create([Notification::message("REQ", LICENSE_URL)])
        .on_update([Notification::key_status("usable"), Notification::Ready]);
    let engines = CountingEngineFactory::xor(0);
    let session = xor_session(&platform, &engines);

    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    session.get_key_message().unwrap();
    session.update(b"LICENSE").unwrap();
    platform.join();

    assert_eq!(session.state(), SessionState::Ready);
    assert!(platform.outcomes().iter().all(|(_, outcome)| outcome.is_ok()));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn create_failure_is_terminal(_tracing_setup: ()) {
    let platform = ScriptedPlatform::new().fail_create(PlatformError::new(5, "CDM unavailable"));
    let engines = CountingEngineFactory::xor(0);
    let session = xor_session(&platform, &engines);

    let result = session.create_session(MIME_TYPE, INIT_DATA);
    assert!(matches!(
        result,
        Err(SessionError::SessionCreationFailed { ref reason }) if reason.contains("CDM unavailable")
    ));
    assert_eq!(session.state(), SessionState::Error);
    assert_eq!(session.session_id(), None);
    assert!(matches!(
        session.update(b"LICENSE"),
        Err(SessionError::SessionCreationFailed { .. })
    ));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn adapter_error_releases_waiting_consumer(_tracing_setup: ()) {
    let platform = ScriptedPlatform::new()
        .with_delay(Duration::from_millis(30))
        .on_create([Notification::error(0x8007, "provisioning failed")]);
    let engines = CountingEngineFactory::xor(0);
    let session = xor_session(&platform, &engines);

    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    let result = session.get_key_message();
    assert!(matches!(
        result,
        Err(SessionError::AdapterError { code: 0x8007, ref message }) if message == "provisioning failed"
    ));
    assert_eq!(session.state(), SessionState::Error);
    assert_eq!(session.last_message(), "provisioning failed");
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn adapter_refuses_license(_tracing_setup: ()) {
    let platform = ScriptedPlatform::new()
        .on_create([Notification::message("REQ", LICENSE_URL)])
        .fail_update(PlatformError::new(9, "license signature invalid"));
    let engines = CountingEngineFactory::xor(0);
    let session = xor_session(&platform, &engines);

    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    session.get_key_message().unwrap();
    let result = session.update(b"LICENSE");
    assert!(matches!(result, Err(SessionError::AdapterError { code: 9, .. })));
    assert_eq!(session.state(), SessionState::Error);
    assert_eq!(session.last_message(), "license signature invalid");
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn key_lost_after_license(_tracing_setup: (), session_id: SessionId) {
    let platform = challenge_then("KeyUsable");
    let engines = CountingEngineFactory::xor(0);
    let session = xor_session(&platform, &engines);

    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    session.get_key_message().unwrap();
    session.update(b"LICENSE").unwrap();

    platform
        .notifier()
        .on_key_status_update(&session_id, "KeyExpired")
        .unwrap();
    assert_eq!(session.state(), SessionState::Error);
    assert_eq!(session.last_message(), "KeyExpired");
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn fixed_buffers_retry_after_truncation(_tracing_setup: ()) {
    let platform = ScriptedPlatform::new()
        .on_create([Notification::message("A-LONGER-CHALLENGE", LICENSE_URL)]);
    let engines = CountingEngineFactory::xor(0);
    let session = xor_session(&platform, &engines);
    session.create_session(MIME_TYPE, INIT_DATA).unwrap();

    let mut challenge = [0_u8; 8];
    let mut url = [0_u8; 128];
    let result = session.get_key_message_into(&mut challenge, &mut url);
    assert!(matches!(
        result,
        Err(SessionError::TruncatedOutputBuffer {
            field: OutputField::Challenge,
            needed: 18,
            available: 8,
        })
    ));
    assert_eq!(session.state(), SessionState::MessageReceived);

    let mut challenge = [0_u8; 64];
    let (challenge_len, url_len) = session
        .get_key_message_into(&mut challenge, &mut url)
        .unwrap();
    assert_eq!(&challenge[..challenge_len], b"A-LONGER-CHALLENGE");
    assert_eq!(&url[..url_len], LICENSE_URL.as_bytes());
    assert_eq!(session.state(), SessionState::WaitingForLicense);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn reselecting_key_system_releases_session(_tracing_setup: (), session_id: SessionId) {
    let platform = ScriptedPlatform::new().on_create([Notification::Ready]);
    let engines = CountingEngineFactory::xor(0);
    let session = xor_session(&platform, &engines);

    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    session.get_key_message().unwrap();
    session.decrypt(&[0; 16], &mut [0_u8; 4]).unwrap();

    session.select_key_system(CLEAR_KEY).unwrap();
    assert_eq!(session.state(), SessionState::Init);
    assert_eq!(session.session_id(), None);
    assert!(
        platform
            .calls()
            .contains(&PlatformCall::ReleaseSession(session_id.clone()))
    );

    // A fresh exchange builds a fresh engine.
    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    session.get_key_message().unwrap();
    session.decrypt(&[0; 16], &mut [0_u8; 4]).unwrap();
    assert_eq!(engines.created(), 2);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn rejected_key_system_keeps_session(_tracing_setup: ()) {
    let platform = ScriptedPlatform::new()
        .on_create([Notification::Ready])
        .fail_select(PlatformError::new(2, "unsupported key system"));
    let engines = CountingEngineFactory::xor(0);
    let session = xor_session(&platform, &engines);
    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    session.get_key_message().unwrap();

    assert!(session.select_key_system("com.example.drm").is_err());
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.key_system(), CLEAR_KEY);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn drop_releases_session(_tracing_setup: (), session_id: SessionId) {
    let platform = ScriptedPlatform::new();
    let engines = CountingEngineFactory::xor(0);
    let session = xor_session(&platform, &engines);
    session.create_session(MIME_TYPE, INIT_DATA).unwrap();
    let notifier = platform.notifier();

    drop(session);
    assert_eq!(
        platform.calls().last(),
        Some(&PlatformCall::ReleaseSession(session_id.clone()))
    );
    assert!(matches!(
        notifier.on_ready(&session_id),
        Err(SessionError::Closed)
    ));
}

#[rstest]
#[case(CLEAR_KEY, "video/mp4", true)]
#[case(CLEAR_KEY, "audio/webm", false)]
#[case("com.example.drm", "video/mp4", false)]
fn type_support_is_delegated(
    #[case] key_system: &str,
    #[case] mime_type: &str,
    #[case] expected: bool,
) {
    let platform = ScriptedPlatform::new().supporting(CLEAR_KEY, "video/mp4");
    let engines = CountingEngineFactory::xor(0);
    let session = xor_session(&platform, &engines);

    assert_eq!(session.is_type_supported(key_system, mime_type), expected);
    assert_eq!(session.state(), SessionState::Init);
    assert_eq!(
        platform.calls(),
        [PlatformCall::IsTypeSupported {
            key_system: key_system.into(),
            mime_type: mime_type.into(),
        }]
    );
}
