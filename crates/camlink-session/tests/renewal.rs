mod common;

use std::time::Duration;

use camlink_core::{ApiError, RenewalEvent};
use camlink_session::RenewalState;
use chrono::TimeDelta;
use common::{Harness, answer, at, grant};

fn near(actual: chrono::DateTime<chrono::Utc>, expected: chrono::DateTime<chrono::Utc>) -> bool {
    actual >= expected && actual - expected < TimeDelta::milliseconds(100)
}

#[tokio::test(start_paused = true)]
async fn renews_ahead_of_each_expiry() {
    let h = Harness::new();
    h.api.push_exchange(answer("s1", at(60)));
    h.api.push_extension(grant("s2", at(150)));
    h.api.push_extension(grant("s3", at(240)));

    let stream = h.connect().await.unwrap();
    let mut updates = stream.watch_renewal();
    stream.start().await.unwrap();

    let calls = h.api.wait_for_extensions(1).await;
    assert_eq!(calls[0].session_id, "s1");
    assert_eq!(calls[0].scope, "p1");
    assert_eq!(calls[0].target, "d1");
    assert!(near(calls[0].at, at(30)), "fired at {}", calls[0].at);

    let calls = h.api.wait_for_extensions(2).await;
    assert_eq!(calls[1].session_id, "s2");
    assert!(near(calls[1].at, at(120)), "fired at {}", calls[1].at);

    updates
        .wait_for(|s| *s == RenewalState::Armed { fire_at: at(210) })
        .await
        .unwrap();
    let session = stream.session().await;
    assert_eq!(session.session_id, "s3");
    assert_eq!(session.expires_at, at(240));

    stream.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn rearms_margin_before_new_expiry() {
    let h = Harness::new();
    h.api.push_exchange(answer("s1", at(60)));
    h.api.push_extension(grant("s2", at(150)));

    let stream = h.connect().await.unwrap();
    let mut updates = stream.watch_renewal();
    stream.start().await.unwrap();

    let state = *updates
        .wait_for(|s| *s == RenewalState::Armed { fire_at: at(120) })
        .await
        .unwrap();
    assert_eq!(state, RenewalState::Armed { fire_at: at(120) });

    let session = stream.session().await;
    assert_eq!(session.session_id, "s2");
    assert!(session.expires_at > at(60));
    assert_eq!(
        h.events.history(),
        vec![RenewalEvent::Renewed {
            previous_session_id: "s1".into(),
            session_id: "s2".into(),
            expires_at: at(150),
        }]
    );

    stream.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn overdue_renewal_fires_immediately() {
    let h = Harness::new();
    // Already inside the safety margin when negotiated.
    h.api.push_exchange(answer("s1", at(10)));
    h.api.push_extension(grant("s2", at(100)));

    let stream = h.connect().await.unwrap();
    stream.start().await.unwrap();

    let calls = h.api.wait_for_extensions(1).await;
    assert_eq!(calls[0].session_id, "s1");
    assert!(near(calls[0].at, at(0)), "fired at {}", calls[0].at);

    stream.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn renewal_returning_past_expiry_still_fires() {
    let h = Harness::new();
    h.api.push_exchange(answer("s1", at(60)));
    // Grant that is already overdue by the time it arrives.
    h.api.push_extension(grant("s2", at(20)));
    h.api.push_extension(grant("s3", at(200)));

    let stream = h.connect().await.unwrap();
    stream.start().await.unwrap();

    let calls = h.api.wait_for_extensions(2).await;
    assert_eq!(calls[1].session_id, "s2");
    assert!(near(calls[1].at, at(30)), "fired at {}", calls[1].at);

    stream.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_extension_keeps_session_and_stream() {
    let h = Harness::new();
    h.api.push_exchange(answer("s1", at(60)));
    h.api
        .push_extension(Err(ApiError::Transport("connection reset".into())));

    let stream = h.connect().await.unwrap();
    let mut updates = stream.watch_renewal();
    stream.start().await.unwrap();

    updates
        .wait_for(|s| *s == RenewalState::Unrenewed)
        .await
        .unwrap();

    let session = stream.session().await;
    assert_eq!(session.session_id, "s1");
    assert_eq!(session.expires_at, at(60));
    assert!(h.media.is_started());
    assert_eq!(
        h.events.failures(),
        vec![ApiError::Transport("connection reset".into())]
    );

    // Nothing re-arms after the failure.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.api.extensions().len(), 1);
    assert_eq!(stream.renewal_state(), RenewalState::Unrenewed);
    assert!(h.media.is_started());

    stream.stop().await.unwrap();
    assert!(!h.media.is_started());
}

#[tokio::test(start_paused = true)]
async fn expired_remote_session_ends_renewal() {
    let h = Harness::new();
    h.api.push_exchange(answer("s1", at(60)));
    h.api
        .push_extension(Err(ApiError::RemoteSession("unknown session s1".into())));

    let stream = h.connect().await.unwrap();
    let mut updates = stream.watch_renewal();
    stream.start().await.unwrap();

    updates
        .wait_for(|s| *s == RenewalState::Unrenewed)
        .await
        .unwrap();

    assert!(matches!(
        h.events.history().as_slice(),
        [RenewalEvent::Failed {
            error: ApiError::RemoteSession(_),
            ..
        }]
    ));
    stream.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn empty_renewed_session_id_is_a_failure() {
    let h = Harness::new();
    h.api.push_exchange(answer("s1", at(60)));
    h.api.push_extension(grant("", at(150)));

    let stream = h.connect().await.unwrap();
    let mut updates = stream.watch_renewal();
    stream.start().await.unwrap();

    updates
        .wait_for(|s| *s == RenewalState::Unrenewed)
        .await
        .unwrap();
    assert_eq!(stream.session().await.session_id, "s1");

    stream.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn at_most_one_extension_in_flight() {
    let h = Harness::new();
    h.api.push_exchange(answer("s1", at(5)));
    h.api.set_extension_latency(Duration::from_secs(3));
    // Every grant is already due, so each renewal re-fires immediately.
    for n in 0..20 {
        h.api.push_extension(grant(&format!("s{}", n + 2), at(6 + n)));
    }

    let stream = h.connect().await.unwrap();
    let mut updates = stream.watch_renewal();
    stream.start().await.unwrap();

    updates
        .wait_for(|s| *s == RenewalState::Unrenewed)
        .await
        .unwrap();

    assert_eq!(h.api.extensions().len(), 21);
    assert_eq!(h.api.max_in_flight(), 1);
    for pair in h.api.extensions().windows(2) {
        assert!(pair[1].at - pair[0].at >= TimeDelta::seconds(3));
    }

    stream.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn honours_custom_safety_margin() {
    let h = Harness::new();
    h.api.push_exchange(answer("s1", at(60)));

    let options = h.options().with_safety_margin(Duration::from_secs(10));
    let stream = camlink_session::StreamSession::connect_with(
        &common::config(),
        &h.connector,
        &h.engine,
        options,
    )
    .await
    .unwrap();
    stream.start().await.unwrap();

    let calls = h.api.wait_for_extensions(1).await;
    assert!(near(calls[0].at, at(50)), "fired at {}", calls[0].at);

    stream.stop().await.unwrap();
}
