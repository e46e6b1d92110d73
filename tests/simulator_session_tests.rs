//! Simulated streaming session tests.
//!
//! Verifies the event partial order, the growing-prefix partials, the
//! diarization toggle, and the hard invariant that nothing is emitted
//! after `Completed`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use asr_client::simulator::{SAMPLE_SENTENCES, SIM_SPEAKER_ID};
use asr_client::{
    RealTimeEvent, RealTimeSession, SessionState, SimulatedSession, TranscriptionOptions,
};

/// Wire the session's subscriber callback into an unbounded channel.
async fn subscribe(session: &mut SimulatedSession) -> mpsc::UnboundedReceiver<RealTimeEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    session
        .on_event(Arc::new(move |event| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(event);
            })
        }))
        .await
        .unwrap();
    rx
}

#[tokio::test(start_paused = true)]
async fn event_order_and_growing_prefixes() {
    let mut session = SimulatedSession::new(TranscriptionOptions::default());
    let mut rx = subscribe(&mut session).await;

    session.connect().await.unwrap();
    assert_eq!(session.state(), SessionState::Open);

    // Audio is accepted and absorbed while open
    session.send_audio(Bytes::from_static(&[0u8; 640])).await.unwrap();

    // Collect through the first finalized sentence
    let mut events = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("emitter stalled")
            .expect("channel closed early");
        let is_end = matches!(event, RealTimeEvent::SentenceEnd { .. });
        events.push(event);
        if is_end {
            break;
        }
    }

    assert!(matches!(events[0], RealTimeEvent::SentenceBegin { .. }));

    // Partials grow monotonically and are prefixes of the final text
    let final_text = events.last().unwrap().result().unwrap().text.clone();
    assert!(SAMPLE_SENTENCES.contains(&final_text.as_str()));
    let mut previous_len = 0;
    for event in &events[1..events.len() - 1] {
        let RealTimeEvent::ResultChanged { result, .. } = event else {
            panic!("expected only partials between begin and end");
        };
        assert!(final_text.starts_with(&result.text));
        assert!(result.text.chars().count() > previous_len);
        previous_len = result.text.chars().count();
    }

    // The final result satisfies every structural invariant
    let final_result = events.last().unwrap().result().unwrap();
    assert!(final_result.is_well_formed());
    assert!(final_result.words.as_ref().unwrap().len() > 0);

    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn pool_wraps_across_sentences() {
    let mut session = SimulatedSession::new(TranscriptionOptions::default());
    let mut rx = subscribe(&mut session).await;
    session.connect().await.unwrap();

    // Collect one more SentenceEnd than the pool holds
    let mut finals = Vec::new();
    while finals.len() <= SAMPLE_SENTENCES.len() {
        let event = timeout(Duration::from_secs(120), rx.recv())
            .await
            .expect("emitter stalled")
            .expect("channel closed early");
        if let RealTimeEvent::SentenceEnd { result, .. } = event {
            finals.push(result.text);
        }
    }
    session.close().await.unwrap();

    // In-order cycle, wrapping to the first sentence
    assert_eq!(finals[0], SAMPLE_SENTENCES[0]);
    assert_eq!(finals[SAMPLE_SENTENCES.len()], SAMPLE_SENTENCES[0]);
}

#[tokio::test(start_paused = true)]
async fn diarization_attaches_fixed_speaker() {
    let options = TranscriptionOptions {
        enable_speaker_diarization: true,
        ..Default::default()
    };
    let mut session = SimulatedSession::new(options);
    let mut rx = subscribe(&mut session).await;
    session.connect().await.unwrap();

    let mut seen_end = false;
    while !seen_end {
        let event = timeout(Duration::from_secs(30), rx.recv())
            .await
            .unwrap()
            .unwrap();
        if let RealTimeEvent::SentenceEnd { result, .. } = &event {
            assert_eq!(result.speaker_id.as_deref(), Some(SIM_SPEAKER_ID));
            assert!(result.speaker_name.as_deref().unwrap().len() > 0);
            seen_end = true;
        }
    }
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn no_events_after_completed() {
    let mut session = SimulatedSession::new(TranscriptionOptions::default());
    let mut rx = subscribe(&mut session).await;
    session.connect().await.unwrap();

    // Let at least one sentence play out
    loop {
        let event = timeout(Duration::from_secs(30), rx.recv())
            .await
            .unwrap()
            .unwrap();
        if matches!(event, RealTimeEvent::SentenceEnd { .. }) {
            break;
        }
    }

    session.close().await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);

    // Drain what was queued: exactly one Completed, and it is the last
    let mut drained = Vec::new();
    while let Ok(event) = rx.try_recv() {
        drained.push(event);
    }
    let completed_count = drained
        .iter()
        .filter(|e| matches!(e, RealTimeEvent::Completed { .. }))
        .count();
    assert_eq!(completed_count, 1);
    assert!(matches!(
        drained.last().unwrap(),
        RealTimeEvent::Completed { .. }
    ));

    // Timers are cancelled: nothing trickles in later
    sleep(Duration::from_secs(5)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn close_before_connect_and_double_close_are_noops() {
    let mut session = SimulatedSession::new(TranscriptionOptions::default());
    session.close().await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    session.close().await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);

    // A closed session never becomes connectable again
    assert!(session.connect().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn second_connect_rejected() {
    let mut session = SimulatedSession::new(TranscriptionOptions::default());
    let _rx = subscribe(&mut session).await;
    session.connect().await.unwrap();
    assert!(session.connect().await.is_err());
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn audio_after_close_is_dropped() {
    let mut session = SimulatedSession::new(TranscriptionOptions::default());
    let _rx = subscribe(&mut session).await;
    session.connect().await.unwrap();
    session.close().await.unwrap();
    // No-op, not an error
    session.send_audio(Bytes::from_static(&[0u8; 64])).await.unwrap();
}
