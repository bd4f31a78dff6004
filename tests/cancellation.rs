//! Cancellation of blocking stream reads.

use cernml_utils::{
    subscribe_param, ReplayClient, Scripted, StreamConfig, StreamError, Token, TokenSource,
};
use std::thread;
use std::time::{Duration, Instant};

const STEP: Duration = Duration::from_millis(10);

fn script(values: &[u32]) -> Vec<Scripted<u32>> {
    values.iter().copied().map(Scripted::Value).collect()
}

fn with_token(token: Token) -> StreamConfig {
    StreamConfig {
        token: Some(token),
        maxlen: None,
        ..Default::default()
    }
}

#[test]
fn test_cancelled_token_raises_immediately() {
    let client = ReplayClient::new(script(&[1])).with_time_step(Duration::from_millis(200));
    let stream = subscribe_param(&client, "dev", with_token(Token::cancelled())).unwrap();

    let result = {
        let active = stream.monitor();
        active.pop_or_wait(None)
    };
    assert!(matches!(result, Err(StreamError::Cancelled(_))));
    assert!(result.unwrap_err().is_cancelled());
    assert!(!stream.is_ready());
}

#[test]
fn test_cancel_preempts_ready() {
    let client = ReplayClient::new(script(&[1]));
    let stream = subscribe_param(&client, "dev", with_token(Token::cancelled())).unwrap();

    let result = {
        let active = stream.monitor();
        client.last_handle().unwrap().wait_delivered();
        active.pop_or_wait(None)
    };
    assert!(matches!(result, Err(StreamError::Cancelled(_))));
    // The queued value is left alone.
    assert!(stream.is_ready());
    assert_eq!(stream.oldest().unwrap().0, 1);
}

#[test]
fn test_cancelled_wait_for_next() {
    let client = ReplayClient::<u32>::new(vec![]);
    let stream = subscribe_param(&client, "dev", with_token(Token::cancelled())).unwrap();

    let active = stream.monitor();
    let result = active.wait_for_next(Some(Duration::from_secs(5)));
    assert!(matches!(result, Err(StreamError::Cancelled(_))));
}

#[test]
fn test_pop_if_ready_ignores_cancellation() {
    let client = ReplayClient::new(script(&[1]));
    let stream = subscribe_param(&client, "dev", with_token(Token::cancelled())).unwrap();
    {
        let _active = stream.monitor();
        client.last_handle().unwrap().wait_delivered();
    }
    assert_eq!(stream.pop_if_ready().unwrap().unwrap().0, 1);
    assert!(stream.pop_if_ready().unwrap().is_none());
}

#[test]
fn test_cancel_breaks_deadlock() {
    let sent = [1, 2, 3];
    let client = ReplayClient::new(script(&sent));
    let source = TokenSource::new();
    let stream = subscribe_param(&client, "dev", with_token(source.token())).unwrap();
    let replay = client.last_handle().unwrap();

    let mut received = Vec::new();
    let error = {
        let active = stream.monitor();
        thread::scope(|s| {
            s.spawn(|| {
                replay.wait_delivered();
                thread::sleep(STEP);
                source.cancel();
            });
            // Would block forever without the cancellation.
            loop {
                match active.pop_or_wait(None) {
                    Ok(Some((value, _))) => received.push(value),
                    Ok(None) => unreachable!("no timeout given"),
                    Err(e) => break e,
                }
            }
        })
    };

    assert!(error.is_cancelled());
    assert_eq!(received, sent.to_vec());
    assert!(!stream.is_ready());
}

#[test]
fn test_cancel_interrupts_timed_wait() {
    let client = ReplayClient::<u32>::new(vec![]);
    let source = TokenSource::new();
    let stream = subscribe_param(&client, "dev", with_token(source.token())).unwrap();

    let active = stream.monitor();
    let start = Instant::now();
    let result = thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(5 * STEP);
            source.cancel();
        });
        active.pop_or_wait(Some(Duration::from_secs(30)))
    });

    assert!(matches!(result, Err(StreamError::Cancelled(_))));
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_cancellation_is_sticky() {
    let client = ReplayClient::<u32>::new(vec![]);
    let source = TokenSource::new();
    let stream = subscribe_param(&client, "dev", with_token(source.token())).unwrap();
    source.cancel();

    let active = stream.monitor();
    for _ in 0..3 {
        assert!(active.pop_or_wait(Some(STEP)).unwrap_err().is_cancelled());
    }
}

#[test]
fn test_new_token_revives_stream() {
    let client = ReplayClient::new(script(&[5]));
    let stream = subscribe_param(&client, "dev", with_token(Token::cancelled())).unwrap();

    {
        let active = stream.monitor();
        assert!(active.pop_or_wait(None).unwrap_err().is_cancelled());
    }

    let source = TokenSource::new();
    stream.set_token(Some(source.token())).unwrap();
    stream.clear();

    let active = stream.monitor();
    assert_eq!(active.pop_or_wait(None).unwrap().unwrap().0, 5);
}

#[test]
fn test_set_token_rebinds_wakeups() {
    let client = ReplayClient::<u32>::new(vec![]);
    let old = TokenSource::new();
    let stream = subscribe_param(&client, "dev", with_token(old.token())).unwrap();

    let source = TokenSource::new();
    stream.set_token(Some(source.token())).unwrap();
    assert!(stream.token().unwrap().ptr_eq(&source.token()));

    let active = stream.monitor();
    let start = Instant::now();
    let result = thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(5 * STEP);
            source.cancel();
        });
        active.pop_or_wait(Some(Duration::from_secs(10)))
    });

    assert!(result.unwrap_err().is_cancelled());
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(!old.is_cancellation_requested());
}
