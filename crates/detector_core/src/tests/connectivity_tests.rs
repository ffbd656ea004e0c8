use super::*;
use async_trait::async_trait;
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

#[derive(Default)]
struct FakeRadio {
    results: Mutex<VecDeque<Result<(), LinkError>>>,
    link_up: AtomicBool,
    connect_calls: AtomicUsize,
    hang: bool,
}

impl FakeRadio {
    fn with_results(results: Vec<Result<(), LinkError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    fn drop_link(&self) {
        self.link_up.store(false, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RadioLink for FakeRadio {
    async fn connect(
        &self,
        _credentials: &WifiCredentials,
        _timeout: Duration,
    ) -> Result<(), LinkError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        let result = self
            .results
            .lock()
            .expect("results lock")
            .pop_front()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.link_up.store(true, Ordering::SeqCst);
        }
        result
    }

    fn is_link_up(&self) -> bool {
        self.link_up.load(Ordering::SeqCst)
    }
}

fn credentials() -> WifiCredentials {
    WifiCredentials {
        ssid: "home".into(),
        password: "pw".into(),
    }
}

fn supervisor(radio: Arc<FakeRadio>) -> ConnectivitySupervisor {
    ConnectivitySupervisor::new(radio, credentials(), ReconnectPolicy::default())
}

fn at(millis: u64) -> Timestamp {
    Timestamp::from_millis(millis)
}

#[tokio::test]
async fn connects_over_two_ticks() {
    let radio = Arc::new(FakeRadio::default());
    let mut link = supervisor(radio.clone());
    assert_eq!(link.current_state(), LinkState::Disconnected);

    assert_eq!(link.tick(at(0)).await, LinkState::Connecting);
    assert_eq!(radio.calls(), 0);

    assert_eq!(link.tick(at(100)).await, LinkState::Connected);
    assert_eq!(radio.calls(), 1);

    assert_eq!(link.tick(at(200)).await, LinkState::Connected);
    assert_eq!(radio.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_attempt_passes_through_failed_and_backs_off() {
    let radio = Arc::new(FakeRadio::with_results(vec![
        Err(LinkError::Rejected),
        Ok(()),
    ]));
    let mut link = supervisor(radio.clone());

    assert_eq!(link.tick(at(0)).await, LinkState::Connecting);
    assert_eq!(link.tick(at(100)).await, LinkState::Failed);
    assert_eq!(link.consecutive_failures(), 1);
    assert_eq!(link.retry_at(), Some(at(600)));

    assert_eq!(link.tick(at(200)).await, LinkState::Disconnected);
    assert_eq!(link.tick(at(300)).await, LinkState::Disconnected);
    assert_eq!(link.tick(at(500)).await, LinkState::Disconnected);
    assert_eq!(radio.calls(), 1);

    assert_eq!(link.tick(at(600)).await, LinkState::Connecting);
    assert_eq!(link.tick(at(700)).await, LinkState::Connected);
    assert_eq!(link.consecutive_failures(), 0);
    assert_eq!(link.retry_at(), None);
    assert_eq!(radio.calls(), 2);
}

#[tokio::test]
async fn never_connected_without_successful_connect() {
    let radio = Arc::new(FakeRadio::with_results(vec![
        Err(LinkError::Radio("no carrier".into()));
        5
    ]));
    let mut link = supervisor(radio.clone());

    for t in (0..200_000).step_by(100) {
        let state = link.tick(at(t)).await;
        assert_ne!(state, LinkState::Connected, "connected at {t} without success");
        if radio.calls() == 5 && state == LinkState::Failed {
            break;
        }
    }
    assert_eq!(radio.calls(), 5);
    assert_eq!(link.consecutive_failures(), 5);
}

#[tokio::test]
async fn link_loss_is_noticed_within_one_tick_and_retried_immediately() {
    let radio = Arc::new(FakeRadio::default());
    let mut link = supervisor(radio.clone());
    link.tick(at(0)).await;
    assert_eq!(link.tick(at(100)).await, LinkState::Connected);

    radio.drop_link();
    assert_eq!(link.tick(at(200)).await, LinkState::Disconnected);
    assert_eq!(link.tick(at(300)).await, LinkState::Connecting);
    assert_eq!(link.tick(at(400)).await, LinkState::Connected);
    assert_eq!(radio.calls(), 2);
}

#[tokio::test]
async fn current_state_is_stable_between_ticks() {
    let radio = Arc::new(FakeRadio::default());
    let mut link = supervisor(radio.clone());
    link.tick(at(0)).await;

    let observed: Vec<_> = (0..5).map(|_| link.current_state()).collect();
    assert!(observed.iter().all(|state| *state == LinkState::Connecting));
    assert_eq!(radio.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_driver_is_cut_off_by_connect_timeout() {
    let radio = Arc::new(FakeRadio::hanging());
    let policy = ReconnectPolicy {
        connect_timeout: Duration::from_secs(2),
        ..ReconnectPolicy::default()
    };
    let mut link = ConnectivitySupervisor::new(radio.clone(), credentials(), policy);

    link.tick(at(0)).await;
    let started = tokio::time::Instant::now();
    assert_eq!(link.tick(at(100)).await, LinkState::Failed);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(radio.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn backoff_counts_from_the_end_of_a_timed_out_attempt() {
    let radio = Arc::new(FakeRadio::hanging());
    let policy = ReconnectPolicy {
        connect_timeout: Duration::from_secs(2),
        initial_backoff: Duration::from_secs(4),
        max_backoff: Duration::from_secs(30),
    };
    let mut link = ConnectivitySupervisor::new(radio.clone(), credentials(), policy);

    link.tick(at(0)).await;
    assert_eq!(link.tick(at(100)).await, LinkState::Failed);

    // attempt began at 100ms, timed out 2s later, then waits the full 4s
    let retry_at = link.retry_at().expect("retry scheduled");
    assert!(retry_at >= at(6_100), "retry at {retry_at} ignores attempt duration");
    assert!(retry_at < at(6_200), "retry at {retry_at}");

    assert_eq!(link.tick(at(2_200)).await, LinkState::Disconnected);
    assert_eq!(link.tick(at(4_100)).await, LinkState::Disconnected);
    assert_eq!(link.tick(at(6_000)).await, LinkState::Disconnected);
    assert_eq!(radio.calls(), 1);

    assert_eq!(link.tick(at(6_200)).await, LinkState::Connecting);
}

#[test]
fn backoff_doubles_and_caps() {
    let policy = ReconnectPolicy {
        connect_timeout: Duration::from_secs(1),
        initial_backoff: Duration::from_millis(500),
        max_backoff: Duration::from_secs(4),
    };
    assert_eq!(policy.backoff_after(0), Duration::ZERO);
    assert_eq!(policy.backoff_after(1), Duration::from_millis(500));
    assert_eq!(policy.backoff_after(2), Duration::from_secs(1));
    assert_eq!(policy.backoff_after(4), Duration::from_secs(4));
    assert_eq!(policy.backoff_after(40), Duration::from_secs(4));
}
