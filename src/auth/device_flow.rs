//! OAuth device flow state machine.
//!
//! [`DeviceFlow`] holds the transition rules and is free of I/O. The async
//! driver [`poll_for_token`] sleeps and exchanges through two seams, [`Clock`]
//! and [`TokenExchange`], so tests can replay scripted server answers against
//! virtual time.

use std::future::Future;
use std::time::{Duration, Instant};

use super::types::{DeviceAuthorization, PollOutcome};
use crate::error::{AuthError, AuthResult};

/// Added to the poll interval every time GitHub answers `slow_down`
pub const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// Floor for the poll interval; a server answering `interval: 0` still gets
/// one second between exchanges
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Ceiling for both the poll interval and the device code lifetime
pub const MAX_DEVICE_FLOW_DURATION: Duration = Duration::from_secs(3600);

/// Time source for the poll loop
pub trait Clock {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Real time backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// One device-code-for-token exchange with the identity provider
pub trait TokenExchange {
    fn exchange(&self, device_code: &str) -> impl Future<Output = AuthResult<PollOutcome>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFlowState {
    Requested,
    AwaitingAuthorization,
    Granted,
    Expired,
    Denied,
    Failed,
}

impl DeviceFlowState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeviceFlowState::Granted
                | DeviceFlowState::Expired
                | DeviceFlowState::Denied
                | DeviceFlowState::Failed
        )
    }
}

/// What the driver should do after a poll answer
#[derive(Debug, PartialEq, Eq)]
pub enum FlowStep {
    /// Keep polling (interval may have grown)
    Continue,
    /// GitHub issued a token; the caller still has to verify membership
    TokenIssued(String),
}

#[derive(Debug)]
pub struct DeviceFlow {
    state: DeviceFlowState,
    interval: Duration,
    expires_in: Duration,
    deadline: Option<Instant>,
}

impl DeviceFlow {
    /// Server-supplied timings are clamped to
    /// [`MIN_POLL_INTERVAL`]..=[`MAX_DEVICE_FLOW_DURATION`]
    pub fn new(authorization: &DeviceAuthorization) -> Self {
        Self {
            state: DeviceFlowState::Requested,
            interval: authorization
                .poll_interval
                .clamp(MIN_POLL_INTERVAL, MAX_DEVICE_FLOW_DURATION),
            expires_in: authorization.expires_in.min(MAX_DEVICE_FLOW_DURATION),
            deadline: None,
        }
    }

    /// Enter `AwaitingAuthorization`; the deadline is measured from here
    pub fn begin(&mut self, now: Instant) {
        self.state = DeviceFlowState::AwaitingAuthorization;
        self.deadline = Some(now.checked_add(self.expires_in).unwrap_or(now));
    }

    pub fn state(&self) -> DeviceFlowState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long to sleep before the next poll, or `None` once the deadline has
    /// passed. The wait is clamped to the remaining time.
    pub fn next_wait(&self, now: Instant) -> Option<Duration> {
        let deadline = self.deadline?;
        let remaining = deadline.checked_duration_since(now)?;
        if remaining.is_zero() {
            return None;
        }
        Some(self.interval.min(remaining))
    }

    /// Apply one classified poll answer
    pub fn apply(&mut self, outcome: PollOutcome) -> AuthResult<FlowStep> {
        match outcome {
            PollOutcome::Token(token) => Ok(FlowStep::TokenIssued(token)),
            PollOutcome::Pending => Ok(FlowStep::Continue),
            PollOutcome::SlowDown => {
                self.interval = self.interval.saturating_add(SLOW_DOWN_INCREMENT);
                tracing::debug!(interval_secs = self.interval.as_secs(), "GitHub asked to slow down");
                Ok(FlowStep::Continue)
            }
            PollOutcome::Expired => {
                self.state = DeviceFlowState::Expired;
                Err(AuthError::Expired)
            }
            PollOutcome::Denied => {
                self.state = DeviceFlowState::Denied;
                Err(AuthError::Denied)
            }
            PollOutcome::Failed(code) => {
                self.state = DeviceFlowState::Failed;
                Err(AuthError::Upstream(code))
            }
        }
    }

    /// Local deadline passed without a terminal answer from GitHub
    pub fn expire(&mut self) -> AuthError {
        self.state = DeviceFlowState::Expired;
        AuthError::TimedOut
    }

    /// Token issued and membership verified
    pub fn grant(&mut self) {
        self.state = DeviceFlowState::Granted;
    }

    /// Token issued but unusable (membership, identity or transport failure)
    pub fn fail(&mut self) {
        self.state = DeviceFlowState::Failed;
    }
}

/// Drive `flow` until GitHub issues a token or the flow reaches a terminal
/// state.
///
/// Each round sleeps for the current interval, then exchanges the device code.
/// Transport errors end the flow in `Failed`.
pub async fn poll_for_token<E, C>(
    flow: &mut DeviceFlow,
    exchange: &E,
    clock: &C,
    device_code: &str,
) -> AuthResult<String>
where
    E: TokenExchange,
    C: Clock,
{
    if flow.state() == DeviceFlowState::Requested {
        flow.begin(clock.now());
    }

    let mut attempt: u32 = 0;
    loop {
        let Some(wait) = flow.next_wait(clock.now()) else {
            tracing::info!(attempts = attempt, "Device flow deadline reached");
            return Err(flow.expire());
        };

        clock.sleep(wait).await;
        attempt += 1;

        let outcome = match exchange.exchange(device_code).await {
            Ok(outcome) => outcome,
            Err(e) => {
                flow.fail();
                return Err(e);
            }
        };
        tracing::debug!(attempt, outcome = ?redacted(&outcome), "Device flow poll");

        if let FlowStep::TokenIssued(token) = flow.apply(outcome)? {
            return Ok(token);
        }
    }
}

fn redacted(outcome: &PollOutcome) -> &'static str {
    match outcome {
        PollOutcome::Token(_) => "token",
        PollOutcome::Pending => "authorization_pending",
        PollOutcome::SlowDown => "slow_down",
        PollOutcome::Expired => "expired_token",
        PollOutcome::Denied => "access_denied",
        PollOutcome::Failed(_) => "error",
    }
}
