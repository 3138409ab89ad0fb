//! Redemption session state machine.
//!
//! A session walks a customer from a scanned token to a voucher:
//!
//! ```text
//! Validating -> Registering -> [ReviewGating] -> Spinning -> Revealing -> Done
//! ```
//!
//! Any non-terminal stage can fall into [`Stage::Errored`] (terminal for the
//! token) or [`Stage::Abandoned`]. There is no way back: recovery is a new
//! session with a new token, see [`Session::restart`].
//!
//! The only way into [`Stage::Done`] is the wheel's completion signal,
//! awaited by [`Session::reveal`]. The play response alone never finishes the
//! flow.

use std::{fmt, sync::Arc, time::Duration};

use api_types::{
    customer::Customer,
    play::PlayResult,
    prize::Prize,
    session::BranchSession,
};
use chrono::Utc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{
    AddressLookup, BackendError, FlowError, RewardBackend, SessionError,
    deeplink::Token,
    events::SessionEvent,
    fraud::{check_quota, quota_selector},
    identity::{Registration, RegistrationForm},
    review::{ReviewGate, reviewed_today},
    voucher::Voucher,
    wheel::{SPIN_DURATION, SpinCompletion, SpinPlan, Wheel},
};

#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Go straight to the wheel after registration.
    pub skip_review: bool,
    /// Always [`SPIN_DURATION`] outside tests, which shorten it to keep
    /// real-time runs fast.
    pub spin_duration: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            skip_review: false,
            spin_duration: SPIN_DURATION,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Registering,
    ReviewGating,
    Spinning,
    Revealing,
    Done,
    Errored(SessionError),
    Abandoned,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Registering => "registering",
            Self::ReviewGating => "review_gating",
            Self::Spinning => "spinning",
            Self::Revealing => "revealing",
            Self::Done => "done",
            Self::Errored(_) => "errored",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Errored(_) | Self::Abandoned)
    }

    /// Legal transitions. Forward only, no skipping except the optional
    /// review gate.
    pub fn can_advance_to(&self, next: &Stage) -> bool {
        use Stage::*;

        match (self, next) {
            (Validating, Registering)
            | (Registering, ReviewGating | Spinning)
            | (ReviewGating, Spinning)
            | (Spinning, Revealing)
            | (Revealing, Done) => true,
            (
                Validating | Registering | ReviewGating | Spinning | Revealing,
                Errored(_) | Abandoned,
            ) => true,
            (Done | Errored(_) | Abandoned, _) => false,
            (Validating | Registering | ReviewGating | Spinning | Revealing, _) => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Non-blocking notices shown next to the wheel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionWarning {
    NoActivePrizes,
}

impl fmt::Display for SessionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoActivePrizes => f.write_str("No prizes are active at the moment."),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlayAttempt {
    /// The outcome is known and the wheel is animating toward it.
    Started(SpinPlan),
    /// A play was already requested; this one was dropped.
    Ignored,
}

pub struct Session<B, L> {
    backend: Arc<B>,
    lookup: Arc<L>,
    options: SessionOptions,
    stage: Stage,
    token: Option<Token>,
    branch: Option<BranchSession>,
    registration: Option<Registration>,
    customer: Option<Customer>,
    network_address: Option<String>,
    address_looked_up: bool,
    review: Option<ReviewGate>,
    wheel: Option<Wheel>,
    warning: Option<SessionWarning>,
    play_in_flight: bool,
    outcome: Option<PlayResult>,
    completion: Option<SpinCompletion>,
    voucher: Option<Voucher>,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: Option<UnboundedReceiver<SessionEvent>>,
}

impl<B: RewardBackend, L: AddressLookup> Session<B, L> {
    pub fn new(backend: Arc<B>, lookup: Arc<L>, options: SessionOptions) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            lookup,
            options,
            stage: Stage::Validating,
            token: None,
            branch: None,
            registration: None,
            customer: None,
            network_address: None,
            address_looked_up: false,
            review: None,
            wheel: None,
            warning: None,
            play_in_flight: false,
            outcome: None,
            completion: None,
            voucher: None,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Throw this session away and start over. Nothing carries across.
    pub fn restart(self) -> Self {
        Self::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.lookup),
            self.options.clone(),
        )
    }

    /// Event stream of this session. Can be taken only once.
    pub fn events(&mut self) -> Option<UnboundedReceiver<SessionEvent>> {
        self.events_rx.take()
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn branch(&self) -> Option<&BranchSession> {
        self.branch.as_ref()
    }

    pub fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    pub fn network_address(&self) -> Option<&str> {
        self.network_address.as_deref()
    }

    pub fn review_gate(&self) -> Option<&ReviewGate> {
        self.review.as_ref()
    }

    pub fn wheel(&self) -> Option<&Wheel> {
        self.wheel.as_ref()
    }

    pub fn wheel_mut(&mut self) -> Option<&mut Wheel> {
        self.wheel.as_mut()
    }

    pub fn prizes(&self) -> &[Prize] {
        self.wheel.as_ref().map(Wheel::segments).unwrap_or_default()
    }

    pub fn warning(&self) -> Option<SessionWarning> {
        self.warning
    }

    pub fn outcome(&self) -> Option<&PlayResult> {
        self.outcome.as_ref()
    }

    pub fn voucher(&self) -> Option<&Voucher> {
        self.voucher.as_ref()
    }

    /// Validate the token. Called exactly once, on entry.
    pub async fn validate(&mut self, token: Token) -> Result<BranchSession, FlowError> {
        self.expect(Stage::Validating)?;

        let branch = match self.backend.validate_session(token.as_str()).await {
            Ok(branch) => branch,
            Err(BackendError::Rejected { message, .. }) => {
                return Err(self.fail(SessionError::TokenInvalidOrUsed(message)));
            }
            Err(err) => return Err(self.fail(err.into())),
        };

        tracing::info!("session validated for branch {}", branch.branch_name);
        self.token = Some(token);
        self.branch = Some(branch.clone());
        self.advance(Stage::Registering)?;
        Ok(branch)
    }

    /// Register the customer and run the quota pre-check.
    ///
    /// Form errors leave the session in [`Stage::Registering`] so the
    /// customer can correct them. Returns the stage reached.
    pub async fn register(&mut self, form: RegistrationForm) -> Result<Stage, FlowError> {
        self.expect(Stage::Registering)?;
        let registration = Registration::try_from(form)?;
        let Some(branch) = self.branch.clone() else {
            return Err(self.fail(SessionError::NetworkOrServer(
                "session has no branch".to_string(),
            )));
        };

        let address = self.resolve_address().await;

        let customer = match self
            .backend
            .upsert_customer(&registration.upsert_request())
            .await
        {
            Ok(customer) => customer,
            Err(err) => return Err(self.fail(err.into())),
        };
        tracing::debug!("customer {} registered", customer.id);

        let selector = quota_selector(address.as_deref(), customer.id);
        if let Err(err) = check_quota(self.backend.as_ref(), &selector).await {
            return Err(self.fail(err));
        }

        let customer_id = customer.id;
        self.registration = Some(registration);
        self.customer = Some(customer);

        let bypass = self.options.skip_review
            || reviewed_today(
                self.backend.as_ref(),
                customer_id,
                branch.branch_id,
                Some(&self.events_tx),
            )
            .await;

        if bypass {
            self.load_prizes().await?;
            self.advance(Stage::Spinning)?;
        } else {
            self.review = Some(ReviewGate::new(
                &branch.review_url,
                customer_id,
                branch.branch_id,
            ));
            self.advance(Stage::ReviewGating)?;
        }
        Ok(self.stage.clone())
    }

    /// Open the external review page. Returns the URL to open.
    pub fn open_review(&mut self) -> Result<String, FlowError> {
        self.expect(Stage::ReviewGating)?;
        let Some(gate) = self.review.as_mut() else {
            return Err(self.wrong_stage("review_gating"));
        };
        let url = gate.open(&self.backend, Some(self.events_tx.clone()));
        Ok(url.to_string())
    }

    /// The customer says they rated: load the prizes and show the wheel.
    pub async fn confirm_review(&mut self) -> Result<&[Prize], FlowError> {
        self.expect(Stage::ReviewGating)?;
        if !self.review.as_ref().is_some_and(ReviewGate::can_confirm) {
            return Err(FlowError::ReviewNotOpened);
        }
        self.load_prizes().await?;
        self.advance(Stage::Spinning)?;
        Ok(self.prizes())
    }

    /// Ask the backend for the outcome and start the wheel toward it.
    pub async fn play(&mut self) -> Result<PlayAttempt, FlowError> {
        match self.stage {
            Stage::Spinning if !self.play_in_flight => {}
            Stage::Spinning | Stage::Revealing | Stage::Done => {
                tracing::debug!("play ignored while {}", self.stage);
                return Ok(PlayAttempt::Ignored);
            }
            _ => return Err(self.wrong_stage("spinning")),
        }

        let (Some(token), Some(registration)) = (&self.token, &self.registration) else {
            return Err(self.fail(SessionError::NetworkOrServer(
                "session is not registered".to_string(),
            )));
        };
        let request = registration.play_request(token.as_str(), self.network_address.as_deref());

        // Stays set if this future is dropped mid-call: the token may already
        // be consumed, so no further play is attempted.
        self.play_in_flight = true;
        let result = self.backend.play(&request).await;
        self.play_in_flight = false;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("play failed: {err}");
                return Err(self.fail(err.into()));
            }
        };

        let spin = self.wheel.as_mut().and_then(|wheel| {
            let index = wheel.index_of(outcome.prize.id)?;
            wheel.play(index).ok()
        });
        let Some((plan, completion)) = spin else {
            return Err(self.fail(SessionError::NetworkOrServer(format!(
                "prize {} is not on the wheel (voucher {})",
                outcome.prize.name, outcome.voucher_code
            ))));
        };

        tracing::info!("play won {}", outcome.prize.name);
        self.outcome = Some(outcome);
        self.completion = Some(completion);
        self.advance(Stage::Revealing)?;
        Ok(PlayAttempt::Started(plan))
    }

    /// Wait for the wheel to stop, then issue the voucher.
    ///
    /// Safe to cancel and call again while the wheel is still turning.
    pub async fn reveal(&mut self) -> Result<Voucher, FlowError> {
        self.expect(Stage::Revealing)?;

        let completed = match self.completion.as_mut() {
            Some(completion) => completion.wait().await,
            None => None,
        };
        self.completion = None;

        let Some(completed) = completed else {
            self.advance(Stage::Abandoned)?;
            return Err(FlowError::SpinAbandoned);
        };

        let (Some(outcome), Some(customer), Some(branch)) =
            (&self.outcome, &self.customer, &self.branch)
        else {
            return Err(self.fail(SessionError::NetworkOrServer(
                "spin finished without an outcome".to_string(),
            )));
        };
        let voucher = Voucher::issue(outcome, customer, branch, Utc::now());
        tracing::info!(
            "spin {} revealed {} with voucher {}",
            completed.play,
            voucher.prize_name,
            voucher.code
        );

        self.voucher = Some(voucher.clone());
        self.advance(Stage::Done)?;
        let _ = self.events_tx.send(SessionEvent::Revealed(voucher.clone()));
        Ok(voucher)
    }

    /// Leave the flow. Cancels a running spin; the token is not given back.
    pub fn abandon(&mut self) {
        if self.stage.is_terminal() {
            return;
        }
        self.completion = None;
        self.wheel = None;
        let _ = self.advance(Stage::Abandoned);
    }

    async fn resolve_address(&mut self) -> Option<String> {
        if !self.address_looked_up {
            self.address_looked_up = true;
            match self.lookup.lookup().await {
                Ok(address) => self.network_address = Some(address),
                Err(err) => {
                    tracing::warn!("network address lookup failed: {err}");
                    let _ = self.events_tx.send(SessionEvent::BestEffortFailed {
                        operation: "network address lookup",
                        message: err.to_string(),
                    });
                }
            }
        }
        self.network_address.clone()
    }

    async fn load_prizes(&mut self) -> Result<(), FlowError> {
        let prizes = match self.backend.active_prizes().await {
            Ok(prizes) => prizes,
            Err(err) => return Err(self.fail(err.into())),
        };

        match Wheel::with_duration(prizes, self.options.spin_duration) {
            Ok(wheel) => {
                tracing::debug!("wheel ready with {} prizes", wheel.segments().len());
                self.wheel = Some(wheel);
            }
            Err(_) => {
                tracing::warn!("no active prizes to show");
                self.warning = Some(SessionWarning::NoActivePrizes);
            }
        }
        Ok(())
    }

    fn expect(&self, expected: Stage) -> Result<(), FlowError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(self.wrong_stage(expected.name()))
        }
    }

    fn wrong_stage(&self, expected: &'static str) -> FlowError {
        FlowError::WrongStage {
            expected,
            actual: self.stage.clone(),
        }
    }

    fn advance(&mut self, next: Stage) -> Result<(), FlowError> {
        if !self.stage.can_advance_to(&next) {
            tracing::error!("illegal transition {} -> {}", self.stage, next);
            return Err(self.wrong_stage(next.name()));
        }
        let from = std::mem::replace(&mut self.stage, next.clone());
        tracing::debug!("session {from} -> {next}");
        let _ = self
            .events_tx
            .send(SessionEvent::StageChanged { from, to: next });
        Ok(())
    }

    fn fail(&mut self, err: SessionError) -> FlowError {
        tracing::warn!("session failed: {} ({err})", err.kind().code());
        let _ = self.advance(Stage::Errored(err.clone()));
        FlowError::Terminal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_only() {
        assert!(Stage::Validating.can_advance_to(&Stage::Registering));
        assert!(Stage::Registering.can_advance_to(&Stage::Spinning));
        assert!(Stage::Registering.can_advance_to(&Stage::ReviewGating));
        assert!(!Stage::Validating.can_advance_to(&Stage::Spinning));
        assert!(!Stage::Spinning.can_advance_to(&Stage::Done));
        assert!(!Stage::Revealing.can_advance_to(&Stage::Spinning));
        assert!(!Stage::Spinning.can_advance_to(&Stage::Spinning));
    }

    #[test]
    fn terminal_stages_are_final() {
        let errored = Stage::Errored(SessionError::DailyLimitExceeded);
        assert!(Stage::Revealing.can_advance_to(&errored));
        assert!(Stage::Spinning.can_advance_to(&Stage::Abandoned));
        for stage in [Stage::Done, errored.clone(), Stage::Abandoned] {
            assert!(stage.is_terminal());
            assert!(!stage.can_advance_to(&Stage::Validating));
            assert!(!stage.can_advance_to(&errored));
        }
    }
}
