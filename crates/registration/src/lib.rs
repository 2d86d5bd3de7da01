#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![deny(unused_features)]
#![warn(unused_crate_dependencies)]

//! Push registration coordinator.
//!
//! Owns the launch sequence "request permission, register with the
//! platform, receive platform token, exchange it for a messaging
//! service token, report the outcome". The platform and the messaging
//! backend are injectable collaborators.

pub mod state;

use std::{future::Future, sync::Arc};

use error_stack::Result;
use model::{MessagingToken, PermissionOptions, PermissionState, PlatformToken};
use simple_agent::AgentQuitWatcher;
use tokio::{
    sync::mpsc::{Receiver, Sender, error::TrySendError},
    task::{JoinHandle, JoinSet},
};
use tracing::{error, info, warn};

use crate::state::{RegistrationState, RegistrationTransition};

const PLATFORM_EVENT_CHANNEL_BUFFER_SIZE: usize = 1024;
const EXCHANGE_OUTCOME_CHANNEL_BUFFER_SIZE: usize = 1024;

#[derive(thiserror::Error, Debug)]
pub enum RegistrationError {
    #[error("Requesting notification permission failed")]
    PermissionRequestFailed,
    #[error("Messaging token exchange failed")]
    ExchangeFailed,
}

pub struct RegistrationCoordinatorQuitHandle {
    task: JoinHandle<()>,
}

impl RegistrationCoordinatorQuitHandle {
    pub async fn wait_quit(self) {
        match self.task.await {
            Ok(()) => (),
            Err(e) => {
                warn!(
                    "RegistrationCoordinatorQuitHandle quit failed. Error: {:?}",
                    e
                );
            }
        }
    }
}

/// Platform push transport event delivered to the coordinator.
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    TokenReceived(PlatformToken),
    RegistrationFailed { message: String },
}

#[derive(Debug, Clone)]
pub struct PlatformEventSender {
    sender: Sender<PlatformEvent>,
}

impl PlatformEventSender {
    pub fn send_token_received(&self, token: PlatformToken) {
        self.send(PlatformEvent::TokenReceived(token));
    }

    pub fn send_registration_failed(&self, message: String) {
        self.send(PlatformEvent::RegistrationFailed { message });
    }

    fn send(&self, event: PlatformEvent) {
        match self.sender.try_send(event) {
            Ok(()) => (),
            Err(TrySendError::Closed(_)) => {
                error!("Sending platform event to internal channel failed: channel is broken");
            }
            Err(TrySendError::Full(_)) => {
                error!("Sending platform event to internal channel failed: channel is full");
            }
        }
    }
}

pub fn channel() -> (PlatformEventSender, PlatformEventReceiver) {
    let (sender, receiver) = tokio::sync::mpsc::channel(PLATFORM_EVENT_CHANNEL_BUFFER_SIZE);
    let sender = PlatformEventSender { sender };
    let receiver = PlatformEventReceiver { receiver };
    (sender, receiver)
}

#[derive(Debug)]
pub struct PlatformEventReceiver {
    receiver: Receiver<PlatformEvent>,
}

/// Result of one messaging token exchange.
///
/// Every received platform token produces exactly one outcome.
#[derive(Debug)]
pub enum ExchangeOutcome {
    Exchanged {
        platform_token: PlatformToken,
        messaging_token: MessagingToken,
    },
    ExchangeFailed {
        platform_token: PlatformToken,
    },
}

#[derive(Debug)]
pub struct ExchangeOutcomeReceiver {
    receiver: Receiver<ExchangeOutcome>,
}

impl ExchangeOutcomeReceiver {
    pub async fn recv(&mut self) -> Option<ExchangeOutcome> {
        self.receiver.recv().await
    }
}

/// Platform permission and push registration collaborator.
pub trait PushPlatform {
    fn request_notification_permission(
        &self,
        options: PermissionOptions,
    ) -> impl Future<Output = Result<PermissionState, RegistrationError>> + Send;

    /// Start platform push registration.
    ///
    /// Completion is asynchronous: the platform delivers
    /// [PlatformEvent::TokenReceived] or
    /// [PlatformEvent::RegistrationFailed] on the event channel.
    fn register_for_remote_notifications(&self) -> impl Future<Output = ()> + Send;
}

/// Messaging backend token service collaborator.
pub trait MessagingTokenExchanger {
    fn exchange_messaging_token(
        &self,
        token: PlatformToken,
    ) -> impl Future<Output = Result<MessagingToken, RegistrationError>> + Send;
}

pub struct RegistrationCoordinator<P, E> {
    platform: P,
    exchanger: Arc<E>,
    receiver: PlatformEventReceiver,
    exchange_tasks: JoinSet<ExchangeOutcome>,
    outcome_sender: Sender<ExchangeOutcome>,
    permission_options: PermissionOptions,
    state: RegistrationState,
}

impl<P, E> RegistrationCoordinator<P, E>
where
    P: PushPlatform + Send + 'static,
    E: MessagingTokenExchanger + Send + Sync + 'static,
{
    pub fn new_coordinator(
        permission_options: PermissionOptions,
        quit_notification: AgentQuitWatcher,
        platform: P,
        exchanger: E,
        receiver: PlatformEventReceiver,
    ) -> (RegistrationCoordinatorQuitHandle, ExchangeOutcomeReceiver) {
        let (outcome_sender, outcome_receiver) =
            tokio::sync::mpsc::channel(EXCHANGE_OUTCOME_CHANNEL_BUFFER_SIZE);

        let coordinator = RegistrationCoordinator {
            platform,
            exchanger: Arc::new(exchanger),
            receiver,
            exchange_tasks: JoinSet::new(),
            outcome_sender,
            permission_options,
            state: RegistrationState::Start,
        };

        let handle = RegistrationCoordinatorQuitHandle {
            task: tokio::spawn(coordinator.run(quit_notification)),
        };

        let outcome_receiver = ExchangeOutcomeReceiver {
            receiver: outcome_receiver,
        };

        (handle, outcome_receiver)
    }

    pub async fn run(mut self, mut quit_notification: AgentQuitWatcher) {
        tokio::select! {
            _ = quit_notification.recv() => (),
            _ = self.logic() => (),
        }

        // Make sure that quit started (closed event channel also
        // breaks the logic loop, but that should not happen)
        let _ = quit_notification.recv().await;

        self.quit_logic().await;
    }

    async fn logic(&mut self) {
        self.apply_transition(RegistrationTransition::RequestPermission);

        let permission = match self
            .platform
            .request_notification_permission(self.permission_options)
            .await
        {
            Ok(permission) => permission,
            Err(e) => {
                error!("Notification permission request failed: {:?}", e);
                PermissionState::Denied
            }
        };

        if !permission.is_granted() {
            self.apply_transition(RegistrationTransition::PermissionDenied);
            info!("Push notifications are unavailable for this session");
            return;
        }

        self.apply_transition(RegistrationTransition::PermissionGranted);
        self.platform.register_for_remote_notifications().await;

        loop {
            tokio::select! {
                event = self.receiver.receiver.recv() => {
                    match event {
                        Some(event) => self.handle_platform_event(event),
                        None => {
                            warn!("Platform event channel is broken");
                            break;
                        }
                    }
                }
                // This branch is disabled when no exchange is in
                // flight as join_next() returns None.
                Some(outcome) = self.exchange_tasks.join_next() => {
                    match outcome {
                        Ok(outcome) => self.handle_exchange_outcome(outcome),
                        Err(e) => error!("Exchange task failed: {:?}", e),
                    }
                }
            }
        }
    }

    async fn quit_logic(&mut self) {
        // Initiated exchanges run to completion or failure. The HTTP
        // request timeout bounds the wait.
        while let Some(outcome) = self.exchange_tasks.join_next().await {
            match outcome {
                Ok(outcome) => self.handle_exchange_outcome(outcome),
                Err(e) => error!("Exchange task failed: {:?}", e),
            }
        }
    }

    fn handle_platform_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::TokenReceived(token) => {
                // Token refresh delivers a new token here. Every
                // delivery starts a fresh exchange, also when the token
                // bytes did not change.
                self.apply_transition(RegistrationTransition::TokenReceived);
                let exchanger = self.exchanger.clone();
                self.exchange_tasks.spawn(async move {
                    match exchanger.exchange_messaging_token(token.clone()).await {
                        Ok(messaging_token) => ExchangeOutcome::Exchanged {
                            platform_token: token,
                            messaging_token,
                        },
                        Err(e) => {
                            error!("Messaging token exchange failed: {:?}", e);
                            ExchangeOutcome::ExchangeFailed {
                                platform_token: token,
                            }
                        }
                    }
                });
            }
            PlatformEvent::RegistrationFailed { message } => {
                error!("Registering for remote notifications failed: {}", message);
                self.apply_transition(RegistrationTransition::RegistrationFailed);
            }
        }
    }

    fn handle_exchange_outcome(&mut self, outcome: ExchangeOutcome) {
        match &outcome {
            ExchangeOutcome::Exchanged { .. } => {
                self.apply_transition(RegistrationTransition::ExchangeSucceeded);
            }
            ExchangeOutcome::ExchangeFailed { .. } => {
                self.apply_transition(RegistrationTransition::ExchangeFailed);
            }
        }

        match self.outcome_sender.try_send(outcome) {
            Ok(()) => (),
            Err(TrySendError::Closed(_)) => {
                error!("Sending exchange outcome to internal channel failed: channel is broken");
            }
            Err(TrySendError::Full(_)) => {
                error!("Sending exchange outcome to internal channel failed: channel is full");
            }
        }
    }

    fn apply_transition(&mut self, transition: RegistrationTransition) {
        let next = self.state.apply(transition);
        if next != self.state {
            info!("Registration state changed: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use model::{MessagingToken, PermissionOptions, PermissionState, PlatformToken};
    use tokio::sync::broadcast;

    use crate::{
        ExchangeOutcome, MessagingTokenExchanger, PlatformEventSender, PushPlatform,
        RegistrationCoordinator, RegistrationCoordinatorQuitHandle, RegistrationError, channel,
    };

    #[derive(Debug, Default)]
    struct PlatformCalls {
        permission_requests: usize,
        registrations: usize,
    }

    struct FakePlatform {
        permission: PermissionState,
        calls: Arc<Mutex<PlatformCalls>>,
        events: Option<PlatformEventSender>,
        tokens_on_register: Vec<PlatformToken>,
    }

    impl FakePlatform {
        fn new(permission: PermissionState) -> (Self, Arc<Mutex<PlatformCalls>>) {
            let calls = Arc::new(Mutex::new(PlatformCalls::default()));
            let platform = Self {
                permission,
                calls: calls.clone(),
                events: None,
                tokens_on_register: vec![],
            };
            (platform, calls)
        }
    }

    impl PushPlatform for FakePlatform {
        async fn request_notification_permission(
            &self,
            _options: PermissionOptions,
        ) -> error_stack::Result<PermissionState, RegistrationError> {
            self.calls.lock().unwrap().permission_requests += 1;
            Ok(self.permission)
        }

        async fn register_for_remote_notifications(&self) {
            self.calls.lock().unwrap().registrations += 1;
            if let Some(events) = &self.events {
                for token in &self.tokens_on_register {
                    events.send_token_received(token.clone());
                }
            }
        }
    }

    struct FakeExchanger {
        calls: Arc<Mutex<Vec<PlatformToken>>>,
        fail_for: Option<PlatformToken>,
    }

    impl FakeExchanger {
        fn new(fail_for: Option<PlatformToken>) -> (Self, Arc<Mutex<Vec<PlatformToken>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let exchanger = Self {
                calls: calls.clone(),
                fail_for,
            };
            (exchanger, calls)
        }
    }

    impl MessagingTokenExchanger for FakeExchanger {
        async fn exchange_messaging_token(
            &self,
            token: PlatformToken,
        ) -> error_stack::Result<MessagingToken, RegistrationError> {
            self.calls.lock().unwrap().push(token.clone());
            if self.fail_for.as_ref() == Some(&token) {
                return Err(error_stack::Report::new(RegistrationError::ExchangeFailed));
            }
            Ok(MessagingToken::new(format!("messaging-{}", token.to_hex())))
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Condition was not reached");
    }

    async fn quit(
        quit_handle: broadcast::Sender<()>,
        coordinator_quit: RegistrationCoordinatorQuitHandle,
    ) {
        drop(quit_handle);
        tokio::time::timeout(Duration::from_secs(5), coordinator_quit.wait_quit())
            .await
            .expect("Coordinator quit timeout");
    }

    #[tokio::test]
    async fn permission_denied_skips_registration_and_exchange() {
        let (quit_handle, quit_watcher) = broadcast::channel(1);
        let (_event_sender, event_receiver) = channel();
        let (platform, platform_calls) = FakePlatform::new(PermissionState::Denied);
        let (exchanger, exchanger_calls) = FakeExchanger::new(None);

        let (coordinator_quit, _outcomes) = RegistrationCoordinator::new_coordinator(
            PermissionOptions::default(),
            quit_watcher,
            platform,
            exchanger,
            event_receiver,
        );

        wait_until(|| platform_calls.lock().unwrap().permission_requests == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(platform_calls.lock().unwrap().registrations, 0);
        assert!(exchanger_calls.lock().unwrap().is_empty());

        quit(quit_handle, coordinator_quit).await;
    }

    #[tokio::test]
    async fn granted_flow_exchanges_the_platform_token() {
        let (quit_handle, quit_watcher) = broadcast::channel(1);
        let (event_sender, event_receiver) = channel();
        let token = PlatformToken::new(vec![0xab, 0xcd]);
        let (mut platform, platform_calls) = FakePlatform::new(PermissionState::Granted);
        platform.events = Some(event_sender);
        platform.tokens_on_register = vec![token.clone()];
        let (exchanger, exchanger_calls) = FakeExchanger::new(None);

        let (coordinator_quit, mut outcomes) = RegistrationCoordinator::new_coordinator(
            PermissionOptions::default(),
            quit_watcher,
            platform,
            exchanger,
            event_receiver,
        );

        let outcome = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
            .await
            .expect("Exchange outcome timeout")
            .expect("Exchange outcome channel closed");
        match outcome {
            ExchangeOutcome::Exchanged {
                platform_token,
                messaging_token,
            } => {
                assert_eq!(platform_token, token);
                assert_eq!(messaging_token.as_str(), "messaging-abcd");
            }
            other => panic!("Unexpected outcome: {:?}", other),
        }

        assert_eq!(platform_calls.lock().unwrap().registrations, 1);
        assert_eq!(exchanger_calls.lock().unwrap().as_slice(), &[token]);

        quit(quit_handle, coordinator_quit).await;
    }

    #[tokio::test]
    async fn duplicate_token_delivery_triggers_a_fresh_exchange() {
        let (quit_handle, quit_watcher) = broadcast::channel(1);
        let (event_sender, event_receiver) = channel();
        let (platform, _platform_calls) = FakePlatform::new(PermissionState::Granted);
        let (exchanger, exchanger_calls) = FakeExchanger::new(None);

        let (coordinator_quit, mut outcomes) = RegistrationCoordinator::new_coordinator(
            PermissionOptions::default(),
            quit_watcher,
            platform,
            exchanger,
            event_receiver,
        );

        let token = PlatformToken::new(vec![0x01]);
        event_sender.send_token_received(token.clone());
        event_sender.send_token_received(token.clone());

        for _ in 0..2 {
            let outcome = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
                .await
                .expect("Exchange outcome timeout")
                .expect("Exchange outcome channel closed");
            assert!(matches!(
                outcome,
                ExchangeOutcome::Exchanged { ref platform_token, .. } if *platform_token == token
            ));
        }

        assert_eq!(exchanger_calls.lock().unwrap().len(), 2);

        quit(quit_handle, coordinator_quit).await;
    }

    #[tokio::test]
    async fn failed_exchange_does_not_block_a_later_token() {
        let (quit_handle, quit_watcher) = broadcast::channel(1);
        let (event_sender, event_receiver) = channel();
        let failing_token = PlatformToken::new(vec![0x01]);
        let working_token = PlatformToken::new(vec![0x02]);
        let (platform, _platform_calls) = FakePlatform::new(PermissionState::Granted);
        let (exchanger, exchanger_calls) = FakeExchanger::new(Some(failing_token.clone()));

        let (coordinator_quit, mut outcomes) = RegistrationCoordinator::new_coordinator(
            PermissionOptions::default(),
            quit_watcher,
            platform,
            exchanger,
            event_receiver,
        );

        event_sender.send_token_received(failing_token.clone());
        event_sender.send_token_received(working_token.clone());

        // Exchanges are concurrent, so outcome order is not fixed.
        let mut failed = 0;
        let mut exchanged = vec![];
        for _ in 0..2 {
            let outcome = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
                .await
                .expect("Exchange outcome timeout")
                .expect("Exchange outcome channel closed");
            match outcome {
                ExchangeOutcome::Exchanged { platform_token, .. } => {
                    exchanged.push(platform_token);
                }
                ExchangeOutcome::ExchangeFailed { platform_token } => {
                    assert_eq!(platform_token, failing_token);
                    failed += 1;
                }
            }
        }
        assert_eq!(failed, 1);
        assert_eq!(exchanged, vec![working_token]);
        assert_eq!(exchanger_calls.lock().unwrap().len(), 2);

        quit(quit_handle, coordinator_quit).await;
    }

    #[tokio::test]
    async fn token_refresh_reports_both_exchanges_independently() {
        let (quit_handle, quit_watcher) = broadcast::channel(1);
        let (event_sender, event_receiver) = channel();
        let first_token = PlatformToken::new(vec![0x0a]);
        let refreshed_token = PlatformToken::new(vec![0x0b]);
        let (platform, _platform_calls) = FakePlatform::new(PermissionState::Granted);
        let (exchanger, _exchanger_calls) = FakeExchanger::new(None);

        let (coordinator_quit, mut outcomes) = RegistrationCoordinator::new_coordinator(
            PermissionOptions::default(),
            quit_watcher,
            platform,
            exchanger,
            event_receiver,
        );

        event_sender.send_token_received(first_token.clone());
        let first = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
            .await
            .expect("Exchange outcome timeout")
            .expect("Exchange outcome channel closed");

        event_sender.send_token_received(refreshed_token.clone());
        let second = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
            .await
            .expect("Exchange outcome timeout")
            .expect("Exchange outcome channel closed");

        match (first, second) {
            (
                ExchangeOutcome::Exchanged {
                    platform_token: t1,
                    messaging_token: m1,
                },
                ExchangeOutcome::Exchanged {
                    platform_token: t2,
                    messaging_token: m2,
                },
            ) => {
                assert_eq!(t1, first_token);
                assert_eq!(t2, refreshed_token);
                assert_ne!(m1, m2);
            }
            other => panic!("Unexpected outcomes: {:?}", other),
        }

        quit(quit_handle, coordinator_quit).await;
    }

    #[tokio::test]
    async fn registration_failure_is_not_fatal() {
        let (quit_handle, quit_watcher) = broadcast::channel(1);
        let (event_sender, event_receiver) = channel();
        let (platform, _platform_calls) = FakePlatform::new(PermissionState::Granted);
        let (exchanger, exchanger_calls) = FakeExchanger::new(None);

        let (coordinator_quit, mut outcomes) = RegistrationCoordinator::new_coordinator(
            PermissionOptions::default(),
            quit_watcher,
            platform,
            exchanger,
            event_receiver,
        );

        event_sender.send_registration_failed("certificate rotation".to_string());

        // A token delivered after the reported failure still starts
        // an exchange.
        let token = PlatformToken::new(vec![0xee]);
        event_sender.send_token_received(token.clone());
        let outcome = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
            .await
            .expect("Exchange outcome timeout")
            .expect("Exchange outcome channel closed");
        assert!(matches!(
            outcome,
            ExchangeOutcome::Exchanged { ref platform_token, .. } if *platform_token == token
        ));
        assert_eq!(exchanger_calls.lock().unwrap().len(), 1);

        quit(quit_handle, coordinator_quit).await;
    }
}
