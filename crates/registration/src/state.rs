//! Push registration flow state.

/// States of the push registration flow.
///
/// [RegistrationState::PermissionDenied] and
/// [RegistrationState::RegistrationFailed] end the flow for the current
/// session. [RegistrationState::Exchanged] and
/// [RegistrationState::ExchangeFailed] end it for one token only: a new
/// platform token restarts the exchange (token refresh).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Start,
    PermissionRequested,
    PermissionDenied,
    Registering,
    RegistrationFailed,
    Exchanging,
    Exchanged,
    ExchangeFailed,
}

/// Named transitions of the push registration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationTransition {
    RequestPermission,
    PermissionGranted,
    PermissionDenied,
    RegistrationFailed,
    TokenReceived,
    ExchangeSucceeded,
    ExchangeFailed,
}

impl RegistrationState {
    /// Next state for a transition. A transition which does not apply
    /// in the current state returns the current state unchanged.
    pub fn apply(self, transition: RegistrationTransition) -> RegistrationState {
        use RegistrationState as S;
        use RegistrationTransition as T;
        match (self, transition) {
            (S::Start, T::RequestPermission) => S::PermissionRequested,
            (S::PermissionRequested, T::PermissionGranted) => S::Registering,
            (S::PermissionRequested, T::PermissionDenied) => S::PermissionDenied,
            (S::Registering, T::RegistrationFailed) => S::RegistrationFailed,
            // The platform can deliver a token also after a reported
            // registration failure. Every delivery starts an exchange.
            (
                S::Registering
                | S::RegistrationFailed
                | S::Exchanging
                | S::Exchanged
                | S::ExchangeFailed,
                T::TokenReceived,
            ) => S::Exchanging,
            (S::Exchanging, T::ExchangeSucceeded) => S::Exchanged,
            (S::Exchanging, T::ExchangeFailed) => S::ExchangeFailed,
            (current, _) => current,
        }
    }

    /// No further registration work happens in this session.
    pub fn is_session_terminal(self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::{RegistrationState as S, RegistrationTransition as T};

    #[test]
    fn permission_denied_is_terminal() {
        let state = S::Start.apply(T::RequestPermission).apply(T::PermissionDenied);
        assert_eq!(state, S::PermissionDenied);
        assert!(state.is_session_terminal());
        assert_eq!(state.apply(T::TokenReceived), S::PermissionDenied);
    }

    #[test]
    fn granted_flow_reaches_exchanged() {
        let state = S::Start
            .apply(T::RequestPermission)
            .apply(T::PermissionGranted)
            .apply(T::TokenReceived)
            .apply(T::ExchangeSucceeded);
        assert_eq!(state, S::Exchanged);
        assert!(!state.is_session_terminal());
    }

    #[test]
    fn token_refresh_restarts_exchange() {
        assert_eq!(S::Exchanged.apply(T::TokenReceived), S::Exchanging);
        assert_eq!(S::ExchangeFailed.apply(T::TokenReceived), S::Exchanging);
    }

    #[test]
    fn failed_exchange_does_not_block_the_next_token() {
        let state = S::Exchanging
            .apply(T::ExchangeFailed)
            .apply(T::TokenReceived)
            .apply(T::ExchangeSucceeded);
        assert_eq!(state, S::Exchanged);
    }

    #[test]
    fn inapplicable_transitions_are_inert() {
        assert_eq!(S::Start.apply(T::TokenReceived), S::Start);
        assert_eq!(S::Start.apply(T::ExchangeSucceeded), S::Start);
        assert_eq!(S::Registering.apply(T::PermissionGranted), S::Registering);
    }
}
