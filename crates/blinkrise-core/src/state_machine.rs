use crate::{
    error::DashboardError,
    types::{DashboardEvent, SessionState},
};

#[derive(Debug, Clone, Default)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl SessionStateMachine {
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// User asked to start. A disconnected session restarts like an off one.
    pub fn begin_start(&mut self) -> Result<DashboardEvent, DashboardError> {
        self.transition_from_any_of(
            &[SessionState::Off, SessionState::Disconnected],
            SessionState::Starting,
            "start",
        )
    }

    pub fn on_start_result(&mut self, success: bool) -> Result<DashboardEvent, DashboardError> {
        let next = if success {
            SessionState::On
        } else {
            SessionState::Off
        };
        self.transition_from_any_of(&[SessionState::Starting], next, "on_start_result")
    }

    pub fn stop(&mut self) -> Result<DashboardEvent, DashboardError> {
        self.transition_from_any_of(&[SessionState::On], SessionState::Off, "stop")
    }

    pub fn on_poll_failure(&mut self) -> Result<DashboardEvent, DashboardError> {
        self.transition_from_any_of(
            &[SessionState::On],
            SessionState::Disconnected,
            "on_poll_failure",
        )
    }

    /// Process is ending; valid from every state.
    pub fn teardown(&mut self) -> DashboardEvent {
        self.state = SessionState::Off;
        DashboardEvent::StateChanged {
            state: SessionState::Off,
        }
    }

    fn transition_from_any_of(
        &mut self,
        expected: &[SessionState],
        next: SessionState,
        action: &str,
    ) -> Result<DashboardEvent, DashboardError> {
        if !expected.contains(&self.state) {
            return Err(DashboardError::invalid_state(self.state, action));
        }
        self.state = next;
        Ok(DashboardEvent::StateChanged { state: next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_happy_path_state_transitions() {
        let mut sm = SessionStateMachine::default();
        assert_eq!(sm.state(), SessionState::Off);

        sm.begin_start().expect("start from off must work");
        assert_eq!(sm.state(), SessionState::Starting);

        sm.on_start_result(true).expect("start result should resolve");
        assert_eq!(sm.state(), SessionState::On);

        let event = sm.stop().expect("stop should work");
        assert_eq!(
            event,
            DashboardEvent::StateChanged {
                state: SessionState::Off
            }
        );
    }

    #[test]
    fn failed_start_returns_to_off() {
        let mut sm = SessionStateMachine::default();
        sm.begin_start().expect("start must work");
        sm.on_start_result(false).expect("failed start should resolve");
        assert_eq!(sm.state(), SessionState::Off);
    }

    #[test]
    fn disconnected_session_can_restart() {
        let mut sm = SessionStateMachine::default();
        sm.begin_start().expect("start must work");
        sm.on_start_result(true).expect("start result should resolve");
        sm.on_poll_failure().expect("poll failure while on");
        assert_eq!(sm.state(), SessionState::Disconnected);

        sm.begin_start().expect("restart from disconnected must work");
        assert_eq!(sm.state(), SessionState::Starting);
    }

    #[test]
    fn rejects_stop_and_poll_failure_outside_on() {
        let mut sm = SessionStateMachine::default();
        let err = sm.stop().expect_err("stop while off should fail");
        assert_eq!(err.code, "invalid_state_transition");

        sm.begin_start().expect("start must work");
        let err = sm
            .on_poll_failure()
            .expect_err("poll failure while starting should fail");
        assert_eq!(err.code, "invalid_state_transition");
        assert_eq!(sm.state(), SessionState::Starting);
    }

    #[test]
    fn rejects_double_start() {
        let mut sm = SessionStateMachine::default();
        sm.begin_start().expect("start must work");
        assert!(sm.begin_start().is_err());
    }

    #[test]
    fn teardown_is_valid_from_any_state() {
        let mut sm = SessionStateMachine::default();
        sm.begin_start().expect("start must work");
        sm.teardown();
        assert_eq!(sm.state(), SessionState::Off);
        sm.teardown();
        assert_eq!(sm.state(), SessionState::Off);
    }
}
