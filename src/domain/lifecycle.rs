use serde::{Deserialize, Serialize};

/// Estado global del servicio. Lineal: Initializing -> Ready -> ShuttingDown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Initializing,
    Ready,
    ShuttingDown,
}

impl ServiceState {
    /// ¿Es legal pasar de `self` a `next`?
    pub fn can_transition_to(self, next: ServiceState) -> bool {
        matches!(
            (self, next),
            (ServiceState::Initializing, ServiceState::Ready)
                | (ServiceState::Initializing, ServiceState::ShuttingDown)
                | (ServiceState::Ready, ServiceState::ShuttingDown)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceState::*;

    #[test]
    fn transitions_are_linear() {
        assert!(Initializing.can_transition_to(Ready));
        assert!(Ready.can_transition_to(ShuttingDown));
        assert!(Initializing.can_transition_to(ShuttingDown));
        assert!(!ShuttingDown.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Initializing));
        assert!(!Ready.can_transition_to(Ready));
    }
}
