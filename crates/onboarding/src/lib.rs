//! `crm-onboarding`: first-run setup, i.e. the gate that sends new users to the
//! setup flow, and the flow itself.

pub mod flow;
pub mod gate;

pub use flow::{
    FlowOutcome, Notice, OnboardingError, OnboardingFlow, OnboardingStep, OnboardingStore, OrganizationDetails,
    ProfileDetails, Transition,
};
pub use gate::{EXEMPT_PATHS, ONBOARDING_PATH, OnboardingDecision, OnboardingGate};
