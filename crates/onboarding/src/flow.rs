//! Four-step onboarding flow: welcome, organization details, profile details,
//! completion.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crm_auth::{AccessToken, ProfilePatch, Session};
use crm_core::{DomainError, OrganizationId, UserId, Validate};
use crm_tenancy::{OrganizationPatch, OrganizationResolver};

/// Where the flow exits once the profile is marked as onboarded.
pub const HOME_PATH: &str = "/";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OnboardingError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("not signed in")]
    NotSignedIn,

    #[error("remote update failed: {0}")]
    Remote(String),
}

/// Persistence port used by the flow.
#[async_trait]
pub trait OnboardingStore: Send + Sync {
    async fn update_organization(
        &self,
        token: &AccessToken,
        user: UserId,
        organization: OrganizationId,
        patch: &OrganizationPatch,
    ) -> Result<(), OnboardingError>;

    async fn update_profile(&self, token: &AccessToken, user: UserId, patch: &ProfilePatch) -> Result<(), OnboardingError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    Welcome,
    OrganizationDetails,
    ProfileDetails,
    Completion,
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 4] = [
        OnboardingStep::Welcome,
        OnboardingStep::OrganizationDetails,
        OnboardingStep::ProfileDetails,
        OnboardingStep::Completion,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// Fraction of the flow reached, `(index + 1) / 4`.
    pub fn progress(self) -> f32 {
        (self.index() + 1) as f32 / Self::ALL.len() as f32
    }

    pub fn title(self) -> &'static str {
        match self {
            OnboardingStep::Welcome => "Bienvenue !",
            OnboardingStep::OrganizationDetails => "Votre organisation",
            OnboardingStep::ProfileDetails => "Votre profil",
            OnboardingStep::Completion => "Configuration terminée",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OnboardingStep::Welcome => "Configurons votre espace de travail",
            OnboardingStep::OrganizationDetails => "Personnalisez les informations de votre organisation",
            OnboardingStep::ProfileDetails => "Complétez vos informations personnelles",
            OnboardingStep::Completion => "Votre CRM est prêt à être utilisé !",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationDetails {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDetails {
    #[serde(default)]
    pub fonction: String,
    #[serde(default)]
    pub telephone: String,
}

/// Toast-style message produced by a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Notice {
    Saved { title: String, description: String },
    Failed { title: String, description: String },
}

impl Notice {
    fn saved(title: &str, description: &str) -> Self {
        Notice::Saved {
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    fn failed(description: impl Into<String>) -> Self {
        Notice::Failed {
            title: "Erreur".to_string(),
            description: description.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Notice::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FlowOutcome {
    Step { step: OnboardingStep },
    Exit { redirect_to: &'static str },
}

/// Result of one user action on the flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    #[serde(flatten)]
    pub outcome: FlowOutcome,
    pub notice: Option<Notice>,
}

impl Transition {
    fn step(step: OnboardingStep, notice: Option<Notice>) -> Self {
        Self {
            outcome: FlowOutcome::Step { step },
            notice,
        }
    }

    fn exit() -> Self {
        Self {
            outcome: FlowOutcome::Exit { redirect_to: HOME_PATH },
            notice: None,
        }
    }
}

/// Onboarding state machine bound to the signed-in session and its
/// organization resolver.
pub struct OnboardingFlow {
    step: OnboardingStep,
    pub organization: OrganizationDetails,
    pub profile: ProfileDetails,
    session: Arc<Session>,
    resolver: Arc<OrganizationResolver>,
    store: Arc<dyn OnboardingStore>,
}

impl OnboardingFlow {
    /// Flow at the first step, forms prefilled from the current organization
    /// and profile.
    pub fn new(session: Arc<Session>, resolver: Arc<OrganizationResolver>, store: Arc<dyn OnboardingStore>) -> Self {
        Self::at(OnboardingStep::Welcome, session, resolver, store)
    }

    pub fn at(
        step: OnboardingStep,
        session: Arc<Session>,
        resolver: Arc<OrganizationResolver>,
        store: Arc<dyn OnboardingStore>,
    ) -> Self {
        let organization = resolver
            .state()
            .ready()
            .and_then(|o| o.as_ref())
            .map(|o| OrganizationDetails {
                name: o.organization.name.clone(),
                description: o.organization.description.clone().unwrap_or_default(),
            })
            .unwrap_or_default();
        let profile = session
            .snapshot()
            .profile()
            .map(|p| ProfileDetails {
                fonction: p.fonction.clone().unwrap_or_default(),
                telephone: p.telephone.clone().unwrap_or_default(),
            })
            .unwrap_or_default();
        Self {
            step,
            organization,
            profile,
            session,
            resolver,
            store,
        }
    }

    pub fn step(&self) -> OnboardingStep {
        self.step
    }

    pub fn progress(&self) -> f32 {
        self.step.progress()
    }

    /// Persist the current step's form (if any) and advance.
    ///
    /// A validation failure keeps the user on the step; a remote failure is
    /// reported in the notice and the flow still advances.
    pub async fn next(&mut self) -> Transition {
        let notice = match self.step {
            OnboardingStep::Welcome => None,
            OnboardingStep::OrganizationDetails => match self.save_organization().await {
                Ok(notice) => notice,
                Err(OnboardingError::Domain(e)) => {
                    return Transition::step(self.step, Some(Notice::failed(e.to_string())));
                }
                Err(e) => {
                    tracing::error!(error = %e, "error updating organization");
                    Some(Notice::failed("Impossible de mettre à jour l'organisation."))
                }
            },
            OnboardingStep::ProfileDetails => match self.save_profile().await {
                Ok(()) => Some(Notice::saved("Profil mis à jour", "Vos informations ont été sauvegardées.")),
                Err(e) => {
                    tracing::error!(error = %e, "error updating profile");
                    Some(Notice::failed("Impossible de mettre à jour le profil."))
                }
            },
            OnboardingStep::Completion => return self.complete().await,
        };
        if let Some(next) = self.step.next() {
            self.step = next;
        }
        Transition::step(self.step, notice)
    }

    pub fn back(&mut self) -> OnboardingStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// Mark onboarding as completed from any step, skipping the remaining forms.
    pub async fn skip(&mut self) -> Transition {
        self.complete().await
    }

    async fn complete(&mut self) -> Transition {
        let patch = ProfilePatch {
            onboarding_completed: Some(true),
            ..ProfilePatch::default()
        };
        let result = match self.subject() {
            Ok((token, user)) => self.store.update_profile(&token, user, &patch).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "error completing onboarding");
            return Transition::step(self.step, Some(Notice::failed("Impossible de finaliser la configuration.")));
        }
        tracing::info!(step = ?self.step, "onboarding completed");
        self.session.refresh_profile().await;
        Transition::exit()
    }

    /// `Ok(None)` when there is no organization to update yet.
    async fn save_organization(&self) -> Result<Option<Notice>, OnboardingError> {
        let Some(organization) = self.resolver.state().ready().and_then(|o| o.as_ref()).map(|o| o.id()) else {
            return Ok(None);
        };
        let patch = OrganizationPatch {
            name: Some(self.organization.name.trim().to_string()),
            description: Some(self.organization.description.trim().to_string()),
        };
        patch.validate()?;
        let (token, user) = self.subject()?;
        self.store.update_organization(&token, user, organization, &patch).await?;
        self.resolver.refetch().await;
        Ok(Some(Notice::saved(
            "Organisation mise à jour",
            "Les informations de votre organisation ont été sauvegardées.",
        )))
    }

    async fn save_profile(&self) -> Result<(), OnboardingError> {
        let (token, user) = self.subject()?;
        let patch = ProfilePatch {
            fonction: Some(self.profile.fonction.trim().to_string()),
            telephone: Some(self.profile.telephone.trim().to_string()),
            onboarding_completed: None,
        };
        self.store.update_profile(&token, user, &patch).await
    }

    fn subject(&self) -> Result<(AccessToken, UserId), OnboardingError> {
        let snapshot = self.session.snapshot();
        match (snapshot.identity(), snapshot.access_token.clone()) {
            (Some(identity), Some(token)) => Ok((token, identity.id)),
            _ => Err(OnboardingError::NotSignedIn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;
    use crm_auth::{
        AuthError, AuthEvent, AuthProvider, AuthSession, Identity, Profile, ProfileSource, Role, SignUpRequest,
    };
    use crm_core::RecordId;
    use crm_tenancy::{LookupError, Membership, MembershipSource, Organization, ResolvedOrganization};
    use tokio::sync::broadcast;

    #[derive(Default)]
    struct Recorder {
        organizations: Mutex<Vec<OrganizationPatch>>,
        profiles: Mutex<Vec<ProfilePatch>>,
        fail_organization: bool,
        completed: Mutex<bool>,
    }

    #[async_trait]
    impl OnboardingStore for Recorder {
        async fn update_organization(
            &self,
            _token: &AccessToken,
            _user: UserId,
            _organization: OrganizationId,
            patch: &OrganizationPatch,
        ) -> Result<(), OnboardingError> {
            if self.fail_organization {
                return Err(OnboardingError::Remote("boom".to_string()));
            }
            self.organizations.lock().unwrap().push(patch.clone());
            Ok(())
        }

        async fn update_profile(&self, _token: &AccessToken, _user: UserId, patch: &ProfilePatch) -> Result<(), OnboardingError> {
            if patch.onboarding_completed == Some(true) {
                *self.completed.lock().unwrap() = true;
            }
            self.profiles.lock().unwrap().push(patch.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl ProfileSource for Recorder {
        async fn fetch_profile(&self, _token: &AccessToken, user: UserId) -> Result<Option<Profile>, AuthError> {
            Ok(Some(Profile {
                id: user,
                email: "ana@exemple.fr".to_string(),
                nom: "Martin".to_string(),
                prenom: "Ana".to_string(),
                role: Role::Owner,
                fonction: None,
                telephone: None,
                statut: None,
                onboarding_completed: *self.completed.lock().unwrap(),
            }))
        }
    }

    struct NoProvider(broadcast::Sender<AuthEvent>);

    #[async_trait]
    impl AuthProvider for NoProvider {
        async fn sign_in(&self, _email: &str, _password: &str) -> Result<AuthSession, AuthError> {
            Err(AuthError::InvalidCredentials)
        }
        async fn sign_up(&self, _request: &SignUpRequest) -> Result<Option<AuthSession>, AuthError> {
            Ok(None)
        }
        async fn sign_out(&self, _token: &AccessToken) -> Result<(), AuthError> {
            Ok(())
        }
        async fn reset_password(&self, _email: &str, _redirect_to: Option<&str>) -> Result<(), AuthError> {
            Ok(())
        }
        async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
            Ok(None)
        }
        async fn user_for_token(&self, _token: &AccessToken) -> Result<Identity, AuthError> {
            Err(AuthError::SessionExpired)
        }
        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            self.0.subscribe()
        }
    }

    struct OneOrganization(ResolvedOrganization);

    #[async_trait]
    impl MembershipSource for OneOrganization {
        async fn membership_for(&self, _token: &AccessToken, _user: UserId) -> Result<Option<ResolvedOrganization>, LookupError> {
            Ok(Some(self.0.clone()))
        }
    }

    async fn flow(store: Arc<Recorder>) -> OnboardingFlow {
        let identity = Identity {
            id: UserId::new(),
            email: Some("ana@exemple.fr".to_string()),
        };
        let token = AccessToken::new("token");
        let session = Session::new(Arc::new(NoProvider(broadcast::channel(4).0)), store.clone());
        session
            .establish(Some(AuthSession {
                access_token: token.clone(),
                refresh_token: None,
                identity: identity.clone(),
                expires_at: None,
            }))
            .await;

        let organization_id = OrganizationId::new();
        let resolved = ResolvedOrganization {
            organization: Organization {
                id: organization_id,
                name: "Acme".to_string(),
                slug: "acme".to_string(),
                description: None,
                settings: None,
            },
            membership: Membership {
                id: RecordId::new(),
                organization_id,
                user_id: identity.id,
                role: Role::Owner,
                joined_at: Some(Utc::now()),
            },
        };
        let resolver = Arc::new(OrganizationResolver::new(Arc::new(OneOrganization(resolved))));
        resolver.resolve(token, identity.id).await;
        OnboardingFlow::new(session, resolver, store)
    }

    #[test]
    fn progress_is_one_quarter_per_step() {
        let progress: Vec<f32> = OnboardingStep::ALL.iter().map(|s| s.progress()).collect();
        assert_eq!(progress, vec![0.25, 0.5, 0.75, 1.0]);
        assert_eq!(OnboardingStep::Welcome.previous(), None);
        assert_eq!(OnboardingStep::Completion.next(), None);
    }

    #[tokio::test]
    async fn walks_the_steps_and_persists_each_form() {
        let store = Arc::new(Recorder::default());
        let mut flow = flow(store.clone()).await;
        assert_eq!(flow.organization.name, "Acme");

        assert_eq!(flow.next().await, Transition::step(OnboardingStep::OrganizationDetails, None));

        flow.organization.description = "Conseil".to_string();
        let t = flow.next().await;
        assert_eq!(t.outcome, FlowOutcome::Step { step: OnboardingStep::ProfileDetails });
        assert!(matches!(t.notice, Some(Notice::Saved { .. })));

        flow.profile.fonction = "Gérante".to_string();
        flow.next().await;
        assert_eq!(flow.step(), OnboardingStep::Completion);

        let t = flow.next().await;
        assert_eq!(t.outcome, FlowOutcome::Exit { redirect_to: HOME_PATH });

        let organizations = store.organizations.lock().unwrap().clone();
        assert_eq!(organizations.len(), 1);
        assert_eq!(organizations[0].description.as_deref(), Some("Conseil"));
        let profiles = store.profiles.lock().unwrap().clone();
        assert_eq!(profiles[0].fonction.as_deref(), Some("Gérante"));
        assert_eq!(profiles[1].onboarding_completed, Some(true));
        assert_eq!(flow.session.snapshot().profile().map(|p| p.onboarding_completed), Some(true));
    }

    #[tokio::test]
    async fn skip_completes_without_intermediate_persistence() {
        let store = Arc::new(Recorder::default());
        let mut flow = flow(store.clone()).await;
        flow.next().await;

        let t = flow.skip().await;
        assert_eq!(t.outcome, FlowOutcome::Exit { redirect_to: HOME_PATH });
        assert!(store.organizations.lock().unwrap().is_empty());
        assert_eq!(store.profiles.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_organization_name_keeps_the_step() {
        let store = Arc::new(Recorder::default());
        let mut flow = flow(store.clone()).await;
        flow.next().await;
        flow.organization.name = "   ".to_string();

        let t = flow.next().await;
        assert_eq!(t.outcome, FlowOutcome::Step { step: OnboardingStep::OrganizationDetails });
        assert!(t.notice.is_some_and(|n| n.is_failure()));
    }

    #[tokio::test]
    async fn remote_failure_is_reported_and_the_flow_advances() {
        let store = Arc::new(Recorder {
            fail_organization: true,
            ..Recorder::default()
        });
        let mut flow = flow(store).await;
        flow.next().await;

        let t = flow.next().await;
        assert_eq!(t.outcome, FlowOutcome::Step { step: OnboardingStep::ProfileDetails });
        assert_eq!(t.notice, Some(Notice::failed("Impossible de mettre à jour l'organisation.")));
    }

    #[tokio::test]
    async fn back_never_goes_before_welcome() {
        let mut flow = flow(Arc::new(Recorder::default())).await;
        assert_eq!(flow.back(), OnboardingStep::Welcome);
        flow.next().await;
        assert_eq!(flow.back(), OnboardingStep::Welcome);
    }
}
