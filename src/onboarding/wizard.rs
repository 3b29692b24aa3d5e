//! Linear onboarding state machine.
//!
//! Page 1 creates the account, later pages patch the created user with the
//! fields owned by whatever components the admin placed on that page. Steps
//! are plain data so the flow can be extended without touching the machine.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::onboarding::{
    component::{Component, Page},
    dto::OnboardingConfigView,
    layout::PageLayout,
    projection::{project, FormData},
    services as onboarding_services,
};
use crate::state::AppState;
use crate::users::{
    dto::{CreateUserRequest, UpdateUserRequest, UserResponse},
    services::{self as user_services, is_valid_email, MIN_PASSWORD_LEN},
};

/// Operations the wizard needs from the service.
#[async_trait]
pub trait OnboardingBackend: Send + Sync {
    async fn fetch_config(&self) -> ApiResult<OnboardingConfigView>;
    async fn init_default_config(&self) -> ApiResult<()>;
    async fn create_user(&self, req: CreateUserRequest) -> ApiResult<UserResponse>;
    async fn update_user(&self, id: Uuid, patch: UpdateUserRequest) -> ApiResult<UserResponse>;
}

#[async_trait]
impl OnboardingBackend for AppState {
    async fn fetch_config(&self) -> ApiResult<OnboardingConfigView> {
        onboarding_services::get_config(self.repos()?.onboarding.as_ref()).await
    }

    async fn init_default_config(&self) -> ApiResult<()> {
        onboarding_services::reset_to_default(self.repos()?.onboarding.as_ref()).await?;
        Ok(())
    }

    async fn create_user(&self, req: CreateUserRequest) -> ApiResult<UserResponse> {
        user_services::create_user(self.repos()?.users.as_ref(), req).await
    }

    async fn update_user(&self, id: Uuid, patch: UpdateUserRequest) -> ApiResult<UserResponse> {
        user_services::update_user(self.repos()?.users.as_ref(), id, patch).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Account,
    Profile(Page),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardStep {
    pub title: &'static str,
    pub description: &'static str,
    pub kind: StepKind,
}

pub const DEFAULT_STEPS: [WizardStep; 3] = [
    WizardStep {
        title: "Account Setup",
        description: "Create your account",
        kind: StepKind::Account,
    },
    WizardStep {
        title: "Personal Info",
        description: "Tell us about yourself",
        kind: StepKind::Profile(Page::Two),
    },
    WizardStep {
        title: "Additional Details",
        description: "Complete your profile",
        kind: StepKind::Profile(Page::Three),
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    Step(usize),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advanced(usize),
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("form has {} invalid field(s)", .0.len())]
    Invalid(Vec<FieldError>),
    #[error("onboarding configuration is not loaded")]
    ConfigUnavailable,
    #[error("no account has been created yet")]
    NoAccount,
    #[error("wizard has no steps")]
    NoSteps,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Client-side checks for the account step.
pub fn validate_account(form: &FormData) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    let email = form.email.trim();
    if email.is_empty() {
        errors.push(FieldError {
            field: "email",
            message: "Email is required".into(),
        });
    } else if !is_valid_email(email) {
        errors.push(FieldError {
            field: "email",
            message: "Invalid email address".into(),
        });
    }
    if form.password.is_empty() {
        errors.push(FieldError {
            field: "password",
            message: "Password is required".into(),
        });
    } else if form.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError {
            field: "password",
            message: format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        });
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn optional(v: &str) -> Option<String> {
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

pub struct Wizard<B> {
    backend: B,
    steps: Vec<WizardStep>,
    state: WizardState,
    form: FormData,
    layout: Option<PageLayout>,
    user_id: Option<Uuid>,
}

impl<B: OnboardingBackend> Wizard<B> {
    pub fn new(backend: B) -> Self {
        Self::with_steps(backend, DEFAULT_STEPS.to_vec())
    }

    pub fn with_steps(backend: B, steps: Vec<WizardStep>) -> Self {
        Self {
            backend,
            steps,
            state: WizardState::Step(0),
            form: FormData::default(),
            layout: None,
            user_id: None,
        }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn steps(&self) -> &[WizardStep] {
        &self.steps
    }

    pub fn current_step(&self) -> Option<&WizardStep> {
        match self.state {
            WizardState::Step(i) => self.steps.get(i),
            WizardState::Done => None,
        }
    }

    pub fn form(&self) -> &FormData {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormData {
        &mut self.form
    }

    pub fn layout(&self) -> Option<&PageLayout> {
        self.layout.as_ref()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    /// Load the layout. An empty configuration is initialised to the default
    /// once and fetched again; a failure leaves the wizard without a layout.
    pub async fn mount(&mut self) -> Result<(), WizardError> {
        if self.layout.is_some() {
            return Ok(());
        }
        let mut view = self.backend.fetch_config().await?;
        if view.is_empty() {
            info!("no onboarding configuration, initialising defaults");
            self.backend.init_default_config().await?;
            view = self.backend.fetch_config().await?;
            if view.is_empty() {
                warn!("onboarding configuration still empty after initialisation");
                return Err(WizardError::ConfigUnavailable);
            }
        }
        debug!(revision = view.revision, "onboarding configuration loaded");
        self.layout = Some(view.layout());
        Ok(())
    }

    /// Components rendered on the current step.
    pub fn visible_components(&self) -> Vec<Component> {
        match (self.current_step().map(|s| s.kind), &self.layout) {
            (Some(StepKind::Profile(page)), Some(layout)) => layout.page(page).to_vec(),
            _ => Vec::new(),
        }
    }

    /// Submit the current step. In `Done` the last step's patch is sent again
    /// and the state is left alone.
    pub async fn submit(&mut self) -> Result<Transition, WizardError> {
        let last = self.steps.len().checked_sub(1).ok_or(WizardError::NoSteps)?;
        let index = match self.state {
            WizardState::Step(i) => i.min(last),
            WizardState::Done => last,
        };
        self.run_step(self.steps[index].kind).await?;

        if self.state == WizardState::Done || index == last {
            self.state = WizardState::Done;
            info!(user_id = ?self.user_id, "onboarding completed");
            return Ok(Transition::Completed);
        }
        self.state = WizardState::Step(index + 1);
        Ok(Transition::Advanced(index + 1))
    }

    /// One step backward. No-op on the first step and once done.
    pub fn back(&mut self) -> bool {
        match self.state {
            WizardState::Step(i) if i > 0 => {
                self.state = WizardState::Step(i - 1);
                true
            }
            _ => false,
        }
    }

    async fn run_step(&mut self, kind: StepKind) -> Result<(), WizardError> {
        match kind {
            StepKind::Account => {
                validate_account(&self.form).map_err(WizardError::Invalid)?;
                let req = CreateUserRequest {
                    email: self.form.email.trim().to_string(),
                    password: self.form.password.clone(),
                    first_name: optional(&self.form.first_name),
                    last_name: optional(&self.form.last_name),
                };
                let user = self.backend.create_user(req).await?;
                self.user_id = Some(user.id);
            }
            StepKind::Profile(page) => {
                let layout = self.layout.as_ref().ok_or(WizardError::ConfigUnavailable)?;
                let id = self.user_id.ok_or(WizardError::NoAccount)?;
                let patch = project(layout.page(page), &self.form);
                self.backend.update_user(id, patch).await?;
            }
        }
        Ok(())
    }
}
