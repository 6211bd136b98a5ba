/// Access gate for member and admin views
///
/// A framework-independent state machine deciding whether a protected view may
/// render. It is driven by two lookups, the session and the payment standing,
/// and never performs I/O itself; [`evaluate`] wires it to async lookups.
///
/// ```text
///                      ┌─ no session ──────────────► Unauthenticated ─► redirect /login
///                      │
/// CheckingAuth ────────┼─ admin view, not admin ───► Forbidden ───────► redirect /dashboard
///                      ├─ admin view, admin ───────► Authorized
///                      ├─ member view, admin ──────► Authorized
///                      └─ member view, member ─────► CheckingPayment
///                                                      │
///                          adimplente ◄────────────────┤
///                          ► Authorized                │
///                          other standing / error ─────┴─► PaymentRequired ─► interstitial
/// ```
///
/// While the gate is in a checking state the only output is [`Render::Loading`];
/// protected content is never produced before both checks pass.

use serde::Serialize;
use std::future::Future;
use uuid::Uuid;

use crate::auth::middleware::AuthContext;
use crate::membership::status::Standing;
use crate::models::member::MemberRole;
use crate::models::payment::PaymentPlan;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const PAYMENT_REQUIRED_PATH: &str = "/payment-required";

/// Pages reserved to members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberView {
    Dashboard,
    Profile,
    Ebooks,
    Events,
    Benefits,
    Certificates,
    Credential,
}

impl MemberView {
    pub const ALL: [MemberView; 7] = [
        MemberView::Dashboard,
        MemberView::Profile,
        MemberView::Ebooks,
        MemberView::Events,
        MemberView::Benefits,
        MemberView::Certificates,
        MemberView::Credential,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            MemberView::Dashboard => "dashboard",
            MemberView::Profile => "profile",
            MemberView::Ebooks => "ebooks",
            MemberView::Events => "events",
            MemberView::Benefits => "benefits",
            MemberView::Certificates => "certificates",
            MemberView::Credential => "credential",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|view| view.slug() == slug)
    }
}

/// A protected client view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Member(MemberView),

    /// Back-office; `section` is the path below `/admin`, if any
    Admin { section: Option<String> },
}

impl View {
    /// Parses a client path such as `/events` or `/admin/payments`
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim_matches('/');
        let (head, rest) = match trimmed.split_once('/') {
            Some((head, rest)) => (head, Some(rest)),
            None => (trimmed, None),
        };

        if head == "admin" {
            let section = rest.map(|s| s.trim_matches('/')).filter(|s| !s.is_empty());
            return Some(View::Admin {
                section: section.map(str::to_string),
            });
        }

        match rest {
            None => MemberView::from_slug(head).map(View::Member),
            Some(_) => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, View::Admin { .. })
    }

    pub fn path(&self) -> String {
        match self {
            View::Member(view) => format!("/{}", view.slug()),
            View::Admin { section: None } => "/admin".to_string(),
            View::Admin { section: Some(section) } => format!("/admin/{}", section),
        }
    }
}

/// Gate states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// Initial state, waiting for the session lookup
    CheckingAuth,

    /// Session found, waiting for the payment lookup of `member_id`
    CheckingPayment { member_id: Uuid },

    Unauthenticated,

    /// Member is not paid up; `standing` is None when the lookup failed
    PaymentRequired { standing: Option<Standing> },

    Authorized,

    /// Authenticated but not allowed on this view
    Forbidden,
}

impl GateState {
    pub fn is_checking(&self) -> bool {
        matches!(self, GateState::CheckingAuth | GateState::CheckingPayment { .. })
    }
}

/// Inputs to the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    SessionResolved(Option<AuthContext>),

    /// Payment lookup result; `Err(())` when the lookup failed
    PaymentResolved(Result<Standing, ()>),
}

/// Renewal option offered on the payment-required interstitial
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalAction {
    pub plan: PaymentPlan,
    pub label: &'static str,
}

pub fn renewal_actions() -> Vec<RenewalAction> {
    vec![
        RenewalAction {
            plan: PaymentPlan::Monthly,
            label: "Renovar mensalidade",
        },
        RenewalAction {
            plan: PaymentPlan::Annual,
            label: "Renovar anuidade",
        },
    ]
}

/// What the client should show for a gate state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Render {
    Loading,
    Redirect(&'static str),
    PaymentRequired {
        standing: Option<Standing>,
        actions: Vec<RenewalAction>,
    },
    Content(View),
}

/// Access gate for one view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    view: View,
    state: GateState,
}

impl Gate {
    pub fn new(view: View) -> Self {
        Self {
            view,
            state: GateState::CheckingAuth,
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// Applies an event; events that do not fit the current state are ignored
    pub fn handle(mut self, event: GateEvent) -> Self {
        self.state = match (self.state, event) {
            (GateState::CheckingAuth, GateEvent::SessionResolved(session)) => {
                Self::after_session(&self.view, session)
            }
            (GateState::CheckingPayment { .. }, GateEvent::PaymentResolved(result)) => match result {
                Ok(Standing::Adimplente) => GateState::Authorized,
                Ok(standing) => GateState::PaymentRequired {
                    standing: Some(standing),
                },
                Err(()) => GateState::PaymentRequired { standing: None },
            },
            (state, _) => state,
        };
        self
    }

    fn after_session(view: &View, session: Option<AuthContext>) -> GateState {
        let Some(auth) = session else {
            return GateState::Unauthenticated;
        };

        match (view.is_admin(), auth.role) {
            (true, MemberRole::Admin) => GateState::Authorized,
            (true, MemberRole::Member) => GateState::Forbidden,
            (false, MemberRole::Admin) => GateState::Authorized,
            (false, MemberRole::Member) => GateState::CheckingPayment {
                member_id: auth.member_id,
            },
        }
    }

    pub fn render(&self) -> Render {
        match &self.state {
            GateState::CheckingAuth | GateState::CheckingPayment { .. } => Render::Loading,
            GateState::Unauthenticated => Render::Redirect(LOGIN_PATH),
            GateState::Forbidden => Render::Redirect(DASHBOARD_PATH),
            GateState::PaymentRequired { standing } => Render::PaymentRequired {
                standing: *standing,
                actions: renewal_actions(),
            },
            GateState::Authorized => Render::Content(self.view.clone()),
        }
    }
}

/// Runs the gate to a terminal state
///
/// `lookup_standing` is only called when a payment check is needed. Its
/// failure is logged and treated as "not paid up".
pub async fn evaluate<F, Fut, E>(view: View, session: Option<AuthContext>, lookup_standing: F) -> Gate
where
    F: FnOnce(Uuid) -> Fut,
    Fut: Future<Output = Result<Standing, E>>,
    E: std::fmt::Display,
{
    let gate = Gate::new(view).handle(GateEvent::SessionResolved(session));

    let member_id = match gate.state() {
        GateState::CheckingPayment { member_id } => *member_id,
        _ => return gate,
    };

    let result = lookup_standing(member_id).await.map_err(|e| {
        tracing::warn!(%member_id, error = %e, "payment lookup failed, requiring payment");
    });

    gate.handle(GateEvent::PaymentResolved(result))
}
