/// Payment processor collaborators
///
/// The processor is opaque to the rest of the server: it turns a member and a
/// plan into a checkout URL, and later reports the outcome through the signed
/// webhook handled in [`webhook`].
///
/// Two adapters are provided, selected by `ASSOCIA__PAYMENT__PROVIDER`:
///
/// - [`LinkProcessor`]: hosted checkout page reached by a query-string link
/// - [`HttpProcessor`]: processor API that creates a checkout session

pub mod webhook;

use crate::config::{PaymentConfig, PaymentProvider};
use associa_shared::models::{member::Member, payment::PaymentPlan};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("invalid checkout URL: {0}")]
    InvalidUrl(String),

    #[error("processor request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected processor response: {0}")]
    InvalidResponse(String),

    #[error("processor not configured: {0}")]
    NotConfigured(&'static str),
}

/// Plan prices in cents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    pub monthly_cents: i64,
    pub annual_cents: i64,
}

impl Pricing {
    pub fn amount(&self, plan: PaymentPlan) -> i64 {
        match plan {
            PaymentPlan::Monthly => self.monthly_cents,
            PaymentPlan::Annual => self.annual_cents,
        }
    }
}

impl From<&PaymentConfig> for Pricing {
    fn from(config: &PaymentConfig) -> Self {
        Self {
            monthly_cents: config.monthly_price_cents,
            annual_cents: config.annual_price_cents,
        }
    }
}

/// Creates checkout links for renewals
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_payment_link(
        &self,
        member: &Member,
        plan: PaymentPlan,
    ) -> Result<String, ProcessorError>;
}

/// Reference echoed back by the processor in webhook notifications
pub fn checkout_reference(member: &Member, plan: PaymentPlan) -> String {
    format!("{}:{}", member.id, plan.as_str())
}

/// Builds a processor from configuration
pub fn from_config(config: &PaymentConfig) -> Result<Arc<dyn PaymentProcessor>, ProcessorError> {
    let pricing = Pricing::from(config);

    match config.provider {
        PaymentProvider::Link => Ok(Arc::new(LinkProcessor::new(
            config.checkout_base_url.clone(),
            pricing,
        ))),
        PaymentProvider::Http => {
            let api_url = config
                .api_url
                .clone()
                .ok_or(ProcessorError::NotConfigured("api_url"))?;
            Ok(Arc::new(HttpProcessor::new(
                api_url,
                config.api_key.clone(),
                pricing,
            )))
        }
    }
}

/// Hosted checkout page addressed by query parameters
pub struct LinkProcessor {
    base_url: String,
    pricing: Pricing,
}

impl LinkProcessor {
    pub fn new(base_url: impl Into<String>, pricing: Pricing) -> Self {
        Self {
            base_url: base_url.into(),
            pricing,
        }
    }
}

#[async_trait]
impl PaymentProcessor for LinkProcessor {
    async fn create_payment_link(
        &self,
        member: &Member,
        plan: PaymentPlan,
    ) -> Result<String, ProcessorError> {
        let amount = self.pricing.amount(plan).to_string();
        let reference = checkout_reference(member, plan);
        let member_id = member.id.to_string();

        let url = reqwest::Url::parse_with_params(
            &self.base_url,
            &[
                ("member", member_id.as_str()),
                ("plan", plan.as_str()),
                ("amount", amount.as_str()),
                ("email", member.email.as_str()),
                ("reference", reference.as_str()),
            ],
        )
        .map_err(|e| ProcessorError::InvalidUrl(e.to_string()))?;

        Ok(url.to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutRequest<'a> {
    reference: String,
    member_id: uuid::Uuid,
    name: &'a str,
    email: &'a str,
    plan: PaymentPlan,
    amount_cents: i64,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    url: String,
}

/// Processor API creating checkout sessions
pub struct HttpProcessor {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    pricing: Pricing,
}

impl HttpProcessor {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>, pricing: Pricing) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key,
            pricing,
        }
    }
}

#[async_trait]
impl PaymentProcessor for HttpProcessor {
    async fn create_payment_link(
        &self,
        member: &Member,
        plan: PaymentPlan,
    ) -> Result<String, ProcessorError> {
        let endpoint = format!("{}/checkout", self.api_url.trim_end_matches('/'));
        let body = CheckoutRequest {
            reference: checkout_reference(member, plan),
            member_id: member.id,
            name: &member.name,
            email: &member.email,
            plan,
            amount_cents: self.pricing.amount(plan),
        };

        let mut request = self
            .client
            .post(&endpoint)
            .timeout(std::time::Duration::from_secs(10))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let checkout: CheckoutResponse = response.json().await?;

        if checkout.url.is_empty() {
            return Err(ProcessorError::InvalidResponse("empty checkout url".to_string()));
        }

        tracing::debug!(member_id = %member.id, plan = plan.as_str(), "checkout session created");
        Ok(checkout.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use associa_shared::models::member::{MemberRole, SubscriptionStatus};
    use chrono::Utc;

    fn member() -> Member {
        Member {
            id: uuid::Uuid::new_v4(),
            name: "Maria Souza".to_string(),
            email: "maria+teste@example.com".to_string(),
            password_hash: String::new(),
            phone: None,
            cpf: "529.982.247-25".to_string(),
            occupation: None,
            graduated: false,
            role: MemberRole::Member,
            subscription_status: SubscriptionStatus::Pending,
            photo_url: None,
            cancelled_at: None,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn pricing() -> Pricing {
        Pricing {
            monthly_cents: 4990,
            annual_cents: 49900,
        }
    }

    #[test]
    fn test_pricing_by_plan() {
        assert_eq!(pricing().amount(PaymentPlan::Monthly), 4990);
        assert_eq!(pricing().amount(PaymentPlan::Annual), 49900);
    }

    #[tokio::test]
    async fn test_link_processor_encodes_params() {
        let processor = LinkProcessor::new("https://pay.example.com/checkout", pricing());
        let member = member();

        let link = processor
            .create_payment_link(&member, PaymentPlan::Annual)
            .await
            .unwrap();

        let url = reqwest::Url::parse(&link).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("pay.example.com"));
        assert_eq!(params["plan"], "annual");
        assert_eq!(params["amount"], "49900");
        assert_eq!(params["email"], "maria+teste@example.com");
        assert_eq!(params["reference"], format!("{}:annual", member.id));
    }

    #[tokio::test]
    async fn test_link_processor_rejects_bad_base() {
        let processor = LinkProcessor::new("not a url", pricing());
        let result = processor.create_payment_link(&member(), PaymentPlan::Monthly).await;
        assert!(matches!(result, Err(ProcessorError::InvalidUrl(_))));
    }

    #[test]
    fn test_http_provider_requires_api_url() {
        let config = PaymentConfig {
            provider: PaymentProvider::Http,
            ..Default::default()
        };
        assert!(matches!(
            from_config(&config),
            Err(ProcessorError::NotConfigured("api_url"))
        ));
    }
}
