//! Razorpay standard checkout.
//!
//! The widget runs entirely in the browser. The server only confirms that
//! `checkout.js` is reachable and builds the options object the widget is
//! opened with.

use std::time::Duration;

use async_trait::async_trait;
use dpicon_core::{Plan, ReceiptId, UserIdentity};
use tokio::sync::OnceCell;

use super::{CheckoutError, CheckoutNotes, CheckoutOptions, PaymentGateway, Prefill, Theme};
use crate::config::CheckoutConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Logo shown inside the widget.
const WIDGET_IMAGE: &str = "/favicon.ico";

/// Razorpay gateway configured from [`CheckoutConfig`].
pub struct RazorpayGateway {
    client: reqwest::Client,
    config: CheckoutConfig,
    script_loaded: OnceCell<()>,
}

impl RazorpayGateway {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: CheckoutConfig) -> Result<Self, CheckoutError> {
        let client = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;
        Ok(Self {
            client,
            config,
            script_loaded: OnceCell::new(),
        })
    }

    async fn probe_script(&self) -> Result<(), CheckoutError> {
        let response = self.client.get(&self.config.script_url).send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::info!(url = %self.config.script_url, "checkout script reachable");
            Ok(())
        } else {
            Err(CheckoutError::ScriptUnavailable(format!(
                "{} returned {status}",
                self.config.script_url
            )))
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn script_url(&self) -> &str {
        &self.config.script_url
    }

    /// Succeeds once per process; failures are retried on the next call.
    async fn load_script(&self) -> Result<(), CheckoutError> {
        self.script_loaded
            .get_or_try_init(|| self.probe_script())
            .await
            .map(|_| ())
    }

    fn checkout_options(
        &self,
        plan: &Plan,
        receipt: &ReceiptId,
        customer: Option<&UserIdentity>,
    ) -> Result<CheckoutOptions, CheckoutError> {
        let amount = plan
            .price
            .minor_units()
            .filter(|amount| *amount > 0)
            .ok_or(CheckoutError::InvalidAmount(plan.id))?;

        let prefill = customer.map_or_else(Prefill::default, |user| Prefill {
            name: user.display_name.clone().unwrap_or_default(),
            email: user
                .email
                .as_ref()
                .map(|email| email.as_str().to_owned())
                .unwrap_or_default(),
        });

        Ok(CheckoutOptions {
            key: self.config.key_id.clone(),
            amount,
            currency: plan.price.currency_code.code().to_owned(),
            name: self.config.merchant_name.clone(),
            description: format!("{} Plan", plan.name),
            image: WIDGET_IMAGE.to_owned(),
            prefill,
            notes: CheckoutNotes {
                plan: plan.id.to_string(),
                receipt: receipt.to_string(),
            },
            theme: Theme {
                color: self.config.theme_color.clone(),
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use dpicon_core::{Email, PlanId, SubjectId};

    fn gateway() -> RazorpayGateway {
        RazorpayGateway::new(CheckoutConfig {
            key_id: "rzp_test_1DP5mmOlF5G5ag".to_owned(),
            script_url: "http://127.0.0.1:9/checkout.js".to_owned(),
            merchant_name: "DPIcon".to_owned(),
            theme_color: "#0d9488".to_owned(),
        })
        .unwrap()
    }

    #[test]
    fn test_options_for_signed_in_customer() {
        let customer = UserIdentity {
            subject: SubjectId::new("1"),
            display_name: Some("Ada Lovelace".to_owned()),
            email: Some(Email::parse("ada@example.com").unwrap()),
            avatar_url: None,
        };
        let receipt = ReceiptId::new("receipt_abc");
        let options = gateway()
            .checkout_options(&Plan::get(PlanId::Premium), &receipt, Some(&customer))
            .unwrap();

        assert_eq!(options.key, "rzp_test_1DP5mmOlF5G5ag");
        assert_eq!(options.amount, 90_000);
        assert_eq!(options.currency, "INR");
        assert_eq!(options.description, "Premium Plan");
        assert_eq!(options.prefill.name, "Ada Lovelace");
        assert_eq!(options.prefill.email, "ada@example.com");
        assert_eq!(options.notes.receipt, "receipt_abc");
        assert_eq!(options.notes.plan, "premium");
    }

    #[test]
    fn test_options_for_anonymous_customer() {
        let options = gateway()
            .checkout_options(&Plan::get(PlanId::Pro), &ReceiptId::new("r"), None)
            .unwrap();
        assert_eq!(options.amount, 8000);
        assert!(options.prefill.name.is_empty());
        assert!(options.prefill.email.is_empty());
    }

    #[test]
    fn test_free_plan_has_no_options() {
        let err = gateway()
            .checkout_options(&Plan::get(PlanId::Basic), &ReceiptId::new("r"), None)
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidAmount(PlanId::Basic)));
    }

    #[test]
    fn test_options_json_uses_widget_field_names() {
        let options = gateway()
            .checkout_options(&Plan::get(PlanId::Pro), &ReceiptId::new("r"), None)
            .unwrap();
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["theme"]["color"], "#0d9488");
        assert_eq!(json["notes"]["receipt"], "r");
        assert_eq!(json["image"], "/favicon.ico");
    }

    #[tokio::test]
    async fn test_unreachable_script_is_an_error() {
        let gateway = gateway();
        assert!(gateway.load_script().await.is_err());
        // not memoized on failure
        assert!(gateway.load_script().await.is_err());
    }
}
