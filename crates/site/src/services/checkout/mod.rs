//! Checkout bridge between the plan selector and the payment widget.
//!
//! Free plans are granted on the spot. Paid plans need the gateway's
//! browser script; once it is reachable the bridge hands the browser a set
//! of widget options and remembers which plan the receipt belongs to. The
//! widget reports back through [`CheckoutBridge::complete`] or
//! [`CheckoutBridge::fail`].

pub mod razorpay;

pub use razorpay::RazorpayGateway;

use std::sync::Arc;

use async_trait::async_trait;
use dpicon_core::{Credits, PaymentId, Plan, PlanId, ReceiptId, UserIdentity};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::error::add_breadcrumb;
use crate::models::Notification;
use crate::services::session::SessionContext;

/// Errors from the payment gateway or a checkout callback.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("checkout script unavailable: {0}")]
    ScriptUnavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("plan {0} has no chargeable amount")]
    InvalidAmount(PlanId),

    #[error("no open checkout for receipt {0}")]
    UnknownCheckout(ReceiptId),
}

/// A paid checkout that has been handed to the widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCheckout {
    pub plan: PlanId,
    pub receipt: ReceiptId,
}

/// Options passed verbatim to the payment widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutOptions {
    pub key: String,
    /// Amount in minor units (paise).
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub image: String,
    pub prefill: Prefill,
    pub notes: CheckoutNotes,
    pub theme: Theme,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Prefill {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutNotes {
    pub plan: String,
    pub receipt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub color: String,
}

/// A hosted payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// URL of the browser script that renders the widget.
    fn script_url(&self) -> &str;

    /// Make sure the widget script can be loaded.
    async fn load_script(&self) -> Result<(), CheckoutError>;

    /// Widget options for a paid plan.
    fn checkout_options(
        &self,
        plan: &Plan,
        receipt: &ReceiptId,
        customer: Option<&UserIdentity>,
    ) -> Result<CheckoutOptions, CheckoutError>;
}

/// Result of picking a plan in the selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Selection {
    /// Credits were granted without payment.
    Granted { credits: Credits },
    /// The browser should open the widget with these options.
    Checkout {
        receipt: ReceiptId,
        options: CheckoutOptions,
    },
    /// Payment is unavailable right now; nothing changed.
    Unavailable { message: String },
}

const UNAVAILABLE_MESSAGE: &str = "Payment is temporarily unavailable. Please try again later.";

/// Runs plan selection and checkout callbacks against a gateway.
#[derive(Clone)]
pub struct CheckoutBridge {
    gateway: Arc<dyn PaymentGateway>,
}

impl CheckoutBridge {
    #[must_use]
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }

    #[must_use]
    pub fn script_url(&self) -> &str {
        self.gateway.script_url()
    }

    /// Act on a plan chosen in the selector.
    pub async fn select_plan(&self, ctx: &SessionContext, plan_id: PlanId) -> Selection {
        let plan = Plan::get(plan_id);

        if plan.is_free() {
            let mut state = ctx.lock().await;
            state.update_credits(plan.credits);
            state.checkout = None;
            state.close_plans();
            tracing::info!(visitor = %ctx.visitor(), plan = %plan.id, "free plan granted");
            add_breadcrumb("checkout", "Free plan selected", Some(&[("plan", plan.id.as_str())]));
            return Selection::Granted {
                credits: plan.credits,
            };
        }

        // the visitor's state stays unlocked while the script is fetched
        if let Err(e) = self.gateway.load_script().await {
            tracing::error!(visitor = %ctx.visitor(), plan = %plan.id, error = %e, "checkout script failed to load");
            return Selection::Unavailable {
                message: UNAVAILABLE_MESSAGE.to_owned(),
            };
        }

        let receipt = ReceiptId::new(format!("receipt_{}", Uuid::new_v4().simple()));
        let mut state = ctx.lock().await;
        match self
            .gateway
            .checkout_options(&plan, &receipt, state.session().user())
        {
            Ok(options) => {
                state.checkout = Some(PendingCheckout {
                    plan: plan.id,
                    receipt: receipt.clone(),
                });
                tracing::info!(visitor = %ctx.visitor(), plan = %plan.id, %receipt, "checkout opened");
                add_breadcrumb("checkout", "Checkout opened", Some(&[("plan", plan.id.as_str())]));
                Selection::Checkout { receipt, options }
            }
            Err(e) => {
                tracing::error!(visitor = %ctx.visitor(), plan = %plan.id, error = %e, "checkout options rejected");
                Selection::Unavailable {
                    message: UNAVAILABLE_MESSAGE.to_owned(),
                }
            }
        }
    }

    /// The widget reported a successful payment.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::UnknownCheckout`] if `receipt` is not the
    /// visitor's open checkout. Nothing is granted in that case.
    pub async fn complete(
        &self,
        ctx: &SessionContext,
        receipt: &ReceiptId,
        payment_id: &PaymentId,
    ) -> Result<Credits, CheckoutError> {
        let mut state = ctx.lock().await;
        let Some(pending) = state.checkout.take_if(|pending| &pending.receipt == receipt) else {
            tracing::warn!(visitor = %ctx.visitor(), %receipt, %payment_id, "payment for unknown checkout");
            return Err(CheckoutError::UnknownCheckout(receipt.clone()));
        };

        let plan = Plan::get(pending.plan);
        state.update_credits(plan.credits);
        state.close_plans();
        state.notifications.push(Notification::success(
            "Payment successful!",
            format!("Payment ID: {payment_id}"),
        ));

        tracing::info!(visitor = %ctx.visitor(), plan = %plan.id, %receipt, %payment_id, "payment completed");
        add_breadcrumb("checkout", "Payment completed", Some(&[("plan", plan.id.as_str())]));
        Ok(plan.credits)
    }

    /// The widget reported a failed or abandoned payment.
    ///
    /// Credits are untouched and the selector stays open.
    pub async fn fail(&self, ctx: &SessionContext, receipt: Option<&ReceiptId>, reason: &str) {
        let mut state = ctx.lock().await;
        let matches = state
            .checkout
            .as_ref()
            .is_some_and(|pending| receipt.is_none_or(|r| r == &pending.receipt));
        if matches {
            state.checkout = None;
        }
        tracing::warn!(visitor = %ctx.visitor(), receipt = ?receipt, reason, "payment failed");
    }
}
