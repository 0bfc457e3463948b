//! Plans, credit packs and checkout
//!
//! Checkout hands the customer to a payment redirector and gets back a URL.
//! The purchase is remembered until the return URL is seen, then the ledger
//! is credited.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::PlanTier;
use crate::ledger::{CreditLedger, LedgerError};
use crate::text::format_price;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plan {
    pub tier: PlanTier,
    pub price: f64,
    pub credits: u32,
    pub features: &'static [&'static str],
}

pub const PLANS: [Plan; 3] = [
    Plan {
        tier: PlanTier::Free,
        price: 0.0,
        credits: 3,
        features: &["Unlimited text", "3 image credits", "Watermark"],
    },
    Plan {
        tier: PlanTier::Pro,
        price: 49.90,
        credits: 50,
        features: &["Unlimited text", "50 credits/month", "No watermark", "High resolution"],
    },
    Plan {
        tier: PlanTier::Master,
        price: 129.90,
        credits: 200,
        features: &["Unlimited text", "200 credits/month", "Priority queue", "Brand identity pro"],
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreditPack {
    pub id: &'static str,
    pub credits: u32,
    pub price: f64,
    pub label: &'static str,
    pub popular: bool,
}

pub const CREDIT_PACKS: [CreditPack; 5] = [
    CreditPack {
        id: "test_1",
        credits: 1,
        price: 1.00,
        label: "System test",
        popular: false,
    },
    CreditPack {
        id: "test_5",
        credits: 5,
        price: 5.00,
        label: "Quick test",
        popular: false,
    },
    CreditPack {
        id: "pack_10",
        credits: 10,
        price: 19.90,
        label: "Quick rescue",
        popular: false,
    },
    CreditPack {
        id: "pack_50",
        credits: 50,
        price: 59.90,
        label: "New menu",
        popular: true,
    },
    CreditPack {
        id: "pack_100",
        credits: 100,
        price: 99.90,
        label: "Agency",
        popular: false,
    },
];

pub fn plan(tier: PlanTier) -> &'static Plan {
    match tier {
        PlanTier::Free => &PLANS[0],
        PlanTier::Pro => &PLANS[1],
        PlanTier::Master => &PLANS[2],
    }
}

pub fn pack(id: &str) -> Option<&'static CreditPack> {
    CREDIT_PACKS.iter().find(|p| p.id == id)
}

/// What the customer is paying for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum PurchaseItem {
    Plan(PlanTier),
    Pack(String),
}

impl PurchaseItem {
    pub fn item_id(&self) -> &str {
        match self {
            PurchaseItem::Plan(tier) => tier.id(),
            PurchaseItem::Pack(id) => id,
        }
    }

    /// Price and credits, or `None` for an unknown pack.
    fn terms(&self) -> Option<(f64, u32)> {
        match self {
            PurchaseItem::Plan(tier) => {
                let p = plan(*tier);
                Some((p.price, p.credits))
            }
            PurchaseItem::Pack(id) => pack(id).map(|p| (p.price, p.credits)),
        }
    }

    pub fn amount(&self) -> f64 {
        self.terms().map(|(price, _)| price).unwrap_or(0.0)
    }

    pub fn credits(&self) -> u32 {
        self.terms().map(|(_, credits)| credits).unwrap_or(0)
    }

    pub fn is_subscription(&self) -> bool {
        matches!(self, PurchaseItem::Plan(_)) && self.amount() > 0.0
    }

    pub fn description(&self) -> String {
        match self {
            PurchaseItem::Plan(tier) => format!("{} plan", tier.name()),
            PurchaseItem::Pack(_) => format!("{} credit pack", self.credits()),
        }
    }

    pub fn summary(&self) -> String {
        format!("{} ({})", self.description(), format_price(self.amount()))
    }
}

/// Billing details collected before redirecting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
    pub name: String,
    pub email: String,
    pub tax_id: String,
    pub cellphone: String,
}

impl CheckoutForm {
    pub fn validate(&self) -> Result<(), PaymentError> {
        let missing = [&self.name, &self.cellphone, &self.tax_id]
            .iter()
            .any(|f| f.trim().is_empty());
        if missing {
            return Err(PaymentError::InvalidForm(
                "Please fill in every field for the invoice.".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("{0}")]
    InvalidForm(String),
    #[error("unknown item {0:?}")]
    UnknownItem(String),
    #[error("could not create the payment session: {0}")]
    Gateway(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait PaymentRedirector: Send + Sync {
    async fn initiate_payment(
        &self,
        amount: f64,
        description: &str,
        customer: &CheckoutForm,
        item_id: &str,
        is_subscription: bool,
    ) -> Result<PaymentResponse, PaymentError>;
}

/// Approves every payment after a delay and points back at the app.
#[derive(Debug, Clone)]
pub struct MockPaymentRedirector {
    base_url: String,
    delay: Duration,
}

impl MockPaymentRedirector {
    pub fn new(base_url: &str, delay: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            delay,
        }
    }
}

#[async_trait]
impl PaymentRedirector for MockPaymentRedirector {
    async fn initiate_payment(
        &self,
        amount: f64,
        description: &str,
        _customer: &CheckoutForm,
        item_id: &str,
        is_subscription: bool,
    ) -> Result<PaymentResponse, PaymentError> {
        tracing::info!(amount, description, item_id, is_subscription, "mock payment started");
        tokio::time::sleep(self.delay).await;
        Ok(PaymentResponse {
            success: true,
            url: Some(format!(
                "{}/?payment_status=success&session_id=mock_session_{}",
                self.base_url,
                chrono::Utc::now().timestamp_millis()
            )),
            error: None,
        })
    }
}

/// Validate and hand off to the redirector. Returns the redirect URL.
pub async fn start_checkout(
    redirector: &dyn PaymentRedirector,
    item: &PurchaseItem,
    form: &CheckoutForm,
) -> Result<String, PaymentError> {
    if item.terms().is_none() {
        return Err(PaymentError::UnknownItem(item.item_id().to_string()));
    }
    form.validate()?;
    let response = redirector
        .initiate_payment(
            item.amount(),
            &item.description(),
            form,
            item.item_id(),
            item.is_subscription(),
        )
        .await?;
    match response {
        PaymentResponse {
            success: true,
            url: Some(url),
            ..
        } => Ok(url),
        PaymentResponse { error, .. } => Err(PaymentError::Gateway(error.unwrap_or_else(|| "unknown".to_string()))),
    }
}

/// True for a URL carrying `payment_status=success`.
pub fn is_payment_return(url: &str) -> bool {
    reqwest::Url::parse(url)
        .map(|u| u.query_pairs().any(|(k, v)| k == "payment_status" && v == "success"))
        .unwrap_or(false)
}

/// Credit the ledger for a confirmed purchase. Plans also switch the tier.
pub fn apply_purchase(ledger: &CreditLedger, item: &PurchaseItem) -> Result<u32, LedgerError> {
    let plan = match item {
        PurchaseItem::Plan(tier) => Some(*tier),
        PurchaseItem::Pack(_) => None,
    };
    let balance = ledger.credit(item.credits(), plan)?;
    tracing::info!(item = item.item_id(), credits = item.credits(), balance, "purchase applied");
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{MemoryProfileStore, User};
    use std::sync::Arc;

    struct Declining;

    #[async_trait]
    impl PaymentRedirector for Declining {
        async fn initiate_payment(
            &self,
            _: f64,
            _: &str,
            _: &CheckoutForm,
            _: &str,
            _: bool,
        ) -> Result<PaymentResponse, PaymentError> {
            Ok(PaymentResponse {
                success: false,
                url: None,
                error: Some("card declined".into()),
            })
        }
    }

    fn form() -> CheckoutForm {
        CheckoutForm {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            tax_id: "123".into(),
            cellphone: "555".into(),
        }
    }

    #[test]
    fn test_catalogue() {
        assert_eq!(plan(PlanTier::Pro).credits, 50);
        assert_eq!(plan(PlanTier::Master).price, 129.90);
        assert_eq!(pack("pack_50").map(|p| p.popular), Some(true));
        assert!(pack("pack_7").is_none());
        assert_eq!(CREDIT_PACKS.iter().filter(|p| p.popular).count(), 1);
    }

    #[test]
    fn test_purchase_terms() {
        let pro = PurchaseItem::Plan(PlanTier::Pro);
        assert!(pro.is_subscription());
        assert_eq!(pro.summary(), "Entrepreneur plan (R$ 49,90)");
        assert!(!PurchaseItem::Plan(PlanTier::Free).is_subscription());
        let p = PurchaseItem::Pack("pack_10".into());
        assert!(!p.is_subscription());
        assert_eq!((p.amount(), p.credits()), (19.90, 10));
    }

    #[test]
    fn test_purchase_serde() {
        let json = serde_json::to_string(&PurchaseItem::Pack("test_1".into())).unwrap();
        assert_eq!(json, r#"{"kind":"pack","id":"test_1"}"#);
        let back: PurchaseItem = serde_json::from_str(r#"{"kind":"plan","id":"master"}"#).unwrap();
        assert_eq!(back, PurchaseItem::Plan(PlanTier::Master));
    }

    #[test]
    fn test_form_requires_fields() {
        let mut f = form();
        assert!(f.validate().is_ok());
        f.tax_id = " ".into();
        assert!(matches!(f.validate(), Err(PaymentError::InvalidForm(_))));
    }

    #[test]
    fn test_return_url_detection() {
        assert!(is_payment_return("http://localhost/?payment_status=success&session_id=x"));
        assert!(!is_payment_return("http://localhost/?payment_status=failed"));
        assert!(!is_payment_return("http://localhost/?status=success"));
        assert!(!is_payment_return("not a url"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_checkout_returns_success_url() {
        let mock = MockPaymentRedirector::new("http://localhost/", Duration::from_millis(1500));
        let url = start_checkout(&mock, &PurchaseItem::Pack("test_5".into()), &form())
            .await
            .unwrap();
        assert!(url.starts_with("http://localhost/?payment_status=success&session_id=mock_session_"));
        assert!(is_payment_return(&url));
    }

    #[tokio::test]
    async fn test_checkout_errors() {
        let mock = MockPaymentRedirector::new("http://localhost", Duration::ZERO);
        let err = start_checkout(&mock, &PurchaseItem::Pack("nope".into()), &form())
            .await
            .unwrap_err();
        assert_eq!(err, PaymentError::UnknownItem("nope".into()));

        let err = start_checkout(&Declining, &PurchaseItem::Plan(PlanTier::Pro), &form())
            .await
            .unwrap_err();
        assert_eq!(err, PaymentError::Gateway("card declined".into()));
    }

    #[tokio::test]
    async fn test_apply_plan_switches_tier() {
        let store = Arc::new(MemoryProfileStore::new());
        let user = User::from_parts("u1".into(), "a@b.c".into(), None, None);
        let ledger = CreditLedger::new(&user, store.clone(), tokio::runtime::Handle::current());
        assert_eq!(apply_purchase(&ledger, &PurchaseItem::Plan(PlanTier::Pro)).unwrap(), 53);
        assert_eq!(ledger.plan(), PlanTier::Pro);
        assert_eq!(apply_purchase(&ledger, &PurchaseItem::Pack("test_1".into())).unwrap(), 54);
        ledger.settle().await;
        assert_eq!(store.get("u1").map(|p| p.credits), Some(54));
    }
}
