//! Canonical event extraction.
//!
//! Each provider encodes "a purchase completed" differently. The rules live
//! here and nowhere else: an extractor either yields a [`CanonicalEvent`] or
//! `None` for anything the pipeline should not act on (refunds, pending
//! sales, payloads missing a required field).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::platform::Platform;

/// Provider-neutral view of a completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub event_type: String,
    pub transaction_id: String,
    /// Trimmed and lower-cased.
    pub user_email: String,
    pub product_id: String,
    pub status: String,
}

/// Normalizes one provider's payload.
pub trait EventExtractor: Send + Sync {
    fn extract(&self, payload: &Value) -> Option<CanonicalEvent>;
}

/// Hotmart: `event == "PURCHASE_COMPLETE"`.
#[derive(Debug, Default)]
pub struct HotmartExtractor;

impl EventExtractor for HotmartExtractor {
    fn extract(&self, payload: &Value) -> Option<CanonicalEvent> {
        let event = str_at(payload, &["event"])?;
        if event != "PURCHASE_COMPLETE" {
            return None;
        }
        let data = payload.get("data")?;
        Some(CanonicalEvent {
            event_type: event.to_string(),
            transaction_id: id_at(data, &["purchase", "transaction"])?,
            user_email: email_at(data, &["buyer", "email"])?,
            product_id: id_at(data, &["product", "id"])?,
            status: str_at(data, &["purchase", "status"])
                .unwrap_or(event)
                .to_string(),
        })
    }
}

/// Eduzz: `data.status == "paid"`.
#[derive(Debug, Default)]
pub struct EduzzExtractor;

impl EventExtractor for EduzzExtractor {
    fn extract(&self, payload: &Value) -> Option<CanonicalEvent> {
        let data = payload.get("data")?;
        let status = str_at(data, &["status"])?;
        if status != "paid" {
            return None;
        }
        Some(CanonicalEvent {
            event_type: str_at(payload, &["event"])
                .unwrap_or("invoice_paid")
                .to_string(),
            transaction_id: id_at(data, &["id"])?,
            user_email: email_at(data, &["customer", "email"])?,
            product_id: id_at(data, &["product", "id"])?,
            status: status.to_string(),
        })
    }
}

/// Stripe: paid invoices, or checkout sessions whose payment settled.
#[derive(Debug, Default)]
pub struct StripeExtractor;

impl StripeExtractor {
    fn from_invoice(event_type: &str, object: &Value) -> Option<CanonicalEvent> {
        Some(CanonicalEvent {
            event_type: event_type.to_string(),
            transaction_id: id_at(object, &["payment_intent"]).or_else(|| id_at(object, &["id"]))?,
            user_email: email_at(object, &["customer_email"])?,
            product_id: object
                .pointer("/lines/data/0/price/id")
                .and_then(as_id)
                .or_else(|| id_at(object, &["metadata", "price_id"]))?,
            status: str_at(object, &["status"]).unwrap_or("paid").to_string(),
        })
    }

    fn from_checkout_session(event_type: &str, object: &Value) -> Option<CanonicalEvent> {
        let payment_status = str_at(object, &["payment_status"])?;
        if payment_status != "paid" {
            return None;
        }
        Some(CanonicalEvent {
            event_type: event_type.to_string(),
            transaction_id: id_at(object, &["payment_intent"]).or_else(|| id_at(object, &["id"]))?,
            user_email: email_at(object, &["customer_details", "email"])
                .or_else(|| email_at(object, &["customer_email"]))?,
            product_id: id_at(object, &["metadata", "price_id"])
                .or_else(|| id_at(object, &["metadata", "product_id"]))?,
            status: payment_status.to_string(),
        })
    }
}

impl EventExtractor for StripeExtractor {
    fn extract(&self, payload: &Value) -> Option<CanonicalEvent> {
        let event_type = str_at(payload, &["type"])?;
        let object = payload.pointer("/data/object")?;
        match event_type {
            "invoice.payment_succeeded" | "invoice.paid" => Self::from_invoice(event_type, object),
            "checkout.session.completed" => Self::from_checkout_session(event_type, object),
            _ => None,
        }
    }
}

/// Kirvano: `status == "ACTIVE"`.
#[derive(Debug, Default)]
pub struct KirvanoExtractor;

impl EventExtractor for KirvanoExtractor {
    fn extract(&self, payload: &Value) -> Option<CanonicalEvent> {
        let status = str_at(payload, &["status"])?;
        if status != "ACTIVE" {
            return None;
        }
        Some(CanonicalEvent {
            event_type: str_at(payload, &["event"])
                .unwrap_or("SALE_APPROVED")
                .to_string(),
            transaction_id: id_at(payload, &["sale_id"])?,
            user_email: email_at(payload, &["customer", "email"])?,
            product_id: payload
                .pointer("/products/0/id")
                .and_then(as_id)
                .or_else(|| id_at(payload, &["product", "id"]))?,
            status: status.to_string(),
        })
    }
}

/// Monetizze: `venda.status == "Aprovado"`.
#[derive(Debug, Default)]
pub struct MonetizzeExtractor;

impl EventExtractor for MonetizzeExtractor {
    fn extract(&self, payload: &Value) -> Option<CanonicalEvent> {
        let venda = payload.get("venda")?;
        let status = str_at(venda, &["status"])?;
        if status != "Aprovado" {
            return None;
        }
        Some(CanonicalEvent {
            event_type: str_at(payload, &["tipoPostback", "descricao"])
                .unwrap_or("venda_aprovada")
                .to_string(),
            transaction_id: id_at(venda, &["codigo"])?,
            user_email: email_at(payload, &["comprador", "email"])?,
            product_id: id_at(payload, &["produto", "codigo"])?,
            status: status.to_string(),
        })
    }
}

/// Dispatches to the extractor for a platform.
#[derive(Debug, Default)]
pub struct EventExtractorRegistry {
    hotmart: HotmartExtractor,
    eduzz: EduzzExtractor,
    stripe: StripeExtractor,
    kirvano: KirvanoExtractor,
    monetizze: MonetizzeExtractor,
}

impl EventExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extractor_for(&self, platform: Platform) -> &dyn EventExtractor {
        match platform {
            Platform::Hotmart => &self.hotmart,
            Platform::Eduzz => &self.eduzz,
            Platform::Stripe => &self.stripe,
            Platform::Kirvano => &self.kirvano,
            Platform::Monetizze => &self.monetizze,
        }
    }

    pub fn extract(&self, platform: Platform, payload: &Value) -> Option<CanonicalEvent> {
        self.extractor_for(platform).extract(payload)
    }
}

fn walk<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    walk(value, path)?.as_str()
}

/// Identifiers arrive as strings or numbers depending on the provider.
fn as_id(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn id_at(value: &Value, path: &[&str]) -> Option<String> {
    walk(value, path).and_then(as_id)
}

fn email_at(value: &Value, path: &[&str]) -> Option<String> {
    let email = str_at(value, path)?.trim().to_lowercase();
    (!email.is_empty()).then_some(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> EventExtractorRegistry {
        EventExtractorRegistry::new()
    }

    // ══════════════════════════════════════════════════════════════
    // Hotmart
    // ══════════════════════════════════════════════════════════════

    fn hotmart(event: &str) -> Value {
        json!({
            "event": event,
            "data": {
                "buyer": { "email": "  Buyer@Example.COM " },
                "product": { "id": 4455 },
                "purchase": { "transaction": "HM-123", "status": "COMPLETED" }
            }
        })
    }

    #[test]
    fn hotmart_purchase_complete_is_extracted() {
        let event = registry()
            .extract(Platform::Hotmart, &hotmart("PURCHASE_COMPLETE"))
            .unwrap();

        assert_eq!(event.event_type, "PURCHASE_COMPLETE");
        assert_eq!(event.transaction_id, "HM-123");
        assert_eq!(event.user_email, "buyer@example.com");
        assert_eq!(event.product_id, "4455");
        assert_eq!(event.status, "COMPLETED");
    }

    #[test]
    fn hotmart_other_events_are_irrelevant() {
        assert!(registry()
            .extract(Platform::Hotmart, &hotmart("PURCHASE_REFUNDED"))
            .is_none());
    }

    #[test]
    fn hotmart_missing_buyer_is_irrelevant() {
        let mut payload = hotmart("PURCHASE_COMPLETE");
        payload["data"].as_object_mut().unwrap().remove("buyer");
        assert!(registry().extract(Platform::Hotmart, &payload).is_none());
    }

    // ══════════════════════════════════════════════════════════════
    // Eduzz
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn eduzz_paid_is_extracted() {
        let payload = json!({
            "data": {
                "id": 987654,
                "status": "paid",
                "customer": { "email": "ana@example.com" },
                "product": { "id": "ED-PRO" }
            }
        });
        let event = registry().extract(Platform::Eduzz, &payload).unwrap();

        assert_eq!(event.transaction_id, "987654");
        assert_eq!(event.event_type, "invoice_paid");
        assert_eq!(event.product_id, "ED-PRO");
    }

    #[test]
    fn eduzz_waiting_payment_is_irrelevant() {
        let payload = json!({ "data": { "id": 1, "status": "waiting_payment" } });
        assert!(registry().extract(Platform::Eduzz, &payload).is_none());
    }

    // ══════════════════════════════════════════════════════════════
    // Stripe
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn stripe_invoice_payment_succeeded_is_extracted() {
        let payload = json!({
            "id": "evt_1",
            "type": "invoice.payment_succeeded",
            "data": { "object": {
                "id": "in_1",
                "payment_intent": "pi_1",
                "customer_email": "Pro@Example.com",
                "status": "paid",
                "lines": { "data": [ { "price": { "id": "price_pro_monthly" } } ] }
            }}
        });
        let event = registry().extract(Platform::Stripe, &payload).unwrap();

        assert_eq!(event.transaction_id, "pi_1");
        assert_eq!(event.user_email, "pro@example.com");
        assert_eq!(event.product_id, "price_pro_monthly");
    }

    #[test]
    fn stripe_invoice_without_payment_intent_uses_invoice_id() {
        let payload = json!({
            "type": "invoice.paid",
            "data": { "object": {
                "id": "in_2",
                "customer_email": "a@b.co",
                "lines": { "data": [ { "price": { "id": "price_starter_monthly" } } ] }
            }}
        });
        let event = registry().extract(Platform::Stripe, &payload).unwrap();
        assert_eq!(event.transaction_id, "in_2");
        assert_eq!(event.status, "paid");
    }

    #[test]
    fn stripe_checkout_requires_paid_status() {
        let mut payload = json!({
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_1",
                "payment_status": "unpaid",
                "customer_details": { "email": "c@d.co" },
                "metadata": { "price_id": "price_premium_monthly" }
            }}
        });
        assert!(registry().extract(Platform::Stripe, &payload).is_none());

        payload["data"]["object"]["payment_status"] = json!("paid");
        let event = registry().extract(Platform::Stripe, &payload).unwrap();
        assert_eq!(event.transaction_id, "cs_1");
        assert_eq!(event.product_id, "price_premium_monthly");
    }

    #[test]
    fn stripe_unrelated_types_are_irrelevant() {
        let payload = json!({ "type": "charge.refunded", "data": { "object": {} } });
        assert!(registry().extract(Platform::Stripe, &payload).is_none());
    }

    // ══════════════════════════════════════════════════════════════
    // Kirvano / Monetizze
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn kirvano_active_is_extracted() {
        let payload = json!({
            "event": "SALE_APPROVED",
            "status": "ACTIVE",
            "sale_id": "KV-9",
            "customer": { "email": "k@v.co" },
            "products": [ { "id": "KV-PRO" } ]
        });
        let event = registry().extract(Platform::Kirvano, &payload).unwrap();
        assert_eq!(event.transaction_id, "KV-9");
        assert_eq!(event.product_id, "KV-PRO");
    }

    #[test]
    fn kirvano_pending_is_irrelevant() {
        let payload = json!({ "status": "PENDING", "sale_id": "KV-9" });
        assert!(registry().extract(Platform::Kirvano, &payload).is_none());
    }

    #[test]
    fn monetizze_aprovado_is_extracted() {
        let payload = json!({
            "tipoPostback": { "codigo": 2, "descricao": "Finalizada / Aprovada" },
            "venda": { "codigo": 31337, "status": "Aprovado" },
            "comprador": { "email": "m@z.co" },
            "produto": { "codigo": 778 }
        });
        let event = registry().extract(Platform::Monetizze, &payload).unwrap();
        assert_eq!(event.transaction_id, "31337");
        assert_eq!(event.product_id, "778");
        assert_eq!(event.event_type, "Finalizada / Aprovada");
    }

    #[test]
    fn monetizze_cancelled_is_irrelevant() {
        let payload = json!({ "venda": { "codigo": 1, "status": "Cancelada" } });
        assert!(registry().extract(Platform::Monetizze, &payload).is_none());
    }

    // ══════════════════════════════════════════════════════════════
    // Robustness
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn odd_shapes_never_panic() {
        let shapes = [
            json!(null),
            json!([]),
            json!("PURCHASE_COMPLETE"),
            json!({ "event": 42 }),
            json!({ "data": "paid" }),
            json!({ "venda": [] }),
            json!({ "type": "invoice.paid", "data": { "object": null } }),
        ];
        for platform in Platform::ALL {
            for shape in &shapes {
                assert!(registry().extract(platform, shape).is_none());
            }
        }
    }

    #[test]
    fn blank_identifiers_are_rejected() {
        let mut payload = hotmart("PURCHASE_COMPLETE");
        payload["data"]["purchase"]["transaction"] = json!("   ");
        assert!(registry().extract(Platform::Hotmart, &payload).is_none());
    }
}
