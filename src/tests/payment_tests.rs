//! tests/payment_tests.rs
//! Normalizadores del pago directo GetNet, webhooks y firma de Stripe.

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::models::payment_model::{
        CardBillingAddress, CardCustomer, CardData, PayDirectRequest,
    };
    use crate::services::billing_service::hmac_sha256_hex;
    use crate::services::getnet_service::{
        build_payment_payload, digits, e164_br, extract_ref_and_status, normalize_brand,
        normalize_pay_request, normalized_pay_status, pad2, split_name, to_yyyy,
    };
    use crate::services::stripe_service::verify_signature_at;

    fn base_request(pay_type: &str, brand: &str, cvv: &str) -> PayDirectRequest {
        PayDirectRequest {
            pay_type: pay_type.to_string(),
            amount_cents: Some(34990),
            currency: "BRL".to_string(),
            number_installments: 1,
            cardholder_mobile: Some("+5531988887777".to_string()),
            customer: CardCustomer {
                email: "cliente@luna.app".to_string(),
                name: "Maria da Silva".to_string(),
                document_number: "123.456.789-09".to_string(),
                phone_number: "31 99999-8888".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                billing_address: Some(CardBillingAddress {
                    street: "Rua A".to_string(),
                    number: "100".to_string(),
                    complement: String::new(),
                    district: "Centro".to_string(),
                    city: "Belo Horizonte".to_string(),
                    state: "MG".to_string(),
                    country: "BR".to_string(),
                    postal_code: "30.130-000".to_string(),
                }),
            },
            card: CardData {
                card_number: "5155 9012 2222 0001".to_string(),
                cardholder_name: "maria da silva".to_string(),
                expiration_month: "9".to_string(),
                expiration_year: "28".to_string(),
                security_code: cvv.to_string(),
                brand: brand.to_string(),
            },
            order_id: None,
            product_type: "digital_content".to_string(),
            sales_tax: 0,
        }
    }

    #[test]
    fn test_field_normalizers() {
        assert_eq!(digits("123.456.789-09"), "12345678909");
        assert_eq!(pad2("9"), "09");
        assert_eq!(pad2("12"), "12");
        assert_eq!(to_yyyy("28"), "2028");
        assert_eq!(to_yyyy("2028"), "2028");
        assert_eq!(normalize_brand("master"), "Mastercard");
        assert_eq!(normalize_brand("AMEX"), "American Express");
        assert_eq!(normalize_brand("elo"), "Elo");
        assert_eq!(normalize_brand("desconhecida"), "Visa");
        assert_eq!(split_name("Maria da Silva"), ("Maria".to_string(), "da Silva".to_string()));
        assert_eq!(split_name("Maria"), ("Maria".to_string(), "Maria".to_string()));
        assert_eq!(e164_br("31 99999-8888"), "+5531999998888");
        assert_eq!(e164_br("5531999998888"), "+5531999998888");
        assert_eq!(e164_br("+1 555 0100"), "+15550100");
    }

    #[test]
    fn test_cvv_validation_by_brand() {
        // Visa/Master: 3 dígitos.
        assert!(normalize_pay_request(&base_request("credit", "master", "123")).is_ok());
        assert!(normalize_pay_request(&base_request("credit", "master", "1234")).is_err());
        // Amex: 4 dígitos.
        assert!(normalize_pay_request(&base_request("credit", "amex", "1234")).is_ok());
        assert!(normalize_pay_request(&base_request("credit", "amex", "123")).is_err());
    }

    #[test]
    fn test_document_type_and_names() {
        let norm = normalize_pay_request(&base_request("credit", "visa", "123")).unwrap();
        assert_eq!(norm.document_type, "CPF");
        assert_eq!(norm.first_name, "Maria");
        assert_eq!(norm.last_name, "da Silva");
        assert_eq!(norm.exp_month, "09");
        assert_eq!(norm.exp_year, "2028");

        let mut req = base_request("credit", "visa", "123");
        req.customer.document_number = "12.345.678/0001-95".to_string();
        let norm = normalize_pay_request(&req).unwrap();
        assert_eq!(norm.document_type, "CNPJ");
    }

    #[test]
    fn test_debit_requires_mobile() {
        let mut req = base_request("debit", "visa", "123");
        req.cardholder_mobile = None;
        req.customer.phone_number = String::new();
        assert!(normalize_pay_request(&req).is_err());

        // Con teléfono del cliente alcanza.
        let mut req = base_request("debit", "visa", "123");
        req.cardholder_mobile = None;
        assert!(normalize_pay_request(&req).is_ok());
    }

    #[test]
    fn test_credit_payload_shape() {
        let req = base_request("credit", "master", "123");
        let norm = normalize_pay_request(&req).unwrap();
        let (endpoint, payload) = build_payment_payload(
            "seller-1",
            &req,
            &norm,
            "num-token",
            34990,
            "10.0.0.1",
            "Mozilla/5.0",
        );
        assert_eq!(endpoint, "/v1/payments/credit");
        assert_eq!(payload["seller_id"], "seller-1");
        assert_eq!(payload["amount"], 34990);
        // La tarjeta va en la raíz.
        assert_eq!(payload["card"]["number_token"], "num-token");
        assert_eq!(payload["card"]["cardholder_name"], "MARIA DA SILVA");
        assert_eq!(payload["card"]["expiration_year"], "2028");
        assert_eq!(payload["credit"]["transaction_type"], "FULL");
        assert_eq!(payload["credit"]["soft_descriptor"], "LunaAI");
        assert_eq!(payload["credit"]["number_installments"], 1);
        assert!(payload.get("debit").is_none());
        assert_eq!(payload["customer"]["document_type"], "CPF");
        assert_eq!(payload["customer"]["billing_address"]["postal_code"], "30130000");
        assert_eq!(payload["device"]["ip_address"], "10.0.0.1");
        assert!(payload["order"]["order_id"]
            .as_str()
            .unwrap()
            .starts_with("order_"));
    }

    #[test]
    fn test_debit_payload_shape() {
        let req = base_request("debit", "visa", "123");
        let norm = normalize_pay_request(&req).unwrap();
        let (endpoint, payload) =
            build_payment_payload("seller-1", &req, &norm, "num-token", 34990, "", "");
        assert_eq!(endpoint, "/v1/payments/debit");
        assert_eq!(payload["debit"]["cardholder_mobile"], "+5531988887777");
        assert_eq!(payload["debit"]["authenticated"], false);
        assert!(payload.get("credit").is_none());
        // Sin ip ni user-agent no se manda bloque device.
        assert!(payload.get("device").is_none());
    }

    #[test]
    fn test_webhook_ref_and_status() {
        let info = extract_ref_and_status(&json!({
            "reference_id": "gt_abc", "status": "PAYMENT_APPROVED"
        }));
        assert_eq!(info.reference.as_deref(), Some("gt_abc"));
        assert_eq!(info.status, Some("paid"));

        let info = extract_ref_and_status(&json!({
            "orderId": "gt_x", "payment_status": "Canceled"
        }));
        assert_eq!(info.reference.as_deref(), Some("gt_x"));
        assert_eq!(info.status, Some("failed"));

        let info = extract_ref_and_status(&json!({ "ref": "gt_y", "status": "em análise" }));
        assert_eq!(info.reference.as_deref(), Some("gt_y"));
        assert_eq!(info.status, None);

        let info = extract_ref_and_status(&json!({ "status": "paid" }));
        assert!(info.reference.is_none());
    }

    #[test]
    fn test_normalized_pay_status() {
        assert_eq!(normalized_pay_status(&json!({ "status": "AUTHORIZED" })), "approved");
        assert_eq!(
            normalized_pay_status(&json!({ "payment": { "status": "CONFIRMED" } })),
            "approved"
        );
        assert_eq!(normalized_pay_status(&json!({ "status": "DENIED" })), "denied");
        assert_eq!(normalized_pay_status(&json!({})), "");
    }

    #[test]
    fn test_stripe_signature_verification() {
        let secret = "whsec_test";
        let payload = r#"{"id":"evt_1","type":"invoice.paid"}"#;
        let now = 1_700_000_000i64;
        let expected = hmac_sha256_hex(secret, &format!("{}.{}", now, payload)).unwrap();
        let header = format!("t={},v1={}", now, expected);

        assert!(verify_signature_at(secret, payload, &header, now));
        // Dentro de la tolerancia de 5 minutos.
        assert!(verify_signature_at(secret, payload, &header, now + 299));
        // Fuera de la tolerancia.
        assert!(!verify_signature_at(secret, payload, &header, now + 301));
        // Firma de otro secreto.
        assert!(!verify_signature_at("otro", payload, &header, now));
        // Header sin timestamp.
        assert!(!verify_signature_at(secret, payload, "v1=abc", now));
        // Cualquier v1 que matchee alcanza.
        let header = format!("t={},v1=basura,v1={}", now, expected);
        assert!(verify_signature_at(secret, payload, &header, now));
    }
}
