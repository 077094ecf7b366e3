//! tests/stage_tests.rs
//! Reglas de clasificación de etapa y normalizadores de mensajes.

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use crate::services::stage_service::{
        classify_by_rules, classify_transcript, extract_text, extract_ts, is_from_me,
        last_msg_ts_of, normalize_stage, normalize_text, scale_ts,
    };

    fn outgoing(text: &str) -> Value {
        json!({ "fromMe": true, "text": text })
    }

    fn incoming(text: &str) -> Value {
        json!({ "fromMe": false, "text": text })
    }

    #[test]
    fn test_normalize_text_folds_accents_and_whitespace() {
        assert_eq!(normalize_text("  Vou te PASSAR  para "), "vou te passar para");
        assert_eq!(normalize_text("Qual é o seu nome?"), "qual e o seu nome?");
        assert_eq!(normalize_text("Atenção: catálogo"), "atencao: catalogo");
    }

    #[test]
    fn test_hot_hint_marks_lead_quente() {
        let items = vec![
            incoming("oi"),
            outgoing("vou te passar para o setor comercial"),
        ];
        assert_eq!(classify_transcript(&items), "lead_quente");
    }

    #[test]
    fn test_menu_guard_blocks_hot_hint() {
        // "encaminharei" matchearía, pero el texto habla del cardápio.
        let items = vec![outgoing("encaminharei o link do menu do cardapio online")];
        assert_eq!(classify_transcript(&items), "contatos");
    }

    #[test]
    fn test_ok_pattern_promotes_to_lead() {
        let items = vec![outgoing("sim, pode continuar"), incoming("obrigado")];
        assert_eq!(classify_transcript(&items), "lead");
    }

    #[test]
    fn test_name_pattern_promotes_to_lead() {
        let items = vec![outgoing("Qual o seu nome?")];
        assert_eq!(classify_transcript(&items), "lead");
    }

    #[test]
    fn test_incoming_messages_are_ignored() {
        // Las mismas frases dichas por el contacto no cuentan.
        let items = vec![
            incoming("vou te passar para o time"),
            incoming("qual seu nome"),
        ];
        assert_eq!(classify_transcript(&items), "contatos");
    }

    #[test]
    fn test_empty_transcript_defaults() {
        assert_eq!(classify_transcript(&[]), "contatos");
        assert_eq!(classify_by_rules(&[]), "lead");
    }

    #[test]
    fn test_board_rules_promote_to_qualificado() {
        let items = vec![outgoing("pode continuar por favor")];
        assert_eq!(classify_by_rules(&items), "lead_qualificado");

        let items = vec![outgoing("encaminhei seu contato ao time")];
        assert_eq!(classify_by_rules(&items), "lead_quente");
    }

    #[test]
    fn test_accented_hot_hint_still_matches() {
        let items = vec![outgoing("Vou te passar para o departamento, tá?")];
        assert_eq!(classify_transcript(&items), "lead_quente");
    }

    #[test]
    fn test_is_from_me_variants() {
        assert!(is_from_me(&json!({ "fromMe": true })));
        assert!(is_from_me(&json!({ "fromme": 1 })));
        assert!(is_from_me(&json!({ "from_me": "true" })));
        assert!(is_from_me(&json!({ "key": { "fromMe": true } })));
        assert!(is_from_me(&json!({ "message": { "key": { "fromMe": true } } })));
        assert!(is_from_me(&json!({ "id": "true_ABC123" })));
        assert!(is_from_me(&json!({ "user": "me" })));

        assert!(!is_from_me(&json!({ "fromMe": false })));
        assert!(!is_from_me(&json!({ "id": "false_ABC123" })));
        assert!(!is_from_me(&json!({})));
    }

    #[test]
    fn test_extract_text_field_order() {
        assert_eq!(extract_text(&json!({ "text": "Olá" })), "ola");
        assert_eq!(extract_text(&json!({ "caption": "Foto" })), "foto");
        assert_eq!(
            extract_text(&json!({ "message": { "conversation": "Bom dia" } })),
            "bom dia"
        );
        assert_eq!(
            extract_text(&json!({ "message": { "extendedTextMessage": { "text": "Oi" } } })),
            "oi"
        );
        assert_eq!(extract_text(&json!({})), "");
    }

    #[test]
    fn test_scale_ts_seconds_to_millis() {
        assert_eq!(scale_ts(1_700_000_000), 1_700_000_000_000);
        assert_eq!(scale_ts(1_700_000_000_000), 1_700_000_000_000);
        assert_eq!(scale_ts(0), 0);
    }

    #[test]
    fn test_extract_ts_sources() {
        assert_eq!(
            extract_ts(&json!({ "messageTimestamp": 1_700_000_000 })),
            1_700_000_000_000
        );
        assert_eq!(extract_ts(&json!({ "timestamp": "1700000001" })), 1_700_000_001_000);
        assert_eq!(
            extract_ts(&json!({ "message": { "messageTimestamp": 1_700_000_002_000i64 } })),
            1_700_000_002_000
        );
        assert_eq!(extract_ts(&json!({})), 0);
    }

    #[test]
    fn test_last_msg_ts_of_chat_item() {
        assert_eq!(
            last_msg_ts_of(&json!({ "wa_lastMsgTimestamp": 1_700_000_000 })),
            1_700_000_000_000
        );
        assert_eq!(
            last_msg_ts_of(&json!({ "updatedAt": 1_700_000_000_500i64 })),
            1_700_000_000_500
        );
    }

    #[test]
    fn test_normalize_stage_vocabulary() {
        assert_eq!(normalize_stage("contato"), "contatos");
        assert_eq!(normalize_stage("Contatos"), "contatos");
        assert_eq!(normalize_stage("LEAD QUENTE"), "lead_quente");
        assert_eq!(normalize_stage("lead_qualificado"), "lead_qualificado");
        assert_eq!(normalize_stage("lead"), "lead");
        assert_eq!(normalize_stage("qualquer coisa"), "contatos");
        assert_eq!(normalize_stage(""), "contatos");
    }
}
