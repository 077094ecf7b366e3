//! tests/crm_tests.rs
//! Tablero CRM: normalización de chatid, CRUD y sync.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};

    use crate::models::crm_model::STAGES;
    use crate::services::crm_service::{is_valid_stage, normalize_chatid, CrmService};

    async fn memory_pool() -> Pool<Sqlite> {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("No se pudo abrir sqlite::memory:")
    }

    async fn crm() -> CrmService {
        let svc = CrmService::new(memory_pool().await);
        svc.ensure_schema().await.expect("schema crm_status");
        svc
    }

    #[test]
    fn test_normalize_chatid() {
        assert_eq!(
            normalize_chatid(" 5531999998888@s.whatsapp.net "),
            "5531999998888@s.whatsapp.net"
        );
        // Número pelado de 10-15 dígitos gana el sufijo.
        assert_eq!(
            normalize_chatid("5531999998888"),
            "5531999998888@s.whatsapp.net"
        );
        // Grupos y otros ids con @ pasan tal cual.
        assert_eq!(normalize_chatid("1234-567@g.us"), "1234-567@g.us");
        // Demasiado corto o sin formato: inválido.
        assert_eq!(normalize_chatid("12345"), "");
        assert_eq!(normalize_chatid("no es un chat"), "");
        assert_eq!(normalize_chatid(""), "");
    }

    #[test]
    fn test_stage_vocabulary() {
        for stage in STAGES {
            assert!(is_valid_stage(stage));
        }
        assert!(!is_valid_stage("contatos"));
        assert!(!is_valid_stage(""));
        assert!(!is_valid_stage("Lead"));
    }

    #[actix_rt::test]
    async fn test_views_counts_zero_filled() {
        let svc = crm().await;
        svc.set_status("inst1", "a@s.whatsapp.net", "lead", "", &json!({}))
            .await
            .unwrap();
        svc.set_status("inst1", "b@s.whatsapp.net", "cliente", "", &json!({}))
            .await
            .unwrap();
        // Otra instancia no cuenta.
        svc.set_status("inst2", "c@s.whatsapp.net", "lead", "", &json!({}))
            .await
            .unwrap();

        let counts = svc.views_counts("inst1").await.unwrap();
        assert_eq!(counts["lead"], 1);
        assert_eq!(counts["cliente"], 1);
        assert_eq!(counts["lead_quente"], 0);
        assert_eq!(counts["lead_qualificado"], 0);
        assert_eq!(counts["prospectivo_cliente"], 0);
    }

    #[actix_rt::test]
    async fn test_list_filters_and_totals() {
        let svc = crm().await;
        svc.set_status("inst1", "111@s.whatsapp.net", "lead", "cliente VIP", &json!({}))
            .await
            .unwrap();
        svc.set_status("inst1", "222@s.whatsapp.net", "lead", "", &json!({}))
            .await
            .unwrap();

        let (items, total) = svc.list("inst1", "lead", None, 100, 0).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 2);

        // q busca en chatid y notas, sin case.
        let (items, total) = svc.list("inst1", "lead", Some("vip"), 100, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].chatid, "111@s.whatsapp.net");

        // El total es el filtrado, antes de paginar.
        let (items, total) = svc.list("inst1", "lead", None, 1, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 1);
    }

    #[actix_rt::test]
    async fn test_set_get_delete_roundtrip() {
        let svc = crm().await;
        let item = svc
            .set_status(
                "inst1",
                "111@s.whatsapp.net",
                "lead_quente",
                "notas",
                &json!({ "origem": "ads" }),
            )
            .await
            .unwrap();
        assert_eq!(item.stage, "lead_quente");

        let stored = svc.get_item("inst1", "111@s.whatsapp.net").await.unwrap().unwrap();
        assert_eq!(stored.notes, "notas");
        assert_eq!(stored.meta["origem"], "ads");

        svc.delete("inst1", "111@s.whatsapp.net").await.unwrap();
        assert!(svc.get_item("inst1", "111@s.whatsapp.net").await.unwrap().is_none());
        // Idempotente.
        svc.delete("inst1", "111@s.whatsapp.net").await.unwrap();
    }

    #[actix_rt::test]
    async fn test_set_stage_internal_preserves_notes() {
        let svc = crm().await;
        svc.set_status("inst1", "111@s.whatsapp.net", "lead", "importante", &json!({}))
            .await
            .unwrap();

        svc.set_stage_internal("inst1", "111@s.whatsapp.net", "lead_quente")
            .await
            .unwrap();
        let item = svc.get_item("inst1", "111@s.whatsapp.net").await.unwrap().unwrap();
        assert_eq!(item.stage, "lead_quente");
        assert_eq!(item.notes, "importante");

        // Etapa fuera del vocabulario cae en "lead"; chatid inválido se ignora.
        svc.set_stage_internal("inst1", "111@s.whatsapp.net", "contatos")
            .await
            .unwrap();
        let item = svc.get_item("inst1", "111@s.whatsapp.net").await.unwrap().unwrap();
        assert_eq!(item.stage, "lead");

        svc.set_stage_internal("inst1", "basura", "lead").await.unwrap();
        assert!(svc.get_item("inst1", "basura").await.unwrap().is_none());
    }

    #[actix_rt::test]
    async fn test_create_missing_never_touches_existing() {
        let svc = crm().await;
        svc.set_status("inst1", "111@s.whatsapp.net", "cliente", "n", &json!({}))
            .await
            .unwrap();

        let created = svc
            .create_missing(
                "inst1",
                &[
                    "111@s.whatsapp.net".to_string(),
                    "222@s.whatsapp.net".to_string(),
                ],
            )
            .await
            .unwrap();
        assert_eq!(created, 1);

        let existing = svc.get_item("inst1", "111@s.whatsapp.net").await.unwrap().unwrap();
        assert_eq!(existing.stage, "cliente");
        let fresh = svc.get_item("inst1", "222@s.whatsapp.net").await.unwrap().unwrap();
        assert_eq!(fresh.stage, "lead");

        assert_eq!(svc.board_size("inst1").await.unwrap(), 2);
    }
}
