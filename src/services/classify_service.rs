//! services/classify_service.rs
//! Clasificación bajo demanda del listado de chats: banco primero,
//! después un cache corto y recién ahí la transcripción remota, con
//! timeout y concurrencia acotada.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::timeout;

use crate::services::lead_status_service::LeadStatusService;
use crate::services::stage_service::classify_transcript;
use crate::services::uazapi_service::{normalize_items, UazapiService};

const CACHE_TTL: Duration = Duration::from_secs(300);
const CLASSIFY_TIMEOUT: Duration = Duration::from_millis(3500);
const FETCH_LIMIT: i64 = 200;
const MAX_CONCURRENT_FETCHES: usize = 16;

#[derive(Clone)]
pub struct ClassifyService {
    uazapi: UazapiService,
    lead_status: LeadStatusService,
    cache: Arc<Mutex<HashMap<String, (Instant, String)>>>,
    sem: Arc<Semaphore>,
}

impl ClassifyService {
    pub fn new(uazapi: UazapiService, lead_status: LeadStatusService) -> Self {
        ClassifyService {
            uazapi,
            lead_status,
            cache: Arc::new(Mutex::new(HashMap::new())),
            sem: Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES)),
        }
    }

    /// Etapa para un chat del listado. Devuelve None cuando no se pudo
    /// resolver dentro del presupuesto; el item sale sin stage.
    pub async fn stage_for_chat(
        &self,
        host: &str,
        token: &str,
        instance: &str,
        chatid: &str,
        last_msg_ts: i64,
    ) -> Option<String> {
        // 1) estado guardado todavía vigente
        if let Ok(Some(rec)) = self.lead_status.get(instance, chatid).await {
            if !rec.stage.is_empty() {
                let need = self
                    .lead_status
                    .should_reclassify(instance, chatid, last_msg_ts, None)
                    .await
                    .unwrap_or(false);
                if !need {
                    return Some(rec.stage);
                }
            }
        }

        // 2) cache corto
        let key = format!("{}:{}", instance, chatid);
        let cached = {
            let cache = self.cache.lock().await;
            cache.get(&key).and_then(|(at, stage)| {
                if at.elapsed() <= CACHE_TTL {
                    Some(stage.clone())
                } else {
                    None
                }
            })
        };
        if let Some(stage) = cached {
            let _ = self
                .lead_status
                .upsert(instance, chatid, &stage, last_msg_ts, false)
                .await;
            return Some(stage);
        }

        // 3) transcripción remota con timeout corto
        let stage = match timeout(CLASSIFY_TIMEOUT, self.classify_remote(host, token, chatid)).await
        {
            Ok(Some(stage)) => stage,
            _ => return None,
        };

        {
            let mut cache = self.cache.lock().await;
            cache.insert(key, (Instant::now(), stage.clone()));
        }
        match self
            .lead_status
            .upsert(instance, chatid, &stage, last_msg_ts, false)
            .await
        {
            Ok(rec) => Some(rec.stage),
            Err(_) => Some(stage),
        }
    }

    async fn classify_remote(&self, host: &str, token: &str, chatid: &str) -> Option<String> {
        let _permit = self.sem.acquire().await.ok()?;
        let payload = json!({
            "chatid": chatid,
            "limit": FETCH_LIMIT,
            "offset": 0,
            "sort": "-messageTimestamp",
        });
        let reply = self.uazapi.message_find(host, token, &payload).await.ok()?;
        if reply.is_error() {
            return None;
        }
        let data = reply.json().ok()?;
        let items = normalize_items(&data, "messages");
        Some(classify_transcript(&items).to_string())
    }
}
