//! services/uazapi_service.rs
//! Cliente HTTP contra el gateway UAZAPI. Los métodos devuelven la
//! respuesta cruda (status + cuerpo) y el handler decide si retransmite
//! el error del upstream o lo envuelve.

use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use reqwest::Client;
use serde_json::{json, Value};

/// Respuesta cruda del gateway.
#[derive(Debug, Clone)]
pub struct UazReply {
    pub status: u16,
    pub body: String,
}

impl UazReply {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// El host puede venir pelado ("x.uazapi.com") o como URL completa.
pub fn host_base(host: &str) -> String {
    let h = host.trim().trim_end_matches('/');
    if h.starts_with("http://") || h.starts_with("https://") {
        h.to_string()
    } else {
        format!("https://{}", h)
    }
}

/// Extrae la lista de un cuerpo que puede ser un array directo o venir
/// envuelto en items/data/results/<clave propia del endpoint>.
pub fn normalize_items(data: &Value, list_key: &str) -> Vec<Value> {
    if let Value::Array(arr) = data {
        return arr.clone();
    }
    for key in ["items", "data", "results", list_key] {
        if let Some(Value::Array(arr)) = data.get(key) {
            return arr.clone();
        }
    }
    Vec::new()
}

#[derive(Clone)]
pub struct UazapiService {
    // Sin timeout global: el stream SSE queda abierto indefinidamente.
    client: Client,
}

impl UazapiService {
    pub fn new() -> Self {
        UazapiService {
            client: Client::new(),
        }
    }

    async fn post_json(
        &self,
        url: String,
        token: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<UazReply> {
        let resp = self
            .client
            .post(&url)
            .header("token", token)
            .json(payload)
            .timeout(timeout)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(UazReply { status, body })
    }

    async fn get_with_query(
        &self,
        url: String,
        token: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<UazReply> {
        let resp = self
            .client
            .get(&url)
            .header("token", token)
            .query(query)
            .timeout(timeout)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(UazReply { status, body })
    }

    /// POST /chat/find con el payload de paginación armado por el caller.
    pub async fn chat_find(&self, host: &str, token: &str, payload: &Value) -> Result<UazReply> {
        let url = format!("{}/chat/find", host_base(host));
        self.post_json(url, token, payload, Duration::from_secs(30))
            .await
    }

    /// POST /message/find.
    pub async fn message_find(&self, host: &str, token: &str, payload: &Value) -> Result<UazReply> {
        let url = format!("{}/message/find", host_base(host));
        self.post_json(url, token, payload, Duration::from_secs(30))
            .await
    }

    /// POST /send/{text|media|buttons|list}; el cuerpo viaja tal cual.
    pub async fn send(
        &self,
        host: &str,
        token: &str,
        kind: &str,
        body: &Value,
    ) -> Result<UazReply> {
        let url = format!("{}/send/{}", host_base(host), kind);
        self.post_json(url, token, body, Duration::from_secs(30))
            .await
    }

    pub async fn instance_status(&self, host: &str, token: &str) -> Result<UazReply> {
        let url = format!("{}/instance/status", host_base(host));
        self.get_with_query(url, token, &[], Duration::from_secs(20))
            .await
    }

    pub async fn labels(&self, host: &str, token: &str) -> Result<UazReply> {
        let url = format!("{}/labels", host_base(host));
        self.get_with_query(url, token, &[], Duration::from_secs(20))
            .await
    }

    /// GET /chat/GetNameAndImageURL?chatid=
    pub async fn name_image_get(&self, host: &str, token: &str, chatid: &str) -> Result<UazReply> {
        let url = format!("{}/chat/GetNameAndImageURL", host_base(host));
        self.get_with_query(url, token, &[("chatid", chatid)], Duration::from_secs(20))
            .await
    }

    /// POST /chat/GetNameAndImageURL con { number, preview }.
    pub async fn name_image_post(
        &self,
        host: &str,
        token: &str,
        number: &str,
        preview: bool,
    ) -> Result<UazReply> {
        let url = format!("{}/chat/GetNameAndImageURL", host_base(host));
        let payload = json!({ "number": number, "preview": preview });
        self.post_json(url, token, &payload, Duration::from_secs(15))
            .await
    }

    /// Abre el stream SSE del gateway. El token viaja como query param,
    /// igual que lo espera el endpoint /sse de la UAZAPI.
    pub async fn sse_stream(
        &self,
        host: &str,
        token: &str,
        events: &str,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/sse", host_base(host));
        let resp = self
            .client
            .get(&url)
            .query(&[("token", token), ("events", events)])
            .send()
            .await?;
        Ok(resp)
    }

    pub async fn media_resolve_by_id(
        &self,
        host: &str,
        token: &str,
        media_id: &str,
    ) -> Result<UazReply> {
        let url = format!("{}/media/resolve", host_base(host));
        self.get_with_query(url, token, &[("id", media_id)], Duration::from_secs(20))
            .await
    }

    pub async fn media_resolve_message(
        &self,
        host: &str,
        token: &str,
        message: &Value,
    ) -> Result<UazReply> {
        let url = format!("{}/media/resolve", host_base(host));
        let payload = json!({ "message": message });
        self.post_json(url, token, &payload, Duration::from_secs(20))
            .await
    }

    /// Descarga una URL de medios arbitraria (el proxy). Sigue redirects.
    pub async fn fetch_media(&self, url: &str) -> Result<(u16, String, Bytes)> {
        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp.bytes().await.unwrap_or_else(|_| Bytes::new());
        Ok((status, content_type, bytes))
    }

    /// POST {host}/instance/create con el token master en el header.
    pub async fn instance_create(
        &self,
        host: &str,
        token: &str,
        payload: &Value,
    ) -> Result<UazReply> {
        let url = format!("{}/instance/create", host_base(host));
        self.post_json(url, token, payload, Duration::from_secs(30))
            .await
    }

    /// GET {host}/instance/qr?instance=
    pub async fn instance_qr(&self, host: &str, token: &str, instance: &str) -> Result<UazReply> {
        let url = format!("{}/instance/qr", host_base(host));
        self.get_with_query(
            url,
            token,
            &[("instance", instance)],
            Duration::from_secs(20),
        )
        .await
    }

    /// GET {host}/instance/status?instance=
    pub async fn instance_status_by_name(
        &self,
        host: &str,
        token: &str,
        instance: &str,
    ) -> Result<UazReply> {
        let url = format!("{}/instance/status", host_base(host));
        self.get_with_query(
            url,
            token,
            &[("instance", instance)],
            Duration::from_secs(20),
        )
        .await
    }
}

impl Default for UazapiService {
    fn default() -> Self {
        Self::new()
    }
}
