//! models/message_model.rs

/// Fila del archivo local de mensajes (tabla `messages`).
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub instance_id: String,
    pub chatid: String,
    pub msgid: String,
    pub from_me: bool,
    pub ts: i64,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub media_mime: Option<String>,
}
