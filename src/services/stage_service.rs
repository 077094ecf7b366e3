//! services/stage_service.rs
//! Clasificador de etapa por reglas sobre la transcripción del chat.
//! Las tablas de frases son las mismas que usa el front, ya normalizadas
//! (minúsculas, sin acentos, espacios colapsados).

use serde_json::Value;

/// Frases de "derivación a humano" emitidas por el bot. Cualquiera de
/// ellas en un mensaje saliente marca el chat como lead_quente.
pub const HOT_HINTS: &[&str] = &[
    "vou te passar para",
    "vou te passar pro",
    "vou passar voce para",
    "vou passar para o setor",
    "vou passar para o departamento",
    "vou passar para o time",
    "vou passar seu contato",
    "vou passar o seu contato",
    "vou passar seu numero",
    "vou passar o seu numero",
    "vou repassar seu contato",
    "repassei seu contato",
    "enviei seu contato",
    "vou enviar seu contato",
    "enviarei seu contato",
    "vou encaminhar",
    "encaminhando seu contato",
    "encaminhei seu contato",
    "encaminhei seu numero",
    "encaminhar seu contato",
    "estou encaminhando",
    "encaminharei",
    "vou te colocar em contato",
    "vou colocar voce em contato",
    "colocar voce em contato",
    "vou te conectar",
    "vou te por em contato",
    "te coloco em contato",
    "o time comercial vai te chamar",
    "o time vai te chamar",
    "nossa equipe vai entrar em contato",
    "a equipe vai entrar em contato",
    "o setor vai entrar em contato",
    "o atendente vai falar com voce",
    "um atendente vai te chamar",
    "um consultor vai te chamar",
    "o consultor vai te chamar",
    "o especialista vai te chamar",
    "o responsavel vai te chamar",
    "o pessoal do comercial te chama",
    "suporte vai te chamar",
    "vendas vai te chamar",
    "pre-vendas vai te chamar",
    "vou pedir para alguem te chamar",
    "vou pedir pra alguem te chamar",
    "vou pedir pro pessoal te chamar",
    "vou pedir para o time te chamar",
    "ja pedi para te chamarem",
    "vou transferir",
    "estou transferindo",
    "transferencia para o setor",
    "transferi sua solicitacao",
    "direcionei seu contato",
    "direcionando seu contato",
    "direcionar seu contato",
    "daqui a pouco te chamam",
    "em breve vao entrar em contato",
    "abrirei um chamado",
    "vou abrir um chamado",
    "abrir um ticket",
    "abrirei um ticket",
];

/// Frases de menú/catálogo: un texto que contenga alguna NO cuenta
/// como derivación aunque matchee un HOT_HINT.
pub const HOT_NEGATIVE_GUARDS: &[&str] = &[
    "cardapio",
    "menu",
    "catalogo",
    "ver menu",
    "ver cardapio",
    "acesse o menu",
    "acesse o cardapio",
    "acesse nosso catalogo",
    "cardapio online",
    "link do menu",
    "nosso menu",
    "veja o menu",
    "veja o cardapio",
    "veja o catalogo",
];

/// "Puede continuar": el contacto aceptó seguir la conversación.
pub const LEAD_OK_PATTERNS: &[&str] = &[
    "sim, pode continuar",
    "sim pode continuar",
    "pode continuar",
    "ok, pode continuar",
    "ok pode continuar",
    "pode seguir",
    "sim, pode seguir",
    "sim pode seguir",
    "vamos continuar",
    "podemos continuar",
    "pode prosseguir",
    "ok vamos prosseguir",
    "segue",
    "segue por favor",
    "pode mostrar",
    "pode me mostrar",
    "pode enviar",
    "pode mandar",
    "pode continuar 👍",
    "pode continuar sim",
    "sim, pode continuar sim",
    "pode continuar por favor",
    "pode continuar pf",
    "pode continuar pff",
    "pode cont",
    "pode cnt",
    "pode seg",
    "pode prosseg",
    "pode proseguir",
];

/// El bot pidió el nombre del contacto.
pub const LEAD_NAME_PATTERNS: &[&str] = &[
    "qual seu nome",
    "qual o seu nome",
    "me diga seu nome",
    "me fala seu nome",
    "como voce se chama",
    "quem fala",
    "quem esta falando",
    "quem e voce",
    "pode me dizer seu nome",
    "me passa seu nome",
    "me informe seu nome",
    "seu nome por favor",
    "nome pfv",
    "nome por favor",
    "nome?",
    "qual seu primeiro nome",
    "qual seu nome completo",
    "nome do cliente",
    "nome do titular",
    "nome para cadastro",
    "poderia me informar seu nome",
    "me diga o seu nome",
    "informe seu nome",
    "sobrenome",
    "seu nome e sobrenome",
    "como devo te chamar",
    "como posso te chamar",
    "qual e seu nome",
    "qual seria seu nome",
    "ql seu nome",
    "q seu nome",
    "seu nm",
    "seu nome sff",
    "seu nome pf",
];

/// Minúsculas + fold de acentos latinos + espacios colapsados.
/// Equivale al NFD + descarte de marcas combinantes del front para el
/// portugués que manejan las reglas.
pub fn normalize_text(s: &str) -> String {
    let lowered = s.to_lowercase();
    let folded: String = lowered
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Entero tolerante: acepta números JSON y strings numéricos.
fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn truthy(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        Some(Value::String(s)) => !s.is_empty() && s != "false" && s != "0",
        _ => false,
    }
}

/// ¿El mensaje es saliente? Acepta las variantes que devuelve la UAZAPI:
/// fromMe/fromme/from_me, key.fromMe anidado, id con prefijo "true_"
/// y user == "me".
pub fn is_from_me(m: &Value) -> bool {
    if truthy(m.get("fromMe")) || truthy(m.get("fromme")) || truthy(m.get("from_me")) {
        return true;
    }
    if truthy(m.pointer("/key/fromMe")) || truthy(m.pointer("/message/key/fromMe")) {
        return true;
    }
    if let Some(id) = m.get("id").and_then(Value::as_str) {
        if id.starts_with("true_") {
            return true;
        }
    }
    m.get("user").and_then(Value::as_str) == Some("me")
}

/// Texto del mensaje, ya normalizado. Prueba los campos en el mismo
/// orden que el front: text, caption, body y los anidados de `message`.
pub fn extract_text(m: &Value) -> String {
    let raw = m
        .get("text")
        .and_then(Value::as_str)
        .or_else(|| m.get("caption").and_then(Value::as_str))
        .or_else(|| m.get("body").and_then(Value::as_str))
        .or_else(|| m.pointer("/message/text").and_then(Value::as_str))
        .or_else(|| m.pointer("/message/conversation").and_then(Value::as_str))
        .or_else(|| {
            m.pointer("/message/extendedTextMessage/text")
                .and_then(Value::as_str)
        })
        .unwrap_or("");
    normalize_text(raw)
}

/// Timestamps de 10 dígitos vienen en segundos; los escala a ms.
pub fn scale_ts(n: i64) -> i64 {
    if (1_000_000_000..=9_999_999_999).contains(&n) {
        n * 1000
    } else {
        n
    }
}

/// Timestamp (ms) de un mensaje: messageTimestamp | timestamp | t |
/// message.messageTimestamp.
pub fn extract_ts(m: &Value) -> i64 {
    let raw = m
        .get("messageTimestamp")
        .or_else(|| m.get("timestamp"))
        .or_else(|| m.get("t"))
        .or_else(|| m.pointer("/message/messageTimestamp"))
        .and_then(as_int)
        .unwrap_or(0);
    scale_ts(raw)
}

/// Última actividad de un item de /chat/find (ms):
/// wa_lastMsgTimestamp | messageTimestamp | updatedAt.
pub fn last_msg_ts_of(item: &Value) -> i64 {
    let raw = item
        .get("wa_lastMsgTimestamp")
        .or_else(|| item.get("messageTimestamp"))
        .or_else(|| item.get("updatedAt"))
        .and_then(as_int)
        .unwrap_or(0);
    scale_ts(raw)
}

fn contains_any(text: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| text.contains(p))
}

/// Clasificación instantánea (la de /api/messages y el listado de chats):
/// contatos → lead → lead_quente. Sólo cuentan los mensajes salientes.
pub fn classify_transcript(items: &[Value]) -> &'static str {
    let mut stage = "contatos";
    for m in items {
        if !is_from_me(m) {
            continue;
        }
        let text = extract_text(m);
        if text.is_empty() {
            continue;
        }
        let has_menu = contains_any(&text, HOT_NEGATIVE_GUARDS);
        if !has_menu && contains_any(&text, HOT_HINTS) {
            return "lead_quente";
        }
        if contains_any(&text, LEAD_OK_PATTERNS) || contains_any(&text, LEAD_NAME_PATTERNS) {
            stage = "lead";
        }
    }
    stage
}

/// Variante del tablero (POST /api/stage/classify): arranca en lead,
/// los patrones OK/nombre promueven a lead_qualificado.
pub fn classify_by_rules(items: &[Value]) -> &'static str {
    let mut stage = "lead";
    for m in items {
        if !is_from_me(m) {
            continue;
        }
        let text = extract_text(m);
        if text.is_empty() {
            continue;
        }
        if !contains_any(&text, HOT_NEGATIVE_GUARDS) && contains_any(&text, HOT_HINTS) {
            return "lead_quente";
        }
        if contains_any(&text, LEAD_OK_PATTERNS) || contains_any(&text, LEAD_NAME_PATTERNS) {
            stage = "lead_qualificado";
        }
    }
    stage
}

/// Normaliza nombres de etapa arbitrarios al vocabulario conocido.
pub fn normalize_stage(s: &str) -> &'static str {
    let s = s.trim().to_lowercase();
    if s.starts_with("contato") {
        return "contatos";
    }
    if s.contains("quente") {
        return "lead_quente";
    }
    if s.contains("qualificado") {
        return "lead_qualificado";
    }
    if s == "lead" {
        return "lead";
    }
    "contatos"
}
