//! models/send_model.rs
//! Bodies de los endpoints /api/send-*. Se reenvían tal cual a la UAZAPI.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendText {
    pub number: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMedia {
    pub number: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendButtons {
    pub number: String,
    pub text: String,
    pub buttons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendList {
    pub number: String,
    pub header: String,
    pub body: String,
    pub button_text: String,
    pub sections: Vec<Value>,
}
