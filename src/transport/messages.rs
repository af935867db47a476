use serde::{Deserialize, Serialize};
use url::Url;

/// Recognition language sent in the start frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    /// Mandarin
    #[default]
    Cn,
    Sichuanese,
    Cantonese,
    En,
}

/// Streaming parameters carried by the start frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartData {
    pub lang: Lang,
    pub appkey: String,
    pub user_id: String,
    pub udid: String,
}

/// Client -> server JSON control frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    Start { sha: String, data: StartData },
    End,
}

impl ControlFrame {
    pub fn start(lang: Lang, appkey: &str, user_id: &str, udid: &str) -> Self {
        ControlFrame::Start {
            sha: "256".to_string(),
            data: StartData {
                lang,
                appkey: appkey.to_string(),
                user_id: user_id.to_string(),
                udid: udid.to_string(),
            },
        }
    }
}

/// Server -> client frame, interpreted
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Recognised segment; `partial` marks an interim ("variable") hypothesis
    Transcript {
        text: String,
        partial: bool,
        sid: Option<String>,
    },
    /// Any other frame: the server finished the current utterance
    UtteranceEnd,
}

impl ServerMessage {
    /// Interpret a text frame
    ///
    /// Only `code == 0` with non-empty `text` is a transcript. Every other
    /// JSON value ends the utterance. Non-JSON payloads are an error.
    pub fn parse(payload: &str) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(payload)?;

        let code = value.get("code").and_then(|c| c.as_i64());
        let text = value
            .get("text")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty());

        match (code, text) {
            (Some(0), Some(text)) => Ok(ServerMessage::Transcript {
                text: text.to_string(),
                partial: value.get("type").and_then(|t| t.as_str()) == Some("variable"),
                sid: value
                    .get("sid")
                    .and_then(|s| s.as_str())
                    .map(str::to_string),
            }),
            _ => Ok(ServerMessage::UtteranceEnd),
        }
    }
}

/// Socket URL for one channel: `base?appkey=..&time=..&sign=..`
pub fn channel_url(base: &Url, appkey: &str, time: i64, sign: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("appkey", appkey)
        .append_pair("time", &time.to_string())
        .append_pair("sign", sign);
    url
}
