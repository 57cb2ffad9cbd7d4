//! Channel types and logical API families
//!
//! A channel's `ChannelType` identifies the vendor implementation behind it
//! (OpenAI, Azure, AWS Bedrock, ...). An `ApiType` identifies the protocol
//! family a request targets. Several channel types can serve the same family,
//! and some channel types serve none; those are never selected by API type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Vendor implementation code of a channel, as persisted in `channels.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelType(pub i32);

impl ChannelType {
    pub const UNKNOWN: Self = Self(0);
    pub const OPENAI: Self = Self(1);
    pub const AZURE: Self = Self(3);
    pub const OLLAMA: Self = Self(4);
    pub const CUSTOM: Self = Self(8);
    pub const PALM: Self = Self(11);
    pub const ANTHROPIC: Self = Self(14);
    pub const ALI: Self = Self(17);
    pub const XUNFEI: Self = Self(18);
    pub const OPENROUTER: Self = Self(20);
    pub const TENCENT: Self = Self(23);
    pub const GEMINI: Self = Self(24);
    pub const MOONSHOT: Self = Self(25);
    pub const ZHIPU_V4: Self = Self(26);
    pub const AWS: Self = Self(33);
    pub const COHERE: Self = Self(34);
    pub const MINIMAX: Self = Self(35);
    pub const DIFY: Self = Self(37);
    pub const JINA: Self = Self(38);
    pub const CLOUDFLARE: Self = Self(39);
    pub const SILICONFLOW: Self = Self(40);
    pub const VERTEX_AI: Self = Self(41);
    pub const MISTRAL: Self = Self(42);
    pub const DEEPSEEK: Self = Self(43);
    pub const VOLCENGINE: Self = Self(45);
    pub const XAI: Self = Self(48);

    /// Exclusive upper bound of the channel type codes this build knows about
    pub const DUMMY: Self = Self(58);

    /// Every channel type code below [`ChannelType::DUMMY`], starting at 1
    pub fn all_known() -> impl Iterator<Item = ChannelType> {
        (1..Self::DUMMY.0).map(ChannelType)
    }

    pub fn as_i32(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ChannelType {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Logical protocol family a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum ApiType {
    OpenAI = 0,
    Anthropic = 1,
    PaLM = 2,
    Ali = 5,
    Xunfei = 6,
    Tencent = 8,
    Gemini = 9,
    ZhipuV4 = 10,
    Ollama = 11,
    Aws = 13,
    Cohere = 14,
    Dify = 15,
    Jina = 16,
    Cloudflare = 17,
    SiliconFlow = 18,
    VertexAi = 19,
    Mistral = 20,
    DeepSeek = 21,
    VolcEngine = 23,
    OpenRouter = 25,
    Xai = 27,
    Moonshot = 30,
    MiniMax = 32,
}

impl ApiType {
    pub const ALL: [ApiType; 23] = [
        ApiType::OpenAI,
        ApiType::Anthropic,
        ApiType::PaLM,
        ApiType::Ali,
        ApiType::Xunfei,
        ApiType::Tencent,
        ApiType::Gemini,
        ApiType::ZhipuV4,
        ApiType::Ollama,
        ApiType::Aws,
        ApiType::Cohere,
        ApiType::Dify,
        ApiType::Jina,
        ApiType::Cloudflare,
        ApiType::SiliconFlow,
        ApiType::VertexAi,
        ApiType::Mistral,
        ApiType::DeepSeek,
        ApiType::VolcEngine,
        ApiType::OpenRouter,
        ApiType::Xai,
        ApiType::Moonshot,
        ApiType::MiniMax,
    ];

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Look up an API type by its numeric code
    pub fn from_i32(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_i32() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApiType::OpenAI => "openai",
            ApiType::Anthropic => "anthropic",
            ApiType::PaLM => "palm",
            ApiType::Ali => "ali",
            ApiType::Xunfei => "xunfei",
            ApiType::Tencent => "tencent",
            ApiType::Gemini => "gemini",
            ApiType::ZhipuV4 => "zhipuv4",
            ApiType::Ollama => "ollama",
            ApiType::Aws => "aws",
            ApiType::Cohere => "cohere",
            ApiType::Dify => "dify",
            ApiType::Jina => "jina",
            ApiType::Cloudflare => "cloudflare",
            ApiType::SiliconFlow => "siliconflow",
            ApiType::VertexAi => "vertexai",
            ApiType::Mistral => "mistral",
            ApiType::DeepSeek => "deepseek",
            ApiType::VolcEngine => "volcengine",
            ApiType::OpenRouter => "openrouter",
            ApiType::Xai => "xai",
            ApiType::Moonshot => "moonshot",
            ApiType::MiniMax => "minimax",
        }
    }
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiType {
    type Err = Error;

    /// Accepts either the numeric code or the lowercase family name
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i32>() {
            return Self::from_i32(code)
                .ok_or_else(|| Error::Config(format!("Unknown API type code: {}", code)));
        }
        let lowered = s.to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == lowered)
            .ok_or_else(|| Error::Config(format!("Unknown API type: {}", s)))
    }
}

/// Map a channel type to the API family it serves
///
/// Returns `None` for channel types with no defined family (Azure, custom
/// endpoints, unknown codes); such channels are excluded from API-type
/// selection.
pub fn api_type_of(channel_type: ChannelType) -> Option<ApiType> {
    let api_type = match channel_type {
        ChannelType::OPENAI => ApiType::OpenAI,
        ChannelType::ANTHROPIC => ApiType::Anthropic,
        ChannelType::PALM => ApiType::PaLM,
        ChannelType::ALI => ApiType::Ali,
        ChannelType::XUNFEI => ApiType::Xunfei,
        ChannelType::TENCENT => ApiType::Tencent,
        ChannelType::GEMINI => ApiType::Gemini,
        ChannelType::ZHIPU_V4 => ApiType::ZhipuV4,
        ChannelType::OLLAMA => ApiType::Ollama,
        ChannelType::AWS => ApiType::Aws,
        ChannelType::COHERE => ApiType::Cohere,
        ChannelType::DIFY => ApiType::Dify,
        ChannelType::JINA => ApiType::Jina,
        ChannelType::CLOUDFLARE => ApiType::Cloudflare,
        ChannelType::SILICONFLOW => ApiType::SiliconFlow,
        ChannelType::VERTEX_AI => ApiType::VertexAi,
        ChannelType::MISTRAL => ApiType::Mistral,
        ChannelType::DEEPSEEK => ApiType::DeepSeek,
        ChannelType::VOLCENGINE => ApiType::VolcEngine,
        ChannelType::OPENROUTER => ApiType::OpenRouter,
        ChannelType::XAI => ApiType::Xai,
        ChannelType::MOONSHOT => ApiType::Moonshot,
        ChannelType::MINIMAX => ApiType::MiniMax,
        _ => return None,
    };
    Some(api_type)
}

/// Inverse of [`api_type_of`]: every known channel type serving `api_type`
///
/// Scans all known channel type codes, so the result is ascending.
pub fn channel_types_for_api_type(api_type: ApiType) -> Vec<ChannelType> {
    ChannelType::all_known()
        .filter(|t| api_type_of(*t) == Some(api_type))
        .collect()
}
