#![forbid(unsafe_code)]

//! Request shaping and response extraction for the supported providers.
//!
//! Nothing here performs I/O. [`conversion_request`] and
//! [`validation_request`] produce an [`HttpRequest`] for the host to send;
//! the host hands the status and body back to [`parse_conversion`] or
//! [`parse_validation`]. The extracted text is raw: the engine runs it
//! through the inbound guard before showing it.

use core::fmt;

use lumen_core::{ConversionError, ConversionRequest, OptionKind, ProviderKind, ValidationRequest};
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use crate::endpoint::is_allowed_endpoint;

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";
pub const OPENAI_MODEL: &str = "gpt-5-nano";

const VALIDATION_PROMPT: &str = "Respond with OK";

/// A request ready for the host's HTTP client. Always a JSON `POST`.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The URL may carry the key as a query parameter.
        let host = Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned));
        f.debug_struct("HttpRequest")
            .field("host", &host)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// System message for `option`.
#[must_use]
pub const fn system_message(option: OptionKind) -> &'static str {
    match option {
        OptionKind::TextToEnglish => {
            "You are a helpful AI assistant. Follow instructions precisely and provide direct, \
             substantive responses ALWAYS IN ENGLISH, regardless of the input language. Never \
             start with acknowledgments like \"Okay\", \"Sure\", \"Here's\", \"Let me\", etc. \
             Start immediately with the actual content requested. Output exactly what is asked \
             without preambles or meta-commentary."
        }
        OptionKind::TextToJsonEnglish | OptionKind::TextToJsonMultilingual => {
            "You are a helpful AI assistant specialized in JSON generation. Follow instructions \
             precisely and output ONLY valid JSON without any text before or after. Never \
             include explanations, markdown code blocks, or any other text - just pure JSON."
        }
        OptionKind::TextToToon => {
            "You are a helpful AI assistant. Follow instructions precisely and provide direct, \
             substantive responses. Never start with acknowledgments. Start immediately with the \
             actual content requested. Output exactly what is asked without preambles or \
             meta-commentary."
        }
    }
}

/// Instruction text placed before the user's text. TOON has none yet.
#[must_use]
pub const fn prompt_template(option: OptionKind) -> &'static str {
    match option {
        OptionKind::TextToEnglish => {
            "You are a helpful AI assistant. Provide a direct, comprehensive response IN ENGLISH \
to the following request.

CRITICAL RULES:
- Your ENTIRE response MUST be in English, regardless of the input language
- Start immediately with the actual content - NO introductory phrases like \"Okay, let's...\", \"Sure, I'll...\", \"Here's...\", etc.
- Do NOT explain what you're about to do or acknowledge the request
- Do NOT include meta-commentary about the task
- Provide ONLY the substantive content requested
- Use clear, professional English language
- Format appropriately (paragraphs, lists, code blocks as needed)
- Jump straight into the content
- IMPORTANT: Even if the request is in Portuguese, Spanish, or any other language, respond ENTIRELY in English

User request:
"
        }
        OptionKind::TextToJsonEnglish => {
            "You are a helpful AI assistant. Based on the following request, generate a single, \
valid, well-formatted JSON object with English keys and values. IMPORTANTLY, enhance and improve \
the content quality.

Instructions:
- Analyze the user's request and extract all relevant information
- ENHANCE AND IMPROVE the content: fix grammar, expand ideas, make it clearer, more professional, and more complete
- Transform the improved content into a comprehensive JSON structure with appropriate English keys
- Use descriptive, semantic key names (e.g., \"title\", \"description\", \"content\", \"items\", \"metadata\", \"details\", etc.)
- Ensure the JSON is valid and properly formatted with 2-space indentation
- Include all relevant data from the request with improvements
- Use appropriate data types (strings, numbers, booleans, arrays, objects)
- Add nested structures where appropriate to organize the enhanced content
- Handle missing data with null values
- Escape special characters correctly
- If the input is a simple request or note, expand it with relevant details and structure
- Return ONLY the JSON object, no explanations or additional text

User request:
"
        }
        OptionKind::TextToJsonMultilingual => {
            "You are a helpful AI assistant. Based on the following request, generate a single, \
valid, well-formatted JSON object with English keys while preserving and ENHANCING the original \
language in the values.

Instructions:
- Analyze the user's request and extract all relevant information
- ENHANCE AND IMPROVE the content: fix grammar, expand ideas, make it clearer, more professional, and more complete in the ORIGINAL LANGUAGE
- Transform the improved content into a comprehensive JSON structure with English keys
- Preserve the original language and cultural context in all JSON values (only keys should be in English)
- Use descriptive, semantic English key names (e.g., \"title\", \"description\", \"content\", \"details\", \"requirements\", \"items\", etc.)
- Ensure the JSON is valid and properly formatted with 2-space indentation
- Include all relevant data from the request with improvements
- Use appropriate data types (strings, numbers, booleans, arrays, objects)
- Add nested structures where appropriate to organize the enhanced content
- Handle missing data with null values
- Properly encode and escape special characters for the original language
- If the input is a simple request or note, expand it with relevant details and structure while maintaining the original language
- Return ONLY the JSON object, no explanations or additional text before or after

User request:
"
        }
        OptionKind::TextToToon => "",
    }
}

fn endpoint(provider: ProviderKind, credential: &str) -> Result<String, ConversionError> {
    let base = match provider {
        ProviderKind::OpenAi => OPENAI_ENDPOINT,
        ProviderKind::Gemini => GEMINI_ENDPOINT,
    };
    if !is_allowed_endpoint(base) {
        return Err(ConversionError::InvalidEndpoint);
    }
    match provider {
        ProviderKind::OpenAi => Ok(base.to_owned()),
        ProviderKind::Gemini => {
            let mut url = Url::parse(base).map_err(|_| ConversionError::InvalidEndpoint)?;
            url.query_pairs_mut().append_pair("key", credential);
            Ok(url.into())
        }
    }
}

fn headers(provider: ProviderKind, credential: &str) -> Vec<(&'static str, String)> {
    let mut headers = vec![("Content-Type", "application/json".to_owned())];
    if provider == ProviderKind::OpenAi {
        headers.push(("Authorization", format!("Bearer {credential}")));
    }
    headers
}

fn gemini_safety_settings() -> Value {
    let categories = [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ];
    Value::Array(
        categories
            .into_iter()
            .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
            .collect(),
    )
}

/// Shape a conversion call.
pub fn conversion_request(request: &ConversionRequest) -> Result<HttpRequest, ConversionError> {
    let url = endpoint(request.provider, &request.credential)?;
    let prompt = format!("{}{}", prompt_template(request.option), request.text);
    let body = match request.provider {
        ProviderKind::OpenAi => json!({
            "model": OPENAI_MODEL,
            "messages": [
                { "role": "system", "content": system_message(request.option) },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.3,
            "top_p": 0.9,
            "max_tokens": 2000,
            "presence_penalty": 0.1,
            "frequency_penalty": 0.1,
        }),
        ProviderKind::Gemini => json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.3,
                "topK": 40,
                "topP": 0.9,
                "maxOutputTokens": 2000,
            },
            "safetySettings": gemini_safety_settings(),
        }),
    };
    Ok(HttpRequest {
        url,
        headers: headers(request.provider, &request.credential),
        body: body.to_string(),
    })
}

/// Shape a credential probe.
pub fn validation_request(request: &ValidationRequest) -> Result<HttpRequest, ConversionError> {
    let url = endpoint(request.provider, &request.credential)?;
    let body = match request.provider {
        ProviderKind::OpenAi => json!({
            "model": OPENAI_MODEL,
            "messages": [{ "role": "user", "content": VALIDATION_PROMPT }],
            "max_tokens": 10,
        }),
        ProviderKind::Gemini => json!({
            "contents": [{ "parts": [{ "text": VALIDATION_PROMPT }] }],
        }),
    };
    Ok(HttpRequest {
        url,
        headers: headers(request.provider, &request.credential),
        body: body.to_string(),
    })
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    #[serde(default)]
    message: Option<OpenAiMessage>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn error_from(status: u16, body: &str, fallback: &str) -> ConversionError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_owned());
    ConversionError::Api { status, message }
}

const fn is_success(status: u16) -> bool {
    matches!(status, 200..=299)
}

/// Extract the generated text from a conversion response. A well-formed
/// response without text yields an empty string.
pub fn parse_conversion(provider: ProviderKind, status: u16, body: &str) -> Result<String, ConversionError> {
    if !is_success(status) {
        return Err(error_from(status, body, "API request failed"));
    }
    let text = match provider {
        ProviderKind::OpenAi => {
            let parsed: OpenAiResponse =
                serde_json::from_str(body).map_err(|_| ConversionError::MalformedResponse)?;
            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message)
                .and_then(|m| m.content)
        }
        ProviderKind::Gemini => {
            let parsed: GeminiResponse =
                serde_json::from_str(body).map_err(|_| ConversionError::MalformedResponse)?;
            parsed
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .and_then(|c| c.parts.into_iter().next())
                .and_then(|p| p.text)
        }
    };
    Ok(text.unwrap_or_default())
}

/// Judge a credential probe. The key is accepted when the provider answered
/// successfully with at least one choice or candidate.
pub fn parse_validation(provider: ProviderKind, status: u16, body: &str) -> Result<(), ConversionError> {
    if !is_success(status) {
        return Err(error_from(status, body, "Invalid API key"));
    }
    let answered = match provider {
        ProviderKind::OpenAi => {
            serde_json::from_str::<OpenAiResponse>(body)
                .map_err(|_| ConversionError::MalformedResponse)?
                .choices
                .len()
        }
        ProviderKind::Gemini => {
            serde_json::from_str::<GeminiResponse>(body)
                .map_err(|_| ConversionError::MalformedResponse)?
                .candidates
                .len()
        }
    };
    if answered > 0 {
        Ok(())
    } else {
        Err(ConversionError::Api {
            status,
            message: "Invalid API key".to_owned(),
        })
    }
}
