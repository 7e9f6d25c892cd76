//! Short bilingual captions shown on today's weather card.
//!
//! A batch of captions is generated per weather context and cached for
//! [`WEATHER_CAPTION_TTL_SECS`]; each request picks one at random so the
//! card does not repeat itself. When generation fails a rule-based caption
//! is used instead.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike, Utc};
use dastyar_shared::constants::WEATHER_CAPTION_TTL_SECS;
use dastyar_shared::types::{Language, MessageRole};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::llm::{strip_code_fence, ChatMessage, ChatModel, GenerationRequest, LlmError, ModelTier};

const CAPTION_SYSTEM_PROMPT: &str = "You write short, friendly weather captions for a browser start page. \
Answer with a JSON array of 15 to 20 objects, each {\"ar\": string, \"en\": string, \"emoji\": string}. \
\"ar\" is Arabic, \"en\" is English with the same meaning, \"emoji\" is a single emoji. \
Each caption is at most 60 characters, fits the weather, time of day and season, and never repeats another. \
Output the JSON array only.";

const CAPTION_TEMPERATURE: f32 = 0.8;

/// Iran standard time, UTC+03:30.
const TEHRAN_OFFSET_SECS: i32 = 3 * 3600 + 30 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caption {
    pub ar: String,
    pub en: String,
    pub emoji: String,
}

impl Caption {
    fn new(en: &str, ar: &str, emoji: &str) -> Self {
        Self {
            ar: ar.to_string(),
            en: en.to_string(),
            emoji: emoji.to_string(),
        }
    }

    /// Arabic for `ar`, English otherwise.
    pub fn text(&self, locale: Language) -> &str {
        match locale {
            Language::Ar => &self.ar,
            Language::En | Language::Fa => &self.en,
        }
    }
}

/// What the caption should talk about.
#[derive(Debug, Clone)]
pub struct CaptionContext {
    pub city: String,
    pub temp: f64,
    /// Provider condition group, e.g. `Rain`.
    pub condition: String,
    pub description: String,
    pub humidity: f64,
    pub wind_speed: f64,
}

impl CaptionContext {
    fn cache_key(&self) -> [u8; 32] {
        let material = format!("{}|{}|{}", self.city, self.temp.round(), self.condition);
        *blake3::hash(material.as_bytes()).as_bytes()
    }

    fn prompt(&self, now: DateTime<Utc>) -> String {
        let local = FixedOffset::east_opt(TEHRAN_OFFSET_SECS)
            .map(|offset| now.with_timezone(&offset).naive_local())
            .unwrap_or_else(|| now.naive_utc());
        let season = match local.month() {
            3..=5 => "spring",
            6..=8 => "summer",
            9..=11 => "autumn",
            _ => "winter",
        };
        format!(
            "City: {}\nTemperature: {:.0}°C\nCondition: {} ({})\nHumidity: {:.0}%\nWind: {:.1} m/s\n\
             Local time: {:02}:{:02}, {}\nSeason: {season}",
            self.city,
            self.temp,
            self.condition,
            self.description,
            self.humidity,
            self.wind_speed,
            local.hour(),
            local.minute(),
            local.weekday(),
        )
    }
}

/// Rule-based caption used when generation is unavailable.
pub fn fallback_caption(context: &CaptionContext) -> Caption {
    if context.temp > 30.0 {
        return Caption::new("It's hot out there! Stay hydrated 💧", "الجو حار جداً! اشرب الكثير من الماء 💧", "☀️");
    }
    if context.temp < 5.0 {
        return Caption::new("Bundle up, it's cold outside! 🧥", "الجو بارد! ارتدِ ملابس دافئة 🧥", "❄️");
    }
    match context.condition.as_str() {
        "Rain" | "Drizzle" => Caption::new("Don't forget your umbrella! ☔", "المطر قادم، لا تنسَ المظلة! ☔", "🌧️"),
        "Snow" => Caption::new("Snow is falling! Enjoy a warm drink ☕", "الثلج يتساقط! استمتع بمشروب ساخن ☕", "🌨️"),
        "Clouds" => Caption::new("Cloudy but pleasant weather 🌥️", "الجو غائم ولطيف 🌥️", "☁️"),
        _ => Caption::new(
            "Beautiful weather today! Have a great day ✨",
            "طقس جميل اليوم! أتمنى لك يوماً رائعاً ✨",
            "🌤️",
        ),
    }
}

/// Parse a generated batch, keeping only complete captions.
fn parse_captions(text: &str) -> Result<Vec<Caption>, LlmError> {
    let captions: Vec<Caption> =
        serde_json::from_str(strip_code_fence(text)).map_err(|e| LlmError::Malformed(e.to_string()))?;
    let captions: Vec<Caption> = captions
        .into_iter()
        .filter(|c| !c.ar.trim().is_empty() && !c.en.trim().is_empty())
        .collect();
    if captions.is_empty() {
        return Err(LlmError::Malformed("no usable captions".into()));
    }
    Ok(captions)
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CachedCaptions {
    captions: Vec<Caption>,
    generated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CaptionCache {
    /// blake3(city, rounded temperature, condition) -> generated batch.
    cache: Arc<RwLock<HashMap<[u8; 32], CachedCaptions>>>,
    ttl: Duration,
}

impl Default for CaptionCache {
    fn default() -> Self {
        Self::new(Duration::seconds(WEATHER_CAPTION_TTL_SECS as i64))
    }
}

impl CaptionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// A caption for `context`, generating a fresh batch on a cache miss.
    pub async fn caption(&self, model: &dyn ChatModel, context: &CaptionContext) -> Caption {
        let key = context.cache_key();
        let now = Utc::now();

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if now - entry.generated_at < self.ttl {
                    if let Some(caption) = pick(&entry.captions) {
                        return caption;
                    }
                }
            }
        }

        let request = GenerationRequest {
            tier: ModelTier::Chat,
            system: Some(CAPTION_SYSTEM_PROMPT.to_string()),
            messages: vec![ChatMessage::new(MessageRole::User, context.prompt(now))],
            temperature: Some(CAPTION_TEMPERATURE),
            json_output: true,
            ..Default::default()
        };

        match model.generate(request).await.and_then(|text| parse_captions(&text)) {
            Ok(captions) => {
                debug!(city = %context.city, count = captions.len(), "Generated weather captions");
                let caption = pick(&captions).unwrap_or_else(|| fallback_caption(context));
                self.cache.write().await.insert(
                    key,
                    CachedCaptions {
                        captions,
                        generated_at: now,
                    },
                );
                caption
            }
            Err(e) => {
                warn!(city = %context.city, "Caption generation failed, using fallback: {e}");
                fallback_caption(context)
            }
        }
    }

    /// Evict batches older than the TTL.
    pub async fn purge_expired(&self) {
        let now = Utc::now();
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, entry| now - entry.generated_at < self.ttl);
        let removed = before - cache.len();
        if removed > 0 {
            debug!(removed, "Purged expired weather captions");
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.cache.read().await.len()
    }
}

fn pick(captions: &[Caption]) -> Option<Caption> {
    captions.choose(&mut rand::thread_rng()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::TextStream;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedModel {
        reply: Result<String, ()>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn stream(&self, _request: GenerationRequest) -> Result<TextStream, LlmError> {
            Err(LlmError::NotConfigured)
        }

        async fn generate(&self, _request: GenerationRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(|_| LlmError::Transport("down".into()))
        }
    }

    fn context(temp: f64, condition: &str) -> CaptionContext {
        CaptionContext {
            city: "Tehran".into(),
            temp,
            condition: condition.into(),
            description: condition.to_lowercase(),
            humidity: 40.0,
            wind_speed: 3.0,
        }
    }

    #[test]
    fn test_fallback_rules_in_order() {
        assert_eq!(fallback_caption(&context(35.0, "Rain")).emoji, "☀️");
        assert_eq!(fallback_caption(&context(2.0, "Clear")).emoji, "❄️");
        assert_eq!(fallback_caption(&context(15.0, "Drizzle")).emoji, "🌧️");
        assert_eq!(fallback_caption(&context(15.0, "Snow")).emoji, "🌨️");
        assert_eq!(fallback_caption(&context(15.0, "Clouds")).emoji, "☁️");
        assert_eq!(fallback_caption(&context(15.0, "Clear")).emoji, "🌤️");
    }

    #[test]
    fn test_parse_captions_tolerates_fence_and_drops_incomplete() {
        let text = "```json\n[{\"ar\":\"مرحبا\",\"en\":\"Hello\",\"emoji\":\"👋\"},{\"ar\":\"\",\"en\":\"x\",\"emoji\":\"y\"}]\n```";
        let captions = parse_captions(text).unwrap();
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].text(Language::Ar), "مرحبا");
        assert_eq!(captions[0].text(Language::Fa), "Hello");

        assert!(parse_captions("[]").is_err());
        assert!(parse_captions("sunny!").is_err());
    }

    #[tokio::test]
    async fn test_generated_batch_is_cached() {
        let model = CannedModel {
            reply: Ok(r#"[{"ar":"جميل","en":"Lovely","emoji":"🌞"}]"#.into()),
            calls: AtomicUsize::new(0),
        };
        let cache = CaptionCache::default();
        let ctx = context(21.2, "Clear");

        let first = cache.caption(&model, &ctx).await;
        let second = cache.caption(&model, &context(20.9, "Clear")).await;
        assert_eq!(first.en, "Lovely");
        assert_eq!(first, second);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);

        cache.caption(&model, &context(21.0, "Rain")).await;
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_falls_back_without_caching() {
        let model = CannedModel {
            reply: Err(()),
            calls: AtomicUsize::new(0),
        };
        let cache = CaptionCache::default();

        let caption = cache.caption(&model, &context(33.0, "Clear")).await;
        assert_eq!(caption.emoji, "☀️");
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let model = CannedModel {
            reply: Ok(r#"[{"ar":"a","en":"b","emoji":"c"}]"#.into()),
            calls: AtomicUsize::new(0),
        };
        let cache = CaptionCache::new(Duration::zero());

        cache.caption(&model, &context(10.0, "Clear")).await;
        assert_eq!(cache.len().await, 1);
        cache.purge_expired().await;
        assert_eq!(cache.len().await, 0);
    }
}
