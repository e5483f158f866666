pub mod http;
pub mod notifier;
pub mod sampler;
pub mod ws;

use std::time::Duration;

use crate::config::{NotifierConfig, SamplerConfig};
use self::http::HttpSampler;
use self::notifier::{LogNotifier, Notifier, SnsNotifier, TelegramNotifier, WebhookNotifier};
use self::sampler::{Credentials, FixedSampler, Sampler};
use self::ws::WsSampler;

pub fn build_sampler(config: &SamplerConfig, credentials: Credentials) -> Box<dyn Sampler> {
    match config {
        SamplerConfig::Ws {
            url,
            subscribe,
            pointer,
            currency_symbol,
            timeout_secs,
        } => Box::new(WsSampler::new(
            url.as_str(),
            subscribe.as_deref(),
            pointer.clone(),
            currency_symbol.as_str(),
            Duration::from_secs(*timeout_secs),
            &credentials,
        )),
        SamplerConfig::Http {
            url,
            pointer,
            currency_symbol,
            timeout_secs,
        } => Box::new(HttpSampler::new(
            url.as_str(),
            pointer.as_str(),
            currency_symbol.as_str(),
            Duration::from_secs(*timeout_secs),
            credentials,
        )),
        SamplerConfig::Fixed { price } => Box::new(FixedSampler::new(price.as_str())),
    }
}

pub fn build_notifier(config: &NotifierConfig) -> Box<dyn Notifier> {
    match config {
        NotifierConfig::Log => Box::new(LogNotifier),
        NotifierConfig::Webhook { url } => Box::new(WebhookNotifier::new(url.as_str())),
        NotifierConfig::Telegram { token } => Box::new(TelegramNotifier::new(token.as_str())),
        NotifierConfig::Sns { region } => Box::new(SnsNotifier::new(region.as_str())),
    }
}
