//! 生成服务网关 - 业务能力层
//!
//! 按优先级依次尝试各提供方：
//! - 没有密钥：跳过，不算一次尝试
//! - 请求失败 / 超时 / 空回复：立即切换到下一个，不在同一提供方内重试
//! - 取消：立即终止

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::GatewayError;
use crate::infrastructure::{bounded, HttpExecutor, Interrupted};
use crate::models::credentials::ProviderCredentialSet;
use crate::services::providers::{build_provider, GenerationProvider};
use crate::utils::logging::truncate_text;

/// 生成服务网关
pub struct ProviderGateway {
    providers: Vec<Box<dyn GenerationProvider>>,
    credentials: ProviderCredentialSet,
    attempt_timeout: Duration,
}

impl ProviderGateway {
    pub fn new(
        providers: Vec<Box<dyn GenerationProvider>>,
        credentials: ProviderCredentialSet,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            providers,
            credentials,
            attempt_timeout,
        }
    }

    /// 按配置中的优先级构造
    pub fn from_config(config: &Config, http: &HttpExecutor, credentials: ProviderCredentialSet) -> Self {
        let providers = config
            .provider_priority()
            .into_iter()
            .map(|id| build_provider(id, config, http))
            .collect();
        Self::new(providers, credentials, config.attempt_timeout())
    }

    /// 当前的提供方顺序
    pub fn order(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id().to_string()).collect()
    }

    /// 发送提示词，返回第一个成功的回复
    pub async fn generate(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let mut attempted = 0;
        let mut skipped = 0;

        for provider in &self.providers {
            let id = provider.id();
            let Some(secret) = self.credentials.secret_for(id) else {
                let reason = GatewayError::CredentialMissing {
                    provider: id.to_string(),
                };
                debug!("[网关] {}，跳过", reason);
                skipped += 1;
                continue;
            };
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }

            attempted += 1;
            info!("[网关] 📤 请求 {} (第 {} 个)", id, attempted);
            match bounded(cancel, self.attempt_timeout, provider.complete(secret, prompt, cancel)).await {
                Ok(Ok(reply)) if !reply.trim().is_empty() => {
                    info!(
                        "[网关] ✓ {} 返回 {} 字符: {}",
                        id,
                        reply.chars().count(),
                        truncate_text(reply.trim(), 60)
                    );
                    return Ok(reply);
                }
                Ok(Ok(_)) => warn!("[网关] ⚠️ {} 返回了空内容", id),
                Ok(Err(GatewayError::Cancelled)) | Err(Interrupted::Cancelled) => {
                    info!("[网关] 已取消");
                    return Err(GatewayError::Cancelled);
                }
                Ok(Err(e)) => warn!("[网关] ⚠️ {}", e),
                Err(Interrupted::TimedOut) => {
                    warn!("[网关] ⚠️ {} 超时 ({:?})", id, self.attempt_timeout)
                }
            }
        }

        warn!(
            "[网关] ❌ 没有可用的生成服务 (尝试 {}, 跳过 {})",
            attempted, skipped
        );
        Err(GatewayError::Exhausted { attempted, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credentials::ProviderId;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Behaviour {
        Reply(&'static str),
        Fail,
        Hang,
    }

    struct FakeProvider {
        id: ProviderId,
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
    }

    impl FakeProvider {
        fn boxed(id: ProviderId, behaviour: Behaviour) -> (Box<dyn GenerationProvider>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let provider = FakeProvider {
                id,
                behaviour,
                calls: calls.clone(),
            };
            (Box::new(provider), calls)
        }
    }

    #[async_trait]
    impl GenerationProvider for FakeProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn complete(
            &self,
            _secret: &str,
            _prompt: &str,
            _cancel: &CancellationToken,
        ) -> Result<String, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Reply(text) => Ok(text.to_string()),
                Behaviour::Fail => Err(GatewayError::request_failed(self.id.as_str(), "HTTP 401")),
                Behaviour::Hang => {
                    std::future::pending::<()>().await;
                    Ok(String::new())
                }
            }
        }
    }

    fn all_keys() -> ProviderCredentialSet {
        ProviderCredentialSet::new()
            .with(ProviderId::Gemini, Some("g".into()))
            .with(ProviderId::Groq, Some("q".into()))
            .with(ProviderId::OpenRouter, Some("o".into()))
    }

    #[tokio::test]
    async fn test_missing_then_failing_then_ok() {
        let (a, a_calls) = FakeProvider::boxed(ProviderId::Gemini, Behaviour::Reply("from A"));
        let (b, b_calls) = FakeProvider::boxed(ProviderId::Groq, Behaviour::Fail);
        let (c, _) = FakeProvider::boxed(ProviderId::OpenRouter, Behaviour::Reply("from C"));

        let credentials = all_keys().with(ProviderId::Gemini, None);
        let gateway = ProviderGateway::new(vec![a, b, c], credentials, Duration::from_secs(5));

        let reply = gateway.generate("prompt", &CancellationToken::new()).await.unwrap();
        assert_eq!(reply, "from C");
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_success_stops_the_chain() {
        let (a, _) = FakeProvider::boxed(ProviderId::Gemini, Behaviour::Reply("from A"));
        let (b, b_calls) = FakeProvider::boxed(ProviderId::Groq, Behaviour::Reply("from B"));
        let gateway = ProviderGateway::new(vec![a, b], all_keys(), Duration::from_secs(5));

        assert_eq!(gateway.generate("p", &CancellationToken::new()).await.unwrap(), "from A");
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_counts() {
        let (a, _) = FakeProvider::boxed(ProviderId::Gemini, Behaviour::Fail);
        let (b, _) = FakeProvider::boxed(ProviderId::Groq, Behaviour::Reply("   "));
        let (c, _) = FakeProvider::boxed(ProviderId::OpenRouter, Behaviour::Reply("never"));
        let credentials = all_keys().with(ProviderId::OpenRouter, Some(" ".into()));
        let gateway = ProviderGateway::new(vec![a, b, c], credentials, Duration::from_secs(5));

        let err = gateway.generate("p", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Exhausted { attempted: 2, skipped: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_through() {
        let (a, _) = FakeProvider::boxed(ProviderId::Gemini, Behaviour::Hang);
        let (b, _) = FakeProvider::boxed(ProviderId::Groq, Behaviour::Reply("from B"));
        let gateway = ProviderGateway::new(vec![a, b], all_keys(), Duration::from_secs(1));

        let reply = gateway.generate("p", &CancellationToken::new()).await.unwrap();
        assert_eq!(reply, "from B");
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_call() {
        let (a, _) = FakeProvider::boxed(ProviderId::Gemini, Behaviour::Hang);
        let (b, b_calls) = FakeProvider::boxed(ProviderId::Groq, Behaviour::Reply("from B"));
        let gateway = ProviderGateway::new(vec![a, b], all_keys(), Duration::from_secs(60));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = gateway.generate("p", &cancel).await.unwrap_err();
        assert!(matches!(err, GatewayError::Cancelled));
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_order_follows_config() {
        let config = Config {
            provider_order: vec!["openrouter".into(), "gemini".into()],
            ..Default::default()
        };
        let http = HttpExecutor::new(Duration::from_secs(5)).unwrap();
        let gateway = ProviderGateway::from_config(&config, &http, ProviderCredentialSet::new());
        assert_eq!(gateway.order(), vec!["openrouter", "gemini"]);
    }
}
