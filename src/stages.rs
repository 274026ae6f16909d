//! Stage rules shared by every integration.

use crate::{
    captcha::CaptchaSolver,
    error::CrawlerError,
    request::{Meta, RequestOption, Response},
    rule::{ControlSignal, Outputs, RoutingRule, RuleKey},
};
use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::{info, warn};

pub type RequestBuilder<K> = Box<dyn Fn(Meta) -> RequestOption<K> + Send + Sync>;

/// Builds the request carrying a solved CAPTCHA answer.
pub type SubmitBuilder<K> = Box<dyn Fn(Meta, String) -> RequestOption<K> + Send + Sync>;

pub const IP_URL: &str = "https://api.myip.com/";

#[derive(Debug, Deserialize)]
struct IpReport {
    ip: String,
}

/// Refuses to continue from an IP address this session already used.
///
/// Only proxied connections are checked, a direct connection keeps its address.
pub struct IdentityCheckRule<K> {
    key: K,
    next: RequestBuilder<K>,
    seen_ips: HashSet<String>,
}

impl<K: RuleKey> IdentityCheckRule<K> {
    pub fn new(key: K, next: impl Fn(Meta) -> RequestOption<K> + Send + Sync + 'static) -> Self {
        IdentityCheckRule {
            key,
            next: Box::new(next),
            seen_ips: HashSet::new(),
        }
    }

    pub fn build_request_option(key: K, meta: Meta) -> RequestOption<K> {
        RequestOption::get(key, IP_URL, meta)
    }
}

#[async_trait::async_trait]
impl<K: RuleKey> RoutingRule<K> for IdentityCheckRule<K> {
    fn name(&self) -> K {
        self.key
    }

    async fn handle(&mut self, response: &Response<K>) -> Result<Outputs<K>, CrawlerError> {
        let report = serde_json::from_slice::<IpReport>(&response.body)
            .map_err(|_| CrawlerError::blocked("ip report is not readable"))?;

        let fresh = self.seen_ips.insert(report.ip.clone());
        if !fresh && response.meta.proxy.is_some() {
            warn!("----- ip {} used before", report.ip);
            return Ok(Outputs::new().signal(ControlSignal::ForceRestart {
                reason: format!("ip {} already used in this session", report.ip),
            }));
        }

        info!("----- using ip {}", report.ip);
        Ok(Outputs::new().request((self.next)(response.meta.clone())))
    }
}

/// Solves the fetched CAPTCHA image, at most `max_attempts` times per search number.
///
/// A solver failure is counted like a wrong answer and fetches a new image.
pub struct CaptchaRule<K> {
    key: K,
    solver: Arc<dyn CaptchaSolver>,
    max_attempts: u32,
    attempts: HashMap<String, u32>,
    refetch: RequestBuilder<K>,
    submit: SubmitBuilder<K>,
}

impl<K: RuleKey> CaptchaRule<K> {
    pub fn new(
        key: K,
        solver: Arc<dyn CaptchaSolver>,
        max_attempts: u32,
        refetch: impl Fn(Meta) -> RequestOption<K> + Send + Sync + 'static,
        submit: impl Fn(Meta, String) -> RequestOption<K> + Send + Sync + 'static,
    ) -> Self {
        CaptchaRule {
            key,
            solver,
            max_attempts,
            attempts: HashMap::new(),
            refetch: Box::new(refetch),
            submit: Box::new(submit),
        }
    }

    pub fn attempts(&self, search_no: &str) -> u32 {
        self.attempts.get(search_no).copied().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl<K: RuleKey> RoutingRule<K> for CaptchaRule<K> {
    fn name(&self) -> K {
        self.key
    }

    fn get_save_name(&self, response: &Response<K>) -> String {
        format!(
            "{}_{}.jpg",
            self.key.name(),
            self.attempts(&response.meta.search_no)
        )
    }

    async fn handle(&mut self, response: &Response<K>) -> Result<Outputs<K>, CrawlerError> {
        let search_no = response.meta.search_no.clone();
        let attempt = self.attempts.entry(search_no.clone()).or_default();
        if *attempt >= self.max_attempts {
            return Err(CrawlerError::CaptchaExhausted {
                attempts: *attempt,
            });
        }
        *attempt += 1;
        let attempt = *attempt;

        match self.solver.solve(&response.body).await {
            Ok(answer) => {
                info!("captcha attempt {} for {}: `{}`", attempt, search_no, answer);
                Ok(Outputs::new().request((self.submit)(response.meta.clone(), answer)))
            }
            Err(err) => {
                warn!("captcha attempt {} for {} failed: {}", attempt, search_no, err);
                Ok(Outputs::new().request((self.refetch)(response.meta.clone())))
            }
        }
    }
}
