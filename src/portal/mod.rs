//! Reference integration: a tracking portal guarded by a session cookie and an image CAPTCHA.
//!
//! IP check -> landing page (cookies) -> CAPTCHA image -> search form -> container pages.

mod pages;
mod rules;

pub use pages::{parse_container_page, parse_search_page, ContainerPage, SearchPage, Tracking};
pub use rules::{ContainerRule, LandingRule, SearchRule, CONTAINER_NO, COOKIES};

use crate::{
    captcha::CaptchaSolver,
    config::PortalConfig,
    request::{Meta, RequestOption, SearchType},
    rule::{RoutingRule, RuleKey, RuleManager},
    session::{Flow, SessionState},
    stages::{CaptchaRule, IdentityCheckRule},
};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalRule {
    Ip,
    Landing,
    Captcha,
    Search,
    Container,
}

impl RuleKey for PortalRule {
    const ALL: &'static [Self] = &[
        PortalRule::Ip,
        PortalRule::Landing,
        PortalRule::Captcha,
        PortalRule::Search,
        PortalRule::Container,
    ];

    fn name(&self) -> &'static str {
        match self {
            PortalRule::Ip => "IP",
            PortalRule::Landing => "LANDING",
            PortalRule::Captcha => "CAPTCHA",
            PortalRule::Search => "SEARCH",
            PortalRule::Container => "CONTAINER",
        }
    }

    fn state(&self) -> SessionState {
        match self {
            PortalRule::Ip => SessionState::IdentityCheck,
            PortalRule::Landing => SessionState::CookieBootstrap,
            PortalRule::Captcha => SessionState::CaptchaRetry,
            PortalRule::Search => SessionState::MainQuery,
            PortalRule::Container => SessionState::DetailFetch,
        }
    }
}

pub struct PortalFlow {
    base_url: String,
    solver: Arc<dyn CaptchaSolver>,
    max_captcha_retry: u32,
}

impl PortalFlow {
    pub fn new(config: &PortalConfig, solver: Arc<dyn CaptchaSolver>, max_captcha_retry: u32) -> Self {
        PortalFlow {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            solver,
            max_captcha_retry,
        }
    }
}

impl Flow for PortalFlow {
    type Key = PortalRule;

    fn name(&self) -> &'static str {
        "portal"
    }

    fn build_rules(&self, _search_type: SearchType) -> RuleManager<PortalRule> {
        RuleManager::new(|key| -> Box<dyn RoutingRule<PortalRule>> {
            let base_url = self.base_url.clone();
            match key {
                PortalRule::Ip => Box::new(IdentityCheckRule::new(PortalRule::Ip, move |meta| {
                    rules::landing_request(&base_url, meta)
                })),
                PortalRule::Landing => Box::new(LandingRule::new(base_url)),
                PortalRule::Captcha => {
                    let refetch_url = base_url.clone();
                    Box::new(CaptchaRule::new(
                        PortalRule::Captcha,
                        self.solver.clone(),
                        self.max_captcha_retry,
                        move |meta| rules::captcha_request(&refetch_url, meta),
                        move |meta, answer| rules::search_request(&base_url, meta, answer),
                    ))
                }
                PortalRule::Search => Box::new(SearchRule::new(base_url)),
                PortalRule::Container => Box::new(ContainerRule),
            }
        })
    }

    fn start_request(&self, meta: Meta) -> RequestOption<PortalRule> {
        IdentityCheckRule::build_request_option(PortalRule::Ip, meta)
    }

    fn round_request(&self, meta: Meta) -> RequestOption<PortalRule> {
        rules::captcha_request(&self.base_url, meta)
    }
}
