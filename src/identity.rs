use crate::error::CrawlerError;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyCredential {
    pub domain: String,
    pub username: String,
    pub password: String,
}

impl ProxyCredential {
    pub fn url(&self) -> String {
        format!("http://{}:{}@{}", self.username, self.password, self.domain)
    }
}

/// Network identity a session presents to the remote site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub proxy: Option<ProxyCredential>,
    pub cookie_jar_id: u64,
}

impl Identity {
    pub fn proxy_url(&self) -> Option<String> {
        self.proxy.as_ref().map(ProxyCredential::url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    #[default]
    Fifo,
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProxyPoolConfig {
    Static {
        credentials: Vec<ProxyCredential>,
    },
    /// Session-scoped usernames for a rotating residential gateway.
    Generated {
        domain: String,
        password: String,
        group: String,
        session: String,
        size: usize,
    },
}

impl ProxyPoolConfig {
    pub fn credentials(&self) -> Vec<ProxyCredential> {
        match self {
            ProxyPoolConfig::Static { credentials } => credentials.clone(),
            ProxyPoolConfig::Generated {
                domain,
                password,
                group,
                session,
                size,
            } => (0..*size)
                .map(|_| ProxyCredential {
                    domain: domain.clone(),
                    username: format!("groups-{},session-{}{}", group, session, random_suffix()),
                    password: password.clone(),
                })
                .collect(),
        }
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .map(|c| c.to_ascii_uppercase())
        .take(20)
        .collect()
}

/// Hands out proxy credentials and cookie jar ids; the pool only ever shrinks.
#[derive(Debug)]
pub struct IdentityManager {
    unused: VecDeque<ProxyCredential>,
    active: Option<ProxyCredential>,
    policy: SelectionPolicy,
    direct: bool,
    acquired: u64,
}

impl IdentityManager {
    pub fn new(pool: Vec<ProxyCredential>, policy: SelectionPolicy) -> Self {
        IdentityManager {
            unused: pool.into(),
            active: None,
            policy,
            direct: false,
            acquired: 0,
        }
    }

    /// No proxies: every identity connects directly and only the cookie jar rotates.
    pub fn direct() -> Self {
        IdentityManager {
            direct: true,
            ..Self::new(vec![], SelectionPolicy::Fifo)
        }
    }

    /// An empty pool means connecting directly.
    pub fn from_config(config: Option<&ProxyPoolConfig>, policy: SelectionPolicy) -> Self {
        let credentials = config.map(ProxyPoolConfig::credentials).unwrap_or_default();
        if credentials.is_empty() {
            Self::direct()
        } else {
            Self::new(credentials, policy)
        }
    }

    pub fn acquire(&mut self) -> Result<Identity, CrawlerError> {
        let proxy = if self.direct {
            None
        } else {
            let index = match self.policy {
                SelectionPolicy::Fifo => 0,
                SelectionPolicy::Random if !self.unused.is_empty() => {
                    rand::thread_rng().gen_range(0..self.unused.len())
                }
                SelectionPolicy::Random => 0,
            };
            let credential = self
                .unused
                .remove(index)
                .ok_or(CrawlerError::ProxyPoolExhausted)?;
            if let Some(previous) = self.active.replace(credential.clone()) {
                warn!("----- dropping proxy still in use: {}", previous.username);
            }
            Some(credential)
        };

        let cookie_jar_id = self.acquired;
        self.acquired += 1;
        info!(
            "----- renew identity (jar={}, proxies left={})",
            cookie_jar_id,
            self.unused.len()
        );

        Ok(Identity {
            proxy,
            cookie_jar_id,
        })
    }

    /// Discards the active credential; it is never handed out again.
    pub fn release_on_block(&mut self) {
        if let Some(credential) = self.active.take() {
            warn!("----- discarding blocked proxy {}", credential.username);
        }
    }

    /// Credentials not discarded yet, the active one included.
    pub fn pool_size(&self) -> usize {
        self.unused.len() + usize::from(self.active.is_some())
    }

    pub fn remaining(&self) -> usize {
        self.unused.len()
    }

    pub fn is_direct(&self) -> bool {
        self.direct
    }
}
