mod http;

pub use http::HttpTransport;

use crate::{
    error::TransportError,
    identity::Identity,
    request::{Method, RequestOption, Response},
    rule::RuleKey,
};
use std::time::Duration;
use tracing::debug;

/// Meta key naming a selector the driver waits for after navigation.
pub const WAIT_FOR: &str = "wait_for";

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// The only place a `RequestOption` turns into network traffic.
#[async_trait::async_trait]
pub trait Transport: Send {
    async fn execute<K: RuleKey>(&mut self, option: &RequestOption<K>) -> Result<Page, TransportError>;

    /// Drops every cookie and reconnects through `identity`.
    async fn restart(&mut self, identity: &Identity) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Executes `option` within `timeout`, carrying its rule and meta onto the response.
pub async fn fetch<K, T>(
    transport: &mut T,
    option: &RequestOption<K>,
    timeout: Duration,
) -> Result<Response<K>, TransportError>
where
    K: RuleKey,
    T: Transport + ?Sized,
{
    debug!("Visit {} [{}]", option.url, option.rule.name());
    let page = tokio::time::timeout(timeout, transport.execute(option))
        .await
        .map_err(|_| TransportError::Timeout {
            url: option.url.clone(),
            secs: timeout.as_secs(),
        })??;

    Ok(Response {
        rule: option.rule,
        url: page.url,
        status: page.status,
        headers: page.headers,
        body: page.body,
        meta: option.meta.clone(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Minimal browser automation surface.
#[async_trait::async_trait]
pub trait Driver: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), TransportError>;
    async fn fill(&mut self, selector: &str, text: &str) -> Result<(), TransportError>;
    async fn click(&mut self, selector: &str) -> Result<(), TransportError>;
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), TransportError>;
    async fn page_source(&mut self) -> Result<String, TransportError>;
    async fn cookies(&mut self) -> Result<Vec<Cookie>, TransportError>;
    async fn restart(&mut self, identity: &Identity) -> Result<(), TransportError>;
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Runs request options through a browser driver.
///
/// Forms are filled field by field and submitted with the page's submit
/// button; browser cookies are reported back as `Set-Cookie` headers.
pub struct DriverTransport<D> {
    driver: D,
    wait_timeout: Duration,
}

impl<D: Driver> DriverTransport<D> {
    pub fn new(driver: D, wait_timeout: Duration) -> Self {
        DriverTransport {
            driver,
            wait_timeout,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}

#[async_trait::async_trait]
impl<D: Driver> Transport for DriverTransport<D> {
    async fn execute<K: RuleKey>(&mut self, option: &RequestOption<K>) -> Result<Page, TransportError> {
        if !option.headers.is_empty() {
            debug!("driver ignores {} request headers", option.headers.len());
        }

        match option.method {
            Method::Get => self.driver.navigate(&option.url).await?,
            Method::PostForm => {
                self.driver.navigate(&option.url).await?;
                for (name, value) in &option.form_data {
                    self.driver
                        .fill(&format!("[name=\"{}\"]", name), value)
                        .await?;
                }
                self.driver.click("[type=\"submit\"]").await?;
            }
            Method::PostBody => return Err(TransportError::Unsupported("raw request bodies")),
        }

        if let Some(selector) = option.meta.get_str(WAIT_FOR) {
            self.driver.wait_for(selector, self.wait_timeout).await?;
        }

        let body = self.driver.page_source().await?.into_bytes();
        let headers = self
            .driver
            .cookies()
            .await?
            .into_iter()
            .map(|c| ("Set-Cookie".to_string(), format!("{}={}", c.name, c.value)))
            .collect();

        Ok(Page {
            url: option.url.clone(),
            status: 200,
            headers,
            body,
        })
    }

    async fn restart(&mut self, identity: &Identity) -> Result<(), TransportError> {
        self.driver.restart(identity).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.driver.close().await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    #[derive(Debug, Clone)]
    pub(crate) struct Sent {
        pub(crate) url: String,
        pub(crate) form_data: Vec<(String, String)>,
        pub(crate) headers: Vec<(String, String)>,
        pub(crate) cookie_jar_id: u64,
        pub(crate) proxy: Option<String>,
    }

    /// Serves scripted pages per url; the last page of a script repeats.
    ///
    /// A page whose body is `SLOW` never answers.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pages: HashMap<String, VecDeque<Page>>,
        pub(crate) sent: Vec<Sent>,
        pub(crate) restarts: Vec<u64>,
    }

    impl ScriptedTransport {
        pub(crate) fn script(self, url: &str, bodies: &[&str]) -> Self {
            let pages = bodies
                .iter()
                .map(|body| Page {
                    url: url.to_string(),
                    status: 200,
                    headers: vec![],
                    body: body.as_bytes().to_vec(),
                })
                .collect();
            self.script_pages(url, pages)
        }

        pub(crate) fn script_pages(mut self, url: &str, pages: Vec<Page>) -> Self {
            self.pages.insert(url.to_string(), pages.into());
            self
        }

        pub(crate) fn urls(&self) -> Vec<&str> {
            self.sent.iter().map(|s| s.url.as_str()).collect()
        }
    }

    #[async_trait::async_trait]
    impl Transport for ScriptedTransport {
        async fn execute<K: RuleKey>(&mut self, option: &RequestOption<K>) -> Result<Page, TransportError> {
            self.sent.push(Sent {
                url: option.url.clone(),
                form_data: option.form_data.clone(),
                headers: option.headers.clone(),
                cookie_jar_id: option.meta.cookie_jar_id,
                proxy: option.meta.proxy.clone(),
            });

            let page = match self.pages.get_mut(&option.url) {
                Some(pages) if pages.len() > 1 => pages.pop_front(),
                Some(pages) => pages.front().cloned(),
                None => None,
            };
            let page = page.unwrap_or_else(|| Page {
                url: option.url.clone(),
                status: 404,
                headers: vec![],
                body: vec![],
            });

            if page.body == b"SLOW" {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(page)
        }

        async fn restart(&mut self, identity: &Identity) -> Result<(), TransportError> {
            self.restarts.push(identity.cookie_jar_id);
            Ok(())
        }
    }
}
