use super::{Page, Transport};
use crate::{
    error::TransportError,
    identity::Identity,
    request::{Method, RequestOption},
    rule::RuleKey,
};
use tracing::info;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0 Safari/537.36";

/// reqwest client with one cookie store per identity.
pub struct HttpTransport {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(user_agent: Option<String>) -> Result<Self, TransportError> {
        let user_agent = user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        Ok(HttpTransport {
            client: build_client(&user_agent, None)?,
            user_agent,
        })
    }
}

fn build_client(user_agent: &str, proxy: Option<&str>) -> Result<reqwest::Client, TransportError> {
    let mut builder = reqwest::Client::builder()
        .cookie_store(true)
        .user_agent(user_agent);
    if let Some(proxy) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    Ok(builder.build()?)
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn execute<K: RuleKey>(&mut self, option: &RequestOption<K>) -> Result<Page, TransportError> {
        let mut request = match option.method {
            Method::Get => self.client.get(&option.url),
            Method::PostForm => self.client.post(&option.url).form(&option.form_data),
            Method::PostBody => self.client.post(&option.url).body(option.body.clone()),
        };
        for (name, value) in &option.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: option.url.clone(),
            });
        }

        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(Page {
            url,
            status: status.as_u16(),
            headers,
            body,
        })
    }

    async fn restart(&mut self, identity: &Identity) -> Result<(), TransportError> {
        let proxy = identity.proxy_url();
        self.client = build_client(&self.user_agent, proxy.as_deref())?;
        info!(
            "http client rebuilt (jar={}, proxy={})",
            identity.cookie_jar_id,
            identity
                .proxy
                .as_ref()
                .map_or("direct", |p| p.domain.as_str())
        );
        Ok(())
    }
}
