use super::{
    pages::{self, ContainerPage, SearchPage},
    PortalRule,
};
use crate::{
    batch::SearchTask,
    error::CrawlerError,
    item::{ErrorItem, Item, ItemKind, RecordKey},
    request::{cookie_header, Extras, Meta, RequestOption, Response},
    rule::{ControlSignal, Outputs, RoutingRule, RuleKey},
};
use tracing::{info, warn};

/// Meta key holding the `Cookie` header value issued by the landing page.
pub const COOKIES: &str = "cookies";
pub const CONTAINER_NO: &str = "container_no";

fn with_cookies(option: RequestOption<PortalRule>) -> RequestOption<PortalRule> {
    match option.meta.get_str(COOKIES).map(ToString::to_string) {
        Some(cookies) => option.header("Cookie", cookies),
        None => option,
    }
}

fn carry(meta: &Meta) -> Extras {
    meta.extras()
        .iter()
        .filter(|(key, _)| key.as_str() == COOKIES)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

pub fn landing_request(base_url: &str, meta: Meta) -> RequestOption<PortalRule> {
    RequestOption::get(PortalRule::Landing, format!("{}/", base_url), meta)
}

pub fn captcha_request(base_url: &str, meta: Meta) -> RequestOption<PortalRule> {
    with_cookies(RequestOption::get(
        PortalRule::Captcha,
        format!("{}/captcha.jpg", base_url),
        meta,
    ))
}

pub fn search_request(base_url: &str, meta: Meta, answer: String) -> RequestOption<PortalRule> {
    let form_data = vec![
        ("searchType".to_string(), meta.search_type.to_string()),
        ("searchNo".to_string(), meta.search_no.clone()),
        ("captcha".to_string(), answer),
    ];
    with_cookies(RequestOption::post_form(
        PortalRule::Search,
        format!("{}/track", base_url),
        form_data,
        meta,
    ))
}

pub fn container_request(base_url: &str, meta: Meta, container_no: &str) -> RequestOption<PortalRule> {
    with_cookies(RequestOption::get(
        PortalRule::Container,
        format!("{}/container/{}", base_url, container_no),
        meta.with(CONTAINER_NO, container_no),
    ))
}

/// Collects the session cookies every later request has to present.
pub struct LandingRule {
    base_url: String,
}

impl LandingRule {
    pub fn new(base_url: impl Into<String>) -> Self {
        LandingRule {
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl RoutingRule<PortalRule> for LandingRule {
    fn name(&self) -> PortalRule {
        PortalRule::Landing
    }

    async fn handle(
        &mut self,
        response: &Response<PortalRule>,
    ) -> Result<Outputs<PortalRule>, CrawlerError> {
        if pages::is_block_page(&response.text()) {
            return Ok(Outputs::new().signal(ControlSignal::Restart {
                reason: "landing page blocked".to_string(),
            }));
        }

        let cookies = response.set_cookies();
        if cookies.is_empty() {
            warn!("----- landing page issued no cookies");
            return Ok(Outputs::new().signal(ControlSignal::Restart {
                reason: "no session cookie".to_string(),
            }));
        }

        let meta = response.meta.clone().with(COOKIES, cookie_header(&cookies));
        Ok(Outputs::new().request(captcha_request(&self.base_url, meta)))
    }
}

pub struct SearchRule {
    base_url: String,
}

impl SearchRule {
    pub fn new(base_url: impl Into<String>) -> Self {
        SearchRule {
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl RoutingRule<PortalRule> for SearchRule {
    fn name(&self) -> PortalRule {
        PortalRule::Search
    }

    async fn handle(
        &mut self,
        response: &Response<PortalRule>,
    ) -> Result<Outputs<PortalRule>, CrawlerError> {
        let meta = &response.meta;
        let page = pages::parse_search_page(&response.text(), meta)?;

        let outputs = match page {
            SearchPage::Blocked => Outputs::new().signal(ControlSignal::Restart {
                reason: "search page blocked".to_string(),
            }),
            SearchPage::WrongCaptcha => {
                info!("----- wrong captcha for {}", meta.search_no);
                Outputs::new().request(captcha_request(&self.base_url, meta.clone()))
            }
            SearchPage::NotFound => {
                let task = SearchTask::new(&meta.task_id, &meta.search_no);
                Outputs::new()
                    .item(
                        RecordKey::new(ItemKind::Error, &meta.task_id),
                        Item::Error(ErrorItem::from_error(
                            &task,
                            meta.search_type,
                            &CrawlerError::DataNotFound,
                        )),
                    )
                    .signal(ControlSignal::NextRound { carry: carry(meta) })
            }
            SearchPage::Found(tracking) => {
                let mut outputs = Outputs::new().item(
                    RecordKey::new(ItemKind::Mbl, &meta.search_no),
                    Item::Mbl(tracking.mbl),
                );
                for vessel in tracking.vessels {
                    outputs.add_item(
                        RecordKey::new(ItemKind::Vessel, &vessel.vessel_key),
                        Item::Vessel(vessel),
                    );
                }
                for container in tracking.containers {
                    outputs.add_request(container_request(
                        &self.base_url,
                        meta.clone(),
                        &container.container_no,
                    ));
                    outputs.add_item(
                        RecordKey::new(ItemKind::Container, &container.container_key),
                        Item::Container(container),
                    );
                }
                outputs.signal(ControlSignal::NextRound { carry: carry(meta) })
            }
        };
        Ok(outputs)
    }
}

pub struct ContainerRule;

#[async_trait::async_trait]
impl RoutingRule<PortalRule> for ContainerRule {
    fn name(&self) -> PortalRule {
        PortalRule::Container
    }

    fn get_save_name(&self, response: &Response<PortalRule>) -> String {
        let container_no = response.meta.get_str(CONTAINER_NO).unwrap_or_default();
        format!("{}_{}.html", PortalRule::Container.name(), container_no)
    }

    async fn handle(
        &mut self,
        response: &Response<PortalRule>,
    ) -> Result<Outputs<PortalRule>, CrawlerError> {
        let container_no = response
            .meta
            .require(CONTAINER_NO)
            .as_str()
            .unwrap_or_default()
            .to_string();

        let outputs = match pages::parse_container_page(&response.text(), &response.meta, &container_no)? {
            ContainerPage::Blocked => Outputs::new().signal(ControlSignal::Restart {
                reason: "container page blocked".to_string(),
            }),
            ContainerPage::Events(events) => {
                let mut outputs = Outputs::new();
                for (i, event) in events.into_iter().enumerate() {
                    outputs.add_item(
                        RecordKey::new(ItemKind::ContainerStatus, format!("{}-{}", container_no, i)),
                        Item::ContainerStatus(event),
                    );
                }
                outputs
            }
        };
        Ok(outputs)
    }
}
