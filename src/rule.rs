use crate::{
    error::CrawlerError,
    item::{Item, RecordKey},
    request::{Extras, RequestOption, Response},
    session::SessionState,
};
use std::{collections::HashMap, collections::VecDeque, fmt, hash::Hash};

/// Closed set of stage names of one integration.
pub trait RuleKey: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    fn name(&self) -> &'static str;

    /// Session state a request for this rule puts the session in.
    fn state(&self) -> SessionState;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlSignal {
    /// The site blocked us; counts towards the restart budget.
    Restart { reason: String },
    /// The identity is unusable (e.g. repeated IP); bounded by the proxy pool only.
    ForceRestart { reason: String },
    /// Current search number is finished, `carry` is handed to the next round.
    NextRound { carry: Extras },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutput<K> {
    Item(RecordKey, Item),
    Request(RequestOption<K>),
    Control(ControlSignal),
}

/// Ordered, consume-once output of one `handle` call.
#[derive(Debug)]
pub struct Outputs<K> {
    queue: VecDeque<RuleOutput<K>>,
}

impl<K> Default for Outputs<K> {
    fn default() -> Self {
        Outputs {
            queue: VecDeque::new(),
        }
    }
}

impl<K> Outputs<K> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn item(mut self, key: RecordKey, item: Item) -> Self {
        self.add_item(key, item);
        self
    }

    pub fn request(mut self, option: RequestOption<K>) -> Self {
        self.add_request(option);
        self
    }

    pub fn signal(mut self, signal: ControlSignal) -> Self {
        self.add_signal(signal);
        self
    }

    pub fn add_item(&mut self, key: RecordKey, item: Item) {
        self.queue.push_back(RuleOutput::Item(key, item));
    }

    pub fn add_request(&mut self, option: RequestOption<K>) {
        self.queue.push_back(RuleOutput::Request(option));
    }

    pub fn add_signal(&mut self, signal: ControlSignal) {
        self.queue.push_back(RuleOutput::Control(signal));
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<K> Iterator for Outputs<K> {
    type Item = RuleOutput<K>;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop_front()
    }
}

/// One named stage of a site's scrape protocol.
#[async_trait::async_trait]
pub trait RoutingRule<K: RuleKey>: Send {
    fn name(&self) -> K;

    fn get_save_name(&self, _response: &Response<K>) -> String {
        format!("{}.html", self.name().name())
    }

    async fn handle(&mut self, response: &Response<K>) -> Result<Outputs<K>, CrawlerError>;
}

pub struct RuleManager<K: RuleKey> {
    rules: HashMap<K, Box<dyn RoutingRule<K>>>,
}

impl<K: RuleKey> RuleManager<K> {
    /// Builds one rule per key; the factory is expected to `match` every variant.
    pub fn new<F>(mut factory: F) -> Self
    where
        F: FnMut(K) -> Box<dyn RoutingRule<K>>,
    {
        let mut rules = HashMap::new();
        for key in K::ALL {
            let rule = factory(*key);
            assert_eq!(
                rule.name(),
                *key,
                "factory built rule {:?} for key {:?}",
                rule.name(),
                key
            );
            rules.insert(*key, rule);
        }
        RuleManager { rules }
    }

    pub fn get_rule(&mut self, key: K) -> &mut dyn RoutingRule<K> {
        match self.rules.get_mut(&key) {
            Some(rule) => rule.as_mut(),
            None => panic!("rule {:?} is not registered", key),
        }
    }

    pub fn get_rule_by_name(&mut self, name: &str) -> &mut dyn RoutingRule<K> {
        match K::from_name(name) {
            Some(key) => self.get_rule(key),
            None => panic!("unknown rule name `{}`", name),
        }
    }

    pub fn dispatch(&mut self, response: &Response<K>) -> &mut dyn RoutingRule<K> {
        self.get_rule(response.rule)
    }
}
