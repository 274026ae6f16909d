use crate::{
    error::CrawlerError,
    item::{ContainerItem, ContainerStatusItem, Location, MblItem, VesselItem},
    request::{Meta, SearchType},
    table::{
        ClassTextExtractor, FirstTextExtractor, LabelTableLocator, SplitTextExtractor,
        TableExtractor, TableLocator, TopHeaderTableLocator, TwoLevelTopHeaderTableLocator,
    },
};
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};

const E: &str = "Invalid selector";
lazy_static! {
    static ref TITLE: Selector = Selector::parse("title").expect(E);
    static ref CHALLENGE: Selector = Selector::parse("#challenge-form").expect(E);
    static ref CAPTCHA_ERROR: Selector = Selector::parse("div.captcha-error").expect(E);
    static ref NO_RESULT: Selector = Selector::parse("div.no-result").expect(E);
    static ref SUMMARY: Selector = Selector::parse("table#summary").expect(E);
    static ref ROUTING: Selector = Selector::parse("table#routing").expect(E);
    static ref CONTAINERS: Selector = Selector::parse("table#containers").expect(E);
    static ref EVENTS: Selector = Selector::parse("table#events").expect(E);
}

const SUMMARY_LABELS: [&str; 12] = [
    "B/L No.",
    "Booking No.",
    "Vessel / Voyage",
    "Place of Receipt",
    "Port of Loading",
    "Port of Discharge",
    "Place of Delivery",
    "Final Destination",
    "ETD",
    "ETA",
    "Containers",
    "Last Update",
];

#[derive(Debug, PartialEq)]
pub enum SearchPage {
    Blocked,
    WrongCaptcha,
    NotFound,
    Found(Tracking),
}

#[derive(Debug, PartialEq)]
pub struct Tracking {
    pub mbl: MblItem,
    pub vessels: Vec<VesselItem>,
    pub containers: Vec<ContainerItem>,
}

#[derive(Debug, PartialEq)]
pub enum ContainerPage {
    Blocked,
    Events(Vec<ContainerStatusItem>),
}

fn is_blocked(doc: &Html) -> bool {
    let title_blocked = doc
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect::<String>().contains("Access Denied"))
        .unwrap_or(false);
    title_blocked || doc.select(&CHALLENGE).next().is_some()
}

pub fn is_block_page(html: &str) -> bool {
    is_blocked(&Html::parse_document(html))
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn label<'a>(table: &TableExtractor<LabelTableLocator<'a>>, name: &str) -> Option<String> {
    table.extract_cell(name, 0).ok().and_then(non_empty)
}

fn location<'a>(table: &TableExtractor<LabelTableLocator<'a>>, name: &str) -> Option<Location> {
    label(table, name).map(Location::named)
}

/// `"EVER LEADER / 0123W"` -> `(Some("EVER LEADER"), Some("0123W"))`
fn vessel_voyage(parts: Vec<String>) -> (Option<String>, Option<String>) {
    let mut parts = parts.into_iter();
    (parts.next(), parts.next())
}

/// Actual and estimated dates share one cell, told apart by class.
fn dated<'a, L: TableLocator<'a>>(
    table: &TableExtractor<L>,
    top: &str,
    left: usize,
) -> (Option<String>, Option<String>) {
    let extractor = ClassTextExtractor::new(["actual", "estimated"]);
    match table.extract_cell_with(top, left, &extractor) {
        Ok(mut dates) => (
            dates.remove("actual").flatten(),
            dates.remove("estimated").flatten(),
        ),
        Err(_) => (None, None),
    }
}

fn first<'a>(doc: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    doc.select(selector).next()
}

pub fn parse_search_page(html: &str, meta: &Meta) -> Result<SearchPage, CrawlerError> {
    let doc = Html::parse_document(html);
    if is_blocked(&doc) {
        return Ok(SearchPage::Blocked);
    }
    if first(&doc, &CAPTCHA_ERROR).is_some() {
        return Ok(SearchPage::WrongCaptcha);
    }
    if first(&doc, &NO_RESULT).is_some() {
        return Ok(SearchPage::NotFound);
    }

    let summary = first(&doc, &SUMMARY).ok_or_else(|| CrawlerError::format("summary table not found"))?;
    let summary = TableExtractor::parse(LabelTableLocator::new(SUMMARY_LABELS), summary)?;

    let (mbl_no, booking_no) = match meta.search_type {
        SearchType::Mbl => (
            Some(summary.extract_cell("B/L No.", 0)?),
            label(&summary, "Booking No."),
        ),
        SearchType::Booking => (
            label(&summary, "B/L No."),
            Some(summary.extract_cell("Booking No.", 0)?),
        ),
    };
    let (vessel, voyage) = summary
        .extract_cell_with("Vessel / Voyage", 0, &SplitTextExtractor::new("/"))
        .map(vessel_voyage)
        .unwrap_or_default();

    let mbl = MblItem {
        task_id: meta.task_id.clone(),
        mbl_no,
        booking_no,
        vessel,
        voyage,
        por: location(&summary, "Place of Receipt"),
        pol: location(&summary, "Port of Loading"),
        pod: location(&summary, "Port of Discharge"),
        place_of_deliv: location(&summary, "Place of Delivery"),
        final_dest: location(&summary, "Final Destination"),
        etd: label(&summary, "ETD"),
        eta: label(&summary, "ETA"),
        container_quantity: label(&summary, "Containers").and_then(|c| c.parse().ok()),
        latest_update: label(&summary, "Last Update"),
        ..Default::default()
    };

    let vessels = match first(&doc, &ROUTING) {
        Some(table) => parse_routing(table, meta)?,
        None => vec![],
    };
    let containers = match first(&doc, &CONTAINERS) {
        Some(table) => parse_containers(table, meta)?,
        None => vec![],
    };

    Ok(SearchPage::Found(Tracking {
        mbl,
        vessels,
        containers,
    }))
}

fn parse_routing(table: ElementRef<'_>, meta: &Meta) -> Result<Vec<VesselItem>, CrawlerError> {
    let routing = TableExtractor::parse(TwoLevelTopHeaderTableLocator::new(), table)?;
    let rows = routing.iter_left_headers().count();

    let mut vessels = vec![];
    for i in 0..rows {
        let (vessel, voyage) = vessel_voyage(routing.extract_cell_with(
            "Vessel / Voyage",
            i,
            &SplitTextExtractor::new("/"),
        )?);
        let (atd, etd) = dated(&routing, "Departure_Date", i);
        let (ata, eta) = dated(&routing, "Arrival_Date", i);

        vessels.push(VesselItem {
            task_id: meta.task_id.clone(),
            vessel_key: format!("{}-{}", meta.search_no, i),
            vessel,
            voyage,
            pol: non_empty(routing.extract_cell("Departure_Port", i)?).map(Location::named),
            pod: non_empty(routing.extract_cell("Arrival_Port", i)?).map(Location::named),
            etd,
            atd,
            eta,
            ata,
        });
    }
    Ok(vessels)
}

fn parse_containers(table: ElementRef<'_>, meta: &Meta) -> Result<Vec<ContainerItem>, CrawlerError> {
    let containers = TableExtractor::parse(TopHeaderTableLocator::new(), table)?;
    let optional = |top: &str, left: usize| {
        containers
            .extract_cell(top, left)
            .ok()
            .and_then(non_empty)
    };

    let mut items = vec![];
    for i in 0..containers.iter_left_headers().count() {
        let container_no = containers.extract_cell("Container No.", i)?;
        items.push(ContainerItem {
            task_id: meta.task_id.clone(),
            container_key: container_no.clone(),
            container_no,
            last_free_day: optional("Last Free Day", i),
            empty_pickup_date: optional("Empty Pickup", i),
            full_return_date: optional("Full Return", i),
        });
    }
    Ok(items)
}

pub fn parse_container_page(
    html: &str,
    meta: &Meta,
    container_key: &str,
) -> Result<ContainerPage, CrawlerError> {
    let doc = Html::parse_document(html);
    if is_blocked(&doc) {
        return Ok(ContainerPage::Blocked);
    }

    let table = first(&doc, &EVENTS).ok_or_else(|| CrawlerError::format("event table not found"))?;
    let events = TableExtractor::parse(TopHeaderTableLocator::new(), table)?;

    let mut items = vec![];
    for i in 0..events.iter_left_headers().count() {
        let (local_date_time, est_or_actual) = match dated(&events, "Date", i) {
            (Some(actual), _) => (Some(actual), Some("A".to_string())),
            (None, Some(estimated)) => (Some(estimated), Some("E".to_string())),
            (None, None) => (non_empty(events.extract_cell("Date", i)?), None),
        };
        let (vessel, voyage) = events
            .extract_cell_with("Vessel / Voyage", i, &SplitTextExtractor::new("/"))
            .map(vessel_voyage)
            .unwrap_or_default();

        items.push(ContainerStatusItem {
            task_id: meta.task_id.clone(),
            container_key: container_key.to_string(),
            description: events.extract_cell_with("Event", i, &FirstTextExtractor::new())?,
            local_date_time,
            location: non_empty(events.extract_cell("Location", i)?).map(Location::named),
            vessel,
            voyage,
            est_or_actual,
        });
    }
    Ok(ContainerPage::Events(items))
}
