use super::{CellIndex, HeaderKey, TableLocator};
use crate::{
    error::CrawlerError,
    utils::{clean_text, strip_label_colon},
};
use itertools::Itertools;
use scraper::ElementRef;

fn element_children(parent: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    parent.children().filter_map(ElementRef::wrap)
}

fn cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    element_children(row)
        .filter(|e| matches!(e.value().name(), "th" | "td"))
        .collect()
}

fn has_data_cells(row: ElementRef<'_>) -> bool {
    cells(row).iter().any(|c| c.value().name() == "td")
}

fn text(cell: ElementRef<'_>) -> String {
    clean_text(&cell.text().join(" "))
}

fn span(cell: ElementRef<'_>, attr: &str) -> usize {
    cell.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .max(1)
}

/// Rows owned by `table`, each flagged when it sits in `<thead>`.
///
/// Rows of tables nested inside cells are not visited.
fn own_rows(table: ElementRef<'_>) -> Vec<(bool, ElementRef<'_>)> {
    let mut rows = vec![];
    for child in element_children(table) {
        match child.value().name() {
            "tr" => rows.push((false, child)),
            section @ ("thead" | "tbody" | "tfoot") => rows.extend(
                element_children(child)
                    .filter(|e| e.value().name() == "tr")
                    .map(|tr| (section == "thead", tr)),
            ),
            _ => {}
        }
    }
    rows
}

fn rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    own_rows(table).into_iter().map(|(_, row)| row).collect()
}

/// Header rows come from `<thead>` when present, otherwise the leading
/// `header_rows` rows are taken.
fn split_rows(table: ElementRef<'_>, header_rows: usize) -> (Vec<ElementRef<'_>>, Vec<ElementRef<'_>>) {
    let (head, body): (Vec<_>, Vec<_>) = own_rows(table).into_iter().partition(|(in_head, _)| *in_head);
    let mut head = head.into_iter().map(|(_, row)| row).collect::<Vec<_>>();
    let mut all = body.into_iter().map(|(_, row)| row).collect::<Vec<_>>();

    if head.is_empty() {
        let data = all.split_off(header_rows.min(all.len()));
        head = all;
        (head, data)
    } else {
        (head, all)
    }
}

/// Colspan-aware column layout of one header row.
fn columns(header: &[ElementRef<'_>]) -> Vec<Option<HeaderKey>> {
    let mut columns = vec![];
    for cell in header {
        columns.push(Some(HeaderKey::Text(text(*cell))));
        columns.extend(std::iter::repeat(None).take(span(*cell, "colspan") - 1));
    }
    columns
}

fn place<'a>(
    index: &mut CellIndex<'a>,
    columns: &[Option<HeaderKey>],
    left: HeaderKey,
    row: &[ElementRef<'a>],
) {
    index.add_left(left.clone());
    let mut position = 0;
    for cell in row {
        if let Some(Some(top)) = columns.get(position) {
            index.insert(top.clone(), left.clone(), *cell);
        }
        position += span(*cell, "colspan");
    }
}

fn register_tops(index: &mut CellIndex<'_>, columns: &[Option<HeaderKey>]) {
    for top in columns.iter().flatten() {
        index.add_top(top.clone());
    }
}

/// One header row on top, data rows indexed `0..n`.
#[derive(Debug, Default)]
pub struct TopHeaderTableLocator<'a> {
    index: CellIndex<'a>,
}

impl<'a> TopHeaderTableLocator<'a> {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<'a> TableLocator<'a> for TopHeaderTableLocator<'a> {
    fn parse(&mut self, table: ElementRef<'a>) -> Result<(), CrawlerError> {
        let (head, data) = split_rows(table, 1);
        let header = head
            .last()
            .map(|row| cells(*row))
            .ok_or_else(|| CrawlerError::format("table has no header row"))?;

        let columns = columns(&header);
        register_tops(&mut self.index, &columns);

        let rows = data.into_iter().filter(|r| has_data_cells(*r));
        for (i, row) in rows.enumerate() {
            place(&mut self.index, &columns, HeaderKey::Index(i), &cells(row));
        }
        Ok(())
    }

    fn index(&self) -> &CellIndex<'a> {
        &self.index
    }
}

/// Every row starts with a `th` title, its `td`s are indexed `0..m`.
#[derive(Debug, Default)]
pub struct LeftHeaderTableLocator<'a> {
    index: CellIndex<'a>,
}

impl<'a> LeftHeaderTableLocator<'a> {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<'a> TableLocator<'a> for LeftHeaderTableLocator<'a> {
    fn parse(&mut self, table: ElementRef<'a>) -> Result<(), CrawlerError> {
        for row in rows(table) {
            let row = cells(row);
            let title = match row.iter().find(|c| c.value().name() == "th") {
                Some(th) => text(*th),
                None => continue,
            };

            let left = HeaderKey::Text(title);
            self.index.add_left(left.clone());
            for (j, td) in row.iter().filter(|c| c.value().name() == "td").enumerate() {
                self.index.insert(HeaderKey::Index(j), left.clone(), *td);
            }
        }
        Ok(())
    }

    fn index(&self) -> &CellIndex<'a> {
        &self.index
    }
}

/// Top header row whose first cell is the corner, each data row led by its title.
#[derive(Debug, Default)]
pub struct TopLeftHeaderTableLocator<'a> {
    index: CellIndex<'a>,
}

impl<'a> TopLeftHeaderTableLocator<'a> {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<'a> TableLocator<'a> for TopLeftHeaderTableLocator<'a> {
    fn parse(&mut self, table: ElementRef<'a>) -> Result<(), CrawlerError> {
        let (head, data) = split_rows(table, 1);
        let header = head
            .last()
            .map(|row| cells(*row))
            .ok_or_else(|| CrawlerError::format("table has no header row"))?;

        let mut columns = columns(&header);
        if let Some(corner) = columns.first_mut() {
            *corner = None;
        }
        register_tops(&mut self.index, &columns);

        for row in data {
            let row = cells(row);
            let left = match row.first() {
                Some(first) => HeaderKey::Text(text(*first)),
                None => continue,
            };
            place(&mut self.index, &columns, left, &row);
        }
        Ok(())
    }

    fn index(&self) -> &CellIndex<'a> {
        &self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubTitle {
    /// Index the column as `"{main}_{sub}"`.
    Keep,
    /// Index the column under the bare main title.
    Collapse,
    /// Leave the column unindexed.
    Skip,
}

pub type SubTitlePolicy = Box<dyn Fn(&str) -> SubTitle + Send + Sync>;

/// Main header row spanning sub-columns through `colspan`, sub header row below.
///
/// Main cells with `rowspan > 1` have no sub-title and keep their own name.
pub struct TwoLevelTopHeaderTableLocator<'a> {
    index: CellIndex<'a>,
    policy: SubTitlePolicy,
}

impl<'a> Default for TwoLevelTopHeaderTableLocator<'a> {
    fn default() -> Self {
        TwoLevelTopHeaderTableLocator {
            index: CellIndex::new(),
            policy: Box::new(|_| SubTitle::Keep),
        }
    }
}

impl<'a> TwoLevelTopHeaderTableLocator<'a> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_policy(policy: impl Fn(&str) -> SubTitle + Send + Sync + 'static) -> Self {
        TwoLevelTopHeaderTableLocator {
            index: CellIndex::new(),
            policy: Box::new(policy),
        }
    }

    fn columns(&self, main: &[ElementRef<'_>], sub: &[ElementRef<'_>]) -> Vec<Option<HeaderKey>> {
        let mut subs = sub.iter().map(|c| text(*c));
        let mut columns = vec![];

        for cell in main {
            let title = text(*cell);
            let colspan = span(*cell, "colspan");

            if span(*cell, "rowspan") > 1 {
                columns.push(Some(HeaderKey::Text(title)));
                columns.extend(std::iter::repeat(None).take(colspan - 1));
                continue;
            }

            for _ in 0..colspan {
                let key = match subs.next() {
                    Some(sub) if !sub.is_empty() => match (self.policy)(&sub) {
                        SubTitle::Keep => Some(format!("{}_{}", title, sub)),
                        SubTitle::Collapse => Some(title.clone()),
                        SubTitle::Skip => None,
                    },
                    _ => Some(title.clone()),
                };
                columns.push(key.map(HeaderKey::Text));
            }
        }
        columns
    }
}

impl<'a> TableLocator<'a> for TwoLevelTopHeaderTableLocator<'a> {
    fn parse(&mut self, table: ElementRef<'a>) -> Result<(), CrawlerError> {
        let (head, data) = split_rows(table, 2);
        if head.len() < 2 {
            return Err(CrawlerError::format("two-level table needs two header rows"));
        }

        let columns = self.columns(&cells(head[0]), &cells(head[1]));
        register_tops(&mut self.index, &columns);

        let rows = data.into_iter().filter(|r| has_data_cells(*r));
        for (i, row) in rows.enumerate() {
            place(&mut self.index, &columns, HeaderKey::Index(i), &cells(row));
        }
        Ok(())
    }

    fn index(&self) -> &CellIndex<'a> {
        &self.index
    }
}

/// `label | value` rows where the label column moves around.
///
/// Values are indexed at `(label, 0)`; rows without a whitelisted label are ignored.
#[derive(Debug)]
pub struct LabelTableLocator<'a> {
    index: CellIndex<'a>,
    labels: Vec<String>,
}

impl<'a> LabelTableLocator<'a> {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LabelTableLocator {
            index: CellIndex::new(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }
}

impl<'a> TableLocator<'a> for LabelTableLocator<'a> {
    fn parse(&mut self, table: ElementRef<'a>) -> Result<(), CrawlerError> {
        for row in rows(table) {
            let row = cells(row);
            let found = row.iter().enumerate().find_map(|(i, cell)| {
                let label = strip_label_colon(&text(*cell));
                self.labels.contains(&label).then_some((i, label))
            });

            if let Some((i, label)) = found {
                if let Some(value) = row.get(i + 1) {
                    self.index
                        .insert(HeaderKey::Text(label), HeaderKey::Index(0), *value);
                }
            }
        }
        Ok(())
    }

    fn index(&self) -> &CellIndex<'a> {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableExtractor;
    use pretty_assertions::assert_eq;
    use scraper::{Html, Selector};

    fn first_table(html: &Html) -> ElementRef<'_> {
        let table = Selector::parse("table").unwrap();
        html.select(&table).next().unwrap()
    }

    #[test]
    fn top_header_table() {
        let html = Html::parse_fragment(
            r#"<table>
                <thead><tr><th>Date</th><th colspan="2">Event</th><th>Location</th></tr></thead>
                <tbody>
                  <tr><td>2022-01-01</td><td>Gate In</td><td>icon</td><td>SHANGHAI</td></tr>
                  <tr><td>2022-01-03</td><td colspan="2">Loaded</td><td>SHANGHAI</td></tr>
                  <tr><td>2022-01-20</td><td>Discharged</td></tr>
                </tbody>
            </table>"#,
        );
        let t = TableExtractor::parse(TopHeaderTableLocator::new(), first_table(&html)).unwrap();

        assert_eq!(t.extract_cell("Event", 0).unwrap(), "Gate In");
        assert_eq!(t.extract_cell("Location", 0).unwrap(), "SHANGHAI");
        assert_eq!(t.extract_cell("Location", 1).unwrap(), "SHANGHAI");
        assert_eq!(t.extract_cell("Event", 2).unwrap(), "Discharged");
        assert!(t.extract_cell("Location", 2).is_err());
        assert_eq!(
            t.iter_left_headers().cloned().collect::<Vec<_>>(),
            vec![0.into(), 1.into(), 2.into()]
        );
    }

    #[test]
    fn top_header_without_thead_uses_first_row() {
        let html = Html::parse_fragment(
            r#"<table>
                <tr><th>Container No.</th><th>Size</th></tr>
                <tr><td> TCLU1234567 </td><td>40HQ</td></tr>
            </table>"#,
        );
        let t = TableExtractor::parse(TopHeaderTableLocator::new(), first_table(&html)).unwrap();
        assert_eq!(t.extract_cell("Container No.", 0).unwrap(), "TCLU1234567");
        assert!(t.has_top_header("Size"));
    }

    #[test]
    fn left_header_table() {
        let html = Html::parse_fragment(
            r#"<table>
                <tr><th>Vessel</th><td>EVER LEADER</td><td>XIN YING KOU</td></tr>
                <tr><th>Voyage</th><td>0123W</td><td>045E</td></tr>
                <tr><td>no title row</td></tr>
            </table>"#,
        );
        let t = TableExtractor::parse(LeftHeaderTableLocator::new(), first_table(&html)).unwrap();

        assert_eq!(t.extract_cell(1, "Vessel").unwrap(), "XIN YING KOU");
        assert_eq!(t.extract_cell(0, "Voyage").unwrap(), "0123W");
        assert!(t.has_left_header("Voyage"));
        assert!(!t.has_left_header("no title row"));
    }

    #[test]
    fn top_left_header_table() {
        let html = Html::parse_fragment(
            r#"<table>
                <tr><th></th><th>Origin</th><th>Destination</th></tr>
                <tr><th>Port</th><td>SHANGHAI</td><td>LOS ANGELES</td></tr>
                <tr><th>Date</th><td>2022-01-03</td><td>2022-01-20</td></tr>
            </table>"#,
        );
        let t =
            TableExtractor::parse(TopLeftHeaderTableLocator::new(), first_table(&html)).unwrap();

        assert_eq!(t.extract_cell("Destination", "Port").unwrap(), "LOS ANGELES");
        assert_eq!(t.extract_cell("Origin", "Date").unwrap(), "2022-01-03");
        assert!(t.has_header(Some("Origin".into()), Some("Port".into())));
        assert!(!t.has_header(Some("".into()), Some("Port".into())));
    }

    #[test]
    fn two_level_policy_collapses_and_skips_sub_titles() {
        let html = Html::parse_fragment(
            r#"<table>
                <tr>
                  <th rowspan="2">Container</th>
                  <th colspan="3">Equipment</th>
                  <th colspan="2">Discharge</th>
                </tr>
                <tr><th>Size</th><th>Type</th><th>Height</th><th>Date</th><th>Port</th></tr>
                <tr><td>TCLU1234567</td><td>40</td><td>HC</td><td>9'6</td><td>2022-01-20</td><td>LAX</td></tr>
            </table>"#,
        );
        let locator = TwoLevelTopHeaderTableLocator::with_policy(|sub| match sub {
            "Size" => SubTitle::Collapse,
            "Type" | "Height" => SubTitle::Skip,
            _ => SubTitle::Keep,
        });
        let t = TableExtractor::parse(locator, first_table(&html)).unwrap();

        assert_eq!(t.extract_cell("Equipment", 0).unwrap(), "40");
        assert_eq!(t.extract_cell("Discharge_Date", 0).unwrap(), "2022-01-20");
        assert_eq!(t.extract_cell("Discharge_Port", 0).unwrap(), "LAX");
        assert!(!t.has_top_header("Equipment_Type"));
        assert!(!t.has_top_header("Equipment_Height"));
    }

    #[test]
    fn two_level_table_requires_sub_header_row() {
        let html = Html::parse_fragment(r#"<table><thead><tr><th>Only</th></tr></thead></table>"#);
        let result =
            TableExtractor::parse(TwoLevelTopHeaderTableLocator::new(), first_table(&html));
        assert!(matches!(result, Err(CrawlerError::Format { .. })));
    }

    #[test]
    fn label_table_finds_whitelisted_labels_anywhere_in_row() {
        let html = Html::parse_fragment(
            r#"<table>
                <tr><td>Port of Loading:</td><td>SHANGHAI</td></tr>
                <tr><td><img/></td><td>Port of Discharge :</td><td>LOS ANGELES</td></tr>
                <tr><td>Remark:</td><td>ignored</td></tr>
                <tr><td>ETA:</td></tr>
            </table>"#,
        );
        let locator = LabelTableLocator::new(["Port of Loading", "Port of Discharge", "ETA"]);
        let t = TableExtractor::parse(locator, first_table(&html)).unwrap();

        assert_eq!(t.extract_cell("Port of Loading", 0).unwrap(), "SHANGHAI");
        assert_eq!(t.extract_cell("Port of Discharge", 0).unwrap(), "LOS ANGELES");
        assert!(!t.has_top_header("Remark"));
        assert!(!t.has_top_header("ETA"));
    }

    #[test]
    fn rows_of_nested_tables_stay_out_of_the_index() {
        let html = Html::parse_fragment(
            r#"<table>
                <tr><th>Vessel</th><td>EVER LEADER</td></tr>
                <tr><th>Remark</th><td>
                  <table><tr><th>Hidden</th><td>inner</td></tr></table>
                </td></tr>
            </table>"#,
        );
        let t = TableExtractor::parse(LeftHeaderTableLocator::new(), first_table(&html)).unwrap();

        let lefts = t.iter_left_headers().cloned().collect::<Vec<_>>();
        assert_eq!(lefts, vec![HeaderKey::from("Vessel"), HeaderKey::from("Remark")]);
        assert!(!t.has_left_header("Hidden"));

        let html = Html::parse_fragment(
            r#"<table>
                <thead><tr><th>Date</th><th>Event</th></tr></thead>
                <tbody>
                  <tr><td>2022-01-01</td><td>
                    <table><thead><tr><th>Note</th></tr></thead><tr><td>x</td></tr></table>
                  </td></tr>
                  <tr><td>2022-01-03</td><td>Loaded</td></tr>
                </tbody>
            </table>"#,
        );
        let t = TableExtractor::parse(TopHeaderTableLocator::new(), first_table(&html)).unwrap();

        assert_eq!(t.iter_top_headers().count(), 2);
        assert_eq!(t.iter_left_headers().count(), 2);
        assert_eq!(t.extract_cell("Date", 1).unwrap(), "2022-01-03");
        assert!(!t.has_top_header("Note"));
    }
}
