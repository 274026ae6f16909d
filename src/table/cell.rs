use crate::{error::CrawlerError, utils::clean_text};
use itertools::Itertools;
use scraper::{ElementRef, Selector};
use std::collections::BTreeMap;

pub trait CellExtractor {
    type Output;

    fn extract(&self, cell: ElementRef<'_>) -> Self::Output;
}

fn parse_selector(query: &str) -> Result<Selector, CrawlerError> {
    Selector::parse(query).map_err(|_| CrawlerError::format(format!("invalid cell query `{}`", query)))
}

fn texts(cell: ElementRef<'_>) -> impl Iterator<Item = String> + '_ {
    cell.text().map(clean_text).filter(|t| !t.is_empty())
}

/// First non blank text node of the cell, `""` when there is none.
#[derive(Default)]
pub struct FirstTextExtractor {
    query: Option<Selector>,
}

impl FirstTextExtractor {
    pub fn new() -> Self {
        Default::default()
    }

    /// Scopes extraction to the first descendant matching `query`.
    pub fn with_query(query: &str) -> Result<Self, CrawlerError> {
        Ok(FirstTextExtractor {
            query: Some(parse_selector(query)?),
        })
    }
}

impl CellExtractor for FirstTextExtractor {
    type Output = String;

    fn extract(&self, cell: ElementRef<'_>) -> String {
        let scope = match &self.query {
            Some(query) => cell.select(query).next(),
            None => Some(cell),
        };
        scope
            .and_then(|e| texts(e).next())
            .unwrap_or_default()
    }
}

pub struct JoinAllTextExtractor {
    sep: String,
}

impl JoinAllTextExtractor {
    pub fn new(sep: impl Into<String>) -> Self {
        JoinAllTextExtractor { sep: sep.into() }
    }
}

impl Default for JoinAllTextExtractor {
    fn default() -> Self {
        Self::new(" ")
    }
}

impl CellExtractor for JoinAllTextExtractor {
    type Output = String;

    fn extract(&self, cell: ElementRef<'_>) -> String {
        texts(cell).join(&self.sep)
    }
}

/// Full text of every descendant matching a selector, one entry per match.
pub struct ChildTextExtractor {
    child: Selector,
}

impl ChildTextExtractor {
    pub fn new(child: &str) -> Result<Self, CrawlerError> {
        Ok(ChildTextExtractor {
            child: parse_selector(child)?,
        })
    }
}

impl CellExtractor for ChildTextExtractor {
    type Output = Vec<String>;

    fn extract(&self, cell: ElementRef<'_>) -> Vec<String> {
        cell.select(&self.child)
            .map(|child| texts(child).join(" "))
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// `"EVER LEADER / 0123W"` -> `["EVER LEADER", "0123W"]`
pub struct SplitTextExtractor {
    sep: String,
}

impl SplitTextExtractor {
    pub fn new(sep: impl Into<String>) -> Self {
        SplitTextExtractor { sep: sep.into() }
    }
}

impl CellExtractor for SplitTextExtractor {
    type Output = Vec<String>;

    fn extract(&self, cell: ElementRef<'_>) -> Vec<String> {
        texts(cell)
            .join(" ")
            .split(self.sep.as_str())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

/// Text of the first descendant carrying each class, e.g. actual vs estimated dates.
pub struct ClassTextExtractor {
    classes: Vec<String>,
}

impl ClassTextExtractor {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ClassTextExtractor {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }
}

impl CellExtractor for ClassTextExtractor {
    type Output = BTreeMap<String, Option<String>>;

    fn extract(&self, cell: ElementRef<'_>) -> Self::Output {
        let elements = cell
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect::<Vec<_>>();

        self.classes
            .iter()
            .map(|class| {
                let text = elements
                    .iter()
                    .find(|e| {
                        e.value()
                            .attr("class")
                            .map_or(false, |attr| {
                                attr.split_whitespace().any(|c| c == class.as_str())
                            })
                    })
                    .map(|e| texts(*e).join(" "))
                    .filter(|t| !t.is_empty());
                (class.clone(), text)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scraper::Html;

    fn td(html: &Html) -> ElementRef<'_> {
        let td = Selector::parse("td").unwrap();
        html.select(&td).next().unwrap()
    }

    fn fragment(cell: &str) -> Html {
        Html::parse_fragment(&format!("<table><tr>{}</tr></table>", cell))
    }

    #[test]
    fn first_text_skips_blank_nodes() {
        let html = fragment("<td>\n   <span> </span><b> SHANGHAI </b> CN</td>");
        assert_eq!(FirstTextExtractor::new().extract(td(&html)), "SHANGHAI");

        let scoped = FirstTextExtractor::with_query("span.date").unwrap();
        let html = fragment(r#"<td>Actual <span class="date">2022-01-05</span></td>"#);
        assert_eq!(scoped.extract(td(&html)), "2022-01-05");

        let html = fragment("<td></td>");
        assert_eq!(scoped.extract(td(&html)), "");
    }

    #[test]
    fn joins_and_splits_text() {
        let html = fragment("<td>EVER LEADER<br/> / <br/>0123W</td>");
        assert_eq!(
            JoinAllTextExtractor::new("|").extract(td(&html)),
            "EVER LEADER|/|0123W"
        );
        assert_eq!(
            SplitTextExtractor::new("/").extract(td(&html)),
            vec!["EVER LEADER".to_string(), "0123W".to_string()]
        );
    }

    #[test]
    fn child_text_only_reads_matching_children() {
        let html = fragment(
            r#"<td><p><span class="label">POL:</span><span class="content">SHANGHAI</span></p>
               <p><span class="label">POD:</span><span class="content"> LOS  ANGELES </span></p></td>"#,
        );
        let extractor = ChildTextExtractor::new("span.content").unwrap();
        assert_eq!(
            extractor.extract(td(&html)),
            vec!["SHANGHAI".to_string(), "LOS ANGELES".to_string()]
        );
    }

    #[test]
    fn class_text_groups_by_class() {
        let html = fragment(
            r#"<td><span class="font_red bold">2022-01-05</span><span class="font_blue"></span></td>"#,
        );
        let result = ClassTextExtractor::new(["font_red", "font_blue", "font_green"]).extract(td(&html));

        assert_eq!(result["font_red"], Some("2022-01-05".to_string()));
        assert_eq!(result["font_blue"], None);
        assert_eq!(result["font_green"], None);
    }

    #[test]
    fn invalid_query_is_a_format_error() {
        assert!(matches!(
            ChildTextExtractor::new("span[["),
            Err(CrawlerError::Format { .. })
        ));
    }
}
