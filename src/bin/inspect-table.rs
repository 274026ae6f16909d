use clap::{Parser, ValueEnum};
use scraper::{Html, Selector};
use std::path::PathBuf;
use tracking_crawler::{
    table::{
        LabelTableLocator, LeftHeaderTableLocator, TableExtractor, TableLocator,
        TopHeaderTableLocator, TopLeftHeaderTableLocator, TwoLevelTopHeaderTableLocator,
    },
    CrawlerError,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Layout {
    Top,
    Left,
    TopLeft,
    TwoLevel,
    Label,
}

/// Print how a saved page's table gets indexed.
#[derive(Debug, Parser)]
struct Args {
    file: PathBuf,

    #[arg(short, long, default_value = "table")]
    selector: String,

    #[arg(short, long, value_enum, default_value_t = Layout::Top)]
    layout: Layout,

    /// Comma separated labels for `--layout label`.
    #[arg(long, default_value = "")]
    labels: String,
}

fn dump<'a, L: TableLocator<'a>>(extractor: TableExtractor<L>) {
    let tops = extractor.iter_top_headers().cloned().collect::<Vec<_>>();
    let lefts = extractor.iter_left_headers().cloned().collect::<Vec<_>>();
    println!("tops:  {:?}", tops);
    println!("lefts: {:?}", lefts);

    for left in &lefts {
        for top in &tops {
            if let Ok(text) = extractor.extract_cell(top.clone(), left.clone()) {
                println!("[{}][{}] {}", top, left, text);
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let html = std::fs::read_to_string(&args.file)?;
    let doc = Html::parse_document(&html);

    let selector = Selector::parse(&args.selector)
        .map_err(|_| CrawlerError::Config(format!("invalid selector `{}`", args.selector)))?;
    let table = doc
        .select(&selector)
        .next()
        .ok_or_else(|| CrawlerError::format(format!("no element matches `{}`", args.selector)))?;

    match args.layout {
        Layout::Top => dump(TableExtractor::parse(TopHeaderTableLocator::new(), table)?),
        Layout::Left => dump(TableExtractor::parse(LeftHeaderTableLocator::new(), table)?),
        Layout::TopLeft => dump(TableExtractor::parse(TopLeftHeaderTableLocator::new(), table)?),
        Layout::TwoLevel => dump(TableExtractor::parse(TwoLevelTopHeaderTableLocator::new(), table)?),
        Layout::Label => {
            let labels = args
                .labels
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            dump(TableExtractor::parse(LabelTableLocator::new(labels), table)?)
        }
    }
    Ok(())
}
