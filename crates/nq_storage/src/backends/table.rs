use async_trait::async_trait;
use calamine::{Data, Range, Reader};
use chrono::{Days, NaiveDate};
use nq_core::{filter_by_date, parse_date, ArticleRecord, ArticleStore, Error, Query, Result, ScoredCandidate};
use std::env;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use crate::scoring::{self, oldest_first};
use crate::BackendConfig;

pub const DEFAULT_DATA_PATH: &str = "data/articles_medias.csv";

const DATE_COLUMN: &str = "date";
const TITLE_COLUMN: &str = "titre";
const BODY_COLUMN: &str = "contenu";
const URL_COLUMNS: &[&str] = &["lien", "lien1", "url"];
const AUTHOR_COLUMNS: &[&str] = &["auteur", "author"];
const CATEGORY_COLUMNS: &[&str] = &["catégorie", "categorie", "category"];
const TAGS_COLUMNS: &[&str] = &["tags"];

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const CSV_DELIMITERS: &[u8] = &[b';', b'\t'];

#[derive(Debug, Clone)]
pub struct TableConfig {
    pub path: PathBuf,
}

impl TableConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_env() -> Self {
        let path = env::var("NQ_DATA_PATH").unwrap_or_else(|_| DEFAULT_DATA_PATH.to_string());
        Self::new(path)
    }

    pub fn format(&self) -> TableFormat {
        TableFormat::detect(&self.path)
    }
}

impl BackendConfig for TableConfig {
    fn get_url(&self) -> String {
        format!("file://{}", self.path.display())
    }

    fn get_collection(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "articles".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Delimited text; `,`, `;` or tab, sniffed from the header line
    Csv,
    /// Spreadsheet workbook, first sheet only
    Workbook,
}

impl TableFormat {
    pub fn detect(path: &Path) -> Self {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
            Self::Workbook
        } else {
            Self::Csv
        }
    }
}

/// Articles loaded once from the archive spreadsheet and kept read-only.
#[derive(Debug)]
pub struct TableStore {
    articles: Vec<ArticleRecord>,
}

impl TableStore {
    /// Builds a store from already-parsed rows. Rows are kept sorted by
    /// date ascending with undated rows last.
    pub fn from_articles(mut articles: Vec<ArticleRecord>) -> Self {
        articles.sort_by(|a, b| oldest_first(a.published_at, b.published_at));
        Self { articles }
    }

    pub async fn open(config: &TableConfig) -> Result<Self> {
        let bytes = tokio::fs::read(&config.path)
            .await
            .map_err(|e| load_error(&config.path, &e.to_string()))?;
        let format = config.format();
        let articles = match format {
            TableFormat::Csv => parse_csv(&bytes),
            TableFormat::Workbook => parse_workbook(bytes),
        }
        .map_err(|e| load_error(&config.path, &e))?;
        info!("📚 Loaded {} articles from {} ({:?})", articles.len(), config.path.display(), format);
        Ok(Self::from_articles(articles))
    }

    pub fn articles(&self) -> &[ArticleRecord] {
        &self.articles
    }

    /// Date filter, then keyword scoring over what is left.
    pub fn find_relevant(&self, query: &Query) -> Vec<ScoredCandidate> {
        let in_range = filter_by_date(&self.articles, &query.range);
        debug!("{} of {} articles inside date range", in_range.len(), self.articles.len());
        scoring::rank(&query.text, in_range)
    }
}

#[async_trait]
impl ArticleStore for TableStore {
    fn name(&self) -> &str {
        "table"
    }

    async fn search(&self, query: &Query, limit: usize) -> Result<Vec<ScoredCandidate>> {
        let mut candidates = self.find_relevant(query);
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn health(&self) -> Result<()> {
        if self.articles.is_empty() {
            return Err(Error::DataLoadFailed("the article table is empty".to_string()));
        }
        Ok(())
    }
}

fn load_error(path: &Path, detail: &str) -> Error {
    Error::DataLoadFailed(format!(
        "{}: {}. The file must be a spreadsheet (.xlsx, .xls, .ods) or CSV export with the columns 'Date', 'Titre', 'Contenu'",
        path.display(),
        detail
    ))
}

struct Columns {
    date: usize,
    title: usize,
    body: usize,
    url: Option<usize>,
    author: Option<usize>,
    category: Option<usize>,
    tags: Option<usize>,
}

impl Columns {
    fn locate(headers: &[String]) -> std::result::Result<Self, String> {
        let names = normalize(headers);

        Ok(Self {
            date: require(&names, DATE_COLUMN)?,
            title: require(&names, TITLE_COLUMN)?,
            body: require(&names, BODY_COLUMN)?,
            url: find(&names, URL_COLUMNS),
            author: find(&names, AUTHOR_COLUMNS),
            category: find(&names, CATEGORY_COLUMNS),
            tags: find(&names, TAGS_COLUMNS),
        })
    }
}

fn normalize(headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect()
}

fn find(names: &[String], candidates: &[&str]) -> Option<usize> {
    names
        .iter()
        .position(|n| candidates.iter().any(|c| n.as_str() == *c))
}

fn require(names: &[String], name: &str) -> std::result::Result<usize, String> {
    find(names, &[name]).ok_or_else(|| format!("missing column '{}'", name))
}

/// Picks `;` or tab over `,` when the header line holds more of them, as
/// French-locale spreadsheet exports do.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let count = |delimiter: u8| header.iter().filter(|b| **b == delimiter).count();

    let mut best = (b',', count(b','));
    for &delimiter in CSV_DELIMITERS {
        let n = count(delimiter);
        if n > best.1 {
            best = (delimiter, n);
        }
    }
    best.0
}

fn parse_csv(bytes: &[u8]) -> std::result::Result<Vec<ArticleRecord>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(bytes))
        .flexible(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| format!("row {}: {}", line + 1, e))?;
        rows.push(row.iter().map(str::to_string).collect());
    }
    build_articles(&headers, rows)
}

fn parse_workbook(bytes: Vec<u8>) -> std::result::Result<Vec<ArticleRecord>, String> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let sheet = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| "the workbook has no sheet".to_string())?
        .map_err(|e| e.to_string())?;
    let (headers, rows) = sheet_rows(&sheet)?;
    build_articles(&headers, rows)
}

/// Header row and data rows of a sheet as text. Numeric cells in the date
/// column are Excel serial dates.
fn sheet_rows(sheet: &Range<Data>) -> std::result::Result<(Vec<String>, Vec<Vec<String>>), String> {
    let mut rows = sheet.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| "the first sheet is empty".to_string())?
        .iter()
        .map(cell_text)
        .collect();
    let date = find(&normalize(&headers), &[DATE_COLUMN]);

    let body = rows
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, cell)| if Some(i) == date { date_cell(cell) } else { cell_text(cell) })
                .collect()
        })
        .collect();
    Ok((headers, body))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => serial_date(dt.as_f64()),
        _ => String::new(),
    }
}

fn date_cell(cell: &Data) -> String {
    match cell {
        Data::Float(f) => serial_date(*f),
        Data::Int(i) => serial_date(*i as f64),
        other => cell_text(other),
    }
}

/// Excel day number (1900 system) as `YYYY-MM-DD`, empty when out of range.
fn serial_date(serial: f64) -> String {
    if !serial.is_finite() || serial < 0.0 {
        return String::new();
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.checked_add_days(Days::new(serial.trunc() as u64)))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn build_articles(headers: &[String], rows: Vec<Vec<String>>) -> std::result::Result<Vec<ArticleRecord>, String> {
    let columns = Columns::locate(headers)?;

    let articles = rows
        .iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|row| {
            let field = |idx: usize| row.get(idx).map(|v| v.trim()).unwrap_or("");
            let optional = |idx: Option<usize>| {
                idx.map(|i| field(i))
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };

            ArticleRecord {
                title: field(columns.title).to_string(),
                body: field(columns.body).to_string(),
                published_at: parse_date(field(columns.date)),
                url: optional(columns.url),
                author: optional(columns.author),
                category: optional(columns.category),
                tags: optional(columns.tags)
                    .map(|t| {
                        t.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            }
        })
        .collect();
    Ok(articles)
}
