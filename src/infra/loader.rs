use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::dataframe::{CellValue, DataFrame};
use crate::infra::xlsx;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid XLSX format: {0}")]
    InvalidWorkbook(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetFormat {
    Xlsx,
    Csv,
}

/// xlsx 是 zip 包，按本地文件头识别
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

fn is_remote(file_loc: &str) -> bool {
    file_loc.starts_with("http://") || file_loc.starts_with("https://")
}

/// 去掉 URL 的 query 与 fragment。签名等凭据都在 query 里，日志只记录这一部分
pub fn redact_location(file_loc: &str) -> &str {
    if is_remote(file_loc) {
        file_loc.split(['?', '#']).next().unwrap_or(file_loc)
    } else {
        file_loc
    }
}

fn extension_hint(file_loc: &str) -> Option<SheetFormat> {
    let ext = Path::new(redact_location(file_loc))
        .extension()
        .and_then(|e| e.to_str())?
        .to_lowercase();
    match ext.as_str() {
        "xlsx" | "xlsm" => Some(SheetFormat::Xlsx),
        "csv" => Some(SheetFormat::Csv),
        _ => None,
    }
}

/// 先看内容：zip 文件头即工作簿；否则按扩展名区分 csv 与 xlsx
fn detect_format(file_loc: &str, bytes: &[u8]) -> Result<SheetFormat, LoadError> {
    if bytes.starts_with(ZIP_MAGIC) {
        return Ok(SheetFormat::Xlsx);
    }
    extension_hint(file_loc)
        .ok_or_else(|| LoadError::UnsupportedFormat(redact_location(file_loc).to_string()))
}

/// 读取本地文件或远程 URL 中的表格
pub async fn load_dataframe(
    file_loc: &str,
    client: &reqwest::Client,
) -> Result<DataFrame, LoadError> {
    let bytes = if is_remote(file_loc) {
        info!("下载远程表格: {}", redact_location(file_loc));
        fetch(client, file_loc).await.map_err(redact_url)?
    } else {
        tokio::fs::read(file_loc).await?
    };
    debug!("表格读取完成: {} bytes", bytes.len());

    let format = detect_format(file_loc, &bytes)?;
    let df = parse_bytes(format, bytes)?;
    info!("数据加载完成: {} 行 x {} 列", df.shape().0, df.shape().1);
    Ok(df)
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let resp = client.get(url).send().await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// reqwest 的错误信息会带上完整 URL，去掉其中的 query
fn redact_url(err: reqwest::Error) -> reqwest::Error {
    match err.url().cloned() {
        Some(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            err.with_url(url)
        }
        None => err,
    }
}

fn parse_bytes(format: SheetFormat, bytes: Vec<u8>) -> Result<DataFrame, LoadError> {
    match format {
        SheetFormat::Xlsx => Ok(DataFrame::from_grid(xlsx::read_first_sheet(Cursor::new(bytes))?)),
        SheetFormat::Csv => {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(bytes.as_slice());
            let mut grid = Vec::new();
            for record in reader.records() {
                let record = record?;
                grid.push(record.iter().map(CellValue::infer).collect());
            }
            Ok(DataFrame::from_grid(grid))
        }
    }
}
