use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;
use std::io::{BufReader, Read, Seek};

use crate::core::dataframe::CellValue;
use crate::infra::loader::LoadError;

/// 读取工作簿第一个工作表的全部单元格，按行列展开为二维网格
pub fn read_first_sheet<R: Read + Seek>(reader: R) -> Result<Vec<Vec<CellValue>>, LoadError> {
    let mut archive = zip::ZipArchive::new(reader)?;

    if archive.by_name("[Content_Types].xml").is_err() {
        return Err(LoadError::InvalidWorkbook("Missing [Content_Types].xml".into()));
    }

    let shared_strings = read_shared_strings(&mut archive)?;
    let first_sheet_rid = read_first_sheet_rid(&mut archive)?;
    let rels = read_workbook_rels(&mut archive)?;
    let path = rels.get(&first_sheet_rid).ok_or_else(|| {
        LoadError::InvalidWorkbook(format!("No worksheet relationship for {}", first_sheet_rid))
    })?;

    read_worksheet(&mut archive, path, &shared_strings)
}

/// 不裁剪文本：`<t>` 内的首尾空白属于单元格内容，元素之间的空白事件由调用方忽略
fn xml_reader<R: Read>(part: R) -> Reader<BufReader<R>> {
    Reader::from_reader(BufReader::new(part))
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()))
}

fn read_shared_strings<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<Vec<String>, LoadError> {
    let mut strings = Vec::new();
    let part = match archive.by_name("xl/sharedStrings.xml") {
        Ok(f) => f,
        Err(_) => return Ok(strings), // 没有共享字符串表也是合法的
    };
    let mut reader = xml_reader(part);
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Event::Empty(e) if e.name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) => match e.name().as_ref() {
                b"si" => {
                    strings.push(std::mem::take(&mut current));
                    in_si = false;
                }
                b"t" => in_t = false,
                _ => {}
            },
            Event::Text(e) if in_t => current.push_str(&e.unescape()?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn read_first_sheet_rid<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String, LoadError> {
    let part = archive
        .by_name("xl/workbook.xml")
        .map_err(|_| LoadError::InvalidWorkbook("Missing xl/workbook.xml".into()))?;
    let mut reader = xml_reader(part);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"sheet" => {
                if let Some(rid) = attr_value(&e, b"r:id") {
                    return Ok(rid);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Err(LoadError::InvalidWorkbook("Workbook has no sheets".into()))
}

fn read_workbook_rels<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<HashMap<String, String>, LoadError> {
    let part = archive
        .by_name("xl/_rels/workbook.xml.rels")
        .map_err(|_| LoadError::InvalidWorkbook("Missing xl/_rels/workbook.xml.rels".into()))?;
    let mut reader = xml_reader(part);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"Relationship" => {
                let id = attr_value(&e, b"Id");
                let target = attr_value(&e, b"Target");
                let rel_type = attr_value(&e, b"Type");
                if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                    if rel_type.ends_with("/worksheet") {
                        // Target 相对于 xl/ 目录
                        let full = match target.strip_prefix('/') {
                            Some(abs) => abs.to_string(),
                            None => format!("xl/{}", target),
                        };
                        rels.insert(id, full);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

/// Excel 工作表上限：XFD 列，1048576 行
const MAX_COLS: usize = 16_384;
const MAX_ROWS: usize = 1_048_576;

/// "BC12" -> (11, 54)，行列均从 0 开始。超出工作表上限时返回 None
fn parse_cell_ref(r: &str) -> Option<(usize, usize)> {
    let split = r.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = r.split_at(split);
    if letters.is_empty() {
        return None;
    }
    let mut col = 0usize;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
        if col > MAX_COLS {
            return None;
        }
    }
    let row = parse_row_number(digits)?;
    Some((row - 1, col - 1))
}

/// 1 起始的行号，0 或超出上限返回 None
fn parse_row_number(digits: &str) -> Option<usize> {
    let row: usize = digits.parse().ok()?;
    (1..=MAX_ROWS).contains(&row).then_some(row)
}

fn row_start(e: &BytesStart) -> Result<Option<usize>, LoadError> {
    match attr_value(e, b"r") {
        Some(r) => parse_row_number(&r)
            .map(|row| Some(row - 1))
            .ok_or_else(|| LoadError::InvalidWorkbook(format!("Invalid row number: {}", r))),
        None => Ok(None),
    }
}

fn cell_position(e: &BytesStart, fallback: (usize, usize)) -> Result<(usize, usize), LoadError> {
    let pos = match attr_value(e, b"r") {
        Some(r) => parse_cell_ref(&r)
            .ok_or_else(|| LoadError::InvalidWorkbook(format!("Invalid cell reference: {}", r)))?,
        None => fallback,
    };
    if pos.0 >= MAX_ROWS || pos.1 >= MAX_COLS {
        return Err(LoadError::InvalidWorkbook(format!(
            "Cell ({}, {}) is outside the worksheet",
            pos.0 + 1,
            pos.1 + 1
        )));
    }
    Ok(pos)
}

struct PendingCell {
    pos: (usize, usize),
    cell_type: Option<String>,
    value: Option<String>,
}

fn resolve_cell(cell: &PendingCell, shared: &[String]) -> Result<CellValue, LoadError> {
    let Some(raw) = cell.value.as_deref() else {
        return Ok(CellValue::Empty);
    };
    // 只有文本类单元格保留原始空白
    let trimmed = raw.trim();
    Ok(match cell.cell_type.as_deref() {
        Some("s") => {
            let idx: usize = trimmed.parse().map_err(|_| {
                LoadError::InvalidWorkbook(format!("Invalid shared string index: {}", raw))
            })?;
            let s = shared.get(idx).ok_or_else(|| {
                LoadError::InvalidWorkbook(format!("Shared string index {} out of bounds", idx))
            })?;
            CellValue::Text(s.clone())
        }
        Some("b") => CellValue::Bool(trimmed == "1" || trimmed.eq_ignore_ascii_case("true")),
        Some("str") | Some("inlineStr") | Some("e") => CellValue::Text(raw.to_string()),
        None | Some("n") => match trimmed.parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => CellValue::Text(raw.to_string()),
        },
        Some(_) => CellValue::Text(raw.to_string()),
    })
}

fn read_worksheet<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    path: &str,
    shared: &[String],
) -> Result<Vec<Vec<CellValue>>, LoadError> {
    let part = archive
        .by_name(path)
        .map_err(|_| LoadError::InvalidWorkbook(format!("Missing worksheet part {}", path)))?;
    let mut reader = xml_reader(part);
    let mut buf = Vec::new();
    let mut grid: Vec<Vec<CellValue>> = Vec::new();

    // 没有 r 属性时按出现顺序定位
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut current: Option<PendingCell> = None;
    let mut in_value = false;

    let place = |cell: PendingCell, grid: &mut Vec<Vec<CellValue>>| -> Result<(), LoadError> {
        let value = resolve_cell(&cell, shared)?;
        let (row, col) = cell.pos;
        if grid.len() <= row {
            grid.resize_with(row + 1, Vec::new);
        }
        let line = &mut grid[row];
        if line.len() <= col {
            line.resize(col + 1, CellValue::Empty);
        }
        line[col] = value;
        Ok(())
    };

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"row" => {
                    if let Some(row) = row_start(&e)? {
                        next_row = row;
                    }
                    next_col = 0;
                }
                b"c" => {
                    let pos = cell_position(&e, (next_row, next_col))?;
                    next_col = pos.1 + 1;
                    current = Some(PendingCell {
                        pos,
                        cell_type: attr_value(&e, b"t"),
                        value: None,
                    });
                }
                // <v> 为缓存值，<is><t> 为内联字符串
                b"v" | b"t" => in_value = current.is_some(),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"row" => {
                    next_row = row_start(&e)?.unwrap_or(next_row) + 1;
                }
                b"c" => {
                    let pos = cell_position(&e, (next_row, next_col))?;
                    next_col = pos.1 + 1;
                }
                _ => {}
            },
            Event::Text(e) if in_value => {
                if let Some(cell) = current.as_mut() {
                    cell.value
                        .get_or_insert_with(String::new)
                        .push_str(&e.unescape()?);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(cell) = current.take() {
                        place(cell, &mut grid)?;
                    }
                }
                b"row" => next_row += 1,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(grid)
}
