use std::fmt;

/// 单元格取值
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// 字符串按数字/布尔推断类型，与 xlsx 之外的数据源保持一致
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            return CellValue::Number(n);
        }
        match trimmed.to_lowercase().as_str() {
            "true" => CellValue::Bool(true),
            "false" => CellValue::Bool(false),
            _ => CellValue::Text(raw.to_string()),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Number(_))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// 整数值不带小数点输出
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// 内存中的二维表：首行为列名，其余为数据行
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl DataFrame {
    /// 用表头 + 数据行构造，行宽不足时补 Empty，超出的列补自动列名
    pub fn new(mut columns: Vec<String>, mut rows: Vec<Vec<CellValue>>) -> Self {
        let width = rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(columns.len()))
            .max()
            .unwrap_or(0);
        while columns.len() < width {
            columns.push(format!("Unnamed: {}", columns.len()));
        }
        for row in &mut rows {
            row.resize(width, CellValue::Empty);
        }
        Self { columns, rows }
    }

    /// 第一行作为表头，空白表头按 pandas 规则命名
    pub fn from_grid(mut grid: Vec<Vec<CellValue>>) -> Self {
        if grid.is_empty() {
            return Self::default();
        }
        let header = grid.remove(0);
        let columns = header
            .iter()
            .enumerate()
            .map(|(i, c)| match c {
                CellValue::Empty => format!("Unnamed: {}", i),
                other => other.to_string(),
            })
            .collect();
        Self::new(columns, grid)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn head(&self, n: usize) -> DataFrame {
        DataFrame {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// 渲染为带行号的 markdown 管道表格，数值列右对齐
    pub fn to_markdown(&self) -> String {
        let numeric: Vec<bool> = (0..self.columns.len())
            .map(|c| {
                let mut values = self
                    .rows
                    .iter()
                    .map(|r| &r[c])
                    .filter(|v| **v != CellValue::Empty)
                    .peekable();
                values.peek().is_some() && values.all(CellValue::is_numeric)
            })
            .collect();

        let mut out = String::from("|    |");
        for col in &self.columns {
            out.push_str(&format!(" {} |", escape_cell(col)));
        }
        out.push_str("\n|---:|");
        for is_num in &numeric {
            out.push_str(if *is_num { "---:|" } else { ":---|" });
        }
        for (idx, row) in self.rows.iter().enumerate() {
            out.push_str(&format!("\n| {} |", idx));
            for cell in row {
                out.push_str(&format!(" {} |", escape_cell(&cell.to_string())));
            }
        }
        out
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        DataFrame::from_grid(vec![
            vec![CellValue::Text("region".into()), CellValue::Text("revenue".into())],
            vec![CellValue::Text("north".into()), CellValue::Number(120.0)],
            vec![CellValue::Text("south".into()), CellValue::Number(80.5)],
        ])
    }

    #[test]
    fn first_row_becomes_header() {
        let df = sample();
        assert_eq!(df.columns, vec!["region", "revenue"]);
        assert_eq!(df.shape(), (2, 2));
    }

    #[test]
    fn ragged_rows_are_padded() {
        let df = DataFrame::from_grid(vec![
            vec![CellValue::Text("a".into()), CellValue::Empty],
            vec![CellValue::Number(1.0), CellValue::Number(2.0), CellValue::Number(3.0)],
        ]);
        assert_eq!(df.columns, vec!["a", "Unnamed: 1", "Unnamed: 2"]);
        assert_eq!(df.rows[0].len(), 3);
    }

    #[test]
    fn renders_pipe_table_with_index() {
        let md = sample().to_markdown();
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "|    | region | revenue |");
        assert_eq!(lines[1], "|---:|:---|---:|");
        assert_eq!(lines[2], "| 0 | north | 120 |");
        assert_eq!(lines[3], "| 1 | south | 80.5 |");
    }

    #[test]
    fn escapes_pipes_in_text() {
        let df = DataFrame::from_grid(vec![
            vec![CellValue::Text("note".into())],
            vec![CellValue::Text("a|b".into())],
        ]);
        assert!(df.to_markdown().contains("a\\|b"));
    }

    #[test]
    fn infers_cell_types() {
        assert_eq!(CellValue::infer("42"), CellValue::Number(42.0));
        assert_eq!(CellValue::infer("TRUE"), CellValue::Bool(true));
        assert_eq!(CellValue::infer("  "), CellValue::Empty);
        assert_eq!(CellValue::infer("north"), CellValue::Text("north".into()));
    }

    #[test]
    fn head_limits_rows() {
        assert_eq!(sample().head(1).rows.len(), 1);
    }
}
