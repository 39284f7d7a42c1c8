use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::AppError;

/// 经过校验的对话请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub file_loc: String, // 表格路径或 URL
    pub prompt: String,   // 用户提问内容
}

impl ChatRequest {
    /// 依次校验 file_loc、prompt：先查 query，缺失或为空再查 JSON body
    pub fn from_parts(query: &HashMap<String, String>, body: &[u8]) -> Result<Self, AppError> {
        // body 只在需要时解析一次
        let mut parsed: Option<Option<Value>> = None;
        let mut lookup = |field: &'static str| -> Result<String, AppError> {
            if let Some(v) = query.get(field).filter(|v| !v.is_empty()) {
                return Ok(v.clone());
            }
            let json = parsed.get_or_insert_with(|| serde_json::from_slice::<Value>(body).ok());
            json.as_ref()
                .and_then(|j| j.get(field))
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(AppError::MissingParameter(field))
        };

        let file_loc = lookup("file_loc")?;
        let prompt = lookup("prompt")?;
        Ok(Self { file_loc, prompt })
    }
}

/// 对话结果，答案与解释之间空一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResult {
    pub answer_markdown: String,
    pub explanation: String,
}

impl fmt::Display for ChatResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\n{}", self.answer_markdown, self.explanation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn missing_field(res: Result<ChatRequest, AppError>) -> &'static str {
        match res {
            Err(AppError::MissingParameter(f)) => f,
            other => panic!("expected MissingParameter, got {:?}", other),
        }
    }

    #[test]
    fn reads_both_fields_from_query() {
        let req = ChatRequest::from_parts(
            &query(&[("file_loc", "sales.xlsx"), ("prompt", "total?")]),
            b"",
        )
        .unwrap();
        assert_eq!(req.file_loc, "sales.xlsx");
        assert_eq!(req.prompt, "total?");
    }

    #[test]
    fn reads_both_fields_from_body() {
        let body = br#"{"file_loc": "sales.xlsx", "prompt": "What is total revenue?"}"#;
        let req = ChatRequest::from_parts(&HashMap::new(), body).unwrap();
        assert_eq!(req.file_loc, "sales.xlsx");
        assert_eq!(req.prompt, "What is total revenue?");
    }

    #[test]
    fn mixes_query_and_body() {
        let req = ChatRequest::from_parts(
            &query(&[("file_loc", "a.csv")]),
            br#"{"prompt": "rows?"}"#,
        )
        .unwrap();
        assert_eq!(req.file_loc, "a.csv");
        assert_eq!(req.prompt, "rows?");
    }

    #[test]
    fn empty_query_value_falls_back_to_body() {
        let req = ChatRequest::from_parts(
            &query(&[("file_loc", ""), ("prompt", "q")]),
            br#"{"file_loc": "b.xlsx"}"#,
        )
        .unwrap();
        assert_eq!(req.file_loc, "b.xlsx");
    }

    #[test]
    fn missing_file_loc_is_reported_first() {
        assert_eq!(missing_field(ChatRequest::from_parts(&HashMap::new(), b"")), "file_loc");
        assert_eq!(
            missing_field(ChatRequest::from_parts(&query(&[("prompt", "q")]), b"{}")),
            "file_loc"
        );
    }

    #[test]
    fn missing_prompt_is_reported() {
        assert_eq!(
            missing_field(ChatRequest::from_parts(
                &HashMap::new(),
                br#"{"file_loc": "x.xlsx", "prompt": ""}"#
            )),
            "prompt"
        );
    }

    #[test]
    fn malformed_body_counts_as_missing() {
        assert_eq!(
            missing_field(ChatRequest::from_parts(&query(&[("file_loc", "x.xlsx")]), b"not json")),
            "prompt"
        );
        // 非字符串值同样视为缺失
        assert_eq!(
            missing_field(ChatRequest::from_parts(&HashMap::new(), br#"{"file_loc": 3}"#)),
            "file_loc"
        );
    }

    #[test]
    fn result_separates_answer_and_explanation_with_blank_line() {
        let result = ChatResult {
            answer_markdown: "1500".into(),
            explanation: "Summed the revenue column.".into(),
        };
        assert_eq!(result.to_string(), "1500\n\nSummed the revenue column.");
    }
}
