// ==========================================
// 同行评审系统 - 文件解析器实现
// ==========================================
// 步骤 1: 原始字节 → 表头 + 数据行
// 格式: CSV，逗号分隔，首行为表头
// 规则: 引号外分隔符后的前导空格裁剪；其余原样保留
// ==========================================

use crate::domain::record::RawTable;
use crate::importer::error::ValidationError;
use crate::importer::staged_importer_trait::FileParser;
use csv::{ReaderBuilder, StringRecord};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse(&self, bytes: &[u8]) -> Result<RawTable, ValidationError> {
        let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let content = skip_initial_space(content);

        // 表头按普通记录读取，列数不一致交给记录解析器报告行号
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_slice());

        let mut records = reader.records();

        let header = match records.next() {
            Some(result) => to_cells(&result.map_err(malformed)?),
            None => return Err(ValidationError::EmptyDataset),
        };

        let rows = records
            .map(|result| result.map(|record| to_cells(&record)).map_err(malformed))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RawTable { header, rows })
    }
}

// 删除引号外分隔符之后的空格，使其后的引号单元格仍按引号解析
// 换行保留，错误位置与原始输入一致
fn skip_initial_space(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut iter = bytes.iter().copied().peekable();

    while let Some(b) = iter.next() {
        out.push(b);
        if in_quotes {
            if b == b'"' {
                if iter.peek() == Some(&b'"') {
                    out.push(b'"');
                    iter.next();
                } else {
                    in_quotes = false;
                }
            }
            continue;
        }
        match b {
            b',' => {
                while iter.peek() == Some(&b' ') {
                    iter.next();
                }
                at_field_start = true;
            }
            b'\n' | b'\r' => at_field_start = true,
            b'"' if at_field_start => {
                in_quotes = true;
                at_field_start = false;
            }
            _ => at_field_start = false,
        }
    }
    out
}

fn to_cells(record: &StringRecord) -> Vec<String> {
    record.iter().map(str::to_string).collect()
}

// 表头是第 0 条记录，因此记录序号即数据行号
fn malformed(err: csv::Error) -> ValidationError {
    let line = err
        .position()
        .map(|pos| pos.record() as usize)
        .unwrap_or(0);
    ValidationError::Malformed {
        line,
        message: err.to_string(),
    }
}
