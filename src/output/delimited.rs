//! Delimited Text Writer
//!
//! グリッドを区切り文字テキスト（RFC 4180準拠のCSV）として出力します。
//! 行区切りは`\n`で、末尾に改行は付与しません。

use std::io::Write;

use crate::api::QuotePolicy;
use crate::error::XlsxToCsvError;
use crate::grid::Grid;

/// 区切り文字テキストのライター
#[derive(Debug, Clone)]
pub(crate) struct DelimitedWriter {
    delimiter: String,
    policy: QuotePolicy,
}

impl DelimitedWriter {
    /// 新しいDelimitedWriterインスタンスを生成
    ///
    /// 区切り文字は`validate_delimiter`で検証済みであることを前提とします。
    pub fn new(delimiter: impl Into<String>, policy: QuotePolicy) -> Self {
        Self {
            delimiter: delimiter.into(),
            policy,
        }
    }

    /// グリッドを出力
    ///
    /// # 引数
    ///
    /// * `grid` - 出力するグリッド
    /// * `writer` - 出力先のライター
    ///
    /// # 戻り値
    ///
    /// * `Ok(())` - 出力に成功した場合
    /// * `Err(XlsxToCsvError)` - 書き込みに失敗した場合
    pub fn render<W: Write>(&self, grid: &Grid, writer: &mut W) -> Result<(), XlsxToCsvError> {
        for (row_idx, row) in grid.rows().iter().enumerate() {
            if row_idx > 0 {
                writer.write_all(b"\n")?;
            }
            for (col_idx, field) in row.iter().enumerate() {
                if col_idx > 0 {
                    writer.write_all(self.delimiter.as_bytes())?;
                }
                writer.write_all(self.escape(field).as_bytes())?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// グリッドを文字列として出力
    pub fn render_to_string(&self, grid: &Grid) -> Result<String, XlsxToCsvError> {
        let mut buffer = Vec::new();
        self.render(grid, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| XlsxToCsvError::from(e.utf8_error()))
    }

    /// フィールドをエスケープ
    ///
    /// 区切り文字、ダブルクォート、改行、CR、セミコロン、タブを含む場合は
    /// ダブルクォートで囲み、内部のダブルクォートは2つにエスケープします。
    fn escape(&self, field: &str) -> String {
        if self.policy == QuotePolicy::Always || self.needs_quotes(field) {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn needs_quotes(&self, field: &str) -> bool {
        field.contains(self.delimiter.as_str())
            || field.contains(['"', '\n', '\r', ';', '\t'])
            || self.overlaps_delimiter(field)
    }

    /// フィールドの末尾が区切り文字の先頭部分と、または先頭が末尾部分と一致するか
    ///
    /// `aa`のような区切り文字では、隣接するフィールドとの境界に
    /// 区切り文字が現れてしまうため、これらのフィールドも引用符で囲みます。
    fn overlaps_delimiter(&self, field: &str) -> bool {
        let delimiter = self.delimiter.as_str();
        delimiter
            .char_indices()
            .skip(1)
            .any(|(i, _)| field.ends_with(&delimiter[..i]) || field.starts_with(&delimiter[i..]))
    }
}

/// 区切り文字を検証
///
/// 空の場合は`,`を返します。ダブルクォート、改行、CRを含む区切り文字は
/// 出力を一意に解析できなくなるため拒否します。
pub(crate) fn validate_delimiter(delimiter: &str) -> Result<String, XlsxToCsvError> {
    if delimiter.is_empty() {
        return Ok(",".to_string());
    }
    if delimiter.contains(['"', '\n', '\r']) {
        return Err(XlsxToCsvError::Config(format!(
            "Invalid delimiter {:?}: must not contain quotes or line breaks",
            delimiter
        )));
    }
    Ok(delimiter.to_string())
}
