//! Workbook Parser Module
//!
//! calamineのラッパーとして、XLSXファイルをデコード済みのシート構造に変換します。

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets, Xlsx};

use crate::error::XlsxToCsvError;
use crate::formatter::{datetime_to_serial, parse_iso_datetime};
use crate::parser::ArchiveMetadata;
use crate::security::SecurityConfig;
use crate::types::{CellCoord, CellRange, CellValue, Sheet};

/// ワークブックパーサー
///
/// calamineのワークブック（XLSX形式のみサポート）とアーカイブのメタデータを保持します。
pub(crate) struct WorkbookParser<'a> {
    workbook: Xlsx<Cursor<&'a [u8]>>,
    metadata: ArchiveMetadata,
}

impl<'a> WorkbookParser<'a> {
    /// ワークブックを開き、アーカイブの検査とメタデータの解析を行う
    ///
    /// # 引数
    ///
    /// * `bytes` - XLSXファイルの内容
    /// * `security` - セキュリティ設定
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkbookParser)` - ワークブックの読み込みに成功した場合
    /// * `Err(XlsxToCsvError)` - アーカイブが不正、制限超過、またはデコードに失敗した場合
    pub fn open(bytes: &'a [u8], security: &SecurityConfig) -> Result<Self, XlsxToCsvError> {
        let metadata = ArchiveMetadata::parse(bytes, security)?;
        Self::open_with_existing_metadata(bytes, metadata)
    }

    /// ワークブックを開き、既存のメタデータを再利用する
    ///
    /// 並列処理で同じ入力を複数回開く場合に、アーカイブの検査を省略するために使用します。
    pub fn open_with_existing_metadata(
        bytes: &'a [u8],
        metadata: ArchiveMetadata,
    ) -> Result<Self, XlsxToCsvError> {
        let sheets = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        let mut workbook = match sheets {
            Sheets::Xlsx(workbook) => workbook,
            _ => {
                return Err(XlsxToCsvError::Config(
                    "Only XLSX format is supported".to_string(),
                ))
            }
        };

        // 結合セル情報は全シート分を一度に読み込む
        workbook
            .load_merged_regions()
            .map_err(|e| XlsxToCsvError::Decode(e.into()))?;

        Ok(Self { workbook, metadata })
    }

    /// すべてのシート名を取得
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names().to_vec()
    }

    /// メタデータを取得（並列処理での再利用用）
    pub fn metadata(&self) -> &ArchiveMetadata {
        &self.metadata
    }

    /// シートをデコードする
    ///
    /// # 引数
    ///
    /// * `sheet_name` - シート名
    ///
    /// # 戻り値
    ///
    /// * `Ok(Sheet)` - セル値、数式、結合範囲、使用範囲を含むシート
    /// * `Err(XlsxToCsvError::Decode)` - シートのデコードに失敗した場合
    pub fn load_sheet(&mut self, sheet_name: &str) -> Result<Sheet, XlsxToCsvError> {
        let mut sheet = Sheet::new(sheet_name);
        sheet.set_1904(self.metadata.is_1904());

        // 1. セル値
        let range = self
            .workbook
            .worksheet_range(sheet_name)
            .map_err(|e| XlsxToCsvError::Decode(e.into()))?;
        if let Some((start_row, start_col)) = range.start() {
            for (row, col, data) in range.used_cells() {
                sheet.set_cell(
                    start_row + row as u32,
                    start_col + col as u32,
                    convert_data(data, self.metadata.is_1904()),
                );
            }
        }

        // 2. 数式（取得できない場合は値のみで続行）
        if let Ok(formulas) = self.workbook.worksheet_formula(sheet_name) {
            if let Some((start_row, start_col)) = formulas.start() {
                for (row, col, formula) in formulas.used_cells() {
                    if !formula.is_empty() {
                        sheet.set_formula(start_row + row as u32, start_col + col as u32, formula);
                    }
                }
            }
        }

        // 3. 結合セル範囲
        if let Some(Ok(regions)) = self.workbook.worksheet_merge_cells(sheet_name) {
            for dims in regions {
                sheet.add_merged_region(CellRange::new(
                    CellCoord::new(dims.start.0, dims.start.1),
                    CellCoord::new(dims.end.0, dims.end.1),
                ));
            }
        }

        // 4. 使用範囲（デコーダーが申告した範囲をそのまま保持）
        let used_range = match (range.start(), range.end()) {
            (Some(start), Some(end)) => Some(CellRange::new(
                CellCoord::new(start.0, start.1),
                CellCoord::new(end.0, end.1),
            )),
            _ => None,
        };
        sheet.set_used_range(used_range);

        Ok(sheet)
    }
}

/// calamineのセルデータを変換
///
/// ISO形式の日時はワークブックのエポックに合わせたシリアル値に変換します。
fn convert_data(data: &Data, is_1904: bool) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => {
            if dt.is_duration() {
                CellValue::Number(dt.as_f64())
            } else {
                CellValue::Date(dt.as_f64())
            }
        }
        Data::DateTimeIso(s) => {
            let serial = parse_iso_datetime(s).and_then(|dt| datetime_to_serial(dt, is_1904));
            CellValue::Date(serial.unwrap_or(f64::NAN))
        }
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
        Data::Empty => CellValue::Empty,
    }
}
