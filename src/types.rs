//! Types Module
//!
//! ワークブック・シート・セルを表す共通データ型を定義するモジュール。
//! デコーダー（calamine）の出力はすべてこの型に変換されてから処理されます。

use std::collections::HashMap;

/// セルの値を表す列挙型
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// 数値（f64）
    Number(f64),

    /// 日付・日時（Excelのシリアル値）
    ///
    /// 解析できなかった日付は`f64::NAN`として保持され、空文字列として出力されます。
    Date(f64),

    /// 論理値
    Bool(bool),

    /// 文字列
    Text(String),

    /// エラー値（例: #DIV/0!）
    Error(String),

    /// 空セル
    Empty,
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    /// 値が空かどうかを判定
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// 値を型解釈なしの文字列として取得
    ///
    /// 日付はシリアル値のまま、論理値は小文字で出力します。
    pub fn as_raw_string(&self) -> String {
        match self {
            CellValue::Number(n) | CellValue::Date(n) => {
                if n.is_finite() {
                    n.to_string()
                } else {
                    String::new()
                }
            }
            CellValue::Text(s) => s.clone(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Error(e) => e.clone(),
            CellValue::Empty => String::new(),
        }
    }
}

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        format!("{}{}", col_index_to_letter(self.col), self.row + 1)
    }
}

/// 列インデックスを文字列に変換（0 -> "A", 25 -> "Z", 26 -> "AA"）
pub(crate) fn col_index_to_letter(mut col: u32) -> String {
    let mut result = String::new();
    loop {
        let remainder = col % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    result
}

/// セル範囲（両端を含む）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start: CellCoord,
    pub end: CellCoord,
}

impl CellRange {
    /// 新しい範囲を生成
    pub fn new(start: CellCoord, end: CellCoord) -> Self {
        Self { start, end }
    }

    /// 指定された座標が範囲内にあるかを判定
    pub fn contains(&self, coord: CellCoord) -> bool {
        coord.row >= self.start.row
            && coord.row <= self.end.row
            && coord.col >= self.start.col
            && coord.col <= self.end.col
    }

    /// 範囲のサイズ（行数 × 列数）を計算
    pub fn size(&self) -> (u32, u32) {
        let rows = self.end.row - self.start.row + 1;
        let cols = self.end.col - self.start.col + 1;
        (rows, cols)
    }

    /// A1形式の範囲参照に変換（例: "A1:C10"）
    pub fn to_a1_ref(&self) -> String {
        format!(
            "{}:{}",
            self.start.to_a1_notation(),
            self.end.to_a1_notation()
        )
    }

    /// 2つの範囲の共通部分を計算
    pub fn intersect(&self, other: &CellRange) -> Option<CellRange> {
        let start = CellCoord::new(
            self.start.row.max(other.start.row),
            self.start.col.max(other.start.col),
        );
        let end = CellCoord::new(
            self.end.row.min(other.end.row),
            self.end.col.min(other.end.col),
        );
        if start.row > end.row || start.col > end.col {
            None
        } else {
            Some(CellRange::new(start, end))
        }
    }
}

/// セル結合範囲の情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRegion {
    /// 結合範囲
    pub range: CellRange,

    /// 親セル（左上セル）の座標
    pub parent: CellCoord,
}

impl MergedRegion {
    /// 新しい結合範囲を生成
    pub fn new(range: CellRange) -> Self {
        Self {
            parent: range.start,
            range,
        }
    }

    /// 指定された座標が結合範囲内にあるかを判定
    pub fn contains(&self, coord: CellCoord) -> bool {
        self.range.contains(coord)
    }
}

/// デコード済みのシート
///
/// セルは座標をキーとするスパースなマップで保持します。
/// `used_range`はデコーダーが申告した使用範囲で、実際のセル配置と
/// 一致しない場合があります（その場合はパイプラインのフォールバックが働きます）。
#[derive(Debug, Clone)]
pub struct Sheet {
    name: String,
    cells: HashMap<CellCoord, CellValue>,
    formulas: HashMap<CellCoord, String>,
    used_range: Option<CellRange>,
    merged_regions: Vec<MergedRegion>,
    is_1904: bool,
}

impl Sheet {
    /// 空のシートを生成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: HashMap::new(),
            formulas: HashMap::new(),
            used_range: None,
            merged_regions: Vec::new(),
            is_1904: false,
        }
    }

    /// 行データからシートを生成し、使用範囲を実データに合わせる
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use xlsxcsv::{CellValue, Sheet};
    ///
    /// let sheet = Sheet::from_rows(
    ///     "Data",
    ///     vec![vec![CellValue::Text("id".into()), CellValue::Number(1.0)]],
    /// );
    /// assert_eq!(sheet.used_range().unwrap().to_a1_ref(), "A1:B1");
    /// ```
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let mut sheet = Self::new(name);
        for (row_idx, row) in rows.into_iter().enumerate() {
            for (col_idx, value) in row.into_iter().enumerate() {
                sheet.set_cell(row_idx as u32, col_idx as u32, value);
            }
        }
        sheet.fit_used_range();
        sheet
    }

    /// セルの値を設定（空の値は保持しない）
    ///
    /// 使用範囲は更新しません。必要に応じて`fit_used_range()`を呼び出してください。
    pub fn set_cell(&mut self, row: u32, col: u32, value: CellValue) {
        let coord = CellCoord::new(row, col);
        if value.is_empty() {
            self.cells.remove(&coord);
        } else {
            self.cells.insert(coord, value);
        }
    }

    /// セルの数式を設定
    pub fn set_formula(&mut self, row: u32, col: u32, formula: impl Into<String>) {
        self.formulas.insert(CellCoord::new(row, col), formula.into());
    }

    /// デコーダーが申告する使用範囲を設定
    pub fn set_used_range(&mut self, range: Option<CellRange>) {
        self.used_range = range;
    }

    /// 使用範囲を実際のセル配置（値と数式）に合わせる
    pub fn fit_used_range(&mut self) {
        self.used_range = self.content_bounds();
    }

    /// 結合範囲を追加
    pub fn add_merged_region(&mut self, range: CellRange) {
        self.merged_regions.push(MergedRegion::new(range));
    }

    /// 1904年エポックを使用するかを設定
    pub fn set_1904(&mut self, is_1904: bool) {
        self.is_1904 = is_1904;
    }

    /// シート名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 申告された使用範囲
    pub fn used_range(&self) -> Option<CellRange> {
        self.used_range
    }

    /// 指定座標のセル値（存在しない場合は空セル）
    pub fn cell_at(&self, row: u32, col: u32) -> &CellValue {
        self.cells
            .get(&CellCoord::new(row, col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// 指定座標の数式
    pub fn formula_at(&self, row: u32, col: u32) -> Option<&str> {
        self.formulas
            .get(&CellCoord::new(row, col))
            .map(|f| f.as_str())
    }

    /// 結合範囲のリスト
    pub fn merged_regions(&self) -> &[MergedRegion] {
        &self.merged_regions
    }

    /// 1904年エポックを使用するか
    pub fn is_1904(&self) -> bool {
        self.is_1904
    }

    /// 空でないセルと数式の数
    pub fn cell_count(&self) -> usize {
        self.cells.len() + self.formulas.len()
    }

    /// 空でないセルを走査
    pub(crate) fn cells(&self) -> impl Iterator<Item = (&CellCoord, &CellValue)> {
        self.cells.iter()
    }

    /// 数式を走査
    pub(crate) fn formulas(&self) -> impl Iterator<Item = (&CellCoord, &String)> {
        self.formulas.iter()
    }

    /// 実際のセル配置から算出した最小の外接矩形
    pub fn content_bounds(&self) -> Option<CellRange> {
        let mut coords = self.cells.keys().chain(self.formulas.keys());
        let first = *coords.next()?;
        let (mut start, mut end) = (first, first);
        for coord in coords {
            start.row = start.row.min(coord.row);
            start.col = start.col.min(coord.col);
            end.row = end.row.max(coord.row);
            end.col = end.col.max(coord.col);
        }
        Some(CellRange::new(start, end))
    }
}

/// デコード済みのワークブック（シートの順序付きリスト）
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// シートのリストからワークブックを生成
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// シート名を順序どおりに取得
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    /// すべてのシート
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_is_empty() {
        assert!(CellValue::Empty.is_empty());
        assert!(!CellValue::Number(42.0).is_empty());
        assert!(!CellValue::Text(String::new()).is_empty());
        assert!(!CellValue::Bool(false).is_empty());
    }

    #[test]
    fn test_cell_value_as_raw_string() {
        assert_eq!(CellValue::Empty.as_raw_string(), "");
        assert_eq!(CellValue::Number(42.5).as_raw_string(), "42.5");
        assert_eq!(CellValue::Number(3.0).as_raw_string(), "3");
        assert_eq!(CellValue::Date(45658.0).as_raw_string(), "45658");
        assert_eq!(CellValue::Date(f64::NAN).as_raw_string(), "");
        assert_eq!(CellValue::Bool(true).as_raw_string(), "true");
        assert_eq!(
            CellValue::Error("#DIV/0!".to_string()).as_raw_string(),
            "#DIV/0!"
        );
    }

    #[test]
    fn test_cell_coord_to_a1_notation() {
        assert_eq!(CellCoord::new(0, 0).to_a1_notation(), "A1");
        assert_eq!(CellCoord::new(0, 25).to_a1_notation(), "Z1");
        assert_eq!(CellCoord::new(0, 26).to_a1_notation(), "AA1");
        assert_eq!(CellCoord::new(99, 701).to_a1_notation(), "ZZ100");
        assert_eq!(CellCoord::new(0, 52).to_a1_notation(), "BA1");
    }

    #[test]
    fn test_cell_range_contains_and_size() {
        let range = CellRange::new(CellCoord::new(0, 0), CellCoord::new(10, 5));

        assert!(range.contains(CellCoord::new(0, 0)));
        assert!(range.contains(CellCoord::new(10, 5)));
        assert!(!range.contains(CellCoord::new(11, 5)));
        assert!(!range.contains(CellCoord::new(5, 6)));
        assert_eq!(range.size(), (11, 6));
        assert_eq!(range.to_a1_ref(), "A1:F11");
    }

    #[test]
    fn test_cell_range_intersect() {
        let a = CellRange::new(CellCoord::new(0, 0), CellCoord::new(5, 5));
        let b = CellRange::new(CellCoord::new(3, 4), CellCoord::new(8, 9));
        assert_eq!(
            a.intersect(&b),
            Some(CellRange::new(CellCoord::new(3, 4), CellCoord::new(5, 5)))
        );

        let c = CellRange::new(CellCoord::new(6, 0), CellCoord::new(7, 1));
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn test_merged_region_parent_is_top_left() {
        let range = CellRange::new(CellCoord::new(2, 1), CellCoord::new(3, 4));
        let merged = MergedRegion::new(range);
        assert_eq!(merged.parent, CellCoord::new(2, 1));
        assert!(merged.contains(CellCoord::new(3, 4)));
        assert!(!merged.contains(CellCoord::new(4, 4)));
    }

    #[test]
    fn test_sheet_cells_are_sparse() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_cell(3, 2, CellValue::Number(1.0));
        sheet.set_cell(0, 0, CellValue::Empty);

        assert_eq!(sheet.cell_at(3, 2), &CellValue::Number(1.0));
        assert_eq!(sheet.cell_at(0, 0), &CellValue::Empty);
        assert_eq!(sheet.cell_at(100, 100), &CellValue::Empty);
        assert_eq!(sheet.cell_count(), 1);
        // 使用範囲はset_cellでは更新されない
        assert!(sheet.used_range().is_none());
    }

    #[test]
    fn test_sheet_content_bounds_include_formulas() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_cell(2, 3, CellValue::Text("x".to_string()));
        sheet.set_formula(5, 1, "SUM(A1:A2)");
        sheet.fit_used_range();

        let range = sheet.used_range().unwrap();
        assert_eq!(range.start, CellCoord::new(2, 1));
        assert_eq!(range.end, CellCoord::new(5, 3));
        assert_eq!(sheet.formula_at(5, 1), Some("SUM(A1:A2)"));
    }

    #[test]
    fn test_sheet_from_rows() {
        let sheet = Sheet::from_rows(
            "Data",
            vec![
                vec![CellValue::Text("a".to_string()), CellValue::Empty],
                vec![CellValue::Empty, CellValue::Number(2.0)],
            ],
        );
        assert_eq!(sheet.name(), "Data");
        assert_eq!(sheet.used_range().unwrap().to_a1_ref(), "A1:B2");
        assert_eq!(Sheet::new("Empty").content_bounds(), None);
    }

    #[test]
    fn test_workbook_sheet_names_keep_order() {
        let workbook = Workbook::new(vec![Sheet::new("B"), Sheet::new("A")]);
        assert_eq!(workbook.sheet_names(), vec!["B", "A"]);
        assert_eq!(workbook.sheets().len(), 2);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_a1_notation_shape(row in 0u32..10000, col in 0u32..10000) {
                let a1 = CellCoord::new(row, col).to_a1_notation();
                let letters: String = a1.chars().take_while(|c| c.is_ascii_uppercase()).collect();
                let digits: String = a1.chars().skip_while(|c| c.is_ascii_uppercase()).collect();

                prop_assert!(!letters.is_empty());
                prop_assert!(digits.chars().all(|c| c.is_ascii_digit()));
                prop_assert_eq!(digits.parse::<u32>().unwrap(), row + 1);
            }
        }
    }
}
