//! Grid Module
//!
//! シートの使用範囲を描画済みの稠密な行データに変換し、ヘッダー行と列範囲に
//! 基づいて矩形のテーブル（Grid）を切り出すモジュール。
//! フォールバック用の型解釈なしのグリッド生成もここで提供します。

use regex::Regex;

use crate::detect::{is_blank, resolve_bounds, HeaderDetector};
use crate::error::XlsxToCsvError;
use crate::formatter::CellRenderer;
use crate::merge::{expand_to_merges, MergeMap};
use crate::types::{CellCoord, CellRange, Sheet};

/// 矩形のテーブル
///
/// 先頭行がヘッダーで、すべての行がヘッダーと同じ幅を持ちます。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    /// 行データからグリッドを構築
    ///
    /// 各行は`width`に合わせて空文字列で埋められます（切り詰めは行いません）。
    /// すべてのセルが空の行は除外されます。
    pub fn new(width: usize, rows: impl IntoIterator<Item = Vec<String>>) -> Self {
        let rows = rows
            .into_iter()
            .filter(|row| !row.iter().all(|cell| is_blank(cell)))
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();
        Self { rows }
    }

    /// グリッドが空かどうか
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// ヘッダー行
    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(|row| row.as_slice())
    }

    /// すべての行（ヘッダーを含む）
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// テーブルの幅
    pub fn width(&self) -> usize {
        self.header().map_or(0, |header| header.len())
    }
}

/// テーブル抽出のリクエストごとの設定
#[derive(Debug, Clone, Default)]
pub(crate) struct TableOptions {
    /// 結合セルを左上セルの値で埋めるか
    pub fill_merges: bool,

    /// ヘッダー行の明示指定（使用範囲の先頭からの0始まり）
    pub header_row: Option<usize>,

    /// 先頭セルがこのパターンに一致する行を除外
    pub skip_pattern: Option<Regex>,

    /// 明示的な列名
    pub headers: Option<Vec<String>>,

    /// 空のヘッダーセルを`col_N`で補完するか
    pub name_blank_headers: bool,

    /// セル値の前後の空白を除去するか
    pub trim_cells: bool,
}

/// テーブル抽出器
pub(crate) struct TableExtractor<'a> {
    renderer: &'a CellRenderer,
    detector: &'a HeaderDetector,
    bounds_lookahead: usize,
}

impl<'a> TableExtractor<'a> {
    /// 新しいTableExtractorインスタンスを生成
    pub fn new(
        renderer: &'a CellRenderer,
        detector: &'a HeaderDetector,
        bounds_lookahead: usize,
    ) -> Self {
        Self {
            renderer,
            detector,
            bounds_lookahead,
        }
    }

    /// シートからテーブルを抽出
    ///
    /// # 引数
    ///
    /// * `sheet` - 対象シート
    /// * `options` - 抽出設定
    ///
    /// # 戻り値
    ///
    /// * `Ok(Grid)` - 抽出されたテーブル（使用範囲がない場合は空）
    /// * `Err(XlsxToCsvError::Config)` - 明示されたヘッダー行が使用範囲外の場合
    pub fn extract(&self, sheet: &Sheet, options: &TableOptions) -> Result<Grid, XlsxToCsvError> {
        let Some(used_range) = sheet.used_range() else {
            return Ok(Grid::default());
        };

        // 1. 使用範囲を描画（結合セルの補完を含む）
        let (range, merges) = if options.fill_merges {
            let range = expand_to_merges(used_range, sheet.merged_regions());
            (range, Some(MergeMap::build(sheet.merged_regions(), Some(range))))
        } else {
            (used_range, None)
        };
        if let Some(map) = &merges {
            tracing::debug!(
                sheet = sheet.name(),
                merged_cells = map.len(),
                "Filling merged cells"
            );
        }
        let rows = render_rows(
            sheet,
            range,
            self.renderer,
            merges.as_ref(),
            options.trim_cells,
            None,
        );

        // 2. ヘッダー行の決定
        let header_index = match options.header_row {
            Some(index) if index < rows.len() => index,
            Some(index) => {
                return Err(XlsxToCsvError::Config(format!(
                    "Header row {} is outside the used range ({} rows)",
                    index,
                    rows.len()
                )))
            }
            None => self.detector.detect(&rows),
        };

        // 3. 列範囲の決定
        let Some((left, right)) = resolve_bounds(&rows, header_index, self.bounds_lookahead)
        else {
            tracing::debug!(sheet = sheet.name(), "No table bounds found");
            return Ok(Grid::default());
        };
        tracing::debug!(
            sheet = sheet.name(),
            header_row = header_index,
            left,
            right,
            "Resolved table bounds"
        );

        // 4. ヘッダー行の構築
        let mut width = right - left + 1;
        let mut header = slice_row(&rows[header_index], left, width);
        if let Some(names) = &options.headers {
            if names.len() > width {
                width = names.len();
                header.resize(width, String::new());
            }
            for (slot, name) in header.iter_mut().zip(names) {
                slot.clone_from(name);
            }
        }
        if options.name_blank_headers {
            for (index, cell) in header.iter_mut().enumerate() {
                if is_blank(cell) {
                    *cell = format!("col_{}", index + 1);
                }
            }
        }

        // 5. データ行の切り出しとフィルタリング
        let data = rows[header_index + 1..]
            .iter()
            .map(|row| slice_row(row, left, width))
            .filter(|row| !is_skipped(row, options.skip_pattern.as_ref()));

        Ok(Grid::new(width, std::iter::once(header).chain(data)))
    }
}

/// 使用範囲の各行を描画
///
/// # 引数
///
/// * `sheet` - 対象シート
/// * `range` - 描画する範囲
/// * `renderer` - セルレンダラー
/// * `merges` - 結合セルの参照先マップ（Noneの場合は結合を補完しない）
/// * `trim` - セル値の前後の空白を除去するか
/// * `limit` - 描画する最大行数
pub(crate) fn render_rows(
    sheet: &Sheet,
    range: CellRange,
    renderer: &CellRenderer,
    merges: Option<&MergeMap>,
    trim: bool,
    limit: Option<usize>,
) -> Vec<Vec<String>> {
    let row_count = (range.end.row - range.start.row) as usize + 1;
    let limit = limit.unwrap_or(row_count).min(row_count);

    (range.start.row..=range.end.row)
        .take(limit)
        .map(|row| {
            (range.start.col..=range.end.col)
                .map(|col| {
                    let coord = CellCoord::new(row, col);
                    let source = merges.map_or(coord, |m| m.source_of(coord));
                    let rendered =
                        renderer.render(sheet.cell_at(source.row, source.col), sheet.is_1904());
                    if trim {
                        rendered.trim().to_string()
                    } else {
                        rendered
                    }
                })
                .collect()
        })
        .collect()
}

/// 型解釈なしのグリッドを生成（フォールバック用）
///
/// 申告された使用範囲を無視し、実際のセル配置から範囲を算出します。
/// 値はシリアル値などの生の文字列表現で出力されます。
pub(crate) fn raw_grid(sheet: &Sheet) -> Grid {
    let Some(bounds) = sheet.content_bounds() else {
        return Grid::default();
    };

    let (_, width) = bounds.size();
    let rows = (bounds.start.row..=bounds.end.row).map(|row| {
        (bounds.start.col..=bounds.end.col)
            .map(|col| sheet.cell_at(row, col).as_raw_string())
            .collect::<Vec<_>>()
    });

    Grid::new(width as usize, rows)
}

/// 行を[left, left + width)の範囲で切り出す（不足分は空文字列）
fn slice_row(row: &[String], left: usize, width: usize) -> Vec<String> {
    (left..left + width)
        .map(|col| row.get(col).cloned().unwrap_or_default())
        .collect()
}

fn is_skipped(row: &[String], pattern: Option<&Regex>) -> bool {
    match (pattern, row.first()) {
        (Some(pattern), Some(first)) => pattern.is_match(first),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;

    fn text(s: &str) -> CellValue {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }

    fn sheet_from(rows: &[&[&str]]) -> Sheet {
        Sheet::from_rows(
            "Sheet1",
            rows.iter()
                .map(|row| row.iter().map(|c| text(c)).collect())
                .collect(),
        )
    }

    fn extract(sheet: &Sheet, options: &TableOptions) -> Result<Grid, XlsxToCsvError> {
        let renderer = CellRenderer::default();
        let detector = HeaderDetector::new(&["date".to_string()], 50);
        TableExtractor::new(&renderer, &detector, 50).extract(sheet, options)
    }

    fn rows_of(grid: &Grid) -> Vec<Vec<&str>> {
        grid.rows()
            .iter()
            .map(|row| row.iter().map(|c| c.as_str()).collect())
            .collect()
    }

    #[test]
    fn test_grid_new_pads_and_drops_blank_rows() {
        let grid = Grid::new(
            3,
            vec![
                vec!["a".to_string(), "b".to_string(), "c".to_string()],
                vec!["1".to_string()],
                vec![" ".to_string(), String::new()],
            ],
        );
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.rows().len(), 2);
        assert_eq!(grid.rows()[1], vec!["1", "", ""]);
    }

    #[test]
    fn test_extract_skips_title_and_blank_rows() {
        let sheet = sheet_from(&[
            &["Monthly report", "", "", ""],
            &["", "", "", ""],
            &["", "id", "name", "amount"],
            &["", "1", "apple", "10"],
            &["", "", "", ""],
            &["", "2", "pear", "20"],
        ]);

        let grid = extract(&sheet, &TableOptions::default()).unwrap();
        assert_eq!(
            rows_of(&grid),
            vec![
                vec!["id", "name", "amount"],
                vec!["1", "apple", "10"],
                vec!["2", "pear", "20"],
            ]
        );
    }

    #[test]
    fn test_extract_slices_rows_to_header_bounds() {
        let sheet = sheet_from(&[&["a", "b", ""], &["1", "2", "3"]]);
        let options = TableOptions {
            header_row: Some(0),
            ..Default::default()
        };
        let grid = extract(&sheet, &options).unwrap();
        // ヘッダー範囲外のセルは切り捨てられ、幅はヘッダーに揃う
        assert_eq!(rows_of(&grid), vec![vec!["a", "b"], vec!["1", "2"]]);
    }

    #[test]
    fn test_extract_merge_fill() {
        let mut sheet = sheet_from(&[&["X", "", "h"], &["", "", "v"]]);
        sheet.add_merged_region(CellRange::new(CellCoord::new(0, 0), CellCoord::new(1, 1)));

        let filled = extract(
            &sheet,
            &TableOptions {
                fill_merges: true,
                header_row: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(rows_of(&filled), vec![vec!["X", "X", "h"], vec!["X", "X", "v"]]);

        let ragged = extract(
            &sheet,
            &TableOptions {
                header_row: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(rows_of(&ragged), vec![vec!["X", "", "h"], vec!["", "", "v"]]);
    }

    #[test]
    fn test_extract_merge_fill_beyond_used_range() {
        // 値を持つのはA1だけで、結合範囲A1:B2は使用範囲からはみ出す
        let mut sheet = sheet_from(&[&["X"]]);
        sheet.add_merged_region(CellRange::new(CellCoord::new(0, 0), CellCoord::new(1, 1)));
        let options = TableOptions {
            fill_merges: true,
            ..Default::default()
        };

        let grid = extract(&sheet, &options).unwrap();
        assert_eq!(rows_of(&grid), vec![vec!["X", "X"], vec!["X", "X"]]);
    }

    #[test]
    fn test_extract_merged_header_at_right_edge() {
        let mut sheet = sheet_from(&[&["id", "Amount"], &["1", ""]]);
        sheet.add_merged_region(CellRange::new(CellCoord::new(0, 1), CellCoord::new(0, 2)));

        let filled = extract(
            &sheet,
            &TableOptions {
                fill_merges: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            rows_of(&filled),
            vec![vec!["id", "Amount", "Amount"], vec!["1", "", ""]]
        );

        let plain = extract(&sheet, &TableOptions::default()).unwrap();
        assert_eq!(rows_of(&plain), vec![vec!["id", "Amount"], vec!["1", ""]]);
    }

    #[test]
    fn test_extract_explicit_header_row() {
        let sheet = sheet_from(&[&["a", "b", "c"], &["x", "y", ""], &["1", "2", ""]]);
        let options = TableOptions {
            header_row: Some(1),
            ..Default::default()
        };
        let grid = extract(&sheet, &options).unwrap();
        assert_eq!(rows_of(&grid), vec![vec!["x", "y"], vec!["1", "2"]]);
    }

    #[test]
    fn test_extract_header_row_out_of_range() {
        let sheet = sheet_from(&[&["a"]]);
        let options = TableOptions {
            header_row: Some(3),
            ..Default::default()
        };
        assert!(matches!(
            extract(&sheet, &options),
            Err(XlsxToCsvError::Config(_))
        ));
    }

    #[test]
    fn test_extract_skip_pattern_matches_first_cell() {
        let sheet = sheet_from(&[
            &["Date", "Value", "Note"],
            &["2024-01-01", "1", ""],
            &["Total", "1", ""],
            &["Source: internal", "", ""],
        ]);
        let options = TableOptions {
            skip_pattern: Some(Regex::new("^(Total|Source)").unwrap()),
            ..Default::default()
        };
        let grid = extract(&sheet, &options).unwrap();
        assert_eq!(
            rows_of(&grid),
            vec![vec!["Date", "Value", "Note"], vec!["2024-01-01", "1", ""]]
        );
    }

    #[test]
    fn test_extract_explicit_headers_replace_and_widen() {
        let sheet = sheet_from(&[&["a", "b"], &["1", "2"]]);
        let options = TableOptions {
            headers: Some(vec!["x".into(), "y".into(), "z".into()]),
            ..Default::default()
        };
        let grid = extract(&sheet, &options).unwrap();
        assert_eq!(rows_of(&grid), vec![vec!["x", "y", "z"], vec!["1", "2", ""]]);
    }

    #[test]
    fn test_extract_names_blank_headers() {
        let sheet = sheet_from(&[&["id", "", "name"], &["1", "", "a"]]);
        let options = TableOptions {
            name_blank_headers: true,
            ..Default::default()
        };
        let grid = extract(&sheet, &options).unwrap();
        assert_eq!(grid.header().unwrap(), &["id", "col_2", "name"]);
    }

    #[test]
    fn test_extract_trim_cells() {
        let sheet = sheet_from(&[&["  id ", "name"], &[" 1", "a  "]]);
        let options = TableOptions {
            trim_cells: true,
            ..Default::default()
        };
        let grid = extract(&sheet, &options).unwrap();
        assert_eq!(rows_of(&grid), vec![vec!["id", "name"], vec!["1", "a"]]);

        let untrimmed = extract(&sheet, &TableOptions::default()).unwrap();
        assert_eq!(untrimmed.rows()[1][1], "a  ");
    }

    #[test]
    fn test_extract_without_used_range() {
        let sheet = Sheet::new("Empty");
        assert!(extract(&sheet, &TableOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_extract_respects_declared_used_range() {
        let mut sheet = sheet_from(&[&["", ""], &["", "value"]]);
        sheet.set_used_range(Some(CellRange::new(
            CellCoord::new(0, 0),
            CellCoord::new(0, 0),
        )));
        assert!(extract(&sheet, &TableOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_raw_grid_uses_actual_content() {
        let mut sheet = Sheet::new("Raw");
        sheet.set_cell(4, 2, CellValue::Date(45658.0));
        sheet.set_cell(6, 3, CellValue::Bool(true));
        sheet.set_used_range(None);

        let grid = raw_grid(&sheet);
        assert_eq!(
            rows_of(&grid),
            vec![vec!["45658", ""], vec!["", "true"]]
        );
    }

    #[test]
    fn test_render_rows_limit() {
        let sheet = sheet_from(&[&["a"], &["b"], &["c"]]);
        let range = sheet.used_range().unwrap();
        let rows = render_rows(&sheet, range, &CellRenderer::default(), None, false, Some(2));
        assert_eq!(rows, vec![vec!["a".to_string()], vec!["b".to_string()]]);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn cell_strategy() -> impl Strategy<Value = String> {
            prop_oneof![
                Just(String::new()),
                Just(" ".to_string()),
                "[a-z0-9]{1,4}",
                Just("date".to_string()),
            ]
        }

        proptest! {
            #[test]
            fn test_every_row_matches_header_width(
                rows in prop::collection::vec(prop::collection::vec(cell_strategy(), 0..8), 1..12),
                fill_merges in any::<bool>(),
                name_blank_headers in any::<bool>(),
            ) {
                let refs: Vec<Vec<&str>> = rows
                    .iter()
                    .map(|row| row.iter().map(|c| c.as_str()).collect())
                    .collect();
                let slices: Vec<&[&str]> = refs.iter().map(|r| r.as_slice()).collect();
                let mut sheet = sheet_from(&slices);
                sheet.add_merged_region(CellRange::new(CellCoord::new(0, 0), CellCoord::new(1, 1)));

                let options = TableOptions {
                    fill_merges,
                    name_blank_headers,
                    ..Default::default()
                };
                let grid = extract(&sheet, &options).unwrap();
                let width = grid.width();
                for row in grid.rows() {
                    prop_assert_eq!(row.len(), width);
                    prop_assert!(!row.iter().all(|c| is_blank(c)));
                }
            }
        }
    }
}
