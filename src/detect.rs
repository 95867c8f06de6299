//! Header Detection Module
//!
//! 描画済みの行データからヘッダー行を推定し、表の左右の列範囲を決定するモジュール。

/// マーカー一致時に加算されるボーナス
const MARKER_BONUS: usize = 1000;

/// マーカー一致で即時採用するための最小セル数
const IMMEDIATE_ACCEPT_CELLS: usize = 3;

/// ヘッダー行検出器
#[derive(Debug, Clone)]
pub(crate) struct HeaderDetector {
    /// マーカートークン（小文字化済み）
    markers: Vec<String>,

    /// 走査する先頭行数
    window: usize,
}

impl HeaderDetector {
    /// 新しいHeaderDetectorインスタンスを生成
    ///
    /// # 引数
    ///
    /// * `markers` - ヘッダーであることを示すトークン（大文字小文字を区別しない）
    /// * `window` - 走査する先頭行数
    pub fn new(markers: &[String], window: usize) -> Self {
        Self {
            markers: markers
                .iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            window,
        }
    }

    /// ヘッダー行のインデックスを検出
    ///
    /// 各行の非空セル数をスコアとし、マーカーに一致するセルを含む行にはボーナスを加算します。
    /// 最もスコアの高い行（同点の場合は先頭に近い行）を返します。
    /// マーカーに一致し、かつ非空セルが3つ以上ある行は即座に採用されます。
    ///
    /// # 引数
    ///
    /// * `rows` - 描画済みの行データ（スライス前）
    ///
    /// # 戻り値
    ///
    /// ヘッダー行のインデックス（0始まり、行がない場合は0）
    pub fn detect(&self, rows: &[Vec<String>]) -> usize {
        let mut best_index = 0;
        let mut best_score = 0;

        for (index, row) in rows.iter().take(self.window).enumerate() {
            let non_blank = row.iter().filter(|cell| !is_blank(cell)).count();
            let has_marker = row.iter().any(|cell| self.is_marker(cell));

            if has_marker && non_blank >= IMMEDIATE_ACCEPT_CELLS {
                return index;
            }

            let score = non_blank + if has_marker { MARKER_BONUS } else { 0 };
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }

        best_index
    }

    fn is_marker(&self, cell: &str) -> bool {
        if self.markers.is_empty() {
            return false;
        }
        let normalized = cell.trim().to_lowercase();
        self.markers.iter().any(|marker| *marker == normalized)
    }
}

/// 表の列範囲（両端を含む）を決定
///
/// ヘッダー行の先頭・末尾の空セルを除いた範囲を返します。
/// ヘッダー行がすべて空の場合は、後続の行（最大`lookahead`行）のうち
/// 最も幅の広い行の長さを右端とし、左端を0とします。
///
/// # 戻り値
///
/// * `Some((left, right))` - 列範囲
/// * `None` - 対象となるデータが存在しない場合
pub(crate) fn resolve_bounds(
    rows: &[Vec<String>],
    header_index: usize,
    lookahead: usize,
) -> Option<(usize, usize)> {
    let header = rows.get(header_index)?;

    let left = header.iter().position(|cell| !is_blank(cell));
    let right = header.iter().rposition(|cell| !is_blank(cell));
    if let (Some(left), Some(right)) = (left, right) {
        return Some((left, right));
    }

    rows.iter()
        .skip(header_index + 1)
        .take(lookahead)
        .filter_map(|row| row.iter().rposition(|cell| !is_blank(cell)))
        .max()
        .map(|right| (0, right))
}

/// 空白のみのセルを空とみなす
pub(crate) fn is_blank(cell: &str) -> bool {
    cell.trim().is_empty()
}
