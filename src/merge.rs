//! Merge Resolver Module
//!
//! 結合セル範囲から「結合範囲内のセル → 左上（親）セル」の対応表を構築するモジュール。

use std::collections::HashMap;

use crate::types::{CellCoord, CellRange, MergedRegion};

/// ワークシートの最終行（0始まり）
const LAST_ROW: u32 = 1_048_575;

/// ワークシートの最終列（0始まり、XFD）
const LAST_COL: u32 = 16_383;

/// 結合セルの参照先マップ
///
/// 親セル自身はマップに含まれません（自分自身を参照するものとして扱う）。
#[derive(Debug, Default)]
pub(crate) struct MergeMap {
    sources: HashMap<CellCoord, CellCoord>,
}

impl MergeMap {
    /// 結合範囲のリストからマップを構築
    ///
    /// # 引数
    ///
    /// * `regions` - シートの結合範囲
    /// * `clip` - 対象とする範囲（列全体の結合などで巨大なマップを作らないように、
    ///   使用範囲の外側のセルは登録しない）
    pub fn build(regions: &[MergedRegion], clip: Option<CellRange>) -> Self {
        let mut sources = HashMap::new();

        for region in regions {
            let area = match clip {
                Some(clip) => match region.range.intersect(&clip) {
                    Some(area) => area,
                    None => continue,
                },
                None => region.range,
            };

            for row in area.start.row..=area.end.row {
                for col in area.start.col..=area.end.col {
                    let coord = CellCoord::new(row, col);
                    if coord != region.parent {
                        sources.insert(coord, region.parent);
                    }
                }
            }
        }

        Self { sources }
    }

    /// セルの値の読み出し元座標を取得
    pub fn source_of(&self, coord: CellCoord) -> CellCoord {
        self.sources.get(&coord).copied().unwrap_or(coord)
    }

    /// 登録された（親以外の）結合セルの数
    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

/// 使用範囲に交差する結合範囲の分だけ、描画範囲を右方向・下方向に広げる
///
/// 値を持つのは結合範囲の左上セルだけなので、使用範囲は結合範囲の右端・下端を
/// 含まないことがあります。行全体・列全体の結合はその方向には広げません。
///
/// # 引数
///
/// * `used` - シートの使用範囲
/// * `regions` - シートの結合範囲
///
/// # 戻り値
///
/// 使用範囲と、それに交差する結合範囲を合わせた範囲
pub(crate) fn expand_to_merges(used: CellRange, regions: &[MergedRegion]) -> CellRange {
    let mut end = used.end;

    for region in regions {
        if region.range.intersect(&used).is_none() {
            continue;
        }
        let range = region.range;
        if !(range.start.row == 0 && range.end.row == LAST_ROW) {
            end.row = end.row.max(range.end.row);
        }
        if !(range.start.col == 0 && range.end.col == LAST_COL) {
            end.col = end.col.max(range.end.col);
        }
    }

    CellRange::new(used.start, end)
}
